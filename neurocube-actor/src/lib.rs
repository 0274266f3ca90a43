//! neurocube-actor: the actor fleet
//!
//! Actors repeatedly play guided cube-and-conquer searches over a corpus of
//! DIMACS instances, pulling fresh network parameters from an aggregation
//! server before every episode and reporting search estimates and training
//! examples back to it.
//!
//! - [`config`]: the fleet file, role and device assignment
//! - [`corpus`]: eager, sorted instance loading
//! - [`protocol`], [`client`], [`server`]: JSON-lines RPC, the actor side
//!   and a reference aggregation service
//! - [`episode`], [`samples`]: one search, and the examples it yields
//! - [`actor`]: the per-process episode loop
//! - [`supervisor`]: one process per actor, with a restart budget

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actor;
pub mod client;
pub mod config;
pub mod corpus;
pub mod episode;
pub mod error;
pub mod protocol;
pub mod samples;
pub mod server;
pub mod supervisor;

pub use actor::{Actor, ActorStats};
pub use client::{AggregationServer, RemoteServer, resolve_endpoint};
pub use config::{FleetConfig, RewardShaping, RoleConfig};
pub use corpus::{Corpus, CorpusEntry};
pub use episode::run_episode;
pub use error::{ActorError, ActorResult, ConfigError};
pub use protocol::{ActorEpisodeReport, Request, Response, TrainingExample};
pub use samples::{generate_examples, minimal_trail};
pub use server::{AggregationService, JsonlSink, LocalServer, MemorySink, NullSink, ReportSink};
pub use supervisor::{FleetSummary, Supervisor, WorkerCommand, WorkerPlan, plan};
