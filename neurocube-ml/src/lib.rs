//! neurocube-ml: learned cube-and-conquer guidance
//!
//! This crate turns solver queries into decisions:
//! - **Features**: per-variable statistics of the residual formula
//! - **Network**: a small feed-forward policy/value network
//! - **Inference**: the actor-side connection that loads parameter snapshots
//!   from the aggregation server and scores queries
//! - **Policies**: cubers decide when to split, branchers pick the literal
//! - **Search**: one cube-and-conquer episode on an incremental solver
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use neurocube_ml::{Brancher, BrancherKind, Cuber, CuberKind, DeviceSlot, InferenceConfig, NeuroQuery};
//! use neurocube_sat::{ProblemInstance, Solver, SolverOptions};
//!
//! let instance = ProblemInstance::from_dimacs_clauses(2, &[vec![1, 2], vec![-1, 2], vec![-2]]).unwrap();
//! let mut solver = Solver::new(Arc::new(instance), SolverOptions::default());
//! let mut inference = NeuroQuery::new(InferenceConfig::default(), DeviceSlot::default()).unwrap();
//!
//! let cuber = Cuber::new(CuberKind::Depth { depth: 1 });
//! let brancher = Brancher::new(BrancherKind::Neural);
//! let outcome = neurocube_ml::search::play(&mut solver, &cuber, &brancher, &mut inference).unwrap();
//! assert!(outcome.is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod features;
pub mod inference;
pub mod network;
pub mod policy;
pub mod search;

pub use error::{ModelError, ModelResult};
pub use inference::{DeviceSlot, Evaluation, Inference, InferenceConfig, NeuroQuery, ParameterBlob, VarScore};
pub use network::{Activation, NetworkConfig, PolicyValueNet};
pub use policy::{Brancher, BrancherKind, Cuber, CuberKind, SearchNode};
pub use search::{EpisodeOutcome, play};
