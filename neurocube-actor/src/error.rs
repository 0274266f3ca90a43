//! Error types of the actor fleet.

use neurocube_ml::ModelError;
use neurocube_sat::ParseError;
use std::io;
use std::path::PathBuf;

/// Invalid fleet configuration. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid JSON for a fleet
    #[error("invalid fleet configuration {}: {source}", path.display())]
    Json {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The fleet has no actors at all
    #[error("fleet configuration declares no actors")]
    NoActors,

    /// Worker index past the last role
    #[error("no actor role for index {index} (fleet has {total} actors)")]
    NoRole {
        /// Requested worker index
        index: usize,
        /// Total number of actors
        total: usize,
    },

    /// `v_reward_decay_steps` must be strictly positive
    #[error("v_reward_decay_steps must be positive, got {0}")]
    DecaySteps(f64),

    /// `gpu_frac` outside `[0, 1]`
    #[error("gpu_frac must lie in [0, 1], got {0}")]
    DeviceFraction(f64),

    /// `gpu_frac * n_gpus / total` gives an actor more than one device
    #[error("per-actor device share {0} exceeds one device")]
    DeviceShare(f64),

    /// A role without cubers or branchers would never play an episode
    #[error("actor role {role} has no {what}")]
    EmptyPolicies {
        /// Role position in the fleet file
        role: usize,
        /// `"cubers"` or `"branchers"`
        what: &'static str,
    },
}

/// Errors that stop an actor or the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Corpus directory could not be walked
    #[error("cannot walk corpus directory {}: {source}", path.display())]
    CorpusWalk {
        /// Corpus root
        path: PathBuf,
        /// Underlying error
        #[source]
        source: walkdir::Error,
    },

    /// A corpus file is not a valid DIMACS instance
    #[error("malformed instance {}: {source}", path.display())]
    MalformedInstance {
        /// Offending file
        path: PathBuf,
        /// Parse failure
        #[source]
        source: ParseError,
    },

    /// Corpus directory holds no instance
    #[error("corpus directory {} contains no instances", .0.display())]
    EmptyCorpus(PathBuf),

    /// Inference model failure (broken parameters)
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Aggregation server could not be located
    #[error("cannot resolve aggregation server {name}: {message}")]
    Resolve {
        /// Name or address that was looked up
        name: String,
        /// Resolver message
        message: String,
    },

    /// Connection to the aggregation server failed
    #[error("aggregation server {endpoint}: {source}")]
    Transport {
        /// Server address
        endpoint: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The server answered with something else than the expected response
    #[error("unexpected response from aggregation server: {0}")]
    Protocol(String),

    /// The server reported a failure
    #[error("aggregation server error: {0}")]
    Server(String),

    /// A worker process could not be started
    #[error("cannot launch worker {index}: {source}")]
    Spawn {
        /// Worker index
        index: usize,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Episode coordinates outside the actor's schedule
    #[error("no episode at instance {instance}, brancher {brancher}, cuber {cuber}")]
    NoEpisode {
        /// Corpus position
        instance: usize,
        /// Brancher position
        brancher: usize,
        /// Cuber position
        cuber: usize,
    },

    /// Workers that exited with a failure and ran out of restarts
    #[error("workers failed: {0:?}")]
    WorkersFailed(Vec<usize>),

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type for actor operations
pub type ActorResult<T> = Result<T, ActorError>;
