//! Wire protocol between actors and the aggregation server
//!
//! Messages are JSON objects, one per line, over a TCP stream. Each request
//! is answered by exactly one response:
//!
//! | request | response |
//! |---------|----------|
//! | `{"type":"get_config"}` | `{"type":"config","config":{..}}` |
//! | `{"type":"get_weights"}` | `{"type":"weights","blob":{..}}` |
//! | `{"type":"process_actor_episode","report":{..}}` | `{"type":"ack"}` |
//!
//! Any request may be answered with `{"type":"error","message":".."}`.

use crate::error::{ActorError, ActorResult};
use neurocube_ml::{InferenceConfig, ParameterBlob};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// One supervised example derived from a refuted cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Variable count of the instance
    pub variable_count: u32,
    /// Clause count of the instance
    pub constraint_count: usize,
    /// `(literal slot, clause index)` pairs of the residual formula
    pub constraint_index_map: Vec<(u32, u32)>,
    /// 0-based variable the refutation decided next
    pub target_variable: u32,
    /// Discounted value target
    pub target_value: f64,
}

/// What an actor reports after a refuted episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorEpisodeReport {
    /// File name of the instance
    pub instance_id: String,
    /// Cuber that shaped the cube
    pub cuber_name: String,
    /// Brancher that picked the literals
    pub brancher_name: String,
    /// Search-tree size estimate
    pub estimate: f64,
    /// Training examples, empty for non-training actors
    pub examples: Vec<TrainingExample>,
}

/// Actor to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Inference configuration
    GetConfig,
    /// Current parameter snapshot
    GetWeights,
    /// Episode report
    ProcessActorEpisode {
        /// The report
        report: ActorEpisodeReport,
    },
}

/// Server to actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Answer to [`Request::GetConfig`]
    Config {
        /// Inference configuration
        config: InferenceConfig,
    },
    /// Answer to [`Request::GetWeights`]
    Weights {
        /// Parameter snapshot
        blob: ParameterBlob,
    },
    /// Answer to [`Request::ProcessActorEpisode`]
    Ack,
    /// The request failed
    Error {
        /// Reason
        message: String,
    },
}

impl Response {
    /// Payload of a [`Response::Config`].
    pub fn into_config(self) -> ActorResult<InferenceConfig> {
        match self {
            Response::Config { config } => Ok(config),
            other => Err(other.unexpected()),
        }
    }

    /// Payload of a [`Response::Weights`].
    pub fn into_weights(self) -> ActorResult<ParameterBlob> {
        match self {
            Response::Weights { blob } => Ok(blob),
            other => Err(other.unexpected()),
        }
    }

    /// Check for a [`Response::Ack`].
    pub fn into_ack(self) -> ActorResult<()> {
        match self {
            Response::Ack => Ok(()),
            other => Err(other.unexpected()),
        }
    }

    fn unexpected(self) -> ActorError {
        match self {
            Response::Error { message } => ActorError::Server(message),
            Response::Config { .. } => ActorError::Protocol("unexpected config".into()),
            Response::Weights { .. } => ActorError::Protocol("unexpected weights".into()),
            Response::Ack => ActorError::Protocol("unexpected ack".into()),
        }
    }
}

/// Write one message followed by a newline and flush.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let mut json = serde_json::to_vec(msg)?;
    json.push(b'\n');
    writer.write_all(&json)?;
    writer.flush()
}

/// Read one message; `None` once the peer has closed the stream.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    let msg = serde_json::from_str(line.trim())?;
    Ok(Some(msg))
}
