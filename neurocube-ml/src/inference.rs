//! Local inference connection
//!
//! A [`NeuroQuery`] owns a [`PolicyValueNet`] bound to a device slot. Actors
//! refresh its parameters from the aggregation server before every episode
//! with [`NeuroQuery::set_weights`] and evaluate queries through the
//! [`Inference`] trait, which search code is generic over.

use crate::error::{ModelError, ModelResult};
use crate::features;
use crate::network::{NetworkConfig, POLICY_NEG, POLICY_POS, PolicyValueNet, VALUE};
use neurocube_sat::{Lit, Query, Var};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Accelerator assignment of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSlot {
    /// Device index
    pub id: usize,
    /// Share of the device's memory this actor may claim
    pub fraction: f64,
}

impl Default for DeviceSlot {
    fn default() -> Self {
        Self {
            id: 0,
            fraction: 1.0,
        }
    }
}

/// Model configuration published by the aggregation server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Network shape
    #[serde(default)]
    pub network: NetworkConfig,
    /// Apply dropout while evaluating. Actors switch this off.
    #[serde(default)]
    pub dropout_training: bool,
}

/// Opaque parameter snapshot as served by the aggregation server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterBlob {
    /// Monotone snapshot counter
    pub version: u64,
    /// Serialized network
    pub bytes: Vec<u8>,
}

impl ParameterBlob {
    /// Snapshot of a network.
    pub fn from_network(version: u64, net: &PolicyValueNet) -> ModelResult<Self> {
        Ok(Self {
            version,
            bytes: net.to_bytes()?,
        })
    }
}

/// Branching scores of one free variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarScore {
    /// The variable
    pub var: Var,
    /// Logit for setting it true
    pub pos: f64,
    /// Logit for setting it false
    pub neg: f64,
}

/// Network output for a whole query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// One entry per free variable, in `Query::free_vars` order
    pub scores: Vec<VarScore>,
    /// Estimated difficulty of the residual formula
    pub value: f64,
}

impl Evaluation {
    /// Highest-scoring literal; ties go to the lower variable, then to the
    /// positive polarity.
    pub fn best_literal(&self) -> Option<Lit> {
        let mut best: Option<(f64, Lit)> = None;
        for s in &self.scores {
            let (logit, lit) = if s.pos >= s.neg {
                (s.pos, Lit::pos(s.var))
            } else {
                (s.neg, Lit::neg(s.var))
            };
            if best.is_none_or(|(b, _)| logit > b) {
                best = Some((logit, lit));
            }
        }
        best.map(|(_, lit)| lit)
    }
}

/// Something that can score queries.
pub trait Inference {
    /// Evaluate the residual formula described by `query`.
    fn evaluate(&mut self, query: &Query) -> ModelResult<Evaluation>;
}

/// Inference connection of one actor.
#[derive(Debug, Clone)]
pub struct NeuroQuery {
    config: InferenceConfig,
    device: DeviceSlot,
    net: PolicyValueNet,
    version: Option<u64>,
}

impl NeuroQuery {
    /// Open a connection with freshly initialised parameters.
    pub fn new(config: InferenceConfig, device: DeviceSlot) -> ModelResult<Self> {
        if !(0.0..=1.0).contains(&device.fraction) {
            return Err(ModelError::InvalidConfig(format!(
                "device fraction {} outside [0, 1]",
                device.fraction
            )));
        }
        let net = PolicyValueNet::new(config.network.clone())?;
        debug!(
            device = device.id,
            fraction = device.fraction,
            parameters = net.num_parameters(),
            "inference connection ready"
        );
        Ok(Self {
            config,
            device,
            net,
            version: None,
        })
    }

    /// Replace the parameters with a snapshot from the server.
    pub fn set_weights(&mut self, blob: &ParameterBlob) -> ModelResult<()> {
        let net = PolicyValueNet::from_bytes(&blob.bytes)?;
        if net.config().layer_sizes != self.config.network.layer_sizes {
            return Err(ModelError::InvalidConfig(format!(
                "parameter snapshot has layers {:?}, expected {:?}",
                net.config().layer_sizes,
                self.config.network.layer_sizes
            )));
        }
        self.net = net;
        self.version = Some(blob.version);
        debug!(version = blob.version, "loaded parameters");
        Ok(())
    }

    /// Configuration this connection was opened with.
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Device slot of this connection.
    pub fn device(&self) -> DeviceSlot {
        self.device
    }

    /// Version of the last loaded snapshot, if any.
    pub fn version(&self) -> Option<u64> {
        self.version
    }
}

impl Inference for NeuroQuery {
    fn evaluate(&mut self, query: &Query) -> ModelResult<Evaluation> {
        let rows = features::extract(query);
        if rows.is_empty() {
            return Ok(Evaluation::default());
        }

        let mut scores = Vec::with_capacity(rows.len());
        let mut value = 0.0;
        for (row, &var) in rows.iter().zip(&query.free_vars) {
            let out = self.net.forward(row, self.config.dropout_training)?;
            scores.push(VarScore {
                var,
                pos: out[POLICY_POS],
                neg: out[POLICY_NEG],
            });
            value += out[VALUE];
        }
        value /= rows.len() as f64;

        Ok(Evaluation { scores, value })
    }
}
