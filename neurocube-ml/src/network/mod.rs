//! Feed-forward policy/value network
//!
//! The network scores one free variable at a time: it maps the
//! [`crate::features::VAR_FEATURES`] features of a variable to
//! `[logit_pos, logit_neg, value]`.

mod policy_value;
mod tensor;

pub use policy_value::{DenseLayer, OUTPUT_DIM, POLICY_NEG, POLICY_POS, PolicyValueNet, VALUE};
pub use tensor::Tensor;

use crate::error::{ModelError, ModelResult};
use crate::features::VAR_FEATURES;
use serde::{Deserialize, Serialize};

/// Activation function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Leaky ReLU
    LeakyReLU,
    /// Hyperbolic tangent
    Tanh,
    /// Sigmoid
    Sigmoid,
    /// Identity
    Linear,
}

impl Activation {
    /// Apply the activation to one pre-activation value.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Linear => x,
        }
    }

    fn prefers_he_init(&self) -> bool {
        matches!(self, Activation::ReLU | Activation::LeakyReLU)
    }
}

/// Shape and regularisation of a [`PolicyValueNet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Layer widths, input first and output last
    pub layer_sizes: Vec<usize>,
    /// One activation per weight layer
    pub activations: Vec<Activation>,
    /// Dropout probability for hidden units, used only when dropout is on
    #[serde(default)]
    pub dropout_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![VAR_FEATURES, 32, 32, OUTPUT_DIM],
            activations: vec![Activation::ReLU, Activation::ReLU, Activation::Linear],
            dropout_rate: 0.1,
        }
    }
}

impl NetworkConfig {
    /// Check the shape against the feature and head layout.
    pub fn validate(&self) -> ModelResult<()> {
        if self.layer_sizes.len() < 2 {
            return Err(ModelError::InvalidConfig(
                "need at least an input and an output layer".into(),
            ));
        }
        if self.activations.len() != self.layer_sizes.len() - 1 {
            return Err(ModelError::InvalidConfig(format!(
                "{} activations for {} weight layers",
                self.activations.len(),
                self.layer_sizes.len() - 1
            )));
        }
        if self.layer_sizes[0] != VAR_FEATURES {
            return Err(ModelError::DimensionMismatch {
                expected: VAR_FEATURES,
                got: self.layer_sizes[0],
            });
        }
        let out = self.layer_sizes[self.layer_sizes.len() - 1];
        if out != OUTPUT_DIM {
            return Err(ModelError::DimensionMismatch {
                expected: OUTPUT_DIM,
                got: out,
            });
        }
        if self.layer_sizes.contains(&0) {
            return Err(ModelError::InvalidConfig("empty layer".into()));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(ModelError::InvalidConfig(format!(
                "dropout rate {} outside [0, 1)",
                self.dropout_rate
            )));
        }
        Ok(())
    }
}
