//! Policy/value network evaluated once per free variable.

use super::{NetworkConfig, Tensor};
use crate::error::{ModelError, ModelResult};
use crate::network::Activation;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Index of the positive-polarity logit in the output.
pub const POLICY_POS: usize = 0;
/// Index of the negative-polarity logit in the output.
pub const POLICY_NEG: usize = 1;
/// Index of the value estimate in the output.
pub const VALUE: usize = 2;
/// Width of the output layer.
pub const OUTPUT_DIM: usize = 3;

/// Fully connected layer: `activation(W x + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix `[output_dim, input_dim]`
    pub weights: Tensor,
    /// Bias vector `[output_dim]`
    pub bias: Tensor,
    /// Activation function
    pub activation: Activation,
}

impl DenseLayer {
    /// Freshly initialised layer.
    pub fn new(input_dim: usize, output_dim: usize, activation: Activation) -> Self {
        let weights = if activation.prefers_he_init() {
            Tensor::he_init(output_dim, input_dim)
        } else {
            Tensor::xavier_init(output_dim, input_dim)
        };
        Self {
            weights,
            bias: Tensor::zeros(&[output_dim]),
            activation,
        }
    }

    fn input_dim(&self) -> usize {
        self.weights.shape().get(1).copied().unwrap_or(0)
    }

    fn output_dim(&self) -> usize {
        self.weights.shape().first().copied().unwrap_or(0)
    }

    fn forward(&self, input: &[f64]) -> ModelResult<Vec<f64>> {
        let mut z = self.weights.matvec(input)?;
        for (zi, b) in z.iter_mut().zip(&self.bias.data) {
            *zi = self.activation.apply(*zi + b);
        }
        Ok(z)
    }

    fn num_parameters(&self) -> usize {
        self.weights.size() + self.bias.size()
    }
}

/// Feed-forward network with a 3-wide policy/value head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyValueNet {
    config: NetworkConfig,
    layers: Vec<DenseLayer>,
}

impl PolicyValueNet {
    /// Randomly initialised network of the given shape.
    pub fn new(config: NetworkConfig) -> ModelResult<Self> {
        config.validate()?;
        let layers = config
            .layer_sizes
            .windows(2)
            .zip(&config.activations)
            .map(|(dims, &act)| DenseLayer::new(dims[0], dims[1], act))
            .collect();
        Ok(Self { config, layers })
    }

    /// Shape of the network.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Total number of weights and biases.
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DenseLayer::num_parameters).sum()
    }

    /// Evaluate one feature vector.
    ///
    /// With `dropout` set, every hidden unit is zeroed with probability
    /// `dropout_rate` and survivors are rescaled by `1 / (1 - dropout_rate)`.
    pub fn forward(&self, input: &[f64], dropout: bool) -> ModelResult<[f64; OUTPUT_DIM]> {
        let mut rng = rand::rng();
        let keep = 1.0 - self.config.dropout_rate;
        let last = self.layers.len().saturating_sub(1);

        let mut x = input.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if dropout && i < last && self.config.dropout_rate > 0.0 {
                for xi in &mut x {
                    *xi = if rng.random::<f64>() < keep {
                        *xi / keep
                    } else {
                        0.0
                    };
                }
            }
        }

        let out: [f64; OUTPUT_DIM] = x.try_into().map_err(|v: Vec<f64>| {
            ModelError::DimensionMismatch {
                expected: OUTPUT_DIM,
                got: v.len(),
            }
        })?;
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NumericalError(format!(
                "non-finite network output {out:?}"
            )));
        }
        Ok(out)
    }

    /// Serialize to the JSON parameter blob format.
    pub fn to_bytes(&self) -> ModelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ModelError::SerializationError(e.to_string()))
    }

    /// Load from a parameter blob, checking that the layers chain up and
    /// match the stored configuration.
    pub fn from_bytes(data: &[u8]) -> ModelResult<Self> {
        let net: PolicyValueNet = serde_json::from_slice(data)
            .map_err(|e| ModelError::SerializationError(e.to_string()))?;
        net.check()?;
        Ok(net)
    }

    fn check(&self) -> ModelResult<()> {
        self.config.validate()?;
        if self.layers.len() != self.config.activations.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.config.activations.len(),
                got: self.layers.len(),
            });
        }
        for (i, layer) in self.layers.iter().enumerate() {
            let (input, output) = (self.config.layer_sizes[i], self.config.layer_sizes[i + 1]);
            if layer.weights.shape().len() != 2 || !layer.weights.is_consistent() {
                return Err(ModelError::InvalidConfig(format!(
                    "layer {i}: malformed weight tensor"
                )));
            }
            if layer.input_dim() != input {
                return Err(ModelError::DimensionMismatch {
                    expected: input,
                    got: layer.input_dim(),
                });
            }
            if layer.output_dim() != output || layer.bias.size() != output {
                return Err(ModelError::DimensionMismatch {
                    expected: output,
                    got: layer.bias.size().min(layer.output_dim()),
                });
            }
            if layer.activation != self.config.activations[i] {
                return Err(ModelError::InvalidConfig(format!(
                    "layer {i}: activation does not match configuration"
                )));
            }
            if layer.weights.has_nan_or_inf() || layer.bias.has_nan_or_inf() {
                return Err(ModelError::NumericalError(format!(
                    "layer {i}: non-finite parameters"
                )));
            }
        }
        Ok(())
    }
}
