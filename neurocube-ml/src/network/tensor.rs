//! Dense tensors for the policy/value network.
//!
//! Only what a small feed-forward network needs at inference time: a flat
//! row-major buffer and matrix-vector products.

use crate::error::{ModelError, ModelResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A row-major tensor of rank 1 or 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Flat data storage
    pub data: Vec<f64>,
    /// Shape of the tensor
    pub shape: SmallVec<[usize; 2]>,
}

impl Tensor {
    /// Zero tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: vec![0.0; shape.iter().product()],
            shape: SmallVec::from_slice(shape),
        }
    }

    /// Tensor from data and shape.
    pub fn from_vec(data: Vec<f64>, shape: &[usize]) -> ModelResult<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: SmallVec::from_slice(shape),
        })
    }

    /// He initialisation for a `[rows, cols]` weight matrix feeding ReLU units.
    pub fn he_init(rows: usize, cols: usize) -> Self {
        let std = (2.0 / cols.max(1) as f64).sqrt();
        Self::random_normal(&[rows, cols], std)
    }

    /// Xavier/Glorot initialisation for a `[rows, cols]` weight matrix.
    pub fn xavier_init(rows: usize, cols: usize) -> Self {
        let limit = (6.0 / (rows + cols).max(1) as f64).sqrt();
        let mut rng = rand::rng();
        let data = (0..rows * cols)
            .map(|_| rng.random_range(-limit..=limit))
            .collect();
        Self {
            data,
            shape: SmallVec::from_slice(&[rows, cols]),
        }
    }

    fn random_normal(shape: &[usize], std: f64) -> Self {
        let mut rng = rand::rng();
        // Box-Muller
        let data = (0..shape.iter().product())
            .map(|_| {
                let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
                let u2: f64 = rng.random();
                std * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
            })
            .collect();
        Self {
            data,
            shape: SmallVec::from_slice(shape),
        }
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `self * x` for a `[rows, cols]` matrix and a `[cols]` vector.
    pub fn matvec(&self, x: &[f64]) -> ModelResult<Vec<f64>> {
        let [rows, cols] = self.shape[..] else {
            return Err(ModelError::InvalidConfig(format!(
                "matvec needs a matrix, got shape {:?}",
                self.shape
            )));
        };
        if x.len() != cols {
            return Err(ModelError::DimensionMismatch {
                expected: cols,
                got: x.len(),
            });
        }
        Ok((0..rows)
            .map(|r| {
                self.data[r * cols..(r + 1) * cols]
                    .iter()
                    .zip(x)
                    .map(|(w, v)| w * v)
                    .sum()
            })
            .collect())
    }

    /// True if any element is NaN or infinite.
    pub fn has_nan_or_inf(&self) -> bool {
        self.data.iter().any(|x| !x.is_finite())
    }

    /// Check that the buffer length matches the shape.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.shape.iter().product::<usize>()
    }
}
