use super::Layer;
use crate::error::{GradError, Result};
use crate::graph::Tensor;
use crate::tensors::Array;
use log::debug;
use rand::Rng;

/// Fully connected layer computing `input · weights + bias`.
///
/// `weights` has shape `[in, out]` and `bias` has shape `[1, out]`; the bias
/// row is broadcast over every row of a batched input.
#[derive(Debug, Clone)]
pub struct Dense {
    weights: Tensor,
    bias: Tensor,
}

impl Dense {
    /// A layer with Xavier-uniform weights drawn from the thread-local RNG
    /// and a zero bias.
    #[must_use]
    pub fn new(in_size: usize, out_size: usize) -> Self {
        Self::with_rng(in_size, out_size, &mut rand::rng())
    }

    /// Like [`Dense::new`], but draws weights from `rng`.
    ///
    /// Weights are uniform in `[-s, s]` with `s = sqrt(2 / (in + out))`.
    #[must_use]
    pub fn with_rng<R: Rng + ?Sized>(in_size: usize, out_size: usize, rng: &mut R) -> Self {
        let scale = xavier_scale(in_size, out_size);
        let weights = (0..in_size * out_size)
            .map(|_| {
                if scale > 0.0 {
                    rng.random_range(-scale..=scale)
                } else {
                    0.0
                }
            })
            .collect::<Vec<_>>();

        debug!("dense {in_size}x{out_size}: xavier scale {scale:.4}");
        Self {
            weights: Tensor::new(Array::from_matrix_parts(in_size, out_size, weights)),
            bias: Tensor::new(Array::from_matrix_parts(1, out_size, vec![0.0; out_size])),
        }
    }

    /// A layer with explicit parameters.
    ///
    /// # Errors
    /// - [`GradError::DimensionMismatch`] if `weights` is not a matrix
    /// - [`GradError::ShapeMismatch`] if `bias` is not `[1, out]`
    pub fn from_parameters(weights: Array, bias: Array) -> Result<Self> {
        let [_, out] = weights.shape() else {
            return Err(GradError::DimensionMismatch {
                op: "dense",
                lhs: weights.shape().to_vec(),
                rhs: bias.shape().to_vec(),
            });
        };
        if bias.shape() != [1, *out] {
            return Err(GradError::ShapeMismatch {
                op: "dense",
                lhs: vec![1, *out],
                rhs: bias.shape().to_vec(),
            });
        }
        Ok(Self {
            weights: Tensor::new(weights),
            bias: Tensor::new(bias),
        })
    }

    /// The `[in, out]` weight matrix.
    #[must_use]
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// The `[1, out]` bias row.
    #[must_use]
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Number of input features.
    #[must_use]
    pub fn in_size(&self) -> usize {
        self.weights.shape()[0]
    }

    /// Number of output features.
    #[must_use]
    pub fn out_size(&self) -> usize {
        self.weights.shape()[1]
    }
}

impl Layer for Dense {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        input.matmul(&self.weights)?.add(&self.bias)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.weights.clone(), self.bias.clone()]
    }
}

fn xavier_scale(in_size: usize, out_size: usize) -> f64 {
    let fan = in_size + out_size;
    if fan == 0 {
        0.0
    } else {
        (2.0 / fan as f64).sqrt()
    }
}
