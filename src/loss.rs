//! Loss functions that reduce a prediction to a scalar tensor.

use crate::backprop;
use crate::error::Result;
use crate::graph::Tensor;

/// Maps a prediction and a target to a one-element loss tensor.
///
/// The returned tensor is a graph node, so calling `backward` on it fills
/// the gradients of everything that produced `prediction`.
pub trait Loss {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Evaluates the loss.
    ///
    /// # Errors
    /// Whatever shape errors the underlying operation reports.
    fn loss(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor>;
}

/// Mean squared error; see [`backprop::mse_loss`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mse;

impl Loss for Mse {
    fn name(&self) -> &'static str {
        "mse"
    }

    fn loss(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor> {
        backprop::mse_loss(prediction, target)
    }
}
