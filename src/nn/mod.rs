//! Neural-network building blocks on top of the autograd graph.
//!
//! A [`Layer`] maps an input tensor to an output tensor by composing
//! differentiable operations, and exposes the trainable tensors it owns.
//! Because parameters are shared [`Tensor`] handles, an optimizer built from
//! [`Layer::parameters`] updates the very same storage the layer reads on its
//! next forward pass.
//!
//! - [`Dense`]: affine map `x · W + b` with Xavier-initialised weights
//! - [`Relu`]: parameter-free activation
//! - [`Sequential`]: ordered container, itself a layer

use crate::error::Result;
use crate::graph::Tensor;

mod dense;
mod relu;
mod sequential;

pub use dense::Dense;
pub use relu::Relu;
pub use sequential::Sequential;

/// A differentiable function with (possibly zero) trainable parameters.
pub trait Layer {
    /// Runs the layer, recording its operations in the graph.
    ///
    /// # Errors
    /// Shape errors from the underlying operations.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Handles to the trainable tensors, in a stable order.
    fn parameters(&self) -> Vec<Tensor>;

    /// Zeroes the gradient of every parameter.
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }

    /// Alias of [`Layer::zero_grad`].
    fn zero_gradient(&self) {
        self.zero_grad();
    }
}

impl<L: Layer + ?Sized> Layer for Box<L> {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        (**self).forward(input)
    }

    fn parameters(&self) -> Vec<Tensor> {
        (**self).parameters()
    }

    fn zero_grad(&self) {
        (**self).zero_grad();
    }
}
