//! Parameter update rules.
//!
//! An optimizer holds shared handles to the tensors it trains and rewrites
//! their values from their accumulated gradients. It never clears gradients
//! on its own: call [`Optimizer::zero_grad`] (or the model's `zero_grad`)
//! before the next backward pass.

use crate::graph::Tensor;
use crate::ops::cpu;
use log::trace;

/// Updates a fixed set of parameters from their gradients.
pub trait Optimizer {
    /// Applies one update to every parameter.
    fn step(&mut self);

    /// Zeroes the gradient of every held parameter.
    fn zero_grad(&self);

    /// Current step size.
    fn learning_rate(&self) -> f64;

    /// Changes the step size used by later calls to [`Optimizer::step`].
    fn set_learning_rate(&mut self, lr: f64);
}

/// Plain stochastic gradient descent: `value -= lr * grad`.
#[derive(Debug, Clone)]
pub struct Sgd {
    params: Vec<Tensor>,
    lr: f64,
}

impl Sgd {
    /// Trains `params` with step size `lr`.
    ///
    /// # Example
    /// ```rust
    /// use minigrad::nn::{Dense, Layer};
    /// use minigrad::optim::{Optimizer, Sgd};
    ///
    /// let layer = Dense::new(2, 1);
    /// let sgd = Sgd::new(layer.parameters(), 0.1);
    /// assert_eq!(sgd.learning_rate(), 0.1);
    /// ```
    #[must_use]
    pub fn new(params: Vec<Tensor>, lr: f64) -> Self {
        Self { params, lr }
    }

    /// The tensors this optimizer updates.
    #[must_use]
    pub fn parameters(&self) -> &[Tensor] {
        &self.params
    }
}

impl Optimizer for Sgd {
    fn step(&mut self) {
        for param in &self.params {
            trace!("sgd update {} (lr {})", param.id(), self.lr);
            param.update_value(|value, grad| cpu::sgd_update(value.data_mut(), grad.data(), self.lr));
        }
    }

    fn zero_grad(&self) {
        for param in &self.params {
            param.zero_grad();
        }
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
}
