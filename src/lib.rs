//! minigrad: a miniature reverse-mode automatic differentiation engine.
//!
//! Builds a dynamic computational graph of small `f64` tensors, records how
//! every value was produced, and computes the gradient of a scalar loss with
//! respect to everything upstream of it in a single reverse traversal.
//!
//! # Features
//!
//! - Scalars, vectors and matrices with eagerly checked shapes.
//! - Differentiable elementwise add (with bias-row broadcasting), matrix
//!   multiplication, ReLU and mean squared error.
//! - Iterative topological ordering, so every backward rule fires once.
//! - Dense layers, a sequential container, SGD and a small training loop.
//!
//! # Modules
//!
//! - [`tensors`]: plain numeric arrays and the `tensor!` macro.
//! - [`graph`]: the [`Tensor`] node handle.
//! - [`backprop`]: differentiable operations and the reverse pass.
//! - [`nn`], [`loss`], [`optim`], [`train`]: model building and training.
//! - [`approx`], [`gradcheck`]: numeric comparison helpers.
//!
//! # Example
//!
//! ```rust
//! use minigrad::prelude::*;
//!
//! let layer = Dense::from_parameters(tensor!([[1.0], [1.0]]), tensor!([[0.0]])).unwrap();
//! let x = Tensor::constant(tensor!([[1.0, 2.0]]));
//! let y = Tensor::constant(tensor!([[4.0]]));
//!
//! let mut sgd = Sgd::new(layer.parameters(), 0.1);
//! let loss = Mse.loss(&layer.forward(&x).unwrap(), &y).unwrap();
//! assert_eq!(loss.item(), Some(1.0));
//!
//! loss.backward().unwrap();
//! sgd.step();
//! let loss = Mse.loss(&layer.forward(&x).unwrap(), &y).unwrap();
//! assert!((loss.item().unwrap() - 0.04).abs() < 1e-12);
//! ```

pub mod approx;
pub mod backprop;
pub mod config;
pub mod error;
pub mod gradcheck;
pub mod graph;
pub mod loss;
pub mod nn;
pub mod ops;
pub mod optim;
pub mod tensors;
pub mod train;

pub use error::{GradError, Result};
pub use graph::{Op, Tensor, TensorId};
pub use tensors::Array;

/// The types most programs need.
pub mod prelude {
    pub use crate::config::TrainConfig;
    pub use crate::error::{GradError, Result};
    pub use crate::graph::Tensor;
    pub use crate::loss::{Loss, Mse};
    pub use crate::nn::{Dense, Layer, Relu, Sequential};
    pub use crate::optim::{Optimizer, Sgd};
    pub use crate::tensor;
    pub use crate::tensors::Array;
    pub use crate::train::{Batch, Trainer};
}
