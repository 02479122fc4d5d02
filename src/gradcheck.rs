//! Finite-difference gradient checking.
//!
//! Used to validate the analytic adjoints in [`crate::backprop`]: evaluate a
//! scalar function through the graph, call `backward`, and compare the
//! gradient of an input against [`numeric_gradient`].
//!
//! ```rust
//! use minigrad::gradcheck::{max_abs_diff, numeric_gradient};
//! use minigrad::{tensor, Tensor};
//!
//! let x = tensor!([[1.0, -2.0]]);
//! let f = |x: &minigrad::Array| -> minigrad::Result<f64> {
//!     let t = Tensor::new(x.clone());
//!     minigrad::backprop::mse_loss(&t.relu(), &Tensor::constant(tensor!([[0.0, 0.0]])))?
//!         .item()
//!         .ok_or(minigrad::GradError::Empty { op: "item" })
//! };
//! let numeric = numeric_gradient(&x, 1e-6, f).unwrap();
//! assert!(max_abs_diff(&numeric, &tensor!([[1.0, 0.0]])).unwrap() < 1e-4);
//! ```

use crate::error::{GradError, Result};
use crate::tensors::Array;

/// Estimates `∂f/∂input` elementwise with central differences
/// `(f(x + eps) - f(x - eps)) / 2eps`.
///
/// # Errors
/// The first error returned by `f`, or [`GradError::InvalidConfig`] if `eps`
/// is not a finite positive number.
pub fn numeric_gradient<F>(input: &Array, eps: f64, mut f: F) -> Result<Array>
where
    F: FnMut(&Array) -> Result<f64>,
{
    if !eps.is_finite() || eps <= 0.0 {
        return Err(GradError::InvalidConfig(format!(
            "finite-difference step must be finite and positive, got {eps}"
        )));
    }

    let mut probe = input.clone();
    let mut grad = Vec::with_capacity(input.len());
    for i in 0..input.len() {
        let x = input.data()[i];

        probe.data_mut()[i] = x + eps;
        let plus = f(&probe)?;
        probe.data_mut()[i] = x - eps;
        let minus = f(&probe)?;
        probe.data_mut()[i] = x;

        grad.push((plus - minus) / (2.0 * eps));
    }
    Ok(input.with_same_shape(grad))
}

/// Largest elementwise `|a - b|`.
///
/// # Errors
/// [`GradError::ShapeMismatch`] if the shapes differ.
pub fn max_abs_diff(a: &Array, b: &Array) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(GradError::ShapeMismatch {
            op: "max_abs_diff",
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }
    Ok(a.data()
        .iter()
        .zip(b.data())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max))
}
