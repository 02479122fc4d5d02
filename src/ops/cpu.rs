//! CPU kernels over raw row-major slices.
//!
//! # CPU Backend
//!
//! These are the number-crunching loops behind every differentiable
//! operation. They know nothing about graphs or gradients; callers in
//! [`crate::tensors`] and [`crate::backprop`] check shapes first and hand
//! over plain slices plus dimensions.
//!
//! ## Features
//!
//! - Data parallelism inside a single call using [`rayon`](https://docs.rs/rayon)
//! - Deterministic output: every element is produced by exactly one task, and
//!   reductions run sequentially in index order
//!
//! ## Implemented Kernels
//!
//! - `add` / `add_row` / `add_assign`: elementwise and row-broadcast sums
//! - `column_sums`: reduction used by the broadcast adjoint
//! - `matmul` / `transpose`: naive `m×k · k×n` product and its helper
//! - `relu` / `relu_backward`: activation and its subgradient mask
//! - `mean_squared_error` / `mse_backward`: loss and its analytic gradient
//! - `sgd_update`: in-place `param -= lr * grad`
//!
//! ## Notes
//!
//! - Slice lengths are asserted in debug builds only; the callers own validation.

use rayon::prelude::*;

/// Elementwise `a + b`.
#[must_use]
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    a.par_iter().zip(b.par_iter()).map(|(x, y)| x + y).collect()
}

/// Adds `row` (length `cols`) to every row of `matrix`.
#[must_use]
pub fn add_row(matrix: &[f64], row: &[f64], cols: usize) -> Vec<f64> {
    debug_assert_eq!(row.len(), cols);
    let mut out = matrix.to_vec();
    if cols == 0 {
        return out;
    }
    out.par_chunks_mut(cols).for_each(|chunk| {
        for (x, b) in chunk.iter_mut().zip(row) {
            *x += b;
        }
    });
    out
}

/// Accumulates `src` into `dst` elementwise.
pub fn add_assign(dst: &mut [f64], src: &[f64]) {
    debug_assert_eq!(dst.len(), src.len());
    dst.par_iter_mut().zip(src.par_iter()).for_each(|(d, s)| *d += s);
}

/// Sums a row-major `[rows, cols]` matrix down its rows, giving one value per column.
#[must_use]
pub fn column_sums(data: &[f64], cols: usize) -> Vec<f64> {
    let mut acc = vec![0.0; cols];
    if cols == 0 {
        return acc;
    }
    for row in data.chunks(cols) {
        for (a, x) in acc.iter_mut().zip(row) {
            *a += x;
        }
    }
    acc
}

/// Performs `C = A × B` for row-major `A: m×k` and `B: k×n`.
///
/// Rows of `C` are computed in parallel; each dot product is accumulated in
/// index order so results do not depend on scheduling.
#[must_use]
pub fn matmul(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);

    let mut out = vec![0.0; m * n];
    if n == 0 {
        return out;
    }

    out.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, cell) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for l in 0..k {
                sum += a[i * k + l] * b[l * n + j];
            }
            *cell = sum;
        }
    });

    out
}

/// Transposes a row-major `[rows, cols]` matrix into `[cols, rows]`.
#[must_use]
pub fn transpose(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    debug_assert_eq!(data.len(), rows * cols);
    let mut out = vec![0.0; rows * cols];
    if rows == 0 {
        return out;
    }
    out.par_chunks_mut(rows).enumerate().for_each(|(j, col)| {
        for (i, cell) in col.iter_mut().enumerate() {
            *cell = data[i * cols + j];
        }
    });
    out
}

/// `max(0, x)` elementwise; NaN passes through.
#[must_use]
pub fn relu(data: &[f64]) -> Vec<f64> {
    data.par_iter()
        .map(|&x| if x <= 0.0 { 0.0 } else { x })
        .collect()
}

/// Passes `grad` through where `input > 0`, zero elsewhere (including at zero).
#[must_use]
pub fn relu_backward(input: &[f64], grad: &[f64]) -> Vec<f64> {
    debug_assert_eq!(input.len(), grad.len());
    input
        .par_iter()
        .zip(grad.par_iter())
        .map(|(&x, &dy)| if x > 0.0 { dy } else { 0.0 })
        .collect()
}

/// `mean((prediction - target)^2)`.
///
/// The sum runs sequentially so the same inputs always give the same bits.
#[must_use]
pub fn mean_squared_error(prediction: &[f64], target: &[f64]) -> f64 {
    debug_assert_eq!(prediction.len(), target.len());
    let n = prediction.len() as f64;
    prediction
        .iter()
        .zip(target)
        .map(|(&y, &t)| (y - t) * (y - t))
        .sum::<f64>()
        / n
}

/// `upstream * 2/n * (prediction - target)` elementwise.
#[must_use]
pub fn mse_backward(prediction: &[f64], target: &[f64], upstream: f64) -> Vec<f64> {
    debug_assert_eq!(prediction.len(), target.len());
    let scale = 2.0 * upstream / prediction.len() as f64;
    prediction
        .par_iter()
        .zip(target.par_iter())
        .map(|(&y, &t)| scale * (y - t))
        .collect()
}

/// In-place `param -= lr * grad`.
pub fn sgd_update(params: &mut [f64], grads: &[f64], lr: f64) {
    debug_assert_eq!(params.len(), grads.len());
    params
        .par_iter_mut()
        .zip(grads.par_iter())
        .for_each(|(w, g)| *w -= lr * g);
}
