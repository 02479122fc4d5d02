//! # Kernel Layer
//!
//! Raw numeric kernels that the graph operations are built from.
//!
//! ## Submodules
//!
//! - [`cpu`]: Rayon-parallel CPU loops over row-major slices
//!
//! ## Extending
//!
//! To add a new differentiable operation:
//!
//! 1. Implement its forward and adjoint loops in [`cpu`]
//! 2. Add an [`Op`](crate::graph::Op) variant and its arm in
//!    [`vector_jacobian`](crate::backprop::vector_jacobian)
//! 3. Keep shape checks in [`backprop`](crate::backprop), never in the kernels

pub mod cpu;
