//! Error types shared by every operation in the crate.
//!
//! All failures here are usage errors caught when an operation is built
//! (bad shapes, bad configuration) or when the optional finite-value
//! validation is requested. None of them are transient, so nothing retries.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = GradError> = core::result::Result<T, E>;

/// Everything that can go wrong while building or differentiating a graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradError {
    /// Operands of an elementwise op (or of a loss) do not line up.
    #[error("shape mismatch in `{op}`: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        /// The operation that rejected its operands.
        op: &'static str,
        /// Shape of the left operand.
        lhs: Vec<usize>,
        /// Shape of the right operand.
        rhs: Vec<usize>,
    },

    /// Matrix operands are not rank 2 or their inner dimensions differ.
    #[error("dimension mismatch in `{op}`: cannot combine {lhs:?} with {rhs:?}")]
    DimensionMismatch {
        /// The operation that rejected its operands.
        op: &'static str,
        /// Shape of the left operand.
        lhs: Vec<usize>,
        /// Shape of the right operand.
        rhs: Vec<usize>,
    },

    /// The data length does not match the product of the shape.
    #[error("shape {shape:?} is incompatible with {len} data elements")]
    InvalidShape {
        /// Requested shape.
        shape: Vec<usize>,
        /// Number of elements supplied.
        len: usize,
    },

    /// Only scalars, vectors and matrices exist here.
    #[error("unsupported rank {rank}: expected a scalar, vector or matrix")]
    UnsupportedRank {
        /// The rank that was asked for.
        rank: usize,
    },

    /// A nested row literal had rows of different lengths.
    #[error("ragged matrix: row {row} has {found} columns, expected {expected}")]
    RaggedRows {
        /// Index of the offending row.
        row: usize,
        /// Column count of the first row.
        expected: usize,
        /// Column count of the offending row.
        found: usize,
    },

    /// An adjoint was handed the wrong number of parent values.
    #[error("`{op}` expects {expected} operand(s), got {found}")]
    OperandCount {
        /// The operation whose adjoint was evaluated.
        op: &'static str,
        /// Operands the operation takes.
        expected: usize,
        /// Operands supplied.
        found: usize,
    },

    /// A reduction was asked to average zero elements.
    #[error("`{op}` needs at least one element")]
    Empty {
        /// The operation that received no elements.
        op: &'static str,
    },

    /// `backward()` seeds with ones, which only means something for scalars.
    #[error("backward needs a scalar root, got shape {shape:?}; use `backward_with` to seed explicitly")]
    NonScalarRoot {
        /// Shape of the rejected root.
        shape: Vec<usize>,
    },

    /// A NaN or infinity showed up where finite values were required.
    #[error("non-finite value in {what}")]
    NonFinite {
        /// What was being checked.
        what: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
