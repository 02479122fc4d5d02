//! Plain numeric storage underneath every graph node.
//!
//! # Arrays
//!
//! An [`Array`] is a scalar, a vector or a matrix of `f64`, stored as a shape
//! plus flat row-major data. It carries no gradient and no graph links; the
//! differentiable wrapper lives in [`crate::graph`].
//!
//! ## Design Highlights
//! - Rank is 0, 1 or 2 and never changes after construction
//! - Shape and length are checked once, through a `briny` [`Validate`] impl
//! - The `tensor!` macro builds arrays from nested literals
//! - Row broadcasting is limited to a `[1, N]` row against an `[M, N]` matrix
//!
//! ## Example
//!
//! ```rust
//! use minigrad::tensors::Array;
//! let a = Array::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! assert_eq!(a.shape(), &[2, 3]);
//! ```

use crate::error::{GradError, Result};
use crate::ops::cpu;
use briny::prelude::{TrustedData, Validate, ValidationError};

/// Highest supported rank (matrices).
pub const MAX_RANK: usize = 2;

/// A scalar, vector or matrix of `f64` with row-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Validate for Array {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.shape.len() > MAX_RANK {
            return Err(ValidationError);
        }
        if self.shape.iter().product::<usize>() != self.data.len() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Wrapper validating that every element is finite.
struct Finite<'a>(&'a [f64]);

impl Validate for Finite<'_> {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.0.iter().all(|x| x.is_finite()) {
            Ok(())
        } else {
            Err(ValidationError)
        }
    }
}

/// How two shapes combine under [`Array::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Broadcast {
    /// Identical shapes.
    Same,
    /// The left operand is a `[1, N]` row repeated over the right's rows.
    LhsRow,
    /// The right operand is a `[1, N]` row repeated over the left's rows.
    RhsRow,
}

impl Broadcast {
    /// Works out whether `lhs` and `rhs` can be added, and how.
    pub(crate) fn plan(lhs: &[usize], rhs: &[usize]) -> Option<Self> {
        if lhs == rhs {
            return Some(Self::Same);
        }
        match (lhs, rhs) {
            ([1, n], [_, m]) if n == m => Some(Self::LhsRow),
            ([_, n], [1, m]) if n == m => Some(Self::RhsRow),
            _ => None,
        }
    }
}

impl Array {
    /// Creates an array with the given shape and flat data.
    ///
    /// # Errors
    /// - [`GradError::UnsupportedRank`] if `shape` has more than two dimensions
    /// - [`GradError::InvalidShape`] if `data.len()` is not the shape product
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<f64>) -> Result<Self> {
        let shape = shape.into();
        if shape.len() > MAX_RANK {
            return Err(GradError::UnsupportedRank { rank: shape.len() });
        }

        let len = data.len();
        let expected = shape.clone();
        let trusted = TrustedData::new(Self { shape, data }).map_err(|_| {
            GradError::InvalidShape {
                shape: expected,
                len,
            }
        })?;
        Ok(trusted.into_inner())
    }

    /// A rank-0 array.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// A rank-1 array.
    #[must_use]
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: values,
        }
    }

    /// A rank-2 array from nested rows.
    ///
    /// # Errors
    /// [`GradError::RaggedRows`] if the rows differ in length.
    pub fn matrix(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(GradError::RaggedRows {
                    row,
                    expected: cols,
                    found: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Ok(Self {
            shape: vec![rows.len(), cols],
            data,
        })
    }

    /// An all-zero array of the given shape.
    ///
    /// # Errors
    /// [`GradError::UnsupportedRank`] for more than two dimensions.
    pub fn zeros(shape: &[usize]) -> Result<Self> {
        Self::filled(shape, 0.0)
    }

    /// An all-one array of the given shape.
    ///
    /// # Errors
    /// [`GradError::UnsupportedRank`] for more than two dimensions.
    pub fn ones(shape: &[usize]) -> Result<Self> {
        Self::filled(shape, 1.0)
    }

    fn filled(shape: &[usize], value: f64) -> Result<Self> {
        Self::new(shape, vec![value; shape.iter().product()])
    }

    /// Zeros with the same shape as `self`.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: vec![0.0; self.data.len()],
        }
    }

    /// Ones with the same shape as `self`.
    #[must_use]
    pub fn ones_like(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: vec![1.0; self.data.len()],
        }
    }

    /// The size along each dimension.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flat row-major elements.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// New data under the same shape; `data` must have `self.len()` elements.
    pub(crate) fn with_same_shape(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            shape: self.shape.clone(),
            data,
        }
    }

    /// A `[rows, cols]` matrix; `data` must have `rows * cols` elements.
    pub(crate) fn from_matrix_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self {
            shape: vec![rows, cols],
            data,
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Number of dimensions: 0, 1 or 2.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The single element of a one-element array.
    #[must_use]
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [x] => Some(*x),
            _ => None,
        }
    }

    /// Copies the elements out as rows.
    ///
    /// Scalars and vectors come back as a single row.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        match self.shape.as_slice() {
            [_, cols] if *cols > 0 => self.data.chunks(*cols).map(<[f64]>::to_vec).collect(),
            [rows, _] => vec![Vec::new(); *rows],
            _ => vec![self.data.clone()],
        }
    }

    /// Swaps the two axes of a matrix.
    ///
    /// # Errors
    /// [`GradError::DimensionMismatch`] if `self` is not a matrix.
    pub fn transpose(&self) -> Result<Self> {
        let [rows, cols] = self.matrix_dims().ok_or_else(|| GradError::DimensionMismatch {
            op: "transpose",
            lhs: self.shape.clone(),
            rhs: Vec::new(),
        })?;
        Ok(Self {
            shape: vec![cols, rows],
            data: cpu::transpose(&self.data, rows, cols),
        })
    }

    /// Matrix product `self · rhs`.
    ///
    /// # Errors
    /// [`GradError::DimensionMismatch`] unless both are matrices and
    /// `self.shape[1] == rhs.shape[0]`.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        let mismatch = || GradError::DimensionMismatch {
            op: "matmul",
            lhs: self.shape.clone(),
            rhs: rhs.shape.clone(),
        };
        let (Some([m, k]), Some([k2, n])) = (self.matrix_dims(), rhs.matrix_dims()) else {
            return Err(mismatch());
        };
        if k != k2 {
            return Err(mismatch());
        }
        Ok(Self {
            shape: vec![m, n],
            data: cpu::matmul(&self.data, &rhs.data, m, k, n),
        })
    }

    /// Elementwise sum, with a `[1, N]` row broadcast over `[M, N]` on either side.
    ///
    /// # Errors
    /// [`GradError::ShapeMismatch`] for any other combination of shapes.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        let plan = Broadcast::plan(&self.shape, &rhs.shape).ok_or_else(|| {
            GradError::ShapeMismatch {
                op: "add",
                lhs: self.shape.clone(),
                rhs: rhs.shape.clone(),
            }
        })?;
        let data = match plan {
            Broadcast::Same => cpu::add(&self.data, &rhs.data),
            Broadcast::LhsRow => cpu::add_row(&rhs.data, &self.data, self.data.len()),
            Broadcast::RhsRow => cpu::add_row(&self.data, &rhs.data, rhs.data.len()),
        };
        let shape = match plan {
            Broadcast::LhsRow => rhs.shape.clone(),
            Broadcast::Same | Broadcast::RhsRow => self.shape.clone(),
        };
        Ok(Self { shape, data })
    }

    /// Column sums of a matrix, as a `[1, cols]` row.
    pub(crate) fn sum_rows(&self) -> Self {
        let cols = self.shape.get(1).copied().unwrap_or(self.data.len());
        Self {
            shape: vec![1, cols],
            data: cpu::column_sums(&self.data, cols),
        }
    }

    /// Accumulates `rhs` into `self`. Shapes must already agree.
    pub(crate) fn add_assign(&mut self, rhs: &Self) {
        debug_assert_eq!(self.shape, rhs.shape, "gradient shape drifted");
        cpu::add_assign(&mut self.data, &rhs.data);
    }

    /// Resets every element to zero, keeping the shape.
    pub(crate) fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Fails if any element is NaN or infinite.
    ///
    /// # Errors
    /// [`GradError::NonFinite`] naming `what`.
    pub fn check_finite(&self, what: &str) -> Result<()> {
        Finite(&self.data)
            .validate()
            .map_err(|_| GradError::NonFinite {
                what: what.to_owned(),
            })
    }

    fn matrix_dims(&self) -> Option<[usize; 2]> {
        match self.shape.as_slice() {
            [rows, cols] => Some([*rows, *cols]),
            _ => None,
        }
    }
}

impl From<f64> for Array {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<f64>> for Array {
    fn from(values: Vec<f64>) -> Self {
        Self::vector(values)
    }
}

impl TryFrom<Vec<Vec<f64>>> for Array {
    type Error = GradError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::matrix(rows)
    }
}

/// Defines an [`Array`] from a scalar, a list, or a list of lists.
///
/// # Panics
/// Panics on ragged rows, like any malformed literal.
///
/// # Example
/// ```
/// use minigrad::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape(), &[2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ([ $( [ $( $x:expr ),* $(,)? ] ),+ $(,)? ]) => {
        match $crate::tensors::Array::matrix(vec![ $( vec![ $( $x as f64 ),* ] ),+ ]) {
            Ok(array) => array,
            Err(err) => panic!("invalid tensor literal: {err}"),
        }
    };

    ([ $( $x:expr ),* $(,)? ]) => {
        $crate::tensors::Array::vector(vec![ $( $x as f64 ),* ])
    };

    ($x:expr) => {
        $crate::tensors::Array::scalar($x as f64)
    };
}
