//! Graph nodes: values that remember how they were produced.
//!
//! A [`Tensor`] is a cheap, clonable handle to a node holding an [`Array`]
//! value, a gradient of the same shape, the parents it was computed from and
//! an [`Op`] tag naming the operation that produced it. Cloning the handle
//! shares the node; layer parameters rely on this so the optimizer and the
//! layer see the same storage.
//!
//! Handles are `Rc`-based and therefore neither `Send` nor `Sync`: a graph
//! lives on the thread that built it.

use crate::backprop;
use crate::error::Result;
use crate::tensors::Array;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Source of node identifiers. Relaxed ordering is enough: ids only need
/// to be unique, not ordered across threads.
static NEXT_TENSOR_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a graph node, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(u64);

impl TensorId {
    fn fresh() -> Self {
        Self(NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The operation that produced a node, and whatever its adjoint needs
/// beyond the parents' values.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Inputs, parameters and constants.
    Leaf,
    /// Elementwise sum, possibly with a broadcast `[1, N]` row.
    Add,
    /// Matrix product of two parents.
    MatMul,
    /// Rectified linear unit.
    Relu,
    /// Mean squared error against a target snapshot.
    Mse {
        /// Target values; never differentiated.
        target: Array,
    },
}

impl Op {
    /// Short lowercase name, used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::Add => "add",
            Self::MatMul => "matmul",
            Self::Relu => "relu",
            Self::Mse { .. } => "mse_loss",
        }
    }
}

pub(crate) struct Node {
    pub(crate) id: TensorId,
    pub(crate) value: Array,
    pub(crate) grad: Array,
    pub(crate) requires_grad: bool,
    pub(crate) op: Op,
    pub(crate) parents: Vec<Tensor>,
}

impl Drop for Node {
    // Unlinks uniquely owned ancestors iteratively so dropping a long chain
    // does not recurse once per node.
    fn drop(&mut self) {
        let mut pending = core::mem::take(&mut self.parents);
        while let Some(parent) = pending.pop() {
            if let Ok(cell) = Rc::try_unwrap(parent.0) {
                let mut node = cell.into_inner();
                pending.append(&mut node.parents);
            }
        }
    }
}

/// Shared handle to a node of the computational graph.
#[derive(Clone)]
pub struct Tensor(Rc<RefCell<Node>>);

impl Tensor {
    /// A trainable leaf: it accumulates a gradient during backward.
    #[must_use]
    pub fn new(value: Array) -> Self {
        Self::leaf(value, true)
    }

    /// A leaf that never receives a gradient (inputs, targets).
    #[must_use]
    pub fn constant(value: Array) -> Self {
        Self::leaf(value, false)
    }

    /// A trainable rank-0 leaf.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self::new(Array::scalar(value))
    }

    /// A trainable rank-1 leaf.
    #[must_use]
    pub fn vector(values: Vec<f64>) -> Self {
        Self::new(Array::vector(values))
    }

    /// A trainable rank-2 leaf from nested rows.
    ///
    /// # Errors
    /// [`GradError::RaggedRows`](crate::GradError::RaggedRows) on uneven rows.
    pub fn matrix(rows: Vec<Vec<f64>>) -> Result<Self> {
        Ok(Self::new(Array::matrix(rows)?))
    }

    fn leaf(value: Array, requires_grad: bool) -> Self {
        Self::from_node(value, Op::Leaf, Vec::new(), requires_grad)
    }

    /// Builds an interior node. It needs a gradient iff any parent does.
    pub(crate) fn from_op(value: Array, op: Op, parents: Vec<Self>) -> Self {
        let requires_grad = parents.iter().any(Self::requires_grad);
        Self::from_node(value, op, parents, requires_grad)
    }

    fn from_node(value: Array, op: Op, parents: Vec<Self>, requires_grad: bool) -> Self {
        let grad = value.zeros_like();
        Self(Rc::new(RefCell::new(Node {
            id: TensorId::fresh(),
            value,
            grad,
            requires_grad,
            op,
            parents,
        })))
    }

    /// Stable identity of this node.
    #[must_use]
    pub fn id(&self) -> TensorId {
        self.0.borrow().id
    }

    /// Read access to the value.
    ///
    /// Drop the guard before calling `backward` or an optimizer step.
    #[must_use]
    pub fn value(&self) -> Ref<'_, Array> {
        Ref::map(self.0.borrow(), |node| &node.value)
    }

    /// Read access to the accumulated gradient.
    #[must_use]
    pub fn grad(&self) -> Ref<'_, Array> {
        Ref::map(self.0.borrow(), |node| &node.grad)
    }

    /// Shape of the value (and of the gradient).
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.0.borrow().value.shape().to_vec()
    }

    /// Number of elements in the value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().value.len()
    }

    /// True when the value holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value of a one-element tensor, such as a loss.
    #[must_use]
    pub fn item(&self) -> Option<f64> {
        self.0.borrow().value.item()
    }

    /// Whether backward propagates into this node.
    #[must_use]
    pub fn requires_grad(&self) -> bool {
        self.0.borrow().requires_grad
    }

    /// True for nodes that were not produced by an operation.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.0.borrow().op == Op::Leaf
    }

    /// Name of the producing operation.
    #[must_use]
    pub fn op_name(&self) -> &'static str {
        self.0.borrow().op.name()
    }

    /// Handles to the nodes this one was computed from.
    #[must_use]
    pub fn parents(&self) -> Vec<Self> {
        self.0.borrow().parents.clone()
    }

    /// Resets the gradient to zeros of the value's shape.
    pub fn zero_grad(&self) {
        self.0.borrow_mut().grad.fill_zero();
    }

    /// Fails if the value or the gradient contains NaN or infinity.
    ///
    /// # Errors
    /// [`GradError::NonFinite`](crate::GradError::NonFinite).
    pub fn check_finite(&self) -> Result<()> {
        let node = self.0.borrow();
        node.value
            .check_finite(&format!("value of {} tensor {}", node.op.name(), node.id))?;
        node.grad
            .check_finite(&format!("gradient of {} tensor {}", node.op.name(), node.id))
    }

    /// Elementwise sum; see [`backprop::add`].
    ///
    /// # Errors
    /// [`GradError::ShapeMismatch`](crate::GradError::ShapeMismatch).
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        backprop::add(self, rhs)
    }

    /// Matrix product; see [`backprop::matmul`].
    ///
    /// # Errors
    /// [`GradError::DimensionMismatch`](crate::GradError::DimensionMismatch).
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        backprop::matmul(self, rhs)
    }

    /// Rectified linear unit; see [`backprop::relu`].
    #[must_use]
    pub fn relu(&self) -> Self {
        backprop::relu(self)
    }

    /// Reverse pass from this scalar; see [`backprop::backward`].
    ///
    /// # Errors
    /// [`GradError::NonScalarRoot`](crate::GradError::NonScalarRoot) for roots
    /// with more than one element.
    pub fn backward(&self) -> Result<()> {
        backprop::backward(self)
    }

    /// Reverse pass seeded with an explicit gradient; see [`backprop::backward_with`].
    ///
    /// # Errors
    /// [`GradError::ShapeMismatch`](crate::GradError::ShapeMismatch) if `seed`
    /// is not shaped like this tensor.
    pub fn backward_with(&self, seed: Array) -> Result<()> {
        backprop::backward_with(self, seed)
    }

    pub(crate) fn node(&self) -> Ref<'_, Node> {
        self.0.borrow()
    }

    /// Adds `delta` into the gradient.
    pub(crate) fn accumulate_grad(&self, delta: &Array) {
        self.0.borrow_mut().grad.add_assign(delta);
    }

    /// Overwrites the gradient; the caller guarantees the shape.
    pub(crate) fn set_grad(&self, grad: Array) {
        let mut node = self.0.borrow_mut();
        debug_assert_eq!(node.value.shape(), grad.shape());
        node.grad = grad;
    }

    /// Gives `f` mutable access to the value alongside the gradient.
    pub(crate) fn update_value(&self, f: impl FnOnce(&mut Array, &Array)) {
        let mut node = self.0.borrow_mut();
        let Node { value, grad, .. } = &mut *node;
        f(value, grad);
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Tensor")
            .field("id", &node.id)
            .field("op", &node.op.name())
            .field("shape", &node.value.shape())
            .field("requires_grad", &node.requires_grad)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn leaves_start_with_zero_gradient_of_same_shape() {
        let t = Tensor::new(tensor!([[1.0, 2.0, 3.0]]));
        assert_eq!(t.grad().shape(), t.value().shape());
        assert!(t.grad().data().iter().all(|&g| g == 0.0));
        assert!(t.is_leaf());
        assert!(t.requires_grad());
        assert!(!Tensor::constant(tensor!(1.0)).requires_grad());
    }

    #[test]
    fn ids_are_unique() {
        let a = Tensor::scalar(1.0);
        let b = Tensor::scalar(1.0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn op_results_inherit_requires_grad() {
        let x = Tensor::constant(tensor!([1.0, 2.0]));
        let w = Tensor::new(tensor!([1.0, 2.0]));
        assert!(x.add(&w).unwrap().requires_grad());
        assert!(!x.add(&x).unwrap().requires_grad());
    }

    #[test]
    fn zero_grad_keeps_shape() {
        let t = Tensor::new(tensor!([[1.0, 2.0]]));
        t.accumulate_grad(&tensor!([[3.0, 4.0]]));
        t.zero_grad();
        assert_eq!(t.grad().data(), &[0.0, 0.0]);
        assert_eq!(t.grad().shape(), &[1, 2]);
    }
}
