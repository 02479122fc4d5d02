//! Differentiable operations and the reverse pass.
//!
//! # Backpropagation Primitives
//!
//! **Key Features:**
//! - **Elementwise Add:** equal shapes, or a `[1, N]` row broadcast over `[M, N]`.
//! - **Matrix Multiplication:** naïve m×k · k×n product with transposed adjoints.
//! - **Elementwise Activation (ReLU):** zero-out negatives, gate gradients on `x > 0`.
//! - **Loss Computation (MSE):** mean squared error against a constant target.
//!
//! ## Autograd Pattern
//!
//! Each operation follows the same pattern:
//! 1. **Inputs** are [`Tensor`] handles.
//! 2. **Forward Pass** computes an [`Array`] eagerly and checks shapes up front.
//! 3. **Recording** stores the parents plus an [`Op`] tag on the new node.
//! 4. **Backward Pass** walks the graph in reverse topological order and asks
//!    [`vector_jacobian`] for each node's contributions to its parents.
//!
//! `vector_jacobian` is a pure function of the tag, the parents' values and
//! the node's own gradient, so adjoints never build graph nodes themselves.
//!
//! ## Usage Guidelines
//!
//! - Shape problems are returned as errors when the operation is built.
//! - [`backward`] only accepts one-element roots; seed anything else with
//!   [`backward_with`].
//! - Gradients accumulate: zero them between backward calls.

use crate::error::{GradError, Result};
use crate::graph::{Op, Tensor, TensorId};
use crate::ops::cpu;
use crate::tensors::{Array, Broadcast};
use log::{debug, trace};
use std::cell::Ref;
use std::collections::HashSet;

/// Elementwise sum `a + b`.
///
/// Shapes must match, except that a `[1, N]` row on either side is added to
/// every row of an `[M, N]` matrix. The broadcast operand receives the column
/// sums of the upstream gradient.
///
/// # Errors
/// [`GradError::ShapeMismatch`] for any other shape combination.
///
/// # Example
/// ```rust
/// use minigrad::{backprop::add, tensor, Tensor};
///
/// let a = Tensor::new(tensor!([[1.0, 2.0]]));
/// let b = Tensor::new(tensor!([[3.0, 4.0]]));
/// let c = add(&a, &b).unwrap();
/// assert_eq!(c.value().data(), &[4.0, 6.0]);
/// ```
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let value = a.value().add(&b.value())?;
    Ok(Tensor::from_op(value, Op::Add, vec![a.clone(), b.clone()]))
}

/// Matrix product of `a` (m×k) and `b` (k×n).
///
/// # Errors
/// [`GradError::DimensionMismatch`] unless both are matrices with
/// `a.shape[1] == b.shape[0]`.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let value = a.value().matmul(&b.value())?;
    Ok(Tensor::from_op(value, Op::MatMul, vec![a.clone(), b.clone()]))
}

/// Applies `max(0, x)` elementwise.
///
/// The adjoint passes the upstream gradient only where the input was
/// strictly positive.
#[must_use]
pub fn relu(a: &Tensor) -> Tensor {
    let value = {
        let input = a.value();
        input.with_same_shape(cpu::relu(input.data()))
    };
    Tensor::from_op(value, Op::Relu, vec![a.clone()])
}

/// Mean squared error `mean((prediction - target)^2)` as a rank-0 tensor.
///
/// Both operands are flattened, so only their element counts must agree.
/// The target is snapshotted as a constant: it is not a parent of the result
/// and never receives a gradient.
///
/// # Errors
/// - [`GradError::ShapeMismatch`] if the element counts differ
/// - [`GradError::Empty`] if there are no elements to average
///
/// # Example
/// ```rust
/// use minigrad::{backprop::mse_loss, tensor, Tensor};
///
/// let pred = Tensor::new(tensor!([[1.0, 2.0]]));
/// let target = Tensor::constant(tensor!([[1.0, 1.0]]));
/// let loss = mse_loss(&pred, &target).unwrap();
/// assert_eq!(loss.item(), Some(0.5));
/// ```
pub fn mse_loss(prediction: &Tensor, target: &Tensor) -> Result<Tensor> {
    let (loss, target) = {
        let pred = prediction.value();
        let target = target.value();
        if pred.len() != target.len() {
            return Err(GradError::ShapeMismatch {
                op: "mse_loss",
                lhs: pred.shape().to_vec(),
                rhs: target.shape().to_vec(),
            });
        }
        if pred.is_empty() {
            return Err(GradError::Empty { op: "mse_loss" });
        }
        (
            cpu::mean_squared_error(pred.data(), target.data()),
            target.clone(),
        )
    };

    Ok(Tensor::from_op(
        Array::scalar(loss),
        Op::Mse { target },
        vec![prediction.clone()],
    ))
}

/// Local gradients of one node: maps its gradient to one delta per parent.
///
/// `inputs` are the parents' values in the order they were recorded. The
/// returned deltas are shaped like the corresponding inputs.
///
/// # Errors
/// - [`GradError::OperandCount`] if `inputs` does not match the op's arity
/// - shape errors if the inputs no longer fit the recorded operation
pub fn vector_jacobian(op: &Op, inputs: &[&Array], grad: &Array) -> Result<Vec<Array>> {
    match (op, inputs) {
        (Op::Leaf, []) => Ok(Vec::new()),

        (Op::Add, [a, b]) => {
            let plan = Broadcast::plan(a.shape(), b.shape()).ok_or_else(|| {
                GradError::ShapeMismatch {
                    op: "add",
                    lhs: a.shape().to_vec(),
                    rhs: b.shape().to_vec(),
                }
            })?;
            Ok(match plan {
                Broadcast::Same => vec![grad.clone(), grad.clone()],
                Broadcast::LhsRow => vec![grad.sum_rows(), grad.clone()],
                Broadcast::RhsRow => vec![grad.clone(), grad.sum_rows()],
            })
        }

        (Op::MatMul, [a, b]) => {
            // dA = dC · Bᵀ, dB = Aᵀ · dC
            let grad_a = grad.matmul(&b.transpose()?)?;
            let grad_b = a.transpose()?.matmul(grad)?;
            Ok(vec![grad_a, grad_b])
        }

        (Op::Relu, [a]) => Ok(vec![
            a.with_same_shape(cpu::relu_backward(a.data(), grad.data())),
        ]),

        (Op::Mse { target }, [pred]) => {
            let upstream = grad.data().iter().sum::<f64>();
            Ok(vec![pred.with_same_shape(cpu::mse_backward(
                pred.data(),
                target.data(),
                upstream,
            ))])
        }

        (op, inputs) => Err(GradError::OperandCount {
            op: op.name(),
            expected: arity(op),
            found: inputs.len(),
        }),
    }
}

const fn arity(op: &Op) -> usize {
    match op {
        Op::Leaf => 0,
        Op::Relu | Op::Mse { .. } => 1,
        Op::Add | Op::MatMul => 2,
    }
}

/// Orders every node reachable from `root` so each appears after all of its
/// parents; `root` comes last.
///
/// This is a depth-first post-order walk. It is iterative, so long chains do
/// not grow the call stack, and each node is listed once even when it is
/// reachable along several paths.
#[must_use]
pub fn topological_order(root: &Tensor) -> Vec<Tensor> {
    let mut order = Vec::new();
    let mut visited: HashSet<TensorId> = HashSet::new();
    let mut stack = vec![(root.clone(), false)];

    while let Some((tensor, expanded)) = stack.pop() {
        if expanded {
            order.push(tensor);
            continue;
        }
        if !visited.insert(tensor.id()) {
            continue;
        }

        let parents = tensor.parents();
        stack.push((tensor, true));
        for parent in parents.into_iter().rev() {
            if !visited.contains(&parent.id()) {
                stack.push((parent, false));
            }
        }
    }

    order
}

/// Computes gradients of a scalar `root` with respect to every upstream node.
///
/// The root's gradient is set to one, then every node's adjoint fires exactly
/// once, consumers before producers.
///
/// # Errors
/// [`GradError::NonScalarRoot`] if `root` has more than one element; no
/// gradient is touched in that case.
pub fn backward(root: &Tensor) -> Result<()> {
    let seed = {
        let value = root.value();
        if value.len() != 1 {
            return Err(GradError::NonScalarRoot {
                shape: value.shape().to_vec(),
            });
        }
        value.ones_like()
    };
    backward_with(root, seed)
}

/// Like [`backward`], but seeds the root with `seed` instead of ones.
///
/// This computes the vector-Jacobian product `seedᵀ · ∂root/∂x` for every
/// upstream `x`, which is how non-scalar roots are differentiated.
///
/// # Errors
/// [`GradError::ShapeMismatch`] if `seed` is not shaped like `root`.
pub fn backward_with(root: &Tensor, seed: Array) -> Result<()> {
    let shape = root.shape();
    if seed.shape() != shape.as_slice() {
        return Err(GradError::ShapeMismatch {
            op: "backward_with",
            lhs: shape,
            rhs: seed.shape().to_vec(),
        });
    }

    let order = topological_order(root);
    debug!("backward from {}: {} nodes", root.id(), order.len());

    root.set_grad(seed);
    for tensor in order.iter().rev() {
        propagate(tensor)?;
    }
    Ok(())
}

/// Runs one node's adjoint and accumulates the results into its parents.
fn propagate(tensor: &Tensor) -> Result<()> {
    let deltas = {
        let node = tensor.node();
        if !node.requires_grad || node.parents.is_empty() {
            return Ok(());
        }
        trace!("propagate {} through {}", node.id, node.op.name());

        let guards: Vec<Ref<'_, Array>> = node.parents.iter().map(Tensor::value).collect();
        let inputs: Vec<&Array> = guards.iter().map(|guard| &**guard).collect();
        vector_jacobian(&node.op, &inputs, &node.grad)?
    };

    for (parent, delta) in tensor.parents().iter().zip(&deltas) {
        if parent.requires_grad() {
            parent.accumulate_grad(delta);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn add_gradient_is_ones_for_both_operands() {
        let a = Tensor::new(tensor!([[1.0, 2.0]]));
        let b = Tensor::new(tensor!([[3.0, 4.0]]));
        let c = add(&a, &b).unwrap();
        let seed = c.value().ones_like();
        c.backward_with(seed).unwrap();
        assert_eq!(a.grad().data(), &[1.0, 1.0]);
        assert_eq!(b.grad().data(), &[1.0, 1.0]);
    }

    #[test]
    fn add_rejects_mismatched_shapes() {
        let a = Tensor::new(tensor!([1.0, 2.0, 3.0]));
        let b = Tensor::new(tensor!([1.0, 2.0]));
        assert!(matches!(
            add(&a, &b),
            Err(GradError::ShapeMismatch { op: "add", .. })
        ));
    }

    #[test]
    fn broadcast_row_receives_column_sums() {
        let m = Tensor::new(tensor!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
        let bias = Tensor::new(tensor!([[0.5, -0.5]]));
        let out = add(&m, &bias).unwrap();
        assert_eq!(out.shape(), vec![3, 2]);
        let seed = out.value().ones_like();
        out.backward_with(seed).unwrap();
        assert_eq!(bias.grad().data(), &[3.0, 3.0]);
        assert_eq!(m.grad().data(), &[1.0; 6]);
    }

    #[test]
    fn relu_gates_on_strictly_positive_input() {
        let x = Tensor::new(tensor!([-1.0, 0.0, 1.0]));
        let y = relu(&x);
        assert_eq!(y.value().data(), &[0.0, 0.0, 1.0]);
        y.backward_with(tensor!([1.0, 1.0, 1.0])).unwrap();
        assert_eq!(x.grad().data(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn mse_value_and_gradient() {
        let pred = Tensor::new(tensor!([[1.0, 2.0]]));
        let target = Tensor::constant(tensor!([[1.0, 1.0]]));
        let loss = mse_loss(&pred, &target).unwrap();
        assert_eq!(loss.item(), Some(0.5));
        assert_eq!(loss.parents().len(), 1);
        loss.backward().unwrap();
        assert_eq!(pred.grad().data(), &[0.0, 1.0]);
        assert_eq!(target.grad().data(), &[0.0, 0.0]);
    }

    #[test]
    fn mse_flattens_but_counts_elements() {
        let pred = Tensor::new(tensor!([[1.0, 2.0]]));
        assert!(mse_loss(&pred, &Tensor::constant(tensor!([1.0, 1.0]))).is_ok());
        assert!(matches!(
            mse_loss(&pred, &Tensor::constant(tensor!([1.0, 1.0, 1.0]))),
            Err(GradError::ShapeMismatch { op: "mse_loss", .. })
        ));
        let empty = Tensor::new(tensor!([]));
        assert_eq!(
            mse_loss(&empty, &empty).unwrap_err(),
            GradError::Empty { op: "mse_loss" }
        );
    }

    #[test]
    fn backward_rejects_non_scalar_root() {
        let a = Tensor::new(tensor!([[1.0, 2.0]]));
        let b = Tensor::new(tensor!([[3.0, 4.0]]));
        let c = add(&a, &b).unwrap();
        assert_eq!(
            c.backward(),
            Err(GradError::NonScalarRoot { shape: vec![1, 2] })
        );
        assert_eq!(a.grad().data(), &[0.0, 0.0]);
    }

    #[test]
    fn backward_with_checks_seed_shape() {
        let a = Tensor::new(tensor!([[1.0, 2.0]]));
        assert!(a.backward_with(tensor!([1.0, 1.0])).is_err());
    }

    #[test]
    fn vector_jacobian_checks_arity() {
        let x = tensor!([1.0]);
        assert_eq!(
            vector_jacobian(&Op::Relu, &[&x, &x], &x),
            Err(GradError::OperandCount {
                op: "relu",
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn reused_tensor_accumulates_from_every_consumer() {
        // y = relu(x) + x, so dy/dx = 1[x > 0] + 1
        let x = Tensor::new(tensor!([[-2.0, 3.0]]));
        let y = add(&relu(&x), &x).unwrap();
        let target = Tensor::constant(tensor!([[0.0, 0.0]]));
        let loss = mse_loss(&y, &target).unwrap();
        loss.backward().unwrap();
        // dL/dy = y = [-2, 6]; dL/dx = [-2 * 1, 6 * 2]
        assert_eq!(x.grad().data(), &[-2.0, 12.0]);
    }

    #[test]
    fn topological_order_lists_each_node_once_after_its_parents() {
        let x = Tensor::new(tensor!([[1.0, 2.0]]));
        let w = Tensor::new(tensor!([[1.0], [1.0]]));
        let h = matmul(&x, &w).unwrap();
        let r = relu(&h);
        let s = add(&r, &h).unwrap();

        let order = topological_order(&s);
        let ids: Vec<_> = order.iter().map(Tensor::id).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(*ids.last().unwrap(), s.id());

        let position = |t: &Tensor| ids.iter().position(|&id| id == t.id()).unwrap();
        for tensor in &order {
            for parent in tensor.parents() {
                assert!(position(&parent) < position(tensor));
            }
        }
    }
}
