use minigrad::approx::roughly_eq;
use minigrad::backprop::*;
use minigrad::gradcheck::{max_abs_diff, numeric_gradient};
use minigrad::{Array, GradError, Tensor, tensor};
use std::collections::HashSet;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn zeros_like(t: &Tensor) -> Tensor {
    Tensor::constant(t.value().zeros_like())
}

#[test]
fn test_gradient_shape_matches_value_shape() {
    init_logger();
    let a = Tensor::new(tensor!([[1.0, -2.0, 3.0], [4.0, 5.0, -6.0]]));
    let b = Tensor::new(tensor!([[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]));
    let bias = Tensor::new(tensor!([[0.5, -0.5]]));
    let out = add(&matmul(&a, &b).unwrap(), &bias).unwrap().relu();
    let loss = mse_loss(&out, &zeros_like(&out)).unwrap();
    loss.backward().unwrap();

    for t in [&a, &b, &bias, &out, &loss] {
        assert_eq!(t.grad().shape(), t.value().shape());
    }
}

#[test]
fn test_add_backprop_adds_one_to_both_operands() {
    let a = Tensor::new(tensor!([[1.0, 2.0], [3.0, 4.0]]));
    let b = Tensor::new(tensor!([[5.0, 6.0], [7.0, 8.0]]));
    let c = add(&a, &b).unwrap();
    assert_eq!(c.value().data(), &[6.0, 8.0, 10.0, 12.0]);

    c.backward_with(tensor!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
    assert_eq!(a.grad().data(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(b.grad().data(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_matmul_adjoints_match_finite_differences() {
    init_logger();
    let a0 = tensor!([[0.3, -1.2, 0.7], [2.0, 0.1, -0.4]]);
    let b0 = tensor!([[1.5, -0.2], [0.6, 0.9], [-1.1, 0.4]]);
    let target = tensor!([[0.5, -0.5], [1.0, 2.0]]);

    let a = Tensor::new(a0.clone());
    let b = Tensor::new(b0.clone());
    let loss = mse_loss(&matmul(&a, &b).unwrap(), &Tensor::constant(target.clone())).unwrap();
    loss.backward().unwrap();

    let eval = |a: &Array, b: &Array| -> minigrad::Result<f64> {
        let out = a.matmul(b)?;
        Ok(out
            .data()
            .iter()
            .zip(target.data())
            .map(|(y, t)| (y - t) * (y - t))
            .sum::<f64>()
            / out.len() as f64)
    };
    let numeric_a = numeric_gradient(&a0, 1e-6, |a| eval(a, &b0)).unwrap();
    let numeric_b = numeric_gradient(&b0, 1e-6, |b| eval(&a0, b)).unwrap();

    assert!(max_abs_diff(&a.grad(), &numeric_a).unwrap() < 1e-4);
    assert!(max_abs_diff(&b.grad(), &numeric_b).unwrap() < 1e-4);
}

#[test]
fn test_matmul_rejects_inner_dimension_mismatch() {
    let a = Tensor::new(tensor!([[1.0, 2.0, 3.0]]));
    let b = Tensor::new(tensor!([[1.0, 2.0]]));
    assert!(matches!(
        matmul(&a, &b),
        Err(GradError::DimensionMismatch { op: "matmul", .. })
    ));
}

#[test]
fn test_relu_subgradient() {
    let x = Tensor::new(tensor!([-1.0, 0.0, 1.0]));
    let y = relu(&x);
    assert_eq!(y.value().data(), &[0.0, 0.0, 1.0]);
    y.backward_with(tensor!([1.0, 1.0, 1.0])).unwrap();
    assert_eq!(x.grad().data(), &[0.0, 0.0, 1.0]);
}

#[test]
fn test_mse_value_and_gradient() {
    let pred = Tensor::new(tensor!([[1.0, 2.0]]));
    let target = Tensor::constant(tensor!([[1.0, 1.0]]));
    let loss = mse_loss(&pred, &target).unwrap();
    assert_eq!(loss.item(), Some(0.5));
    assert!(loss.shape().is_empty());

    loss.backward().unwrap();
    assert_eq!(pred.grad().data(), &[0.0, 1.0]);
}

#[test]
fn test_diamond_graph_fires_each_rule_once() {
    init_logger();
    // x feeds y twice: y = relu(x) + (x + c)
    let x = Tensor::new(tensor!([[2.0, -1.0]]));
    let c = Tensor::constant(tensor!([[1.0, 1.0]]));
    let left = relu(&x);
    let right = add(&x, &c).unwrap();
    let y = add(&left, &right).unwrap();
    let loss = mse_loss(&y, &zeros_like(&y)).unwrap();

    let order = topological_order(&loss);
    // the target is copied into the loss node, not linked as a parent
    assert_eq!(order.len(), 6);
    let ids: HashSet<_> = order.iter().map(Tensor::id).collect();
    assert_eq!(ids.len(), order.len());
    for t in [&x, &c, &left, &right, &y, &loss] {
        assert!(ids.contains(&t.id()));
    }
    assert_eq!(order.last().unwrap().id(), loss.id());
    let x_at = order.iter().position(|t| t.id() == x.id()).unwrap();
    let y_at = order.iter().position(|t| t.id() == y.id()).unwrap();
    assert!(x_at < y_at);

    loss.backward().unwrap();
    // y = [5, 0]; dL/dy = y; dL/dx = dL/dy * (1[x > 0] + 1)
    assert_eq!(y.value().data(), &[5.0, 0.0]);
    assert_eq!(x.grad().data(), &[10.0, 0.0]);
    assert_eq!(c.grad().data(), &[0.0, 0.0]);
}

#[test]
fn test_same_tensor_as_both_operands() {
    let x = Tensor::new(tensor!([[3.0]]));
    let y = add(&x, &x).unwrap();
    y.backward().unwrap();
    assert_eq!(x.grad().data(), &[2.0]);
}

#[test]
fn test_repeated_backward_accumulates() {
    let x = Tensor::new(tensor!([[1.0, 2.0]]));
    let loss = mse_loss(&x, &Tensor::constant(tensor!([[0.0, 0.0]]))).unwrap();
    loss.backward().unwrap();
    loss.backward().unwrap();
    assert_eq!(x.grad().data(), &[2.0, 4.0]);

    x.zero_grad();
    loss.backward().unwrap();
    assert_eq!(x.grad().data(), &[1.0, 2.0]);
}

#[test]
fn test_broadcast_bias_gradient_is_column_sum() {
    let x = Tensor::constant(tensor!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
    let b = Tensor::new(tensor!([[1.0, -1.0]]));
    let y = add(&x, &b).unwrap();
    let loss = mse_loss(&y, &zeros_like(&y)).unwrap();
    loss.backward().unwrap();

    // dL/dy = 2/6 * y; y = [[2, 1], [4, 3], [6, 5]]
    assert!(roughly_eq(b.grad().data(), &[4.0_f64, 3.0][..]));
    assert!(matches!(
        add(&x, &Tensor::new(tensor!([[1.0, 2.0, 3.0]]))),
        Err(GradError::ShapeMismatch { op: "add", .. })
    ));
}

#[test]
fn test_backward_rejects_non_scalar_root() {
    let x = Tensor::new(tensor!([[1.0, 2.0]]));
    let y = relu(&x);
    assert_eq!(
        y.backward(),
        Err(GradError::NonScalarRoot { shape: vec![1, 2] })
    );
    assert!(y.backward_with(tensor!([[1.0]])).is_err());
}

#[test]
fn test_constants_receive_no_gradient() {
    let w = Tensor::new(tensor!([[2.0]]));
    let x = Tensor::constant(tensor!([[3.0]]));
    let y = matmul(&x, &w).unwrap();
    y.backward().unwrap();
    assert_eq!(w.grad().data(), &[3.0]);
    assert_eq!(x.grad().data(), &[0.0]);
    assert!(!x.requires_grad());
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let x = Tensor::new(tensor!([[1.0]]));
    let one = Tensor::constant(tensor!([[1.0]]));
    let mut y = x.clone();
    for _ in 0..20_000 {
        y = add(&y, &one).unwrap();
    }
    assert_eq!(topological_order(&y).len(), 20_002);
    y.backward().unwrap();
    assert_eq!(x.grad().data(), &[1.0]);
}
