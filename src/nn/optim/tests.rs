pub(crate) use super::*;
use crate::primitives::Matrix;

fn param_with_grad(values: &[f32], grad: &[f32]) -> Parameter {
    let mut p = Parameter::new(
        "p",
        Matrix::from_vec(1, values.len(), values.to_vec()).expect("row"),
    );
    p.accumulate_grad(grad);
    p
}

#[test]
fn test_adam_first_step_moves_by_lr() {
    // With bias correction the first update is lr * sign(grad).
    let mut p = param_with_grad(&[1.0, -1.0], &[0.5, -2.0]);
    let mut adam = Adam::new(0.1);
    adam.step(vec![&mut p]);

    let data = p.value().as_slice();
    assert!((data[0] - 0.9).abs() < 1e-5, "got {}", data[0]);
    assert!((data[1] + 0.9).abs() < 1e-5, "got {}", data[1]);
    assert_eq!(adam.t, 1);
}

#[test]
fn test_adam_zero_gradient_is_noop() {
    let mut p = param_with_grad(&[3.0], &[0.0]);
    let mut adam = Adam::new(0.1);
    adam.step(vec![&mut p]);
    assert!((p.value().get(0, 0) - 3.0).abs() < 1e-6);
}

#[test]
fn test_adam_minimizes_quadratic() {
    // f(x) = x^2, grad = 2x
    let mut p = Parameter::new("x", Matrix::filled(1, 1, 5.0));
    let mut adam = Adam::new(0.1);
    for _ in 0..500 {
        p.zero_grad();
        let x = p.value().get(0, 0);
        p.accumulate_grad(&[2.0 * x]);
        adam.step(vec![&mut p]);
    }
    assert!(p.value().get(0, 0).abs() < 0.1);
}


#[test]
fn test_adam_moments_are_per_parameter() {
    let mut a = param_with_grad(&[1.0], &[4.0]);
    let mut b = param_with_grad(&[1.0, 1.0], &[-0.01, 0.0]);
    let mut adam: Box<dyn Optimizer> = Box::new(Adam::new(0.5));
    adam.step(vec![&mut a, &mut b]);

    assert!((a.value().get(0, 0) - 0.5).abs() < 1e-5);
    assert!((b.value().get(0, 0) - 1.5).abs() < 1e-5);
    assert!((b.value().get(0, 1) - 1.0).abs() < 1e-6);
    assert_eq!(adam.lr(), 0.5);
}
