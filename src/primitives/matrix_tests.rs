pub(crate) use super::*;

#[test]
fn test_from_vec() {
    let m = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("test data has correct dimensions: 2*3=6 elements");
    assert_eq!(m.shape(), (2, 3));
    assert!((m.get(0, 0) - 1.0).abs() < 1e-6);
    assert!((m.get(1, 2) - 6.0).abs() < 1e-6);
}

#[test]
fn test_from_vec_error() {
    let result = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0]);
    assert!(result.is_err());
}

#[test]
fn test_transpose() {
    let m = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("test data has correct dimensions: 2*3=6 elements");
    let t = m.transpose();
    assert_eq!(t.shape(), (3, 2));
    assert!((t.get(0, 0) - 1.0).abs() < 1e-6);
    assert!((t.get(0, 1) - 4.0).abs() < 1e-6);
    assert!((t.get(2, 1) - 6.0).abs() < 1e-6);
}

#[test]
fn test_matmul() {
    let a = Matrix::from_vec(2, 2, vec![1.0_f32, 2.0, 3.0, 4.0]).expect("2x2");
    let b = Matrix::from_vec(2, 2, vec![5.0_f32, 6.0, 7.0, 8.0]).expect("2x2");
    let c = a.matmul(&b).expect("compatible dimensions");
    assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
}

#[test]
fn test_matmul_dimension_error() {
    let a = Matrix::<f32>::zeros(2, 3);
    let b = Matrix::<f32>::zeros(2, 3);
    assert!(a.matmul(&b).is_err());
}

#[test]
fn test_matmul_transposed_matches_explicit_transpose() {
    let a = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("2x3");
    let b = Matrix::from_vec(2, 3, vec![0.5_f32, -1.0, 2.0, 1.0, 0.0, -2.0]).expect("2x3");
    let fast = a.matmul_transposed(&b).expect("same cols");
    let slow = a.matmul(&b.transpose()).expect("compatible");
    assert_eq!(fast.as_slice(), slow.as_slice());
}

#[test]
fn test_select_rows_preserves_order() {
    let m = Matrix::from_vec(3, 2, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("3x2");
    let s = m.select_rows(&[2, 0]);
    assert_eq!(s.shape(), (2, 2));
    assert_eq!(s.as_slice(), &[5.0, 6.0, 1.0, 2.0]);
}

#[test]
fn test_vstack_and_head() {
    let a = Matrix::from_vec(1, 2, vec![1.0_f32, 2.0]).expect("1x2");
    let b = Matrix::from_vec(2, 2, vec![3.0_f32, 4.0, 5.0, 6.0]).expect("2x2");
    let stacked = a.vstack(&b).expect("same cols");
    assert_eq!(stacked.shape(), (3, 2));
    assert_eq!(stacked.head(2).as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(stacked.head(10).shape(), (3, 2));
}

#[test]
fn test_column_sums() {
    let m = Matrix::from_vec(2, 2, vec![1.0_f32, 2.0, 3.0, 4.0]).expect("2x2");
    assert_eq!(m.column_sums(), vec![4.0, 6.0]);
}

#[test]
fn test_rows_iterator_on_zero_columns() {
    let m = Matrix::<f32>::zeros(3, 0);
    assert_eq!(m.rows().count(), 0);
}

#[test]
fn test_row_slice_and_column() {
    let m = Matrix::from_vec(2, 3, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("2x3");
    assert_eq!(m.row_slice(1), &[4.0, 5.0, 6.0]);
    assert_eq!(m.column(2).as_slice(), &[3.0, 6.0]);
    assert_eq!(m.map(|v| v * 2.0).row_slice(0), &[2.0, 4.0, 6.0]);
}
