use super::*;
use crate::traits::Model;

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("feature_{i}")).collect()
}

#[test]
fn test_graph_structure() {
    let net = FeedForwardNet::new(4, 6, 3, 7);
    let model = OnnxModel::from_network(&net, &names(4)).expect("4 names");

    let ops: Vec<&str> = model.nodes.iter().map(|n| n.op_type.as_str()).collect();
    assert_eq!(ops, vec!["Gemm", "Relu", "Gemm", "Relu", "Gemm", "Relu", "Gemm"]);
    assert_eq!(model.nodes[0].inputs, vec!["input", "layers.0.weight", "layers.0.bias"]);
    assert_eq!(model.nodes.last().map(|n| n.outputs[0].as_str()), Some("output"));
    for gemm in model.nodes.iter().filter(|n| n.op_type == "Gemm") {
        assert_eq!(gemm.int_attribute("transB"), Some(1));
        assert_eq!(gemm.float_attribute("alpha"), Some(1.0));
    }
    assert_eq!(model.initializers.len(), 8);
    assert_eq!(model.initializers[0].shape, vec![6, 4]);
    assert_eq!(model.initializers[7].shape, vec![1]);
    assert_eq!(model.opset_imports, vec![(String::new(), OPSET_VERSION)]);
}

#[test]
fn test_dynamic_batch_dimension() {
    let net = FeedForwardNet::new(3, 4, 1, 0);
    let model = OnnxModel::from_network(&net, &names(3)).expect("3 names");
    assert_eq!(
        model.inputs[0].dims,
        vec![Dim::Param(BATCH_DIM.to_string()), Dim::Value(3)]
    );
    assert_eq!(
        model.outputs[0].dims,
        vec![Dim::Param(BATCH_DIM.to_string()), Dim::Value(1)]
    );
}

#[test]
fn test_bytes_parse_back_to_same_model() {
    let net = FeedForwardNet::new(5, 8, 2, 99);
    let model = OnnxModel::from_network(&net, &names(5)).expect("5 names");
    let parsed = OnnxModel::from_bytes(&model.to_bytes()).expect("well-formed");
    assert_eq!(parsed, model);
    assert_eq!(parsed.feature_names(), Some(names(5)));
}

#[test]
fn test_graph_matches_network_output() {
    let net = FeedForwardNet::new(3, 5, 3, 21);
    let model = OnnxModel::from_network(&net, &names(3)).expect("3 names");
    let x = Matrix::from_vec(
        3,
        3,
        vec![0.5, -1.0, 2.0, 0.0, 0.0, 0.0, -0.3, 0.8, 1.1],
    )
    .expect("3x3");
    assert_eq!(model.run(&x).expect("runs"), net.forward(&x).expect("forward"));
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("network.onnx");
    let net = FeedForwardNet::new(2, 3, 1, 4);
    let saved = save_onnx(&path, &net, &names(2)).expect("write");
    let bytes = std::fs::read(&path).expect("read");
    // ir_version is field 1, varint
    assert_eq!(bytes[0], 0x08);
    assert_eq!(OnnxModel::from_file(&path).expect("parse"), saved);
}

#[test]
fn test_feature_name_mismatch() {
    let net = FeedForwardNet::new(3, 4, 1, 0);
    let err = OnnxModel::from_network(&net, &names(4)).expect_err("4 names for 3 inputs");
    assert!(matches!(err, PipelineError::Schema { .. }));
}

#[test]
fn test_unsupported_operator_rejected() {
    let net = FeedForwardNet::new(2, 2, 1, 0);
    let mut model = OnnxModel::from_network(&net, &names(2)).expect("2 names");
    model.nodes[1].op_type = "Sigmoid".to_string();
    assert!(model.run(&Matrix::zeros(1, 2)).is_err());
}

#[test]
fn test_truncated_bytes_rejected() {
    let net = FeedForwardNet::new(2, 2, 1, 0);
    let bytes = OnnxModel::from_network(&net, &names(2))
        .expect("2 names")
        .to_bytes();
    assert!(OnnxModel::from_bytes(&bytes[..bytes.len() - 3]).is_err());
}
