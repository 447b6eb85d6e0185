//! ONNX export of the feed-forward network.
//!
//! Hand-rolled protobuf encoding of the subset of `onnx.proto` the exported
//! graph needs, plus a reader for the same subset so exports can be checked
//! without the `prost` crate.
//!
//! # ONNX Protobuf Layout (subset)
//!
//! ```text
//! ModelProto {
//!   ir_version: int64                 (field 1)
//!   producer_name: string             (field 2)
//!   producer_version: string          (field 3)
//!   graph: GraphProto                 (field 7)
//!     node: [NodeProto]               (field 1)
//!     name: string                    (field 2)
//!     initializer: [TensorProto]      (field 5)
//!       dims: [int64]                 (field 1)
//!       data_type: int32              (field 2)
//!       name: string                  (field 8)
//!       raw_data: bytes               (field 9)
//!     input: [ValueInfoProto]         (field 11)
//!     output: [ValueInfoProto]        (field 12)
//!   opset_import: [OperatorSetId]     (field 8)
//!   metadata_props: [StringString]    (field 14)
//! }
//! ```
//!
//! The graph is `Gemm(transB=1) → Relu → … → Gemm` with a symbolic
//! `batch_size` first dimension on `input` and `output`.

mod protobuf;
mod reader;

use crate::error::{PipelineError, Result};
use crate::nn::FeedForwardNet;
use crate::primitives::Matrix;
use protobuf::ProtobufWriter;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Operator set the graph is written against.
pub const OPSET_VERSION: i64 = 10;

/// IR version matching [`OPSET_VERSION`].
pub const IR_VERSION: i64 = 5;

/// Name of the graph input.
pub const INPUT_NAME: &str = "input";

/// Name of the graph output.
pub const OUTPUT_NAME: &str = "output";

/// Symbolic batch dimension.
pub const BATCH_DIM: &str = "batch_size";

/// `TensorProto.DataType.FLOAT`
const ONNX_FLOAT: i32 = 1;

/// A float32 initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct OnnxTensor {
    /// Tensor name
    pub name: String,
    /// Dimensions
    pub shape: Vec<usize>,
    /// Values, row-major
    pub data: Vec<f32>,
}

/// A node attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// `FLOAT`
    Float(f32),
    /// `INT`
    Int(i64),
}

/// A graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct OnnxNode {
    /// Node name
    pub name: String,
    /// Operator (`Gemm`, `Relu`)
    pub op_type: String,
    /// Input value names
    pub inputs: Vec<String>,
    /// Output value names
    pub outputs: Vec<String>,
    /// Attributes in declaration order
    pub attributes: Vec<(String, AttributeValue)>,
}

impl OnnxNode {
    /// Integer attribute `name`, if present.
    #[must_use]
    pub fn int_attribute(&self, name: &str) -> Option<i64> {
        self.attributes.iter().find_map(|(n, v)| match v {
            AttributeValue::Int(i) if n == name => Some(*i),
            _ => None,
        })
    }

    /// Float attribute `name`, if present.
    #[must_use]
    pub fn float_attribute(&self, name: &str) -> Option<f32> {
        self.attributes.iter().find_map(|(n, v)| match v {
            AttributeValue::Float(f) if n == name => Some(*f),
            _ => None,
        })
    }
}

/// One tensor dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Fixed size
    Value(i64),
    /// Named dynamic size
    Param(String),
}

/// A graph input or output declaration (float tensors only).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    /// Value name
    pub name: String,
    /// Dimensions
    pub dims: Vec<Dim>,
}

/// A parsed or exported ONNX model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OnnxModel {
    /// IR version
    pub ir_version: i64,
    /// Producer name
    pub producer_name: String,
    /// Producer version
    pub producer_version: String,
    /// `(domain, version)` opset imports
    pub opset_imports: Vec<(String, i64)>,
    /// Graph name
    pub graph_name: String,
    /// Nodes in topological order
    pub nodes: Vec<OnnxNode>,
    /// Weight tensors
    pub initializers: Vec<OnnxTensor>,
    /// Graph inputs
    pub inputs: Vec<ValueInfo>,
    /// Graph outputs
    pub outputs: Vec<ValueInfo>,
    /// Free-form key/value pairs
    pub metadata_props: BTreeMap<String, String>,
}

impl OnnxModel {
    /// Build the graph for `net`. Weight names follow the network's
    /// parameter names (`layers.{pos}.weight`, `layers.{pos}.bias`).
    ///
    /// # Errors
    ///
    /// Returns `Schema` if `feature_names` does not match the input width.
    pub fn from_network(net: &FeedForwardNet, feature_names: &[String]) -> Result<Self> {
        let arch = net.architecture();
        if feature_names.len() != arch.n_features {
            return Err(PipelineError::schema(format!(
                "{} feature names for a model with {} inputs",
                feature_names.len(),
                arch.n_features
            )));
        }

        let linears = net.linear_weights();
        let last = linears.len() - 1;
        let mut nodes = Vec::with_capacity(2 * linears.len());
        let mut initializers = Vec::with_capacity(2 * linears.len());
        let mut current = INPUT_NAME.to_string();

        for (k, (weight, bias)) in linears.into_iter().enumerate() {
            let pos = 2 * k;
            let w_name = format!("layers.{pos}.weight");
            let b_name = format!("layers.{pos}.bias");
            initializers.push(OnnxTensor {
                name: w_name.clone(),
                shape: vec![weight.n_rows(), weight.n_cols()],
                data: weight.as_slice().to_vec(),
            });
            initializers.push(OnnxTensor {
                name: b_name.clone(),
                shape: vec![bias.n_cols()],
                data: bias.as_slice().to_vec(),
            });

            let gemm_out = if k == last {
                OUTPUT_NAME.to_string()
            } else {
                format!("layers.{pos}.out")
            };
            nodes.push(OnnxNode {
                name: format!("Gemm_{pos}"),
                op_type: "Gemm".to_string(),
                inputs: vec![current, w_name, b_name],
                outputs: vec![gemm_out.clone()],
                attributes: vec![
                    ("alpha".to_string(), AttributeValue::Float(1.0)),
                    ("beta".to_string(), AttributeValue::Float(1.0)),
                    ("transB".to_string(), AttributeValue::Int(1)),
                ],
            });
            current = gemm_out;

            if k != last {
                let relu_out = format!("layers.{}.out", pos + 1);
                nodes.push(OnnxNode {
                    name: format!("Relu_{}", pos + 1),
                    op_type: "Relu".to_string(),
                    inputs: vec![current],
                    outputs: vec![relu_out.clone()],
                    attributes: Vec::new(),
                });
                current = relu_out;
            }
        }

        let mut metadata_props = BTreeMap::new();
        metadata_props.insert(
            "feature_names".to_string(),
            serde_json::to_string(feature_names)?,
        );
        metadata_props.insert(
            "architecture".to_string(),
            serde_json::to_string(&arch)?,
        );

        Ok(Self {
            ir_version: IR_VERSION,
            producer_name: env!("CARGO_PKG_NAME").to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            opset_imports: vec![(String::new(), OPSET_VERSION)],
            graph_name: "feedforward".to_string(),
            nodes,
            initializers,
            inputs: vec![ValueInfo {
                name: INPUT_NAME.to_string(),
                dims: vec![
                    Dim::Param(BATCH_DIM.to_string()),
                    Dim::Value(arch.n_features as i64),
                ],
            }],
            outputs: vec![ValueInfo {
                name: OUTPUT_NAME.to_string(),
                dims: vec![Dim::Param(BATCH_DIM.to_string()), Dim::Value(1)],
            }],
            metadata_props,
        })
    }

    /// Feature names stored in `metadata_props`, if any.
    #[must_use]
    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.metadata_props
            .get("feature_names")
            .and_then(|s| serde_json::from_str(s).ok())
    }

    /// Serialize as an ONNX `ModelProto`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ProtobufWriter::new();
        w.int64(1, self.ir_version);
        w.string(2, &self.producer_name);
        w.string(3, &self.producer_version);
        w.message(7, |g| self.write_graph(g));
        for (domain, version) in &self.opset_imports {
            w.message(8, |o| {
                o.string(1, domain);
                o.int64(2, *version);
            });
        }
        for (key, value) in &self.metadata_props {
            w.message(14, |p| {
                p.string(1, key);
                p.string(2, value);
            });
        }
        w.into_bytes()
    }

    fn write_graph(&self, g: &mut ProtobufWriter) {
        for node in &self.nodes {
            g.message(1, |n| {
                for input in &node.inputs {
                    n.string(1, input);
                }
                for output in &node.outputs {
                    n.string(2, output);
                }
                n.string(3, &node.name);
                n.string(4, &node.op_type);
                for (name, value) in &node.attributes {
                    n.message(5, |a| {
                        a.string(1, name);
                        match value {
                            // AttributeProto.type: FLOAT = 1, INT = 2
                            AttributeValue::Float(f) => {
                                a.float(2, *f);
                                a.int64(20, 1);
                            }
                            AttributeValue::Int(i) => {
                                a.int64(3, *i);
                                a.int64(20, 2);
                            }
                        }
                    });
                }
            });
        }
        g.string(2, &self.graph_name);
        for tensor in &self.initializers {
            g.message(5, |t| {
                for &d in &tensor.shape {
                    t.int64(1, d as i64);
                }
                t.int64(2, i64::from(ONNX_FLOAT));
                t.string(8, &tensor.name);
                let raw: Vec<u8> = tensor.data.iter().flat_map(|v| v.to_le_bytes()).collect();
                t.bytes(9, &raw);
            });
        }
        for info in &self.inputs {
            g.message(11, |v| write_value_info(v, info));
        }
        for info in &self.outputs {
            g.message(12, |v| write_value_info(v, info));
        }
    }

    /// Write to `path`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns `Io` on write failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes())?;
        info!(
            path = %path.as_ref().display(),
            nodes = self.nodes.len(),
            initializers = self.initializers.len(),
            "wrote ONNX graph"
        );
        Ok(())
    }

    /// Run the graph on `x` (`[batch, n_features]`).
    ///
    /// Supports the operators this module writes: `Gemm` with `transB=1`
    /// and `Relu`.
    ///
    /// # Errors
    ///
    /// Returns `Format` for unsupported operators or missing values, and
    /// `DimensionMismatch` for shape errors.
    pub fn run(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let weights: BTreeMap<&str, &OnnxTensor> = self
            .initializers
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect();
        let mut values: BTreeMap<String, Matrix<f32>> = BTreeMap::new();
        values.insert(INPUT_NAME.to_string(), x.clone());

        let missing = |name: &str| PipelineError::Format {
            message: format!("graph value `{name}` is undefined"),
        };

        for node in &self.nodes {
            let input_name = node.inputs.first().ok_or_else(|| missing("<none>"))?;
            let input = values.get(input_name).ok_or_else(|| missing(input_name.as_str()))?;
            let output = match node.op_type.as_str() {
                "Gemm" => {
                    if node.int_attribute("transB") != Some(1) {
                        return Err(PipelineError::Format {
                            message: format!("{}: only transB=1 is supported", node.name),
                        });
                    }
                    let w_name = node.inputs.get(1).ok_or_else(|| missing("B"))?;
                    let b_name = node.inputs.get(2).ok_or_else(|| missing("C"))?;
                    let w = weights.get(w_name.as_str()).ok_or_else(|| missing(w_name.as_str()))?;
                    let b = weights.get(b_name.as_str()).ok_or_else(|| missing(b_name.as_str()))?;
                    gemm(input, w, b)?
                }
                "Relu" => input.map(|v| v.max(0.0)),
                other => {
                    return Err(PipelineError::Format {
                        message: format!("unsupported operator {other}"),
                    })
                }
            };
            let output_name = node.outputs.first().ok_or_else(|| missing("<none>"))?;
            values.insert(output_name.clone(), output);
        }

        values.remove(OUTPUT_NAME).ok_or_else(|| missing(OUTPUT_NAME))
    }
}

fn write_value_info(v: &mut ProtobufWriter, info: &ValueInfo) {
    v.string(1, &info.name);
    // TypeProto { tensor_type { elem_type, shape { dim* } } }
    v.message(2, |ty| {
        ty.message(1, |tensor| {
            tensor.int64(1, i64::from(ONNX_FLOAT));
            tensor.message(2, |shape| {
                for dim in &info.dims {
                    shape.message(1, |d| match dim {
                        Dim::Value(n) => d.int64(1, *n),
                        Dim::Param(p) => d.string(2, p),
                    });
                }
            });
        });
    });
}

fn gemm(x: &Matrix<f32>, w: &OnnxTensor, b: &OnnxTensor) -> Result<Matrix<f32>> {
    let &[out_features, in_features] = w.shape.as_slice() else {
        return Err(PipelineError::Format {
            message: format!("{} must be 2-D, got {:?}", w.name, w.shape),
        });
    };
    if b.data.len() != out_features {
        return Err(PipelineError::dimension_mismatch(
            &b.name,
            out_features,
            b.data.len(),
        ));
    }
    if x.n_cols() != in_features {
        return Err(PipelineError::dimension_mismatch(
            "input columns",
            in_features,
            x.n_cols(),
        ));
    }
    let w = Matrix::from_vec(out_features, in_features, w.data.clone())?;
    let mut out = x.matmul_transposed(&w)?;
    for row in out.as_mut_slice().chunks_exact_mut(out_features.max(1)) {
        for (o, &bias) in row.iter_mut().zip(&b.data) {
            *o += bias;
        }
    }
    Ok(out)
}

/// Export `net` to `path` as ONNX.
///
/// # Errors
///
/// Returns `Schema` for a feature-name mismatch and `Io` on write failure.
pub fn save_onnx(
    path: impl AsRef<Path>,
    net: &FeedForwardNet,
    feature_names: &[String],
) -> Result<OnnxModel> {
    let model = OnnxModel::from_network(net, feature_names)?;
    model.save(path)?;
    Ok(model)
}

#[cfg(test)]
mod tests;
