//! `ModelProto` parsing for the subset written by [`OnnxModel::to_bytes`].
//! Unknown fields are skipped.

use super::protobuf::{ProtobufReader, WIRE_FIXED32, WIRE_LEN, WIRE_VARINT};
use super::{AttributeValue, Dim, OnnxModel, OnnxNode, OnnxTensor, ValueInfo, ONNX_FLOAT};
use crate::error::{PipelineError, Result};
use std::path::Path;

impl OnnxModel {
    /// Read an ONNX file from disk.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Format` if it is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path.as_ref())?)
    }

    /// Parse ONNX `ModelProto` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Format` on malformed protobuf or non-float initializers.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ProtobufReader::new(data);
        let mut model = OnnxModel::default();

        while reader.has_more() {
            let (field_num, wire_type) = reader.read_tag()?;
            match (field_num, wire_type) {
                (1, WIRE_VARINT) => model.ir_version = reader.read_varint()? as i64,
                (2, WIRE_LEN) => model.producer_name = reader.read_string()?,
                (3, WIRE_LEN) => model.producer_version = reader.read_string()?,
                (7, WIRE_LEN) => parse_graph(reader.read_bytes()?, &mut model)?,
                (8, WIRE_LEN) => {
                    let opset = parse_opset_import(reader.read_bytes()?)?;
                    model.opset_imports.push(opset);
                }
                (14, WIRE_LEN) => {
                    let (key, value) = parse_string_pair(reader.read_bytes()?)?;
                    model.metadata_props.insert(key, value);
                }
                _ => reader.skip_field(field_num, wire_type)?,
            }
        }
        Ok(model)
    }
}

fn parse_graph(data: &[u8], model: &mut OnnxModel) -> Result<()> {
    let mut reader = ProtobufReader::new(data);
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_LEN) => model.nodes.push(parse_node(reader.read_bytes()?)?),
            (2, WIRE_LEN) => model.graph_name = reader.read_string()?,
            (5, WIRE_LEN) => model.initializers.push(parse_tensor(reader.read_bytes()?)?),
            (11, WIRE_LEN) => model.inputs.push(parse_value_info(reader.read_bytes()?)?),
            (12, WIRE_LEN) => model.outputs.push(parse_value_info(reader.read_bytes()?)?),
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    Ok(())
}

fn parse_node(data: &[u8]) -> Result<OnnxNode> {
    let mut reader = ProtobufReader::new(data);
    let mut node = OnnxNode {
        name: String::new(),
        op_type: String::new(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        attributes: Vec::new(),
    };
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_LEN) => node.inputs.push(reader.read_string()?),
            (2, WIRE_LEN) => node.outputs.push(reader.read_string()?),
            (3, WIRE_LEN) => node.name = reader.read_string()?,
            (4, WIRE_LEN) => node.op_type = reader.read_string()?,
            (5, WIRE_LEN) => {
                if let Some(attr) = parse_attribute(reader.read_bytes()?)? {
                    node.attributes.push(attr);
                }
            }
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    Ok(node)
}

/// Scalar `FLOAT`/`INT` attributes; other kinds yield `None`.
fn parse_attribute(data: &[u8]) -> Result<Option<(String, AttributeValue)>> {
    let mut reader = ProtobufReader::new(data);
    let mut name = String::new();
    let mut float = None;
    let mut int = None;
    let mut kind = 0;
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_LEN) => name = reader.read_string()?,
            (2, WIRE_FIXED32) => float = Some(reader.read_f32()?),
            (3, WIRE_VARINT) => int = Some(reader.read_varint()? as i64),
            (20, WIRE_VARINT) => kind = reader.read_varint()?,
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    let value = match (kind, float, int) {
        (1, Some(f), _) => Some(AttributeValue::Float(f)),
        (2, _, Some(i)) => Some(AttributeValue::Int(i)),
        _ => None,
    };
    Ok(value.map(|v| (name, v)))
}

fn parse_tensor(data: &[u8]) -> Result<OnnxTensor> {
    let mut reader = ProtobufReader::new(data);
    let mut name = String::new();
    let mut shape = Vec::new();
    let mut data_type = ONNX_FLOAT;
    let mut raw_data: &[u8] = &[];
    let mut float_data = Vec::new();
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_VARINT) => shape.push(reader.read_varint()? as usize),
            (1, WIRE_LEN) => {
                let mut packed = ProtobufReader::new(reader.read_bytes()?);
                while packed.has_more() {
                    shape.push(packed.read_varint()? as usize);
                }
            }
            (2, WIRE_VARINT) => data_type = reader.read_varint()? as i32,
            (4, WIRE_LEN) => {
                float_data.extend(
                    reader
                        .read_bytes()?
                        .chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                );
            }
            (4, WIRE_FIXED32) => float_data.push(reader.read_f32()?),
            (8, WIRE_LEN) => name = reader.read_string()?,
            (9, WIRE_LEN) => raw_data = reader.read_bytes()?,
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }

    if data_type != ONNX_FLOAT {
        return Err(PipelineError::Format {
            message: format!("initializer `{name}` has data type {data_type}, expected FLOAT"),
        });
    }
    let data = if raw_data.is_empty() {
        float_data
    } else {
        raw_data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    };
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(PipelineError::Format {
            message: format!(
                "initializer `{name}` has {} values for shape {shape:?}",
                data.len()
            ),
        });
    }
    Ok(OnnxTensor { name, shape, data })
}

fn parse_value_info(data: &[u8]) -> Result<ValueInfo> {
    let mut reader = ProtobufReader::new(data);
    let mut info = ValueInfo {
        name: String::new(),
        dims: Vec::new(),
    };
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_LEN) => info.name = reader.read_string()?,
            (2, WIRE_LEN) => info.dims = parse_type_dims(reader.read_bytes()?)?,
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    Ok(info)
}

/// Dimensions from `TypeProto.tensor_type.shape`.
fn parse_type_dims(data: &[u8]) -> Result<Vec<Dim>> {
    let mut dims = Vec::new();
    let mut ty = ProtobufReader::new(data);
    while ty.has_more() {
        let (field_num, wire_type) = ty.read_tag()?;
        if (field_num, wire_type) != (1, WIRE_LEN) {
            ty.skip_field(field_num, wire_type)?;
            continue;
        }
        let mut tensor = ProtobufReader::new(ty.read_bytes()?);
        while tensor.has_more() {
            let (field_num, wire_type) = tensor.read_tag()?;
            if (field_num, wire_type) != (2, WIRE_LEN) {
                tensor.skip_field(field_num, wire_type)?;
                continue;
            }
            let mut shape = ProtobufReader::new(tensor.read_bytes()?);
            while shape.has_more() {
                let (field_num, wire_type) = shape.read_tag()?;
                if (field_num, wire_type) != (1, WIRE_LEN) {
                    shape.skip_field(field_num, wire_type)?;
                    continue;
                }
                dims.push(parse_dim(shape.read_bytes()?)?);
            }
        }
    }
    Ok(dims)
}

fn parse_dim(data: &[u8]) -> Result<Dim> {
    let mut reader = ProtobufReader::new(data);
    let mut dim = Dim::Value(0);
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_VARINT) => dim = Dim::Value(reader.read_varint()? as i64),
            (2, WIRE_LEN) => dim = Dim::Param(reader.read_string()?),
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    Ok(dim)
}

fn parse_opset_import(data: &[u8]) -> Result<(String, i64)> {
    let mut reader = ProtobufReader::new(data);
    let mut domain = String::new();
    let mut version = 0i64;
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_LEN) => domain = reader.read_string()?,
            (2, WIRE_VARINT) => version = reader.read_varint()? as i64,
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    Ok((domain, version))
}

fn parse_string_pair(data: &[u8]) -> Result<(String, String)> {
    let mut reader = ProtobufReader::new(data);
    let mut key = String::new();
    let mut value = String::new();
    while reader.has_more() {
        let (field_num, wire_type) = reader.read_tag()?;
        match (field_num, wire_type) {
            (1, WIRE_LEN) => key = reader.read_string()?,
            (2, WIRE_LEN) => value = reader.read_string()?,
            _ => reader.skip_field(field_num, wire_type)?,
        }
    }
    Ok((key, value))
}
