//! `SafeTensors` format implementation for model serialization.
//!
//! Implements the `SafeTensors` format:
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: __metadata__ plus tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```
//!
//! Only F32 tensors are written or read.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Metadata for a single tensor in `SafeTensors` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMetadata {
    /// Data type of the tensor (always "F32" here).
    pub dtype: String,
    /// Shape of the tensor (e.g., `[out, in]` or `[out]`).
    pub shape: Vec<usize>,
    /// Data offsets `[start, end]` in the raw data section.
    pub data_offsets: [usize; 2],
}

/// Tensor metadata by name.
/// Uses `BTreeMap` for deterministic JSON serialization (sorted keys).
pub type SafeTensorsMetadata = BTreeMap<String, TensorMetadata>;

/// String→string pairs stored under `__metadata__`.
pub type UserMetadata = BTreeMap<String, String>;

/// Tensors to write: name → (data, shape).
pub type TensorMap = BTreeMap<String, (Vec<f32>, Vec<usize>)>;

fn format_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Format {
        message: message.into(),
    }
}

/// Encode tensors and user metadata into `SafeTensors` bytes.
///
/// # Errors
///
/// Returns `Format` if a tensor's data length does not match its shape.
pub fn to_bytes(tensors: &TensorMap, user_metadata: &UserMetadata) -> Result<Vec<u8>> {
    let mut header = serde_json::Map::new();
    if !user_metadata.is_empty() {
        let meta_obj: serde_json::Map<String, serde_json::Value> = user_metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        header.insert(
            "__metadata__".to_string(),
            serde_json::Value::Object(meta_obj),
        );
    }

    let mut raw_data = Vec::new();
    let mut current_offset = 0;
    for (name, (data, shape)) in tensors {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(format_error(format!(
                "tensor `{name}` has {} values for shape {shape:?}",
                data.len()
            )));
        }
        let start_offset = current_offset;
        let end_offset = current_offset + data.len() * 4;
        let meta = TensorMetadata {
            dtype: "F32".to_string(),
            shape: shape.clone(),
            data_offsets: [start_offset, end_offset],
        };
        header.insert(name.clone(), serde_json::to_value(meta)?);

        for &value in data {
            raw_data.extend_from_slice(&value.to_le_bytes());
        }
        current_offset = end_offset;
    }

    let metadata_json = serde_json::to_string(&header)?;
    let metadata_bytes = metadata_json.as_bytes();
    let metadata_len = metadata_bytes.len() as u64;

    let mut output = Vec::with_capacity(8 + metadata_bytes.len() + raw_data.len());
    output.extend_from_slice(&metadata_len.to_le_bytes());
    output.extend_from_slice(metadata_bytes);
    output.extend_from_slice(&raw_data);
    Ok(output)
}

/// Saves tensors with a `__metadata__` section, overwriting `path`.
///
/// # Errors
///
/// Returns `Format` for inconsistent tensors and `Io` if writing fails.
pub fn save_safetensors<P: AsRef<Path>>(
    path: P,
    tensors: &TensorMap,
    user_metadata: &UserMetadata,
) -> Result<()> {
    fs::write(path, to_bytes(tensors, user_metadata)?)?;
    Ok(())
}

/// A parsed `SafeTensors` file.
#[derive(Debug, Clone)]
pub struct SafeTensorsFile {
    /// Tensor index
    pub metadata: SafeTensorsMetadata,
    /// `__metadata__` entries
    pub user_metadata: UserMetadata,
    raw_data: Vec<u8>,
}

impl SafeTensorsFile {
    /// Parse `SafeTensors` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the header is truncated or not valid JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let metadata_len = validate_and_read_header(bytes)?;
        let (metadata, user_metadata) = parse_metadata(bytes, metadata_len)?;
        Ok(Self {
            metadata,
            user_metadata,
            raw_data: bytes[8 + metadata_len..].to_vec(),
        })
    }

    /// Read and parse a file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Format` if it is malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Values and shape of the tensor called `name`.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the tensor is missing, not F32, or out of bounds.
    pub fn tensor(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let meta = self
            .metadata
            .get(name)
            .ok_or_else(|| format_error(format!("tensor `{name}` not found")))?;
        if meta.dtype != "F32" {
            return Err(format_error(format!(
                "tensor `{name}` has dtype {}, expected F32",
                meta.dtype
            )));
        }
        let [start, end] = meta.data_offsets;
        if start > end || end > self.raw_data.len() {
            return Err(format_error(format!(
                "tensor `{name}` offsets [{start}, {end}] exceed data size {}",
                self.raw_data.len()
            )));
        }
        Ok((extract_f32(&self.raw_data[start..end])?, meta.shape.clone()))
    }
}

fn validate_and_read_header(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < 8 {
        return Err(format_error(format!(
            "file is {} bytes, need at least 8 bytes for header",
            bytes.len()
        )));
    }

    let mut header_bytes = [0u8; 8];
    header_bytes.copy_from_slice(&bytes[0..8]);
    let metadata_len = u64::from_le_bytes(header_bytes) as usize;

    if metadata_len == 0 {
        return Err(format_error("metadata length is 0"));
    }
    if metadata_len > bytes.len() - 8 {
        return Err(format_error(format!(
            "metadata length {metadata_len} exceeds file size"
        )));
    }
    Ok(metadata_len)
}

fn parse_metadata(bytes: &[u8], metadata_len: usize) -> Result<(SafeTensorsMetadata, UserMetadata)> {
    let metadata_str = std::str::from_utf8(&bytes[8..8 + metadata_len])
        .map_err(|e| format_error(format!("metadata is not valid UTF-8: {e}")))?;

    let serde_json::Value::Object(map) = serde_json::from_str(metadata_str)? else {
        return Err(format_error("metadata is not a JSON object"));
    };

    let mut metadata = SafeTensorsMetadata::new();
    let mut user_metadata = UserMetadata::new();
    for (key, value) in map {
        if key == "__metadata__" {
            if let serde_json::Value::Object(meta_map) = value {
                for (mk, mv) in meta_map {
                    if let serde_json::Value::String(s) = mv {
                        user_metadata.insert(mk, s);
                    }
                }
            }
            continue;
        }
        metadata.insert(key, serde_json::from_value::<TensorMetadata>(value)?);
    }
    Ok((metadata, user_metadata))
}

fn extract_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(format_error(format!(
            "F32 data length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TensorMap {
        let mut t = TensorMap::new();
        t.insert("b".to_string(), (vec![0.5, -0.5], vec![2]));
        t.insert("w".to_string(), (vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]));
        t
    }

    #[test]
    fn test_header_layout() {
        let bytes = to_bytes(&sample(), &UserMetadata::new()).expect("consistent");
        let len = u64::from_le_bytes(bytes[..8].try_into().expect("8 bytes")) as usize;
        assert_eq!(bytes.len(), 8 + len + 8 * 4);
        let header: serde_json::Value =
            serde_json::from_slice(&bytes[8..8 + len]).expect("json header");
        assert_eq!(header["w"]["shape"], serde_json::json!([2, 3]));
        assert_eq!(header["b"]["data_offsets"], serde_json::json!([0, 8]));
        assert_eq!(header["w"]["data_offsets"], serde_json::json!([8, 32]));
    }

    #[test]
    fn test_read_back_with_metadata() {
        let mut meta = UserMetadata::new();
        meta.insert("task".to_string(), "classification".to_string());
        let bytes = to_bytes(&sample(), &meta).expect("consistent");
        let file = SafeTensorsFile::from_bytes(&bytes).expect("valid");
        assert_eq!(file.user_metadata.get("task").map(String::as_str), Some("classification"));
        let (w, shape) = file.tensor("w").expect("present");
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(w, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(file.tensor("missing").is_err());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut t = TensorMap::new();
        t.insert("x".to_string(), (vec![1.0, 2.0], vec![3]));
        assert!(matches!(
            to_bytes(&t, &UserMetadata::new()),
            Err(PipelineError::Format { .. })
        ));
    }

    #[test]
    fn test_truncated_files_rejected() {
        assert!(SafeTensorsFile::from_bytes(&[1, 2, 3]).is_err());
        let mut bytes = to_bytes(&sample(), &UserMetadata::new()).expect("consistent");
        bytes[0] = 0xff;
        assert!(SafeTensorsFile::from_bytes(&bytes).is_err());
        let good = to_bytes(&sample(), &UserMetadata::new()).expect("consistent");
        let file = SafeTensorsFile::from_bytes(&good[..good.len() - 4]).expect("header intact");
        assert!(file.tensor("w").is_err());
    }
}
