//! Minimal protobuf wire format reader and writer.
//!
//! Wire types used by ONNX: 0 (varint), 1 (64-bit), 2 (length-delimited),
//! 5 (32-bit).

use crate::error::{PipelineError, Result};

pub(crate) const WIRE_VARINT: u32 = 0;
pub(crate) const WIRE_FIXED64: u32 = 1;
pub(crate) const WIRE_LEN: u32 = 2;
pub(crate) const WIRE_FIXED32: u32 = 5;

fn truncated(what: &str) -> PipelineError {
    PipelineError::Format {
        message: format!("unexpected end of protobuf data reading {what}"),
    }
}

/// Append-only protobuf encoder.
#[derive(Debug, Default)]
pub(crate) struct ProtobufWriter {
    buf: Vec<u8>,
}

impl ProtobufWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    fn tag(&mut self, field: u32, wire_type: u32) {
        self.varint(u64::from((field << 3) | wire_type));
    }

    /// `int64`/`int32`/enum field. Negative values take ten bytes.
    pub(crate) fn int64(&mut self, field: u32, value: i64) {
        self.tag(field, WIRE_VARINT);
        self.varint(value as u64);
    }

    pub(crate) fn float(&mut self, field: u32, value: f32) {
        self.tag(field, WIRE_FIXED32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn bytes(&mut self, field: u32, value: &[u8]) {
        self.tag(field, WIRE_LEN);
        self.varint(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    pub(crate) fn string(&mut self, field: u32, value: &str) {
        self.bytes(field, value.as_bytes());
    }

    /// Embedded message built by `build`.
    pub(crate) fn message(&mut self, field: u32, build: impl FnOnce(&mut ProtobufWriter)) {
        let mut inner = ProtobufWriter::new();
        build(&mut inner);
        self.bytes(field, &inner.buf);
    }
}

/// Cursor over protobuf bytes.
pub(crate) struct ProtobufReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ProtobufReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    pub(crate) fn read_tag(&mut self) -> Result<(u32, u32)> {
        let varint = self.read_varint()?;
        let field_num = (varint >> 3) as u32;
        let wire_type = (varint & 0x7) as u32;
        Ok((field_num, wire_type))
    }

    pub(crate) fn read_varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = *self.data.get(self.pos).ok_or_else(|| truncated("varint"))?;
            self.pos += 1;
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 64 {
                return Err(PipelineError::Format {
                    message: "varint overflow".to_string(),
                });
            }
        }
    }

    pub(crate) fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| PipelineError::Format {
                message: format!(
                    "length-delimited field extends past data ({} + {len} > {})",
                    self.pos,
                    self.data.len()
                ),
            })?;
        let result = &self.data[self.pos..end];
        self.pos = end;
        Ok(result)
    }

    pub(crate) fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PipelineError::Format {
            message: "invalid UTF-8 in protobuf string".to_string(),
        })
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| truncated("f32"))?;
        self.pos += 4;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(truncated("skipped field"));
        }
        self.pos += n;
        Ok(())
    }

    /// Skip over a field of `wire_type` whose tag was just read.
    pub(crate) fn skip_field(&mut self, field_num: u32, wire_type: u32) -> Result<()> {
        match wire_type {
            WIRE_VARINT => self.read_varint().map(|_| ()),
            WIRE_FIXED64 => self.skip(8),
            WIRE_LEN => self.read_bytes().map(|_| ()),
            WIRE_FIXED32 => self.skip(4),
            _ => Err(PipelineError::Format {
                message: format!("unknown protobuf wire type {wire_type} for field {field_num}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_encoding() {
        let mut w = ProtobufWriter::new();
        w.int64(1, 300);
        // tag 0x08, then 300 = 0b1_0010_1100 → ac 02
        assert_eq!(w.into_bytes(), vec![0x08, 0xac, 0x02]);
    }

    #[test]
    fn test_nested_message_read_back() {
        let mut w = ProtobufWriter::new();
        w.message(7, |g| {
            g.string(2, "graph");
            g.float(3, 1.5);
        });
        w.int64(1, 6);
        let bytes = w.into_bytes();

        let mut r = ProtobufReader::new(&bytes);
        assert_eq!(r.read_tag().expect("tag"), (7, WIRE_LEN));
        let mut inner = ProtobufReader::new(r.read_bytes().expect("message"));
        assert_eq!(inner.read_tag().expect("tag"), (2, WIRE_LEN));
        assert_eq!(inner.read_string().expect("string"), "graph");
        assert_eq!(inner.read_tag().expect("tag"), (3, WIRE_FIXED32));
        assert_eq!(inner.read_f32().expect("float"), 1.5);
        assert!(!inner.has_more());

        let (field, wire) = r.read_tag().expect("tag");
        r.skip_field(field, wire).expect("varint");
        assert!(!r.has_more());
    }

    #[test]
    fn test_truncated_length_rejected() {
        let mut r = ProtobufReader::new(&[0x0a, 0x05, 0x01]);
        r.read_tag().expect("tag");
        assert!(r.read_bytes().is_err());
        assert!(ProtobufReader::new(&[0x80]).read_varint().is_err());
    }
}
