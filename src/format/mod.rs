//! Portable model formats.
//!
//! - [`onnx`]: ONNX computation graph for the selected network, consumed by
//!   the external circuit compiler.

pub mod onnx;
