//! Errors raised by the tensor I/O path: manifest reading, buffer allocation,
//! type conversion, input population and output serialization.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type IoTensorResult<T> = std::result::Result<T, IoTensorError>;

#[derive(Error, Debug)]
pub enum IoTensorError {
    #[error("failed to read input list {}", .path.display())]
    InputListUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "input list {} line {line}: expected {expected} input paths, found {actual}",
        .path.display()
    )]
    RaggedInputList {
        path: PathBuf,
        line: usize,
        expected: usize,
        actual: usize,
    },
    #[error("invalid {kind} data type: {value}")]
    InvalidDataType { kind: &'static str, value: String },
    #[error("invalid dimensions {dims:?}: element count is zero or overflows")]
    InvalidDimensions { dims: Vec<usize> },
    #[error("cannot allocate a buffer of zero bytes")]
    ZeroByteCount,
    #[error("tensor {tensor}: unsupported quantization parameters (scale {scale}, offset {offset})")]
    UnsupportedQuantization {
        tensor: String,
        scale: f32,
        offset: i32,
    },
    #[error("tensor {tensor}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        tensor: String,
        expected: usize,
        actual: usize,
    },
    #[error("input size mismatch for tensor {tensor} from {path}: expected {expected} bytes, read {actual}")]
    InputSizeMismatch {
        tensor: String,
        path: String,
        expected: usize,
        actual: usize,
    },
    #[error("graph {graph_idx}: {actual} inputs supplied, graph declares {expected}")]
    InputCountMismatch {
        graph_idx: usize,
        expected: usize,
        actual: usize,
    },
    #[error("graph {graph_idx}: input list exhausted for input slot {slot}")]
    InputListExhausted { graph_idx: usize, slot: usize },
    #[error("failed to read input file {}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create output directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write output file {}", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "graph {graph_idx} batch {batch_idx}: {} of {total} output files failed, first: {}",
        .failures.len(),
        first_failure(.failures)
    )]
    OutputWrite {
        graph_idx: usize,
        batch_idx: usize,
        total: usize,
        failures: Vec<OutputFailure>,
    },
}

/// One tensor that could not be written during a best-effort output pass.
#[derive(Debug)]
pub struct OutputFailure {
    pub tensor: String,
    pub error: IoTensorError,
}

fn first_failure(failures: &[OutputFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{}: {}", f.tensor, f.error))
        .unwrap_or_default()
}
