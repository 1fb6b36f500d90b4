use std::fmt;
use std::fs;
use std::str::FromStr;

use graphrun_core::{IoTensorError, IoTensorResult, TensorBuffer};
use tracing::{debug, error};

use crate::{decode_f32, from_float, InputManifest};

/// How raw input files are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputDataType {
    /// f32 files converted to each tensor's native type.
    #[default]
    Float,
    /// Files already laid out in the tensor's native type.
    Native,
}

impl FromStr for InputDataType {
    type Err = IoTensorError;

    fn from_str(s: &str) -> IoTensorResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "float" => Ok(InputDataType::Float),
            "native" => Ok(InputDataType::Native),
            _ => Err(IoTensorError::InvalidDataType {
                kind: "input",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for InputDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputDataType::Float => "float",
            InputDataType::Native => "native",
        })
    }
}

/// Fills every input tensor of one graph for a single batch step, dequeuing one
/// path per input slot. Slot `i` feeds declared input `i`.
///
/// On error the tensors populated so far hold this step's data and the rest
/// hold the previous step's; the caller must not execute the graph.
pub fn populate_input_tensors(
    graph_idx: usize,
    manifest: &mut InputManifest,
    inputs: &mut [TensorBuffer],
    input_type: InputDataType,
) -> IoTensorResult<()> {
    check_input_count(graph_idx, manifest.slot_count(), inputs.len())?;

    for (slot, input) in inputs.iter_mut().enumerate() {
        let path = manifest
            .dequeue(slot)
            .ok_or(IoTensorError::InputListExhausted { graph_idx, slot })?;
        let bytes = fs::read(&path).map_err(|source| {
            error!(graph_idx, slot, path = %path, "failed to read input file");
            IoTensorError::ReadInput {
                path: path.clone().into(),
                source,
            }
        })?;
        populate_input_tensor(input, &bytes, &path, input_type)?;
        debug!(graph_idx, slot, tensor = input.name(), path = %path, "populated input tensor");
    }
    Ok(())
}

/// Memory-backed variant of [`populate_input_tensors`]: buffer `i` feeds input `i`.
pub fn populate_input_tensors_from_buffers(
    graph_idx: usize,
    buffers: &[&[u8]],
    inputs: &mut [TensorBuffer],
    input_type: InputDataType,
) -> IoTensorResult<()> {
    check_input_count(graph_idx, buffers.len(), inputs.len())?;

    for (slot, (input, bytes)) in inputs.iter_mut().zip(buffers).enumerate() {
        let origin = format!("memory buffer {slot}");
        populate_input_tensor(input, bytes, &origin, input_type)?;
    }
    Ok(())
}

fn check_input_count(graph_idx: usize, supplied: usize, declared: usize) -> IoTensorResult<()> {
    if supplied != declared {
        error!(graph_idx, supplied, declared, "input count mismatch");
        return Err(IoTensorError::InputCountMismatch {
            graph_idx,
            expected: declared,
            actual: supplied,
        });
    }
    Ok(())
}

/// Converts first, then copies, so a rejected input never touches the tensor.
fn populate_input_tensor(
    input: &mut TensorBuffer,
    bytes: &[u8],
    origin: &str,
    input_type: InputDataType,
) -> IoTensorResult<()> {
    let expected = match input_type {
        InputDataType::Native => input.byte_len(),
        InputDataType::Float => input.desc().element_count()? * std::mem::size_of::<f32>(),
    };
    if bytes.len() != expected {
        error!(
            tensor = input.name(),
            origin,
            expected,
            actual = bytes.len(),
            "input size mismatch"
        );
        return Err(IoTensorError::InputSizeMismatch {
            tensor: input.name().to_string(),
            path: origin.to_string(),
            expected,
            actual: bytes.len(),
        });
    }

    match input_type {
        InputDataType::Native => input.copy_from(bytes),
        InputDataType::Float => {
            let native = from_float(&decode_f32(bytes), input.desc())?;
            input.copy_from(&native)
        }
    }
}
