use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use graphrun_core::{IoTensorError, IoTensorResult, OutputFailure, TensorBuffer};
use tracing::{debug, error};

use crate::{encode_f32, to_float};

const FLOAT_DIR: &str = "float";
const NATIVE_DIR: &str = "native";

/// Which representation(s) of each output tensor are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputDataType {
    #[default]
    FloatOnly,
    NativeOnly,
    FloatAndNative,
}

impl FromStr for OutputDataType {
    type Err = IoTensorError;

    fn from_str(s: &str) -> IoTensorResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "float_only" => Ok(OutputDataType::FloatOnly),
            "native_only" => Ok(OutputDataType::NativeOnly),
            "float_and_native" => Ok(OutputDataType::FloatAndNative),
            _ => Err(IoTensorError::InvalidDataType {
                kind: "output",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputDataType::FloatOnly => "float_only",
            OutputDataType::NativeOnly => "native_only",
            OutputDataType::FloatAndNative => "float_and_native",
        })
    }
}

/// Where and how one batch step's outputs are written.
#[derive(Clone, Copy, Debug)]
pub struct OutputTarget<'a> {
    pub output_root: &'a Path,
    pub graph_idx: usize,
    pub graph_label: &'a str,
    pub batch_idx: usize,
    pub output_type: OutputDataType,
}

impl OutputTarget<'_> {
    /// `<root>/Result_<batch>/<graph>`
    pub fn graph_dir(&self) -> PathBuf {
        self.output_root
            .join(format!("Result_{}", self.batch_idx))
            .join(file_component(self.graph_label))
    }
}

#[derive(Clone, Copy)]
enum Form {
    Float,
    Native,
}

/// Writes every output tensor, continuing past per-file failures. All failures
/// are reported together once every tensor has been attempted; files already
/// written stay on disk.
pub fn write_output_tensors(
    target: &OutputTarget<'_>,
    outputs: &[TensorBuffer],
) -> IoTensorResult<()> {
    let graph_dir = target.graph_dir();
    let plan: Vec<(Form, Option<&str>)> = match target.output_type {
        OutputDataType::FloatOnly => vec![(Form::Float, None)],
        OutputDataType::NativeOnly => vec![(Form::Native, None)],
        OutputDataType::FloatAndNative => vec![
            (Form::Float, Some(FLOAT_DIR)),
            (Form::Native, Some(NATIVE_DIR)),
        ],
    };

    let mut failures = Vec::new();
    let mut total = 0;
    for output in outputs {
        let file_name = format!("{}.raw", file_component(output.name()));
        for &(form, qualifier) in &plan {
            total += 1;
            let path = match qualifier {
                Some(q) => graph_dir.join(q).join(&file_name),
                None => graph_dir.join(&file_name),
            };
            let written = match form {
                Form::Float => write_float(output, &path),
                Form::Native => write_raw(&path, output.as_bytes()),
            };
            match written {
                Ok(()) => {
                    debug!(tensor = output.name(), path = %path.display(), "wrote output tensor")
                }
                Err(err) => {
                    error!(
                        tensor = output.name(),
                        path = %path.display(),
                        error = %err,
                        "failed to write output tensor"
                    );
                    failures.push(OutputFailure {
                        tensor: output.name().to_string(),
                        error: err,
                    });
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(IoTensorError::OutputWrite {
            graph_idx: target.graph_idx,
            batch_idx: target.batch_idx,
            total,
            failures,
        })
    }
}

fn write_float(output: &TensorBuffer, path: &Path) -> IoTensorResult<()> {
    let values = to_float(output.as_bytes(), output.desc())?;
    write_raw(path, &encode_f32(&values))
}

fn write_raw(path: &Path, bytes: &[u8]) -> IoTensorResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| IoTensorError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| IoTensorError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })
}

/// Tensor and graph names may carry path separators; keep each one a single component.
fn file_component(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}
