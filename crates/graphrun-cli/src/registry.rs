use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};
use graphrun_core::Backend;
use graphrun_runtime::{App, RunConfig, RunSummary};
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Onnx,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" | "onnxruntime" => Ok(BackendKind::Onnx),
            other => bail!("unsupported backend: {other} (expected onnx)"),
        }
    }
}

pub fn run(kind: BackendKind, model: &Path, config: RunConfig) -> Result<RunSummary> {
    match kind {
        BackendKind::Onnx => run_onnx(model, config),
    }
}

#[cfg(feature = "onnx")]
fn run_onnx(model: &Path, config: RunConfig) -> Result<RunSummary> {
    drive(graphrun_backend_ort::OrtBackend::new(model), config)
}

#[cfg(not(feature = "onnx"))]
fn run_onnx(model: &Path, config: RunConfig) -> Result<RunSummary> {
    let _ = (model, config);
    bail!("onnx backend requested but graphrun was built without the `onnx` feature")
}

/// Runs every stage, then tears the session down even when a stage failed.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub fn drive<B: Backend>(backend: B, config: RunConfig) -> Result<RunSummary> {
    let mut app = App::new(backend, config);
    let result = app.run();
    let teardown = app.shutdown();
    match (result, teardown) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), teardown) => {
            if let Err(teardown_err) = teardown {
                error!(error = ?teardown_err, "teardown after failed run also failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("ONNX".parse::<BackendKind>().unwrap(), BackendKind::Onnx);
        assert!("helion".parse::<BackendKind>().is_err());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_needs_the_feature() {
        let err = run(BackendKind::Onnx, Path::new("m.onnx"), RunConfig::default()).unwrap_err();
        assert!(err.to_string().contains("`onnx` feature"));
    }
}
