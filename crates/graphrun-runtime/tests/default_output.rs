mod common;

use std::fs;

use anyhow::Result;
use common::LoopbackBackend;
use graphrun_core::{DType, GraphSpec, TensorDescriptor};
use graphrun_iotensor::encode_f32;
use graphrun_runtime::{App, RunConfig, DEFAULT_OUTPUT_DIR};

// Changes the working directory, so it lives alone in this test binary.
#[test]
fn outputs_default_to_output_under_the_working_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("x.raw");
    fs::write(&raw, encode_f32(&[3.0, 4.0]))?;
    let list = dir.path().join("list.txt");
    fs::write(&list, format!("x:={}\n", raw.display()))?;
    std::env::set_current_dir(dir.path())?;

    let config = RunConfig {
        input_lists: vec![list],
        ..RunConfig::default()
    };
    assert_eq!(config.output_dir.to_str(), Some(DEFAULT_OUTPUT_DIR));

    let graph = GraphSpec {
        index: 0,
        name: "net".to_string(),
        inputs: vec![TensorDescriptor::new("x", DType::F32, &[2])],
        outputs: vec![TensorDescriptor::new("y", DType::F32, &[2])],
    };
    let (backend, _log) = LoopbackBackend::new(vec![graph]);
    App::new(backend, config).run()?;

    let written = fs::read(dir.path().join("output/Result_0/net/y.raw"))?;
    assert_eq!(written, encode_f32(&[3.0, 4.0]));
    Ok(())
}
