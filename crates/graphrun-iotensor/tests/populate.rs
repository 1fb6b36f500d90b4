use std::fs;
use std::path::Path;

use anyhow::Result;
use graphrun_core::{DType, IoTensorError, QuantStorage, Quantization, TensorBuffer, TensorDescriptor};
use graphrun_iotensor::{
    allocate_tensor, encode_f32, populate_input_tensors, populate_input_tensors_from_buffers,
    InputDataType, InputManifest, ManifestOptions,
};

fn manifest_for(dir: &Path, lines: &[&[&str]]) -> Result<InputManifest> {
    let text = lines
        .iter()
        .map(|paths| {
            paths
                .iter()
                .map(|p| dir.join(p).display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok(InputManifest::parse(dir.join("list.txt"), &text, ManifestOptions::default())?)
}

fn tensors(descs: &[TensorDescriptor]) -> Result<Vec<TensorBuffer>> {
    Ok(descs.iter().map(allocate_tensor).collect::<Result<Vec<_>, _>>()?)
}

#[test]
fn float_file_fills_float_tensor() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("input0.raw"), encode_f32(&[1.0, 2.0, 3.0, 4.0]))?;
    let mut manifest = InputManifest::parse(
        "list.txt",
        &format!("input0:={}", dir.path().join("input0.raw").display()),
        ManifestOptions::default(),
    )?;
    let mut inputs = tensors(&[TensorDescriptor::new("input0", DType::F32, &[1, 4])])?;

    populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Float)?;

    assert_eq!(inputs[0].as_bytes(), encode_f32(&[1.0, 2.0, 3.0, 4.0]).as_slice());
    assert!(manifest.is_exhausted());
    Ok(())
}

#[test]
fn float_file_is_quantized_into_native_tensor() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("q.raw"), encode_f32(&[0.0, 0.5, 1.0]))?;
    let mut manifest = manifest_for(dir.path(), &[&["q.raw"]])?;
    let dtype = DType::Quantized(Quantization::new(QuantStorage::U8, 0.25, 4));
    let mut inputs = tensors(&[TensorDescriptor::new("q", dtype, &[3])])?;

    populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Float)?;

    assert_eq!(inputs[0].as_bytes(), &[4, 6, 8]);
    Ok(())
}

#[test]
fn native_file_is_copied_verbatim() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.raw"), [9u8, 8, 7, 6])?;
    fs::write(dir.path().join("b.raw"), 513u16.to_le_bytes())?;
    let mut manifest = manifest_for(dir.path(), &[&["a.raw", "b.raw"]])?;
    let mut inputs = tensors(&[
        TensorDescriptor::new("a", DType::U8, &[2, 2]),
        TensorDescriptor::new("b", DType::U16, &[1]),
    ])?;

    populate_input_tensors(3, &mut manifest, &mut inputs, InputDataType::Native)?;

    assert_eq!(inputs[0].as_bytes(), &[9, 8, 7, 6]);
    assert_eq!(inputs[1].as_bytes(), &[1, 2]);
    Ok(())
}

#[test]
fn one_step_consumes_one_path_per_slot() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for name in ["a0.raw", "a1.raw"] {
        fs::write(dir.path().join(name), [name.as_bytes()[1]])?;
    }
    let mut manifest = manifest_for(dir.path(), &[&["a0.raw"], &["a1.raw"]])?;
    let mut inputs = tensors(&[TensorDescriptor::new("a", DType::U8, &[1])])?;

    populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Native)?;
    assert_eq!(inputs[0].as_bytes(), b"0");
    assert_eq!(manifest.remaining_steps(), 1);

    populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Native)?;
    assert_eq!(inputs[0].as_bytes(), b"1");
    assert!(manifest.is_exhausted());
    Ok(())
}

#[test]
fn short_file_fails_without_touching_the_tensor() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("ok.raw"), encode_f32(&[5.0]))?;
    fs::write(dir.path().join("short.raw"), [0u8; 12])?;
    let mut manifest = manifest_for(dir.path(), &[&["ok.raw", "short.raw"]])?;
    let mut inputs = tensors(&[
        TensorDescriptor::new("ok", DType::F32, &[1]),
        TensorDescriptor::new("wide", DType::F32, &[1, 4]),
    ])?;
    inputs[1].copy_from(&encode_f32(&[7.0; 4]))?;

    let err = populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Float).unwrap_err();

    match err {
        IoTensorError::InputSizeMismatch {
            tensor,
            expected,
            actual,
            ..
        } => {
            assert_eq!(tensor, "wide");
            assert_eq!(expected, 16);
            assert_eq!(actual, 12);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(inputs[1].as_bytes(), encode_f32(&[7.0; 4]).as_slice());
    Ok(())
}

#[test]
fn native_mode_expects_native_byte_length() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // A float file for a u8 tensor is four times too large in native mode.
    fs::write(dir.path().join("f.raw"), encode_f32(&[1.0, 2.0]))?;
    let mut manifest = manifest_for(dir.path(), &[&["f.raw"]])?;
    let mut inputs = tensors(&[TensorDescriptor::new("u", DType::U8, &[2])])?;

    let err = populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Native).unwrap_err();
    assert!(matches!(
        err,
        IoTensorError::InputSizeMismatch {
            expected: 2,
            actual: 8,
            ..
        }
    ));
    Ok(())
}

#[test]
fn slot_count_must_match_declared_inputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_for(dir.path(), &[&["a.raw", "b.raw"]])?;
    let mut inputs = tensors(&[TensorDescriptor::new("a", DType::U8, &[1])])?;

    let err = populate_input_tensors(2, &mut manifest, &mut inputs, InputDataType::Native).unwrap_err();
    assert!(matches!(
        err,
        IoTensorError::InputCountMismatch {
            graph_idx: 2,
            expected: 1,
            actual: 2
        }
    ));
    Ok(())
}

#[test]
fn missing_file_and_exhausted_list_are_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_for(dir.path(), &[&["absent.raw"]])?;
    let mut inputs = tensors(&[TensorDescriptor::new("a", DType::U8, &[1])])?;

    let err = populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Native).unwrap_err();
    assert!(matches!(err, IoTensorError::ReadInput { .. }));

    let err = populate_input_tensors(0, &mut manifest, &mut inputs, InputDataType::Native).unwrap_err();
    assert!(matches!(
        err,
        IoTensorError::InputListExhausted { graph_idx: 0, slot: 0 }
    ));
    Ok(())
}

#[test]
fn memory_buffers_follow_the_same_rules() -> Result<()> {
    let mut inputs = tensors(&[
        TensorDescriptor::new("f", DType::F32, &[2]),
        TensorDescriptor::new("i", DType::I16, &[2]),
    ])?;
    let float_bytes = encode_f32(&[0.5, -0.5]);
    let int_bytes = encode_f32(&[-3.0, 70000.0]);

    populate_input_tensors_from_buffers(
        0,
        &[&float_bytes, &int_bytes],
        &mut inputs,
        InputDataType::Float,
    )?;
    assert_eq!(inputs[0].as_bytes(), float_bytes.as_slice());
    let ints: Vec<i16> = inputs[1]
        .as_bytes()
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(ints, [-3, i16::MAX]);

    let err = populate_input_tensors_from_buffers(
        0,
        &[&float_bytes[..4], &int_bytes],
        &mut inputs,
        InputDataType::Float,
    )
    .unwrap_err();
    assert!(matches!(err, IoTensorError::InputSizeMismatch { .. }));

    let err = populate_input_tensors_from_buffers(0, &[&float_bytes], &mut inputs, InputDataType::Native)
        .unwrap_err();
    assert!(matches!(err, IoTensorError::InputCountMismatch { .. }));
    Ok(())
}
