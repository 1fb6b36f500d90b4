use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use graphrun_core::{
    Backend, BackendCapabilities, DType, GraphSpec, OpPackage, ProfilingLevel, TensorBuffer,
    TensorDescriptor,
};
use ort::{
    session::{builder::GraphOptimizationLevel, Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, ValueRef, ValueType},
};
use tracing::{debug, info};

/// Runs a single ONNX model as one graph on the CPU execution provider.
pub struct OrtBackend {
    model_path: PathBuf,
}

impl OrtBackend {
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
        }
    }
}

pub struct OrtGraph {
    session: Session,
    input_names: Vec<String>,
    finalized: bool,
}

impl Backend for OrtBackend {
    type Device = ();
    type Profile = ();
    type Context = ();
    type Graph = OrtGraph;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_device_properties: false,
            supports_profiling: false,
        }
    }

    fn initialize(&mut self) -> Result<()> {
        ensure!(
            self.model_path.is_file(),
            "ONNX model {} does not exist",
            self.model_path.display()
        );
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        Ok(())
    }

    fn register_op_package(&mut self, package: &OpPackage) -> Result<()> {
        bail!(
            "onnxruntime backend cannot load op package {} ({})",
            package.path,
            package.interface_provider
        )
    }

    fn create_device(&mut self) -> Result<Option<()>> {
        Ok(None)
    }

    fn free_device(&mut self, _device: ()) -> Result<()> {
        Ok(())
    }

    fn create_profile(&mut self, level: ProfilingLevel) -> Result<()> {
        bail!("onnxruntime backend does not support {level} profiling")
    }

    fn free_profile(&mut self, _profile: ()) -> Result<()> {
        Ok(())
    }

    fn create_context(&mut self, _device: Option<&()>) -> Result<()> {
        Ok(())
    }

    fn free_context(&mut self, _context: ()) -> Result<()> {
        Ok(())
    }

    fn compose_graphs(&mut self, _context: &mut ()) -> Result<Vec<(GraphSpec, OrtGraph)>> {
        let session = load_session(&self.model_path, None)?;
        Ok(vec![graph_from_session(session, &self.model_path, false)?])
    }

    fn finalize_graph(&mut self, graph: &mut OrtGraph, _profile: Option<&()>) -> Result<()> {
        // Sessions are fully prepared by `commit_from_file`.
        graph.finalized = true;
        Ok(())
    }

    fn execute_graph(
        &mut self,
        graph: &mut OrtGraph,
        inputs: &[TensorBuffer],
        outputs: &mut [TensorBuffer],
        _profile: Option<&()>,
    ) -> Result<()> {
        ensure!(graph.finalized, "graph executed before finalize");
        ensure!(
            inputs.len() == graph.input_names.len(),
            "expected {} inputs, got {}",
            graph.input_names.len(),
            inputs.len()
        );

        let mut ort_inputs = Vec::with_capacity(inputs.len());
        for (name, input) in graph.input_names.iter().zip(inputs) {
            let value = buffer_to_ort_value(input)
                .with_context(|| format!("failed to convert input {}", input.name()))?;
            ort_inputs.push((name.clone(), SessionInputValue::from(value)));
        }

        let results = graph.session.run(ort_inputs)?;
        let mut produced = 0;
        for ((_, value), out) in results.iter().zip(outputs.iter_mut()) {
            let bytes = ort_value_to_bytes(&value, out.desc().dtype)
                .with_context(|| format!("failed to read output {}", out.name()))?;
            out.copy_from(&bytes)?;
            produced += 1;
        }
        ensure!(
            produced == outputs.len(),
            "model produced {produced} outputs, graph declares {}",
            outputs.len()
        );
        debug!(inputs = inputs.len(), outputs = outputs.len(), "ORT session run");
        Ok(())
    }

    fn free_graph(&mut self, graph: OrtGraph) -> Result<()> {
        drop(graph);
        Ok(())
    }

    /// Loads a model previously optimized and saved by `save_binary` (ONNX or
    /// `.ort` format). The session is ready to run without finalizing.
    fn create_from_binary(
        &mut self,
        path: &Path,
        _device: Option<&()>,
        _profile: Option<&()>,
    ) -> Result<((), Vec<(GraphSpec, OrtGraph)>)> {
        let session = load_session(path, None)?;
        Ok(((), vec![graph_from_session(session, path, true)?]))
    }

    /// Writes the model as optimized by ONNX Runtime to `path`.
    fn save_binary(&mut self, _context: &(), path: &Path) -> Result<()> {
        load_session(&self.model_path, Some(path))?;
        Ok(())
    }
}

fn load_session(path: &Path, optimized_out: Option<&Path>) -> Result<Session> {
    let mut builder = Session::builder()
        .context("failed to create ORT session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("failed to configure ORT session builder")?;
    if let Some(out) = optimized_out {
        builder = builder
            .with_optimized_model_path(out.to_string_lossy().into_owned())
            .context("failed to set ORT optimized model path")?;
    }
    builder
        .commit_from_file(path)
        .with_context(|| format!("failed to load ONNX model {}", path.display()))
}

fn graph_from_session(
    session: Session,
    path: &Path,
    finalized: bool,
) -> Result<(GraphSpec, OrtGraph)> {
    let spec = build_graph_spec(&session, path)?;
    let input_names = session.inputs.iter().map(|input| input.name.clone()).collect();
    info!(
        model = %path.display(),
        inputs = spec.inputs.len(),
        outputs = spec.outputs.len(),
        "ONNX model loaded"
    );
    let graph = OrtGraph {
        session,
        input_names,
        finalized,
    };
    Ok((spec, graph))
}

fn build_graph_spec(session: &Session, model_path: &Path) -> Result<GraphSpec> {
    let inputs = session
        .inputs
        .iter()
        .map(|input| descriptor_from_value_type(&input.name, &input.input_type))
        .collect::<Result<Vec<_>>>()?;

    let outputs = session
        .outputs
        .iter()
        .map(|output| descriptor_from_value_type(&output.name, &output.output_type))
        .collect::<Result<Vec<_>>>()?;

    let name = model_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(GraphSpec {
        index: 0,
        name,
        inputs,
        outputs,
    })
}

fn descriptor_from_value_type(name: &str, value_type: &ValueType) -> Result<TensorDescriptor> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("unsupported non-tensor IO value type for {name}");
    };

    let dtype = ort_element_to_dtype(*ty)?;
    // Dynamic dimensions are bound to 1.
    let dims: Vec<usize> = shape
        .iter()
        .map(|d| if *d < 0 { 1 } else { *d as usize })
        .collect();

    Ok(TensorDescriptor::new(name, dtype, &dims))
}

fn ort_element_to_dtype(ty: TensorElementType) -> Result<DType> {
    match ty {
        TensorElementType::Float32 => Ok(DType::F32),
        TensorElementType::Int8 => Ok(DType::I8),
        TensorElementType::Int16 => Ok(DType::I16),
        TensorElementType::Int32 => Ok(DType::I32),
        TensorElementType::Uint8 => Ok(DType::U8),
        TensorElementType::Uint16 => Ok(DType::U16),
        TensorElementType::Uint32 => Ok(DType::U32),
        _ => bail!("unsupported tensor element type: {ty}"),
    }
}

macro_rules! ort_tensor {
    ($bytes:expr, $shape:expr, $t:ty) => {{
        let data = $bytes
            .chunks_exact(std::mem::size_of::<$t>())
            .map(|b| b.try_into().map(<$t>::from_le_bytes))
            .collect::<std::result::Result<Vec<$t>, _>>()?;
        ort::value::Tensor::from_array(($shape, data))?.into_dyn()
    }};
}

fn buffer_to_ort_value(buffer: &TensorBuffer) -> Result<DynValue> {
    let bytes = buffer.as_bytes();
    let shape: Vec<usize> = buffer.desc().shape.dims().to_vec();

    let value = match buffer.desc().dtype {
        DType::F32 => ort_tensor!(bytes, shape, f32),
        DType::I8 => ort_tensor!(bytes, shape, i8),
        DType::I16 => ort_tensor!(bytes, shape, i16),
        DType::I32 => ort_tensor!(bytes, shape, i32),
        DType::U8 => ort::value::Tensor::from_array((shape, bytes.to_vec()))?.into_dyn(),
        DType::U16 => ort_tensor!(bytes, shape, u16),
        DType::U32 => ort_tensor!(bytes, shape, u32),
        DType::Quantized(_) => bail!("quantized tensors have no ONNX representation"),
    };
    Ok(value)
}

macro_rules! le_bytes {
    ($value:expr, $t:ty) => {{
        let array = $value.try_extract_array::<$t>()?;
        let slice = array.as_slice().context("non-contiguous output tensor")?;
        slice.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>()
    }};
}

fn ort_value_to_bytes(value: &ValueRef<'_>, expected: DType) -> Result<Vec<u8>> {
    let ValueType::Tensor { ty, .. } = value.dtype() else {
        bail!("non-tensor outputs are not supported");
    };
    let actual = ort_element_to_dtype(*ty)?;
    ensure!(
        actual == expected,
        "output element type {actual} does not match declared {expected}"
    );

    Ok(match actual {
        DType::F32 => le_bytes!(value, f32),
        DType::I8 => le_bytes!(value, i8),
        DType::I16 => le_bytes!(value, i16),
        DType::I32 => le_bytes!(value, i32),
        DType::U8 => le_bytes!(value, u8),
        DType::U16 => le_bytes!(value, u16),
        DType::U32 => le_bytes!(value, u32),
        DType::Quantized(_) => bail!("quantized tensors have no ONNX representation"),
    })
}
