use graphrun_core::{GraphSpec, IoTensorResult, TensorBuffer, TensorDescriptor};
use tracing::{debug, error};

use crate::allocate_tensor;

/// Host buffers for one graph's inputs and outputs, in declared order.
#[derive(Debug)]
pub struct GraphTensors {
    pub inputs: Vec<TensorBuffer>,
    pub outputs: Vec<TensorBuffer>,
}

pub fn setup_input_and_output_tensors(graph: &GraphSpec) -> IoTensorResult<GraphTensors> {
    let inputs = setup_tensors(graph.index, &graph.inputs)?;
    let outputs = setup_tensors(graph.index, &graph.outputs)?;
    debug!(
        graph_idx = graph.index,
        inputs = inputs.len(),
        outputs = outputs.len(),
        "allocated graph tensors"
    );
    Ok(GraphTensors { inputs, outputs })
}

/// Releases every buffer of a graph. Dropping `GraphTensors` does the same; this
/// just makes the end of the buffers' lifetime explicit at the call site.
pub fn tear_down_input_and_output_tensors(tensors: GraphTensors) {
    debug!(
        inputs = tensors.inputs.len(),
        outputs = tensors.outputs.len(),
        "releasing graph tensors"
    );
    drop(tensors);
}

fn setup_tensors(
    graph_idx: usize,
    descs: &[TensorDescriptor],
) -> IoTensorResult<Vec<TensorBuffer>> {
    descs
        .iter()
        .map(|desc| {
            allocate_tensor(desc).inspect_err(|err| {
                error!(
                    graph_idx,
                    tensor = %desc.name,
                    dims = %desc.shape,
                    error = %err,
                    "failed to allocate tensor"
                );
            })
        })
        .collect()
}
