use std::fmt;

use crate::{DType, IoTensorResult, Shape};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl fmt::Display for IOName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TensorDescriptor {
    pub name: IOName,
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorDescriptor {
    pub fn new(name: impl Into<String>, dtype: DType, dims: &[usize]) -> Self {
        Self {
            name: IOName(name.into()),
            dtype,
            shape: Shape::from_slice(dims),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn element_count(&self) -> IoTensorResult<usize> {
        self.shape.numel()
    }

    pub fn byte_len(&self) -> IoTensorResult<usize> {
        self.shape.byte_len(self.dtype)
    }
}

/// Signature of one composed graph. Fixed once the backend composes it.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphSpec {
    pub index: usize,
    pub name: String,
    pub inputs: Vec<TensorDescriptor>,
    pub outputs: Vec<TensorDescriptor>,
}

impl GraphSpec {
    /// Directory-safe label: the graph name, or its index when unnamed.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("graph_{}", self.index)
        } else {
            self.name.clone()
        }
    }
}
