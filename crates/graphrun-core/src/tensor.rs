use std::fmt;

use bytes::BytesMut;
use smallvec::SmallVec;

use crate::{IoTensorError, IoTensorResult, TensorDescriptor};

/// Integer storage backing a fixed-point quantized tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantStorage {
    U8,
    U16,
    I8,
    I16,
    I32,
}

impl QuantStorage {
    pub fn size_in_bytes(self) -> usize {
        match self {
            QuantStorage::U8 | QuantStorage::I8 => 1,
            QuantStorage::U16 | QuantStorage::I16 => 2,
            QuantStorage::I32 => 4,
        }
    }

    /// Inclusive range of representable native values.
    pub fn range(self) -> (i64, i64) {
        match self {
            QuantStorage::U8 => (u8::MIN as i64, u8::MAX as i64),
            QuantStorage::U16 => (u16::MIN as i64, u16::MAX as i64),
            QuantStorage::I8 => (i8::MIN as i64, i8::MAX as i64),
            QuantStorage::I16 => (i16::MIN as i64, i16::MAX as i64),
            QuantStorage::I32 => (i32::MIN as i64, i32::MAX as i64),
        }
    }
}

/// Per-tensor linear quantization: `real = (native - offset) * scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantization {
    pub storage: QuantStorage,
    pub scale: f32,
    pub offset: i32,
}

impl Quantization {
    pub fn new(storage: QuantStorage, scale: f32, offset: i32) -> Self {
        Self {
            storage,
            scale,
            offset,
        }
    }

    /// A zero or non-finite scale cannot be inverted.
    pub fn is_usable(&self) -> bool {
        self.scale.is_finite() && self.scale != 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DType {
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
    F32,
    Quantized(Quantization),
}

impl DType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::Quantized(q) => q.storage.size_in_bytes(),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::I8 => f.write_str("int8"),
            DType::I16 => f.write_str("int16"),
            DType::I32 => f.write_str("int32"),
            DType::U8 => f.write_str("uint8"),
            DType::U16 => f.write_str("uint16"),
            DType::U32 => f.write_str("uint32"),
            DType::F32 => f.write_str("float32"),
            DType::Quantized(q) => {
                let storage = match q.storage {
                    QuantStorage::U8 => "ufixed8",
                    QuantStorage::U16 => "ufixed16",
                    QuantStorage::I8 => "sfixed8",
                    QuantStorage::I16 => "sfixed16",
                    QuantStorage::I32 => "sfixed32",
                };
                write!(f, "{storage}(scale={}, offset={})", q.scale, q.offset)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Element count, or `InvalidDimensions` for rank 0, a zero dimension or overflow.
    pub fn numel(&self) -> IoTensorResult<usize> {
        if self.0.is_empty() {
            return Err(self.invalid());
        }
        let count = self
            .0
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| self.invalid())?;
        if count == 0 {
            return Err(self.invalid());
        }
        Ok(count)
    }

    /// Byte size of a dense row-major buffer of `dtype` elements.
    pub fn byte_len(&self, dtype: DType) -> IoTensorResult<usize> {
        self.numel()?
            .checked_mul(dtype.size_in_bytes())
            .ok_or_else(|| self.invalid())
    }

    fn invalid(&self) -> IoTensorError {
        IoTensorError::InvalidDimensions {
            dims: self.0.to_vec(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.as_slice())
    }
}

/// A descriptor paired with the host storage holding its elements.
///
/// The byte region always matches `desc.byte_len()`; every mutation path checks
/// the incoming length instead of truncating or padding.
#[derive(Clone, Debug)]
pub struct TensorBuffer {
    desc: TensorDescriptor,
    data: BytesMut,
}

impl TensorBuffer {
    pub fn new(desc: TensorDescriptor, data: BytesMut) -> IoTensorResult<Self> {
        let expected = desc.byte_len()?;
        if data.len() != expected {
            return Err(IoTensorError::SizeMismatch {
                tensor: desc.name.to_string(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { desc, data })
    }

    pub fn desc(&self) -> &TensorDescriptor {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name.0
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Overwrites the whole buffer; fails without touching it on a length mismatch.
    pub fn copy_from(&mut self, bytes: &[u8]) -> IoTensorResult<()> {
        if bytes.len() != self.data.len() {
            return Err(IoTensorError::SizeMismatch {
                tensor: self.desc.name.to_string(),
                expected: self.data.len(),
                actual: bytes.len(),
            });
        }
        self.data.copy_from_slice(bytes);
        Ok(())
    }
}
