//! Float <-> native element conversion.
//!
//! Quantized tensors use `real = (native - offset) * scale` and the inverse
//! `native = round(real / scale) + offset`, saturated to the storage range.
//! Plain integer tensors are cast, rounding and saturating on the way in.

use bytes::BytesMut;
use graphrun_core::{
    DType, IoTensorError, IoTensorResult, QuantStorage, Quantization, TensorDescriptor,
};

const F32_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Clone, Copy, Debug)]
enum IntKind {
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
}

impl IntKind {
    fn size(self) -> usize {
        match self {
            IntKind::I8 | IntKind::U8 => 1,
            IntKind::I16 | IntKind::U16 => 2,
            IntKind::I32 | IntKind::U32 => 4,
        }
    }

    fn range(self) -> (i64, i64) {
        match self {
            IntKind::I8 => (i8::MIN as i64, i8::MAX as i64),
            IntKind::I16 => (i16::MIN as i64, i16::MAX as i64),
            IntKind::I32 => (i32::MIN as i64, i32::MAX as i64),
            IntKind::U8 => (0, u8::MAX as i64),
            IntKind::U16 => (0, u16::MAX as i64),
            IntKind::U32 => (0, u32::MAX as i64),
        }
    }

    fn decode(self, b: &[u8]) -> i64 {
        match self {
            IntKind::I8 => b[0] as i8 as i64,
            IntKind::U8 => b[0] as i64,
            IntKind::I16 => i16::from_le_bytes([b[0], b[1]]) as i64,
            IntKind::U16 => u16::from_le_bytes([b[0], b[1]]) as i64,
            IntKind::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
            IntKind::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
        }
    }

    /// `value` must already be clamped to `range()`.
    fn encode(self, value: i64, out: &mut [u8]) {
        match self {
            IntKind::I8 => out.copy_from_slice(&(value as i8).to_le_bytes()),
            IntKind::U8 => out.copy_from_slice(&(value as u8).to_le_bytes()),
            IntKind::I16 => out.copy_from_slice(&(value as i16).to_le_bytes()),
            IntKind::U16 => out.copy_from_slice(&(value as u16).to_le_bytes()),
            IntKind::I32 => out.copy_from_slice(&(value as i32).to_le_bytes()),
            IntKind::U32 => out.copy_from_slice(&(value as u32).to_le_bytes()),
        }
    }

    fn saturate(self, value: f64) -> i64 {
        let (lo, hi) = self.range();
        // NaN casts to 0; out-of-range floats saturate at the i64 bounds.
        (value.round() as i64).clamp(lo, hi)
    }
}

impl From<QuantStorage> for IntKind {
    fn from(storage: QuantStorage) -> Self {
        match storage {
            QuantStorage::U8 => IntKind::U8,
            QuantStorage::U16 => IntKind::U16,
            QuantStorage::I8 => IntKind::I8,
            QuantStorage::I16 => IntKind::I16,
            QuantStorage::I32 => IntKind::I32,
        }
    }
}

enum Element {
    Float,
    Int(IntKind),
    Fixed(Quantization),
}

fn element(desc: &TensorDescriptor) -> IoTensorResult<Element> {
    Ok(match desc.dtype {
        DType::F32 => Element::Float,
        DType::I8 => Element::Int(IntKind::I8),
        DType::I16 => Element::Int(IntKind::I16),
        DType::I32 => Element::Int(IntKind::I32),
        DType::U8 => Element::Int(IntKind::U8),
        DType::U16 => Element::Int(IntKind::U16),
        DType::U32 => Element::Int(IntKind::U32),
        DType::Quantized(q) => {
            if !q.is_usable() {
                return Err(IoTensorError::UnsupportedQuantization {
                    tensor: desc.name.to_string(),
                    scale: q.scale,
                    offset: q.offset,
                });
            }
            Element::Fixed(q)
        }
    })
}

/// Decodes a native buffer of `desc` into f32 values.
pub fn to_float(bytes: &[u8], desc: &TensorDescriptor) -> IoTensorResult<Vec<f32>> {
    let expected = desc.byte_len()?;
    if bytes.len() != expected {
        return Err(IoTensorError::SizeMismatch {
            tensor: desc.name.to_string(),
            expected,
            actual: bytes.len(),
        });
    }

    Ok(match element(desc)? {
        Element::Float => decode_f32(bytes),
        Element::Int(kind) => bytes
            .chunks_exact(kind.size())
            .map(|b| kind.decode(b) as f32)
            .collect(),
        Element::Fixed(q) => {
            let kind = IntKind::from(q.storage);
            let scale = q.scale as f64;
            let offset = q.offset as i64;
            bytes
                .chunks_exact(kind.size())
                .map(|b| ((kind.decode(b) - offset) as f64 * scale) as f32)
                .collect()
        }
    })
}

/// Encodes f32 values into a native buffer of `desc`.
pub fn from_float(values: &[f32], desc: &TensorDescriptor) -> IoTensorResult<BytesMut> {
    let count = desc.element_count()?;
    if values.len() != count {
        return Err(IoTensorError::SizeMismatch {
            tensor: desc.name.to_string(),
            expected: count * F32_SIZE,
            actual: values.len() * F32_SIZE,
        });
    }

    let element = element(desc)?;
    let mut out = BytesMut::zeroed(desc.byte_len()?);
    match element {
        Element::Float => {
            for (dst, v) in out.chunks_exact_mut(F32_SIZE).zip(values) {
                dst.copy_from_slice(&v.to_le_bytes());
            }
        }
        Element::Int(kind) => {
            for (dst, &v) in out.chunks_exact_mut(kind.size()).zip(values) {
                kind.encode(kind.saturate(v as f64), dst);
            }
        }
        Element::Fixed(q) => {
            let kind = IntKind::from(q.storage);
            let (lo, hi) = q.storage.range();
            let scale = q.scale as f64;
            for (dst, &v) in out.chunks_exact_mut(kind.size()).zip(values) {
                let steps = (v as f64 / scale).round() as i64;
                let native = steps.saturating_add(q.offset as i64).clamp(lo, hi);
                kind.encode(native, dst);
            }
        }
    }
    Ok(out)
}

/// Little-endian f32 decode. Trailing bytes short of a full value are ignored.
pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(F32_SIZE)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

pub fn encode_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
