use bytes::BytesMut;
use graphrun_core::{DType, IoTensorError, IoTensorResult, Shape, TensorBuffer, TensorDescriptor};

/// Zeroed storage for `product(dims)` elements of `dtype`.
pub fn allocate(shape: &Shape, dtype: DType) -> IoTensorResult<BytesMut> {
    let byte_len = shape.byte_len(dtype)?;
    Ok(BytesMut::zeroed(byte_len))
}

/// Zeroed storage for backends that report tensor sizes in bytes.
pub fn allocate_bytes(byte_len: usize) -> IoTensorResult<BytesMut> {
    if byte_len == 0 {
        return Err(IoTensorError::ZeroByteCount);
    }
    Ok(BytesMut::zeroed(byte_len))
}

pub fn allocate_tensor(desc: &TensorDescriptor) -> IoTensorResult<TensorBuffer> {
    let data = allocate(&desc.shape, desc.dtype)?;
    TensorBuffer::new(desc.clone(), data)
}
