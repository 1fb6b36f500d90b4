//! Tensor I/O: turns input lists into per-slot file queues, fills graph input
//! buffers from raw files or memory, and writes output buffers back to disk.

pub mod alloc;
pub mod convert;
pub mod manifest;
pub mod populate;
pub mod serialize;
pub mod setup;

pub use alloc::*;
pub use convert::*;
pub use manifest::*;
pub use populate::*;
pub use serialize::*;
pub use setup::*;
