//! Exposes the GPU resources firstlight creates: buffers and ray tracing acceleration structures.

pub mod buffer;
pub mod raytracing;
