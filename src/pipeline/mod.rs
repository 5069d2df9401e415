//! The ray tracing pipeline and its shader binding table.
//!
//! A pipeline is described with [`RayTracingPipelineBuilder`](crate::RayTracingPipelineBuilder) and created with
//! [`RayTracingPipeline::new()`](crate::RayTracingPipeline::new). While creating it, a [`ShaderGroupTable`](crate::ShaderGroupTable)
//! is built that records which group plays which role. [`ShaderBindingTable::new()`](crate::ShaderBindingTable::new) uses that
//! table to place each role's handle in its own buffer.

pub mod pipeline_layout;
pub mod raytracing;
pub mod sbt;
pub mod set_layout;
pub mod shader;
