//! Exposes all relevant abstractions for raytracing resources.
//!
//! Acceleration structures are built in four steps, tracked by [`AccelerationStructureBuilder`]:
//! query the build sizes, allocate the storage and scratch buffers, record the build, and
//! query the device address of the result. [`AccelerationStructure::build()`] runs all of them.

pub use acceleration_structure::*;
pub use as_type::*;
pub use build_info::*;
pub use build_size::*;
pub use builder::*;
pub use geometry::*;

pub mod acceleration_structure;
pub mod as_type;
pub mod build_info;
pub mod build_size;
pub mod builder;
pub mod geometry;
