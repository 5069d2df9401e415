//! GPU resource setup for a minimal Vulkan ray tracer
//!
//! firstlight creates the buffers, bottom and top level acceleration structures and the shader
//! binding table a hardware ray tracer needs before its first `vkCmdTraceRaysKHR`. Everything is
//! built once, synchronously, and owned by plain Rust values that destroy their Vulkan objects on drop.
//!
//! To get started, import the prelude
//! ```
//! use firstlight::prelude::*;
//! ```
//!
//! # Example
//!
//! First, define an [`AppSettings`](crate::AppSettings) structure that describes the application and
//! the GPU it needs. firstlight uses this to pick a GPU with ray tracing support.
//! ```
//! use firstlight::prelude::*;
//!
//! let settings = AppBuilder::new()
//!     .version((1, 0, 0))
//!     .name("firstlight demo")
//!     .validation(true)
//!     .raytracing(true)
//!     .build();
//! ```
//! Then initialize the context and build the scene.
//! ```no_run
//! # use firstlight::prelude::*;
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! # let settings = AppBuilder::new().raytracing(true).build();
//! let (instance, physical_device, device, mut alloc, exec, debug_messenger) = firstlight::initialize(&settings)?;
//! let scene = Scene::build(device.clone(), &exec, &mut alloc, None)?;
//! println!("TLAS at {:#x}", scene.tlas().address());
//! device.wait_idle()?;
//! # Ok(())
//! # }
//! ```
//! For further example code, check out the following modules
//! - [`resource::raytracing`] for the acceleration structure build protocol.
//! - [`pipeline`] for the ray tracing pipeline and shader binding table.
//! - [`sync`] for submitting one-time commands.
//! - [`allocator`] for device memory allocation.
//! - [`resource::buffer`] for managing [`VkBuffer`](vk::Buffer) objects.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod command_buffer;
pub mod core;
pub mod pipeline;
pub mod resource;
pub mod scene;
pub mod sync;
pub mod util;
