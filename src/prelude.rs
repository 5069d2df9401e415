pub use ash::vk;

pub use crate::core::app_info::*;
pub use crate::core::debug::DebugMessenger;
pub use crate::core::device::{Device, ExtensionID};
pub use crate::core::error::Error;
pub use crate::core::init::{initialize, initialize_with_allocator, Context};
pub use crate::core::instance::Instance;
pub use crate::core::physical_device::PhysicalDevice;

pub use crate::allocator::dedicated_allocator::{DedicatedAllocation, DedicatedAllocator};
pub use crate::allocator::default_allocator;
pub use crate::allocator::default_allocator::{DefaultAllocation, DefaultAllocator};
pub use crate::allocator::memory_type::{find_memory_type_index, MemoryType};
pub use crate::allocator::traits::*;

pub use crate::command_buffer::CommandBuffer;

pub use crate::sync::execution_manager::ExecutionManager;
pub use crate::sync::fence::Fence;

pub use crate::resource::buffer::{Buffer, BufferView};
pub use crate::resource::raytracing::*;

pub use crate::pipeline::pipeline_layout::{PipelineLayout, PipelineLayoutCreateInfo};
pub use crate::pipeline::raytracing::*;
pub use crate::pipeline::sbt::*;
pub use crate::pipeline::set_layout::{DescriptorSetLayout, DescriptorSetLayoutCreateInfo};
pub use crate::pipeline::shader::{Shader, ShaderCreateInfo};

pub use crate::scene::Scene;

pub use crate::util::address::{DeviceAddressConst, DeviceAddressMut};
pub use crate::util::transform::TransformMatrix;
