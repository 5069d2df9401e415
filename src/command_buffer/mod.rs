//! Command buffers are a thin wrapper over Vulkan commands.
//!
//! firstlight only records one-time command buffers, so the only way to obtain one is through
//! [`ExecutionManager::execute_once()`](crate::ExecutionManager::execute_once). The command buffer
//! is begun before it is handed to the callback and ended, submitted and freed after it returns.

use anyhow::Result;
use ash::vk;

use crate::core::device::ExtensionID;
use crate::{AccelerationStructureBuildInfo, Device};

pub(crate) mod command_pool;

/// A command buffer in the recording state.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CommandBuffer {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::CommandBuffer,
}

impl CommandBuffer {
    pub(crate) fn new(device: Device, handle: vk::CommandBuffer) -> Self {
        Self {
            device,
            handle,
        }
    }

    pub(crate) fn begin(&self, flags: vk::CommandBufferUsageFlags) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device.begin_command_buffer(self.handle, &info)? };
        Ok(())
    }

    pub(crate) fn end(&self) -> Result<()> {
        unsafe { self.device.end_command_buffer(self.handle)? };
        Ok(())
    }

    /// Record `vkCmdBuildAccelerationStructuresKHR` for a single build.
    /// The build info must have exactly one range per geometry.
    pub fn build_acceleration_structure(&mut self, info: &AccelerationStructureBuildInfo) -> Result<&mut Self> {
        self.device.require_extension(ExtensionID::AccelerationStructure)?;
        let fns = self.device.acceleration_structure()?;
        let (geometry, ranges) = info.as_vulkan();
        unsafe {
            fns.cmd_build_acceleration_structures(self.handle, std::slice::from_ref(&geometry), &[ranges]);
        }
        Ok(self)
    }

    /// Get unsafe access to the underlying `VkCommandBuffer`.
    /// # Safety
    /// The handle is only valid for the duration of the recording callback.
    pub unsafe fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }
}
