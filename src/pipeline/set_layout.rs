use anyhow::Result;
use ash::vk;

use crate::Device;

/// Owned Vulkan descriptor set layout.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorSetLayout {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::DescriptorSetLayout,
}

/// Describes a descriptor set layout.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutCreateInfo {
    /// Bindings in this set
    pub bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutCreateInfo {
    /// The set used by the ray generation shader: the top level acceleration structure at
    /// binding 0 and the output storage image at binding 1.
    pub fn raytracing_output() -> Self {
        let binding = |binding, ty| vk::DescriptorSetLayoutBinding {
            binding,
            descriptor_type: ty,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::RAYGEN_KHR,
            p_immutable_samplers: std::ptr::null(),
        };
        Self {
            bindings: vec![
                binding(0, vk::DescriptorType::ACCELERATION_STRUCTURE_KHR),
                binding(1, vk::DescriptorType::STORAGE_IMAGE),
            ],
        }
    }
}

impl DescriptorSetLayout {
    /// Create a new descriptor set layout
    pub fn new(device: Device, info: &DescriptorSetLayoutCreateInfo) -> Result<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(info.bindings.as_slice());
        let handle = unsafe { device.create_descriptor_set_layout(&create_info, None)? };

        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorSetLayout {handle:p}");

        Ok(Self {
            device,
            handle,
        })
    }

    /// Get unsafe access to the underlying `VkDescriptorSetLayout`.
    /// # Safety
    /// The caller must not destroy this handle.
    pub unsafe fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorSetLayout {:p}", self.handle);
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}
