//! Wrapper structs around `VkPipelineLayout` objects.

use anyhow::Result;
use ash::vk;

use crate::pipeline::set_layout::{DescriptorSetLayout, DescriptorSetLayoutCreateInfo};
use crate::Device;

/// A Vulkan pipeline layout, together with the set layouts it was created from.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PipelineLayout {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::PipelineLayout,
    set_layouts: Vec<DescriptorSetLayout>,
}

/// Define a pipeline layout. Push constants are not used by firstlight.
#[derive(Debug, Clone, Default)]
pub struct PipelineLayoutCreateInfo {
    /// Pipeline layout flags
    pub flags: vk::PipelineLayoutCreateFlags,
    /// Descriptor set layouts for this pipeline layout, in set order.
    pub set_layouts: Vec<DescriptorSetLayoutCreateInfo>,
}

impl PipelineLayout {
    /// Create the set layouts and the pipeline layout over them.
    pub fn new(device: Device, info: &PipelineLayoutCreateInfo) -> Result<Self> {
        let set_layouts = info
            .set_layouts
            .iter()
            .map(|set| DescriptorSetLayout::new(device.clone(), set))
            .collect::<Result<Vec<_>>>()?;
        let handles = set_layouts
            .iter()
            .map(|set| unsafe { set.handle() })
            .collect::<Vec<_>>();

        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .flags(info.flags)
            .set_layouts(handles.as_slice());
        let handle = unsafe { device.create_pipeline_layout(&create_info, None)? };

        #[cfg(feature = "log-objects")]
        trace!("Created new VkPipelineLayout {handle:p}");

        Ok(Self {
            device,
            handle,
            set_layouts,
        })
    }

    /// Get unsafe access to the internal `VkPipelineLayout`.
    /// # Safety
    /// Any vulkan calls that mutate this pipeline layout may put the system in an undefined state.
    pub unsafe fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Get the descriptor set layouts of this pipeline layout.
    pub fn set_layouts(&self) -> &[DescriptorSetLayout] {
        self.set_layouts.as_slice()
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkPipelineLayout {:p}", self.handle);
        unsafe {
            self.device.destroy_pipeline_layout(self.handle, None);
        }
    }
}
