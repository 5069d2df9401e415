//! SPIR-V shader modules for the ray tracing pipeline

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::path::Path;

use anyhow::{Context, Result};
use ash::vk;

use crate::Device;

/// Owned `VkShaderModule`. These only need to live until the pipeline using them is created.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Shader {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::ShaderModule,
}

impl Shader {
    /// Create a shader module from the SPIR-V code in a create info.
    pub fn new(device: Device, info: &ShaderCreateInfo) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: Default::default(),
            code_size: info.code.len() * 4, // code_size is in bytes, but each element of `code` is 4 bytes.
            p_code: info.code.as_ptr(),
        };
        let handle = unsafe { device.create_shader_module(&create_info, None)? };

        #[cfg(feature = "log-objects")]
        trace!("Created new VkShaderModule {handle:p}");

        Ok(Self {
            device,
            handle,
        })
    }

    /// Get unsafe access to the underlying `VkShaderModule` object.
    /// # Safety
    /// Any vulkan calls that mutate the shader module may put the system in an undefined state.
    pub unsafe fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkShaderModule {:p}", self.handle);
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}

/// SPIR-V code and the stage it runs in. Use [`ShaderCreateInfo::from_spirv`] or
/// [`ShaderCreateInfo::from_file`] to construct this.
#[derive(Debug, Clone)]
pub struct ShaderCreateInfo {
    stage: vk::ShaderStageFlags,
    code: Vec<u32>,
    code_hash: u64,
}

impl ShaderCreateInfo {
    /// Wrap a SPIR-V binary.
    pub fn from_spirv(stage: vk::ShaderStageFlags, code: Vec<u32>) -> Self {
        let mut hasher = DefaultHasher::new();
        code.hash(&mut hasher);
        Self {
            stage,
            code,
            code_hash: hasher.finish(),
        }
    }

    /// Load a compiled `.spv` file.
    pub fn from_file(stage: vk::ShaderStageFlags, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("opening shader {}", path.display()))?;
        let code = ash::util::read_spv(&mut file).with_context(|| format!("reading SPIR-V from {}", path.display()))?;
        Ok(Self::from_spirv(stage, code))
    }

    /// The shader stage
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// The SPIR-V words
    pub fn code(&self) -> &[u32] {
        self.code.as_slice()
    }

    /// Hash of the code, used to deduplicate shaders within one pipeline.
    pub fn code_hash(&self) -> u64 {
        self.code_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_code_hashes_equal() {
        let a = ShaderCreateInfo::from_spirv(vk::ShaderStageFlags::RAYGEN_KHR, vec![0x0723_0203, 1, 2]);
        let b = ShaderCreateInfo::from_spirv(vk::ShaderStageFlags::MISS_KHR, vec![0x0723_0203, 1, 2]);
        let c = ShaderCreateInfo::from_spirv(vk::ShaderStageFlags::MISS_KHR, vec![0x0723_0203, 1, 3]);
        assert_eq!(a.code_hash(), b.code_hash());
        assert_ne!(a.code_hash(), c.code_hash());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ShaderCreateInfo::from_file(vk::ShaderStageFlags::RAYGEN_KHR, "does/not/exist.spv").is_err());
    }
}
