//! Wrappers around Vulkan ray tracing pipelines and their shader groups.

use std::ffi::CString;

use anyhow::Result;
use ash::vk;

use crate::core::device::ExtensionID;
use crate::pipeline::pipeline_layout::{PipelineLayout, PipelineLayoutCreateInfo};
use crate::pipeline::set_layout::DescriptorSetLayoutCreateInfo;
use crate::pipeline::shader::{Shader, ShaderCreateInfo};
use crate::{Device, Error};

/// An index of a shader in a shader group into the shaders array.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ShaderIndex {
    /// The index into the array
    pub index: u32,
}

/// A shader group for raytracing pipelines
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub enum ShaderGroup {
    /// Specifies a ray generation shader, with a single shader object
    RayGeneration {
        /// The ray generation shader to use
        shader: ShaderIndex,
    },
    /// Specifies a ray miss shader, with a single shader object
    RayMiss {
        /// The ray miss shader to be called when a ray misses
        shader: ShaderIndex,
    },
    /// Specifies a triangles hit group with only a closest hit shader
    RayHit {
        /// The closest hit shader
        closest_hit: ShaderIndex,
    },
}

/// The part a shader group plays in the shader binding table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ShaderGroupRole {
    /// Ray generation
    RayGen,
    /// Miss
    Miss,
    /// Hit
    Hit,
}

impl ShaderGroupRole {
    /// All roles, in the order their tables are usually laid out.
    pub const ALL: [ShaderGroupRole; 3] = [ShaderGroupRole::RayGen, ShaderGroupRole::Miss, ShaderGroupRole::Hit];
}

impl ShaderGroup {
    /// The SBT role of this group.
    pub fn role(&self) -> ShaderGroupRole {
        match self {
            ShaderGroup::RayGeneration {
                ..
            } => ShaderGroupRole::RayGen,
            ShaderGroup::RayMiss {
                ..
            } => ShaderGroupRole::Miss,
            ShaderGroup::RayHit {
                ..
            } => ShaderGroupRole::Hit,
        }
    }

    /// The Vulkan group description. Slots a group does not use are set to `VK_SHADER_UNUSED_KHR`.
    pub fn to_vk(&self) -> vk::RayTracingShaderGroupCreateInfoKHR {
        let (ty, general, closest_hit) = match self {
            ShaderGroup::RayGeneration {
                shader,
            }
            | ShaderGroup::RayMiss {
                shader,
            } => (vk::RayTracingShaderGroupTypeKHR::GENERAL, shader.index, vk::SHADER_UNUSED_KHR),
            ShaderGroup::RayHit {
                closest_hit,
            } => (vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP, vk::SHADER_UNUSED_KHR, closest_hit.index),
        };
        vk::RayTracingShaderGroupCreateInfoKHR::builder()
            .ty(ty)
            .general_shader(general)
            .closest_hit_shader(closest_hit)
            .any_hit_shader(vk::SHADER_UNUSED_KHR)
            .intersection_shader(vk::SHADER_UNUSED_KHR)
            .build()
    }
}

/// Maps each SBT role to the index of its group in the pipeline.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ShaderGroupTable {
    raygen: u32,
    miss: u32,
    hit: u32,
}

impl ShaderGroupTable {
    /// Build the table from the pipeline's groups, in pipeline order.
    /// # Errors
    /// Fails with [`Error::ShaderGroupTableMismatch`] unless there is exactly one group per role.
    pub fn new(groups: &[ShaderGroup]) -> Result<Self> {
        let find = |role: ShaderGroupRole| -> Result<u32> {
            let mut indices = groups
                .iter()
                .enumerate()
                .filter(|(_, group)| group.role() == role)
                .map(|(index, _)| index as u32);
            match (indices.next(), indices.next()) {
                (Some(index), None) => Ok(index),
                (None, _) => Err(Error::ShaderGroupTableMismatch(format!("no {role:?} group")).into()),
                (Some(_), Some(_)) => Err(Error::ShaderGroupTableMismatch(format!("more than one {role:?} group")).into()),
            }
        };
        Ok(Self {
            raygen: find(ShaderGroupRole::RayGen)?,
            miss: find(ShaderGroupRole::Miss)?,
            hit: find(ShaderGroupRole::Hit)?,
        })
    }

    /// Group index of a role
    pub fn index(&self, role: ShaderGroupRole) -> u32 {
        match role {
            ShaderGroupRole::RayGen => self.raygen,
            ShaderGroupRole::Miss => self.miss,
            ShaderGroupRole::Hit => self.hit,
        }
    }
}

/// Ray tracing pipeline create info. Prefer using the builder to construct this correctly
#[derive(Debug, Clone)]
pub struct RayTracingPipelineCreateInfo {
    pub(crate) name: String,
    pub(crate) layout: PipelineLayoutCreateInfo,
    pub(crate) max_recursion_depth: u32,
    pub(crate) shader_groups: Vec<ShaderGroup>,
    /// All shaders used, indexed by the [`ShaderIndex`] values in the groups.
    pub shaders: Vec<ShaderCreateInfo>,
}

impl RayTracingPipelineCreateInfo {
    /// The shader groups, in pipeline order.
    pub fn shader_groups(&self) -> &[ShaderGroup] {
        self.shader_groups.as_slice()
    }
}

/// Ray tracing pipeline builder to easily create raytracing pipelines.
///
/// # Example
/// ```no_run
/// # use firstlight::prelude::*;
/// # use anyhow::Result;
/// # fn build(device: Device) -> Result<()> {
/// let info = RayTracingPipelineBuilder::new("triangle")
///     .add_ray_gen_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::RAYGEN_KHR, "shaders/spv/raygen.rgen.spv")?)
///     .add_ray_miss_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::MISS_KHR, "shaders/spv/miss.rmiss.spv")?)
///     .add_ray_hit_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::CLOSEST_HIT_KHR, "shaders/spv/closesthit.rchit.spv")?)
///     .build();
/// let pipeline = RayTracingPipeline::new(device, &info)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RayTracingPipelineBuilder {
    inner: RayTracingPipelineCreateInfo,
}

impl RayTracingPipelineBuilder {
    /// Create a new raytracing pipeline with the given name. The layout defaults to a single set
    /// with the acceleration structure and the output image, and the recursion depth to 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: RayTracingPipelineCreateInfo {
                name: name.into(),
                layout: PipelineLayoutCreateInfo {
                    flags: Default::default(),
                    set_layouts: vec![DescriptorSetLayoutCreateInfo::raytracing_output()],
                },
                max_recursion_depth: 1,
                shader_groups: vec![],
                shaders: vec![],
            },
        }
    }

    /// Add a shader to the pipeline
    fn add_shader(&mut self, shader: ShaderCreateInfo) -> ShaderIndex {
        if let Some((idx, _)) = self
            .inner
            .shaders
            .iter()
            .enumerate()
            .find(|(_, sh)| sh.code_hash() == shader.code_hash() && sh.stage() == shader.stage())
        {
            ShaderIndex {
                index: idx as u32,
            }
        } else {
            self.inner.shaders.push(shader);
            ShaderIndex {
                index: (self.inner.shaders.len() - 1) as u32,
            }
        }
    }

    /// Add a shader group
    pub fn add_shader_group(mut self, group: ShaderGroup) -> Self {
        self.inner.shader_groups.push(group);
        self
    }

    /// Add a ray generation shader group
    pub fn add_ray_gen_group(mut self, shader: ShaderCreateInfo) -> Self {
        let shader = self.add_shader(shader);
        self.inner.shader_groups.push(ShaderGroup::RayGeneration {
            shader,
        });
        self
    }

    /// Add a ray miss shader group
    pub fn add_ray_miss_group(mut self, shader: ShaderCreateInfo) -> Self {
        let shader = self.add_shader(shader);
        self.inner.shader_groups.push(ShaderGroup::RayMiss {
            shader,
        });
        self
    }

    /// Add a triangles hit group with a closest hit shader
    pub fn add_ray_hit_group(mut self, closest_hit: ShaderCreateInfo) -> Self {
        let closest_hit = self.add_shader(closest_hit);
        self.inner.shader_groups.push(ShaderGroup::RayHit {
            closest_hit,
        });
        self
    }

    /// Set the max recursion depth for this pipeline
    pub fn max_recursion_depth(mut self, depth: u32) -> Self {
        self.inner.max_recursion_depth = depth;
        self
    }

    /// Replace the pipeline layout
    pub fn layout(mut self, layout: PipelineLayoutCreateInfo) -> Self {
        self.inner.layout = layout;
        self
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Build the pipeline create info. Groups keep the order they were added in.
    pub fn build(self) -> RayTracingPipelineCreateInfo {
        self.inner
    }
}

/// A created ray tracing pipeline, owning its layout.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RayTracingPipeline {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::Pipeline,
    layout: PipelineLayout,
    name: String,
    group_count: u32,
    group_table: ShaderGroupTable,
}

impl RayTracingPipeline {
    /// Create the shader modules, the layout and the pipeline. The shader modules are destroyed again
    /// once the pipeline exists.
    /// # Errors
    /// * Fails with [`Error::ShaderGroupTableMismatch`] if the groups do not have exactly one group per role.
    /// * Fails with [`Error::PipelineCreation`] if `vkCreateRayTracingPipelinesKHR` fails.
    pub fn new(device: Device, info: &RayTracingPipelineCreateInfo) -> Result<Self> {
        device.require_extension(ExtensionID::RayTracingPipeline)?;
        let group_table = ShaderGroupTable::new(&info.shader_groups)?;
        let layout = PipelineLayout::new(device.clone(), &info.layout)?;

        let shaders = info
            .shaders
            .iter()
            .map(|shader| Shader::new(device.clone(), shader))
            .collect::<Result<Vec<_>>>()?;
        let entry = CString::new("main")?;
        let stages = info
            .shaders
            .iter()
            .zip(shaders.iter())
            .map(|(info, shader)| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(info.stage())
                    .module(unsafe { shader.handle() })
                    .name(&entry)
                    .build()
            })
            .collect::<Vec<_>>();
        let groups = info.shader_groups.iter().map(ShaderGroup::to_vk).collect::<Vec<_>>();

        let create_info = vk::RayTracingPipelineCreateInfoKHR::builder()
            .stages(stages.as_slice())
            .groups(groups.as_slice())
            .max_pipeline_ray_recursion_depth(info.max_recursion_depth)
            .layout(unsafe { layout.handle() });
        let fns = device.raytracing_pipeline()?;
        let pipelines = unsafe {
            fns.create_ray_tracing_pipelines(
                vk::DeferredOperationKHR::null(),
                vk::PipelineCache::null(),
                std::slice::from_ref(&create_info),
                None,
            )
        }
        .map_err(Error::PipelineCreation)?;
        let handle = pipelines
            .into_iter()
            .next()
            .ok_or(Error::PipelineCreation(vk::Result::ERROR_UNKNOWN))?;

        #[cfg(feature = "log-objects")]
        trace!("Created new VkPipeline {handle:p}");
        info!(
            "Created ray tracing pipeline {} with {} shader(s) and {} group(s)",
            info.name,
            info.shaders.len(),
            groups.len()
        );

        Ok(Self {
            device,
            handle,
            layout,
            name: info.name.clone(),
            group_count: groups.len() as u32,
            group_table,
        })
    }

    /// Get unsafe access to the underlying `VkPipeline`.
    /// # Safety
    /// The caller must not destroy this handle.
    pub unsafe fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    /// The pipeline layout
    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    /// The pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of shader groups in this pipeline
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// The role to group index table
    pub fn group_table(&self) -> &ShaderGroupTable {
        &self.group_table
    }
}

impl Drop for RayTracingPipeline {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkPipeline {:p}", self.handle);
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader(stage: vk::ShaderStageFlags, word: u32) -> ShaderCreateInfo {
        ShaderCreateInfo::from_spirv(stage, vec![0x0723_0203, word])
    }

    #[test]
    fn general_group_leaves_other_slots_unused() {
        let group = ShaderGroup::RayMiss {
            shader: ShaderIndex {
                index: 1,
            },
        }
        .to_vk();
        assert_eq!(group.ty, vk::RayTracingShaderGroupTypeKHR::GENERAL);
        assert_eq!(group.general_shader, 1);
        assert_eq!(group.closest_hit_shader, vk::SHADER_UNUSED_KHR);
        assert_eq!(group.any_hit_shader, vk::SHADER_UNUSED_KHR);
        assert_eq!(group.intersection_shader, vk::SHADER_UNUSED_KHR);
    }

    #[test]
    fn hit_group_only_sets_closest_hit() {
        let group = ShaderGroup::RayHit {
            closest_hit: ShaderIndex {
                index: 2,
            },
        }
        .to_vk();
        assert_eq!(group.ty, vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP);
        assert_eq!(group.general_shader, vk::SHADER_UNUSED_KHR);
        assert_eq!(group.closest_hit_shader, 2);
        assert_eq!(group.any_hit_shader, vk::SHADER_UNUSED_KHR);
        assert_eq!(group.intersection_shader, vk::SHADER_UNUSED_KHR);
    }

    #[test]
    fn table_follows_group_order() {
        let info = RayTracingPipelineBuilder::new("test")
            .add_ray_hit_group(shader(vk::ShaderStageFlags::CLOSEST_HIT_KHR, 3))
            .add_ray_gen_group(shader(vk::ShaderStageFlags::RAYGEN_KHR, 1))
            .add_ray_miss_group(shader(vk::ShaderStageFlags::MISS_KHR, 2))
            .build();
        let table = ShaderGroupTable::new(info.shader_groups()).unwrap();
        assert_eq!(table.index(ShaderGroupRole::Hit), 0);
        assert_eq!(table.index(ShaderGroupRole::RayGen), 1);
        assert_eq!(table.index(ShaderGroupRole::Miss), 2);
    }

    #[test]
    fn table_requires_one_group_per_role() {
        let info = RayTracingPipelineBuilder::new("test")
            .add_ray_gen_group(shader(vk::ShaderStageFlags::RAYGEN_KHR, 1))
            .add_ray_miss_group(shader(vk::ShaderStageFlags::MISS_KHR, 2))
            .build();
        let err = ShaderGroupTable::new(info.shader_groups()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ShaderGroupTableMismatch(_))));

        let info = RayTracingPipelineBuilder::new("test")
            .add_ray_gen_group(shader(vk::ShaderStageFlags::RAYGEN_KHR, 1))
            .add_ray_miss_group(shader(vk::ShaderStageFlags::MISS_KHR, 2))
            .add_ray_miss_group(shader(vk::ShaderStageFlags::MISS_KHR, 4))
            .add_ray_hit_group(shader(vk::ShaderStageFlags::CLOSEST_HIT_KHR, 3))
            .build();
        let err = ShaderGroupTable::new(info.shader_groups()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ShaderGroupTableMismatch(_))));
    }

    #[test]
    fn builder_deduplicates_shaders() {
        let info = RayTracingPipelineBuilder::new("test")
            .add_ray_gen_group(shader(vk::ShaderStageFlags::RAYGEN_KHR, 1))
            .add_ray_miss_group(shader(vk::ShaderStageFlags::MISS_KHR, 2))
            .add_ray_miss_group(shader(vk::ShaderStageFlags::MISS_KHR, 2))
            .build();
        assert_eq!(info.shaders.len(), 2);
        assert_eq!(info.shader_groups().len(), 3);
        assert_eq!(info.shader_groups()[1], info.shader_groups()[2]);
    }

    #[test]
    fn builder_defaults() {
        let info = RayTracingPipelineBuilder::new("test").build();
        assert_eq!(info.max_recursion_depth, 1);
        assert_eq!(info.layout.set_layouts.len(), 1);
        assert_eq!(info.layout.set_layouts[0].bindings.len(), 2);
    }
}
