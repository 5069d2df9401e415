//! The static scene traced by the demo: one triangle in a bottom level acceleration structure,
//! referenced by one instance in the top level structure.

use anyhow::Result;
use ash::vk;

use crate::util::transform::TransformMatrix;
use crate::{
    AccelerationStructure, AccelerationStructureGeometryTrianglesData, AccelerationStructureInstance, AccelerationStructureType, Allocator,
    Buffer, DedicatedAllocator, Device, ExecutionManager, HandleLayout, InstanceBuffer, MemoryType, RayTracingPipeline, ShaderBindingTable,
};

/// Positions of the triangle, three `vec3`s.
pub const TRIANGLE_VERTICES: [[f32; 3]; 3] = [[1.0, 1.0, 0.0], [-1.0, 1.0, 0.0], [0.0, -1.0, 0.0]];
/// Indices of the triangle.
pub const TRIANGLE_INDICES: [u32; 3] = [0, 1, 2];

const BUILD_INPUT_USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::from_raw(
    vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR.as_raw() | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS.as_raw(),
);

/// Opaque triangle geometry over the given vertex and index buffers.
pub fn triangle_geometry(vertices: vk::DeviceAddress, indices: vk::DeviceAddress) -> AccelerationStructureGeometryTrianglesData {
    AccelerationStructureGeometryTrianglesData::indexed(
        vk::Format::R32G32B32_SFLOAT,
        vertices,
        std::mem::size_of::<[f32; 3]>() as vk::DeviceSize,
        TRIANGLE_VERTICES.len() as u32,
        indices,
    )
    .flags(vk::GeometryFlagsKHR::OPAQUE)
}

/// The single instance of the scene, referencing the bottom level structure at `blas`.
pub fn triangle_instance(blas: vk::DeviceAddress) -> Result<AccelerationStructureInstance> {
    AccelerationStructureInstance::default()
        .transform(TransformMatrix::identity())
        .custom_index(0)?
        .mask(0xFF)
        .sbt_record_offset(0)?
        .flags(vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE)
        .reference(blas)
}

/// The built scene. Build inputs are released as soon as the structure using them is built.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Scene<A: Allocator = DedicatedAllocator> {
    // The top level structure references the bottom level one, so it goes first.
    tlas: AccelerationStructure<A>,
    blas: AccelerationStructure<A>,
    sbt: Option<ShaderBindingTable<A>>,
}

impl<A: Allocator> Scene<A> {
    /// Build the bottom level structure, then the top level structure over it, and assemble the
    /// shader binding table if a pipeline is given.
    pub fn build(device: Device, exec: &ExecutionManager, allocator: &mut A, pipeline: Option<&RayTracingPipeline>) -> Result<Self> {
        let blas = Self::build_blas(device.clone(), exec, allocator)?;
        let tlas = Self::build_tlas(device.clone(), exec, allocator, &blas)?;
        let sbt = match pipeline {
            Some(pipeline) => {
                let layout = HandleLayout::from_device(&device)?;
                Some(ShaderBindingTable::new(device, allocator, pipeline, layout)?)
            }
            None => None,
        };
        Ok(Self {
            tlas,
            blas,
            sbt,
        })
    }

    fn build_blas(device: Device, exec: &ExecutionManager, allocator: &mut A) -> Result<AccelerationStructure<A>> {
        let vertices = Buffer::from_slice(device.clone(), allocator, BUILD_INPUT_USAGE, MemoryType::CpuToGpu, &TRIANGLE_VERTICES)?;
        let indices = Buffer::from_slice(device.clone(), allocator, BUILD_INPUT_USAGE, MemoryType::CpuToGpu, &TRIANGLE_INDICES)?;
        let geometry = triangle_geometry(vertices.address(), indices.address());
        let blas = AccelerationStructure::build(device, exec, allocator, AccelerationStructureType::BottomLevel, geometry.into(), 1)?;
        info!("Bottom level acceleration structure ready at {:#x}", blas.address());
        Ok(blas)
    }

    fn build_tlas(
        device: Device,
        exec: &ExecutionManager,
        allocator: &mut A,
        blas: &AccelerationStructure<A>,
    ) -> Result<AccelerationStructure<A>> {
        let instance = triangle_instance(blas.address())?;
        let instances = InstanceBuffer::new(device.clone(), allocator, std::slice::from_ref(&instance))?;
        let geometry = instances.geometry(vk::GeometryFlagsKHR::OPAQUE);
        let tlas = AccelerationStructure::build(
            device,
            exec,
            allocator,
            AccelerationStructureType::TopLevel,
            geometry.into(),
            instances.count(),
        )?;
        info!("Top level acceleration structure ready at {:#x}", tlas.address());
        Ok(tlas)
    }

    /// The bottom level structure holding the triangle
    pub fn blas(&self) -> &AccelerationStructure<A> {
        &self.blas
    }

    /// The top level structure holding the instance
    pub fn tlas(&self) -> &AccelerationStructure<A> {
        &self.tlas
    }

    /// The shader binding table, if a pipeline was given
    pub fn sbt(&self) -> Option<&ShaderBindingTable<A>> {
        self.sbt.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::to_vk::IntoVulkanType;

    #[test]
    fn triangle_geometry_layout() {
        let geometry = triangle_geometry(0x1000, 0x2000);
        assert_eq!(geometry.format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(geometry.stride, 12);
        assert_eq!(geometry.max_vertex, 2);
        assert_eq!(geometry.index_type, vk::IndexType::UINT32);
        assert_eq!(geometry.vertex_data.get(), 0x1000);
        assert_eq!(geometry.index_data.get(), 0x2000);
        assert_eq!(geometry.transform_data.get(), 0);
        assert_eq!(geometry.flags, vk::GeometryFlagsKHR::OPAQUE);
    }

    #[test]
    fn instance_references_blas_with_full_mask() {
        let instance = triangle_instance(0xABC0).unwrap();
        let raw = instance.raw();
        assert_eq!(instance.referenced_address(), 0xABC0);
        assert_eq!(raw.instance_custom_index_and_mask.low_24(), 0);
        assert_eq!(raw.instance_custom_index_and_mask.high_8(), 0xFF);
        assert_eq!(raw.instance_shader_binding_table_record_offset_and_flags.low_24(), 0);
        assert_eq!(
            raw.instance_shader_binding_table_record_offset_and_flags.high_8() as u32,
            vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw()
        );
        assert_eq!(raw.transform.matrix, TransformMatrix::identity().into_vulkan().matrix);
    }

    #[test]
    fn instance_without_blas_fails() {
        assert!(triangle_instance(0).is_err());
    }

    #[test]
    fn vertex_data_is_tightly_packed() {
        assert_eq!(std::mem::size_of_val(&TRIANGLE_VERTICES), 36);
        assert_eq!(std::mem::size_of_val(&TRIANGLE_INDICES), 12);
    }
}
