use ash::vk;

use crate::util::address::DeviceAddressMut;
use crate::util::to_vk::AsVulkanType;
use crate::{AccelerationStructureBuildGeometryInfo, AccelerationStructureGeometry, AccelerationStructureType, RawAccelerationStructure};

/// Describes a single acceleration structure build: the geometry, destination, scratch memory and
/// the primitive ranges. Used both to query build sizes and to record the build command.
pub struct AccelerationStructureBuildInfo {
    pub(crate) geometry: AccelerationStructureBuildGeometryInfo,
    pub(crate) build_range_infos: Vec<vk::AccelerationStructureBuildRangeInfoKHR>,
}

impl Default for AccelerationStructureBuildInfo {
    fn default() -> Self {
        Self {
            geometry: AccelerationStructureBuildGeometryInfo {
                ty: AccelerationStructureType::BottomLevel,
                flags: Default::default(),
                mode: Default::default(),
                dst: vk::AccelerationStructureKHR::null(),
                geometries: vec![],
                scratch_data: DeviceAddressMut::null(),
            },
            build_range_infos: vec![],
        }
    }
}

impl AccelerationStructureBuildInfo {
    /// Start describing a full build. Updates are not supported.
    pub fn new_build() -> Self {
        let mut info = Self::default();
        info.geometry.mode = vk::BuildAccelerationStructureModeKHR::BUILD;
        info
    }

    /// Set the type of the structure being built
    pub fn set_type(mut self, ty: AccelerationStructureType) -> Self {
        self.geometry.ty = ty;
        self
    }

    /// Set the build flags
    pub fn flags(mut self, flags: vk::BuildAccelerationStructureFlagsKHR) -> Self {
        self.geometry.flags = flags;
        self
    }

    /// Set the destination structure
    pub fn dst(mut self, dst: &RawAccelerationStructure) -> Self {
        self.geometry.dst = unsafe { dst.handle() };
        self
    }

    /// Add a geometry to the build.
    pub fn push_geometry(mut self, geometry: &AccelerationStructureGeometry) -> Self {
        self.geometry.geometries.push(geometry.as_vulkan());
        self
    }

    /// Set the device address of the scratch memory
    pub fn scratch_data(mut self, data: impl Into<DeviceAddressMut>) -> Self {
        self.geometry.scratch_data = data.into();
        self
    }

    /// Add a build range. There must be one range per geometry.
    pub fn push_range(mut self, primitive_count: u32, primitive_offset: u32, first_vertex: u32, transform_offset: u32) -> Self {
        self.build_range_infos.push(vk::AccelerationStructureBuildRangeInfoKHR {
            primitive_count,
            primitive_offset,
            first_vertex,
            transform_offset,
        });
        self
    }

    /// The type of the structure being built
    pub fn ty(&self) -> AccelerationStructureType {
        self.geometry.ty
    }

    /// Number of geometries in this build
    pub fn geometry_count(&self) -> usize {
        self.geometry.geometries.len()
    }

    /// Primitive counts of each range, in order.
    pub fn primitive_counts(&self) -> Vec<u32> {
        self.build_range_infos.iter().map(|range| range.primitive_count).collect()
    }

    /// Get the Vulkan build info and ranges. The build info points into `self`.
    pub fn as_vulkan(&self) -> (vk::AccelerationStructureBuildGeometryInfoKHR, &[vk::AccelerationStructureBuildRangeInfoKHR]) {
        (self.geometry.as_vulkan(), self.build_range_infos.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccelerationStructureGeometryTrianglesData;

    #[test]
    fn single_range_covers_all_primitives() {
        let triangles = AccelerationStructureGeometryTrianglesData::default()
            .format(vk::Format::R32G32B32_SFLOAT)
            .vertex_data(0x1000u64)
            .stride(12u64)
            .max_vertex(2)
            .index_data(vk::IndexType::UINT32, 0x2000u64)
            .flags(vk::GeometryFlagsKHR::OPAQUE);
        let info = AccelerationStructureBuildInfo::new_build()
            .set_type(AccelerationStructureType::BottomLevel)
            .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
            .push_geometry(&triangles.into())
            .scratch_data(0x3000u64)
            .push_range(1, 0, 0, 0);

        let (geometry, ranges) = info.as_vulkan();
        assert_eq!(geometry.mode, vk::BuildAccelerationStructureModeKHR::BUILD);
        assert_eq!(geometry.ty, vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL);
        assert_eq!(geometry.geometry_count, 1);
        assert_eq!(unsafe { geometry.scratch_data.device_address }, 0x3000);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].primitive_count, 1);
        assert_eq!(ranges[0].primitive_offset, 0);
        assert_eq!(ranges[0].first_vertex, 0);
        assert_eq!(ranges[0].transform_offset, 0);

        let vk_geometry = unsafe { *geometry.p_geometries };
        assert_eq!(vk_geometry.geometry_type, vk::GeometryTypeKHR::TRIANGLES);
        assert_eq!(vk_geometry.flags, vk::GeometryFlagsKHR::OPAQUE);
        let vk_triangles = unsafe { vk_geometry.geometry.triangles };
        assert_eq!(vk_triangles.vertex_stride, 12);
        assert_eq!(vk_triangles.max_vertex, 2);
        assert_eq!(vk_triangles.index_type, vk::IndexType::UINT32);
        assert_eq!(unsafe { vk_triangles.vertex_data.device_address }, 0x1000);
        assert_eq!(unsafe { vk_triangles.transform_data.device_address }, 0);
    }
}
