//! Exposes different acceleration structure geometry types

use ash::vk;

pub use instances::*;
pub use triangles::*;

use crate::util::address::DeviceAddressMut;
use crate::util::to_vk::{AsVulkanType, IntoVulkanType};
use crate::AccelerationStructureType;

pub mod instances;
pub mod triangles;

/// The single geometry an acceleration structure is built over.
#[derive(Debug, Copy, Clone)]
pub enum AccelerationStructureGeometry {
    /// Triangle geometry, for bottom level structures
    Triangles(AccelerationStructureGeometryTrianglesData),
    /// Instance geometry, for top level structures
    Instances(AccelerationStructureGeometryInstancesData),
}

impl AccelerationStructureGeometry {
    /// The acceleration structure type this geometry can be built into.
    pub fn structure_type(&self) -> AccelerationStructureType {
        match self {
            AccelerationStructureGeometry::Triangles(_) => AccelerationStructureType::BottomLevel,
            AccelerationStructureGeometry::Instances(_) => AccelerationStructureType::TopLevel,
        }
    }

    /// Geometry flags, such as `OPAQUE`.
    pub fn flags(&self) -> vk::GeometryFlagsKHR {
        match self {
            AccelerationStructureGeometry::Triangles(triangles) => triangles.flags,
            AccelerationStructureGeometry::Instances(instances) => instances.flags,
        }
    }
}

impl From<AccelerationStructureGeometryTrianglesData> for AccelerationStructureGeometry {
    fn from(value: AccelerationStructureGeometryTrianglesData) -> Self {
        Self::Triangles(value)
    }
}

impl From<AccelerationStructureGeometryInstancesData> for AccelerationStructureGeometry {
    fn from(value: AccelerationStructureGeometryInstancesData) -> Self {
        Self::Instances(value)
    }
}

impl AsVulkanType for AccelerationStructureGeometry {
    type Output = vk::AccelerationStructureGeometryKHR;

    fn as_vulkan(&self) -> Self::Output {
        let (geometry_type, geometry) = match *self {
            AccelerationStructureGeometry::Triangles(triangles) => (
                vk::GeometryTypeKHR::TRIANGLES,
                vk::AccelerationStructureGeometryDataKHR {
                    triangles: triangles.into_vulkan(),
                },
            ),
            AccelerationStructureGeometry::Instances(instances) => (
                vk::GeometryTypeKHR::INSTANCES,
                vk::AccelerationStructureGeometryDataKHR {
                    instances: instances.into_vulkan(),
                },
            ),
        };
        vk::AccelerationStructureGeometryKHR {
            s_type: vk::StructureType::ACCELERATION_STRUCTURE_GEOMETRY_KHR,
            p_next: std::ptr::null(),
            geometry_type,
            geometry,
            flags: self.flags(),
        }
    }
}

/// All information required to build the geometry of an acceleration structure
pub struct AccelerationStructureBuildGeometryInfo {
    /// The acceleration structure type
    pub ty: AccelerationStructureType,
    /// Acceleration structure build flags
    pub flags: vk::BuildAccelerationStructureFlagsKHR,
    /// The acceleration structure build mode
    pub mode: vk::BuildAccelerationStructureModeKHR,
    /// Destination acceleration structure, null while only querying sizes
    pub dst: vk::AccelerationStructureKHR,
    /// Geometry data in this acceleration structure
    pub geometries: Vec<vk::AccelerationStructureGeometryKHR>,
    /// Scratch data used for building
    pub scratch_data: DeviceAddressMut,
}

impl AsVulkanType for AccelerationStructureBuildGeometryInfo {
    type Output = vk::AccelerationStructureBuildGeometryInfoKHR;

    /// The output points into `self.geometries`.
    fn as_vulkan(&self) -> Self::Output {
        vk::AccelerationStructureBuildGeometryInfoKHR {
            s_type: vk::StructureType::ACCELERATION_STRUCTURE_BUILD_GEOMETRY_INFO_KHR,
            p_next: std::ptr::null(),
            ty: self.ty.into_vulkan(),
            flags: self.flags,
            mode: self.mode,
            src_acceleration_structure: vk::AccelerationStructureKHR::null(),
            dst_acceleration_structure: self.dst,
            geometry_count: self.geometries.len() as u32,
            p_geometries: self.geometries.as_ptr(),
            pp_geometries: std::ptr::null(),
            scratch_data: self.scratch_data.as_vulkan(),
        }
    }
}
