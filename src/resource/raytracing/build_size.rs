//! Utilities for querying acceleration structure build sizes

use anyhow::{bail, Result};
use ash::vk;

use crate::core::device::ExtensionID;
use crate::{AccelerationStructureBuildInfo, Device};

/// Holds the required sizes of buffers for the acceleration structure, exactly as reported by the device.
#[derive(Debug, Default, Eq, PartialEq, Hash, Copy, Clone)]
pub struct AccelerationStructureBuildSize {
    /// Required size of the acceleration structure
    pub size: vk::DeviceSize,
    /// Required size of the scratch buffer for update operations
    pub update_scratch_size: vk::DeviceSize,
    /// Required size of the scratch buffer for build operations
    pub build_scratch_size: vk::DeviceSize,
}

impl From<vk::AccelerationStructureBuildSizesInfoKHR> for AccelerationStructureBuildSize {
    fn from(value: vk::AccelerationStructureBuildSizesInfoKHR) -> Self {
        Self {
            size: value.acceleration_structure_size,
            update_scratch_size: value.update_scratch_size,
            build_scratch_size: value.build_scratch_size,
        }
    }
}

/// Get the device build sizes for this acceleration structure build info. The primitive counts
/// are taken from the ranges of the build info.
pub fn query_build_size(device: &Device, info: &AccelerationStructureBuildInfo) -> Result<AccelerationStructureBuildSize> {
    device.require_extension(ExtensionID::AccelerationStructure)?;
    let fns = device.acceleration_structure()?;

    let primitive_counts = info.primitive_counts();
    if primitive_counts.len() != info.geometry_count() {
        bail!(
            "max primitive count length should match the number of geometries (expected: {}, actual: {})",
            info.geometry_count(),
            primitive_counts.len()
        );
    }

    let (geometry, _) = info.as_vulkan();
    let sizes = unsafe {
        fns.get_acceleration_structure_build_sizes(vk::AccelerationStructureBuildTypeKHR::DEVICE, &geometry, &primitive_counts)
    };
    Ok(sizes.into())
}
