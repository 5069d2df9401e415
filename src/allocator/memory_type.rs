//! Exposes different memory types that determine where memory allocations should live, and the
//! memory type selection used by the dedicated allocator.

use anyhow::Result;
use ash::vk;

use crate::Error;

/// The memory type of an allocation indicates where it should live.
/// Give this to an [`Allocator`](crate::Allocator) to let it decide
/// where your allocation should live.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MemoryType {
    /// Store the allocation in GPU only accessible memory. Acceleration structures and scratch
    /// buffers live here.
    GpuOnly,
    /// Memory that the host can map and write without explicit flushes. Build inputs, instance
    /// buffers and shader binding tables live here.
    CpuToGpu,
}

impl MemoryType {
    /// The property flags a memory type must have to back an allocation of this type.
    pub fn property_flags(&self) -> vk::MemoryPropertyFlags {
        match self {
            MemoryType::GpuOnly => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryType::CpuToGpu => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        }
    }
}

impl From<MemoryType> for gpu_allocator::MemoryLocation {
    fn from(value: MemoryType) -> Self {
        match value {
            MemoryType::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
            MemoryType::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        }
    }
}

/// Find the first memory type that is allowed by `type_bits` and has at least the requested property flags.
/// # Errors
/// * Fails with [`Error::NoMemoryType`] if no such memory type exists.
pub fn find_memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32> {
    properties
        .memory_types
        .iter()
        .take(properties.memory_type_count as usize)
        .enumerate()
        .find(|(index, ty)| type_bits & (1u32 << *index) != 0 && ty.property_flags.contains(flags))
        .map(|(index, _)| index as u32)
        .ok_or_else(|| {
            Error::NoMemoryType {
                type_bits,
                flags,
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        properties
    }

    #[test]
    fn picks_first_matching_type() {
        let props = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        let index = find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn respects_type_bits() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let index = find_memory_type_index(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn flags_must_be_superset() {
        let props = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT | vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        let index = find_memory_type_index(&props, u32::MAX, MemoryType::CpuToGpu.property_flags()).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn ignores_types_past_count() {
        let mut props = properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        let err = find_memory_type_index(&props, u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoMemoryType { .. })));
    }

    #[test]
    fn no_match_reports_mask_and_flags() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type_index(&props, 0, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::NoMemoryType {
                type_bits,
                flags,
            }) => {
                assert_eq!(*type_bits, 0);
                assert_eq!(*flags, vk::MemoryPropertyFlags::DEVICE_LOCAL);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
