//! An allocator that gives every resource its own `VkDeviceMemory`. This is the default allocator.
//!
//! Every request results in exactly one `vkAllocateMemory` call of `requirements.size` bytes, using
//! the first memory type that satisfies both the type mask and the [`MemoryType`] property flags.
//! Nothing stays mapped: writes and reads map the whole allocation, copy and unmap again.

use anyhow::Result;
use ash::vk;

use crate::allocator::memory_type::{find_memory_type_index, MemoryType};
use crate::allocator::traits;
use crate::{Allocator, Device, Error};

/// Allocator that performs one device allocation per resource.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct DedicatedAllocator {
    #[derivative(Debug = "ignore")]
    device: Device,
}

/// Allocation returned from the [`DedicatedAllocator`]. The memory is freed on drop.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DedicatedAllocation {
    #[derivative(Debug = "ignore")]
    device: Device,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    memory_type_index: u32,
    property_flags: vk::MemoryPropertyFlags,
}

impl DedicatedAllocator {
    /// Create a new dedicated allocator.
    pub fn new(device: Device) -> Self {
        Self {
            device,
        }
    }
}

impl Allocator for DedicatedAllocator {
    type Allocation = DedicatedAllocation;

    fn allocate(
        &mut self,
        name: &str,
        requirements: &vk::MemoryRequirements,
        ty: MemoryType,
        flags: vk::MemoryAllocateFlags,
    ) -> Result<Self::Allocation> {
        let memory_properties = self.device.memory_properties();
        let memory_type_index = find_memory_type_index(memory_properties, requirements.memory_type_bits, ty.property_flags())?;
        let property_flags = memory_properties.memory_types[memory_type_index as usize].property_flags;

        let mut flags_info = vk::MemoryAllocateFlagsInfo::builder().flags(flags);
        let mut info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        if !flags.is_empty() {
            info = info.push_next(&mut flags_info);
        }

        let memory = unsafe { self.device.allocate_memory(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!(
            "Allocated VkDeviceMemory {memory:p} for {name} ({} bytes, memory type {memory_type_index})",
            requirements.size
        );
        #[cfg(not(feature = "log-objects"))]
        let _ = name;

        Ok(DedicatedAllocation {
            device: self.device.clone(),
            memory,
            size: requirements.size,
            memory_type_index,
            property_flags,
        })
    }

    fn free(&mut self, allocation: Self::Allocation) -> Result<()> {
        drop(allocation);
        Ok(())
    }
}

impl DedicatedAllocation {
    /// Index of the memory type this allocation was made from.
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Property flags of the memory type this allocation was made from.
    pub fn property_flags(&self) -> vk::MemoryPropertyFlags {
        self.property_flags
    }

    fn check_range(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> Result<()> {
        if !self.property_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(Error::UnmappableBuffer.into());
        }
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(Error::UploadOutOfRange {
                len,
                size: self.size.saturating_sub(offset),
            }
            .into());
        }
        Ok(())
    }
}

impl traits::Allocation for DedicatedAllocation {
    unsafe fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    fn offset(&self) -> vk::DeviceSize {
        0
    }

    fn size(&self) -> vk::DeviceSize {
        self.size
    }

    fn write_bytes(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as vk::DeviceSize)?;
        unsafe {
            let ptr = self.device.map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?;
            // SAFETY: The range was checked against the allocation size above.
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>().add(offset as usize), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    fn read_bytes(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut bytes = vec![0u8; len as usize];
        unsafe {
            let ptr = self.device.map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(ptr.cast::<u8>().add(offset as usize), bytes.as_mut_ptr(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(bytes)
    }
}

impl Drop for DedicatedAllocation {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Freeing VkDeviceMemory {:p}", self.memory);
        unsafe {
            self.device.free_memory(self.memory, None);
        }
    }
}
