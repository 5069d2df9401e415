//! Traits that can be implemented to supply a custom allocator to all firstlight resources.

use anyhow::Result;
use ash::vk;

use crate::allocator::memory_type::MemoryType;

/// A memory allocator. Implementations must be cheap to clone and share their state between clones.
pub trait Allocator: Clone + Send + Sync {
    /// Allocation type returned by this allocator.
    type Allocation: Allocation;

    /// Allocate memory satisfying `requirements` in the given memory type. `flags` are the
    /// `VkMemoryAllocateFlags` to allocate with, such as `DEVICE_ADDRESS` for buffers that need a device address.
    fn allocate(
        &mut self,
        name: &str,
        requirements: &vk::MemoryRequirements,
        ty: MemoryType,
        flags: vk::MemoryAllocateFlags,
    ) -> Result<Self::Allocation>;

    /// Free an allocation. Dropping the allocation has the same effect.
    fn free(&mut self, allocation: Self::Allocation) -> Result<()>;
}

/// A block of device memory owned by an [`Allocator`]. The memory is freed when this is dropped.
pub trait Allocation: Send {
    /// Get unsafe access to the underlying `VkDeviceMemory`.
    /// # Safety
    /// The caller must not free this memory or access it outside of `offset()..offset() + size()`.
    unsafe fn memory(&self) -> vk::DeviceMemory;

    /// Offset of this allocation into its `VkDeviceMemory`.
    fn offset(&self) -> vk::DeviceSize;

    /// Size of this allocation in bytes.
    fn size(&self) -> vk::DeviceSize;

    /// Copy `data` into host visible memory, starting `offset` bytes into the allocation.
    /// # Errors
    /// * Fails with [`Error::UnmappableBuffer`](crate::Error::UnmappableBuffer) if the memory is not host visible.
    /// * Fails with [`Error::UploadOutOfRange`](crate::Error::UploadOutOfRange) if the data does not fit.
    fn write_bytes(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<()>;

    /// Read `len` bytes from host visible memory, starting `offset` bytes into the allocation.
    fn read_bytes(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> Result<Vec<u8>>;
}
