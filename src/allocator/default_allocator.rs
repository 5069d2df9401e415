//! Contains a pooled allocator type based on the [`gpu_allocator`] crate.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk::{DeviceMemory, DeviceSize, MemoryAllocateFlags, MemoryRequirements};
use gpu_allocator::vulkan as vk_alloc;
use gpu_allocator::vulkan::AllocationScheme;

use crate::allocator::memory_type::MemoryType;
use crate::allocator::traits;
use crate::{Allocator, Device, Error, Instance, PhysicalDevice};

type Pool = Arc<Mutex<vk_alloc::Allocator>>;

/// Allocator that sub-allocates from large memory blocks through the `gpu_allocator` crate.
/// It's important to note that this allocator is `Clone`, `Send` and `Sync`. All its internal state is safely
/// wrapped inside an `Arc<Mutex<T>>`.
///
/// Requests are served from one of two pools. Requests with [`DEVICE_ADDRESS`](MemoryAllocateFlags::DEVICE_ADDRESS)
/// come from blocks allocated with that flag, everything else comes from plain blocks. Buffers are bound at their
/// allocation's offset inside the shared block, and host visible blocks stay mapped for as long as they live.
///
/// # Example
/// ```no_run
/// # use firstlight::prelude::*;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// # let settings = AppBuilder::new().raytracing(true).build();
/// let (instance, physical_device, device, mut allocator, exec, debug_messenger) =
///     firstlight::initialize_with_allocator(&settings, DefaultAllocator::new)?;
/// let buffer = Buffer::new(device, &mut allocator, 1024u64, vk::BufferUsageFlags::STORAGE_BUFFER, MemoryType::GpuOnly)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct DefaultAllocator {
    #[derivative(Debug = "ignore")]
    plain: Pool,
    #[derivative(Debug = "ignore")]
    addressable: Pool,
}

/// Allocation returned from the default allocator. This allocation is automatically freed
/// when it is dropped, so it's not strictly necessary to call [`Allocator::free()`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DefaultAllocation {
    #[derivative(Debug = "ignore")]
    pool: Pool,
    // Taken out on free, so dropping after an explicit free is a no-op.
    allocation: Option<vk_alloc::Allocation>,
    flags: MemoryAllocateFlags,
}

fn create_pool(instance: &Instance, physical_device: &PhysicalDevice, device: &Device, buffer_device_address: bool) -> Result<Pool> {
    let pool = vk_alloc::Allocator::new(&vk_alloc::AllocatorCreateDesc {
        instance: (**instance).clone(),
        // SAFETY: The user passed in a valid Device reference.
        device: unsafe { device.handle() },
        // SAFETY: The user passed in a valid PhysicalDevice reference.
        physical_device: unsafe { physical_device.handle() },
        debug_settings: Default::default(),
        buffer_device_address,
    })?;
    Ok(Arc::new(Mutex::new(pool)))
}

impl DefaultAllocator {
    /// Create a new default allocator. The argument order matches the callback of
    /// [`initialize_with_allocator()`](crate::initialize_with_allocator), so this can be passed to it directly.
    /// # Errors
    /// * May fail if creating the internal `gpu_allocator` pools fails.
    pub fn new(instance: &Instance, physical_device: &PhysicalDevice, device: &Device) -> Result<Self> {
        Ok(Self {
            plain: create_pool(instance, physical_device, device, false)?,
            addressable: create_pool(instance, physical_device, device, true)?,
        })
    }

    fn pool(&self, flags: MemoryAllocateFlags) -> &Pool {
        if flags.contains(MemoryAllocateFlags::DEVICE_ADDRESS) {
            &self.addressable
        } else {
            &self.plain
        }
    }
}

impl Allocator for DefaultAllocator {
    type Allocation = DefaultAllocation;

    /// Allocates memory of a specific memory type. The given name is used for internal tracking and
    /// debug logging.
    fn allocate(
        &mut self,
        name: &str,
        requirements: &MemoryRequirements,
        ty: MemoryType,
        flags: MemoryAllocateFlags,
    ) -> Result<Self::Allocation> {
        let pool = self.pool(flags).clone();
        let allocation = {
            let mut alloc = pool.lock().map_err(|_| Error::PoisonError)?;
            alloc.allocate(&vk_alloc::AllocationCreateDesc {
                name,
                requirements: *requirements,
                location: gpu_allocator::MemoryLocation::from(ty),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };
        #[cfg(feature = "log-objects")]
        trace!(
            "Sub-allocated {} bytes for {name} at offset {} ({flags:?})",
            allocation.size(),
            allocation.offset()
        );

        Ok(DefaultAllocation {
            pool,
            allocation: Some(allocation),
            flags,
        })
    }

    fn free(&mut self, mut allocation: Self::Allocation) -> Result<()> {
        allocation.release()
    }
}

impl DefaultAllocation {
    /// The allocate flags this allocation was requested with. Decides which pool it came from.
    pub fn flags(&self) -> MemoryAllocateFlags {
        self.flags
    }

    fn release(&mut self) -> Result<()> {
        if let Some(allocation) = self.allocation.take() {
            let mut pool = self.pool.lock().map_err(|_| Error::PoisonError)?;
            pool.free(allocation)?;
        }
        Ok(())
    }

    fn inner(&self) -> Result<&vk_alloc::Allocation> {
        self.allocation
            .as_ref()
            .ok_or_else(|| Error::Uncategorized("Allocation was already freed.").into())
    }

    fn check_range(&self, offset: DeviceSize, len: DeviceSize) -> Result<()> {
        let size = self.inner()?.size();
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(Error::UploadOutOfRange {
                len,
                size: size.saturating_sub(offset),
            }
            .into());
        }
        Ok(())
    }
}

impl traits::Allocation for DefaultAllocation {
    unsafe fn memory(&self) -> DeviceMemory {
        self.allocation.as_ref().map(|a| a.memory()).unwrap_or_default()
    }

    fn offset(&self) -> DeviceSize {
        self.allocation.as_ref().map(|a| a.offset()).unwrap_or_default()
    }

    fn size(&self) -> DeviceSize {
        self.allocation.as_ref().map(|a| a.size()).unwrap_or_default()
    }

    /// Copies through the block's persistent mapping. CpuToGpu memory is coherent, so no flush is needed.
    fn write_bytes(&mut self, offset: DeviceSize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as DeviceSize)?;
        let slice = self
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or(Error::UnmappableBuffer)?;
        let start = offset as usize;
        slice[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_bytes(&self, offset: DeviceSize, len: DeviceSize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let slice = self.inner()?.mapped_slice().ok_or(Error::UnmappableBuffer)?;
        let start = offset as usize;
        Ok(slice[start..start + len as usize].to_vec())
    }
}

impl Drop for DefaultAllocation {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            error!("Failed to free pooled allocation: {err}");
        }
    }
}
