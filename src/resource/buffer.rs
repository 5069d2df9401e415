//! Wrappers for `VkBuffer` objects.
//!
//! This module exposes two types: [`Buffer`] and [`BufferView`]. A [`BufferView`] does not own a vulkan
//! resource, so it can be freely copied around as long as the owning [`Buffer`] lives.
//!
//! Buffers are created, bound and optionally filled in a single call. Host data is uploaded once at
//! creation time. Memory is never left mapped.
//!
//! # Example
//!
//! ```no_run
//! # use firstlight::prelude::*;
//! # use anyhow::Result;
//! # fn upload(device: Device, mut alloc: DedicatedAllocator) -> Result<()> {
//! let vertices = [1.0f32, 1.0, 0.0, -1.0, 1.0, 0.0, 0.0, -1.0, 0.0];
//! let buffer = Buffer::from_slice(
//!     device.clone(),
//!     &mut alloc,
//!     vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
//!     MemoryType::CpuToGpu,
//!     &vertices,
//! )?;
//! assert_ne!(buffer.address(), 0);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::{Allocation, Allocator, DedicatedAllocator, Device, Error, MemoryType};

/// Wrapper around a [`VkBuffer`](vk::Buffer) and the memory backing it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Buffer<A: Allocator = DedicatedAllocator> {
    #[derivative(Debug = "ignore")]
    device: Device,
    #[derivative(Debug = "ignore")]
    memory: A::Allocation,
    address: vk::DeviceAddress,
    handle: vk::Buffer,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
}

/// View into a specific offset and range of a [`Buffer`].
/// Care should be taken with the lifetime of this, as there is no checking that the buffer
/// is not dropped while using this.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferView {
    handle: vk::Buffer,
    address: vk::DeviceAddress,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
}

fn check_upload(len: usize, size: vk::DeviceSize) -> Result<()> {
    let len = len as vk::DeviceSize;
    if len > size {
        Err(Error::UploadOutOfRange {
            len,
            size,
        }
        .into())
    } else {
        Ok(())
    }
}

impl<A: Allocator> Buffer<A> {
    /// Allocate a new buffer with a specific size, at a specific memory location.
    /// All usage flags must be given. The buffer only gets a device address if `usage`
    /// contains [`SHADER_DEVICE_ADDRESS`](vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS).
    pub fn new(
        device: Device,
        allocator: &mut A,
        size: impl Into<vk::DeviceSize>,
        usage: vk::BufferUsageFlags,
        location: MemoryType,
    ) -> Result<Self> {
        Self::new_impl(device, allocator, size.into(), usage, location, None)
    }

    /// Allocate a new buffer and upload `data` to the start of it. The memory is mapped in full,
    /// `data.len()` bytes are copied and the memory is unmapped again.
    /// # Errors
    /// * Fails with [`Error::UploadOutOfRange`] if `data` is larger than `size`. Nothing is created in this case.
    /// * Fails with [`Error::UnmappableBuffer`] if the memory type is not host visible.
    pub fn new_with_data(
        device: Device,
        allocator: &mut A,
        size: impl Into<vk::DeviceSize>,
        usage: vk::BufferUsageFlags,
        location: MemoryType,
        data: &[u8],
    ) -> Result<Self> {
        Self::new_impl(device, allocator, size.into(), usage, location, Some(data))
    }

    /// Allocate a buffer exactly large enough for `data` and upload it.
    pub fn from_slice<T: Copy>(
        device: Device,
        allocator: &mut A,
        usage: vk::BufferUsageFlags,
        location: MemoryType,
        data: &[T],
    ) -> Result<Self> {
        let size = std::mem::size_of_val(data);
        // SAFETY: T is Copy, so viewing it as plain bytes is fine for uploading.
        let bytes = unsafe { std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), size) };
        Self::new_with_data(device, allocator, size as vk::DeviceSize, usage, location, bytes)
    }

    fn new_impl(
        device: Device,
        allocator: &mut A,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryType,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        if let Some(data) = data {
            check_upload(data.len(), size)?;
        }

        let info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = unsafe { device.create_buffer(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkBuffer {handle:p} (size = {size} bytes)");

        let needs_address = usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS);
        let allocate_flags = if needs_address {
            vk::MemoryAllocateFlags::DEVICE_ADDRESS
        } else {
            vk::MemoryAllocateFlags::empty()
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(handle) };
        let memory = match allocator.allocate("buffer", &requirements, location, allocate_flags) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(handle, None) };
                return Err(err);
            }
        };

        // Dropping `this` on an early return destroys the buffer and frees the memory.
        let mut this = Self {
            device,
            memory,
            address: 0,
            handle,
            size,
            usage,
        };

        unsafe {
            this.device
                .bind_buffer_memory(this.handle, this.memory.memory(), this.memory.offset())?
        };

        if let Some(data) = data {
            this.memory.write_bytes(0, data)?;
        }

        if needs_address {
            let info = vk::BufferDeviceAddressInfo::builder().buffer(this.handle);
            this.address = unsafe { this.device.get_buffer_device_address(&info) };
        }

        Ok(this)
    }

    /// Creates a view into an offset and size of the buffer.
    /// # Lifetime
    /// This view is valid as long as the buffer is valid.
    /// # Errors
    /// Fails if `offset + size > self.size`.
    pub fn view(&self, offset: impl Into<vk::DeviceSize>, size: impl Into<vk::DeviceSize>) -> Result<BufferView> {
        let offset = offset.into();
        let size = size.into();
        if offset.checked_add(size).map_or(true, |end| end > self.size) {
            Err(anyhow::Error::from(Error::BufferViewOutOfRange))
        } else {
            Ok(BufferView {
                handle: self.handle,
                offset,
                address: if self.address == 0 {
                    0
                } else {
                    self.address + offset
                },
                size,
            })
        }
    }

    /// Creates a view of the entire buffer.
    /// # Lifetime
    /// This view is valid as long as the buffer is valid.
    pub fn view_full(&self) -> BufferView {
        BufferView {
            handle: self.handle,
            offset: 0,
            address: self.address,
            size: self.size,
        }
    }

    /// Read back the contents of a host visible buffer.
    /// # Errors
    /// Fails with [`Error::UnmappableBuffer`] if the buffer memory is not host visible.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.memory.read_bytes(0, self.size)
    }

    /// Obtain a handle to the raw vulkan buffer object.
    /// # Safety
    /// * The caller must make sure to not use this handle after `self` is dropped.
    /// * The caller must not call `vkDestroyBuffer` on this handle.
    pub unsafe fn handle(&self) -> vk::Buffer {
        self.handle
    }

    /// Get the size of this buffer, as requested at creation.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Get the size of the memory backing this buffer. This is at least [`Buffer::size()`].
    pub fn memory_size(&self) -> vk::DeviceSize {
        self.memory.size()
    }

    /// Get the usage flags this buffer was created with.
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Get the device address of this buffer, or 0 if it was not created with device address usage.
    pub fn address(&self) -> vk::DeviceAddress {
        self.address
    }
}

impl<A: Allocator> Drop for Buffer<A> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkBuffer {:p}", self.handle);
        unsafe {
            self.device.destroy_buffer(self.handle, None);
        }
    }
}

impl BufferView {
    /// Obtain a handle to the raw vulkan buffer object.
    /// # Safety
    /// * The caller must make sure to not use this handle after `self` is dropped.
    /// * The caller must not call `vkDestroyBuffer` on this handle.
    pub unsafe fn handle(&self) -> vk::Buffer {
        self.handle
    }

    /// Get the offset of this buffer view into the owning buffer
    pub fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    /// Get the size of this buffer view.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Get the device address of the start of this buffer view.
    pub fn address(&self) -> vk::DeviceAddress {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_fits() {
        assert!(check_upload(0, 0).is_ok());
        assert!(check_upload(36, 36).is_ok());
        assert!(check_upload(12, 64).is_ok());
    }

    #[test]
    fn upload_larger_than_buffer_fails() {
        let err = check_upload(37, 36).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::UploadOutOfRange {
                len,
                size,
            }) => {
                assert_eq!(*len, 37);
                assert_eq!(*size, 36);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
