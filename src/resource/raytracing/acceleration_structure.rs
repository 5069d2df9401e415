use anyhow::Result;
use ash::vk;

use crate::core::device::ExtensionID;
use crate::util::to_vk::IntoVulkanType;
use crate::{
    AccelerationStructureBuilder, AccelerationStructureGeometry, AccelerationStructureType, Allocator, Buffer, BufferView, DedicatedAllocator,
    Device, ExecutionManager,
};

/// Owning wrapper around a `VkAccelerationStructureKHR` handle. It does not own the buffer it lives in.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RawAccelerationStructure {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::AccelerationStructureKHR,
    ty: AccelerationStructureType,
}

impl RawAccelerationStructure {
    /// Create an acceleration structure object that occupies the given buffer range.
    pub fn new(device: Device, ty: AccelerationStructureType, buffer: BufferView) -> Result<Self> {
        device.require_extension(ExtensionID::AccelerationStructure)?;
        let fns = device.acceleration_structure()?;
        let info = vk::AccelerationStructureCreateInfoKHR {
            s_type: vk::StructureType::ACCELERATION_STRUCTURE_CREATE_INFO_KHR,
            p_next: std::ptr::null(),
            create_flags: vk::AccelerationStructureCreateFlagsKHR::empty(),
            buffer: unsafe { buffer.handle() },
            offset: buffer.offset(),
            size: buffer.size(),
            ty: ty.into_vulkan(),
            // should be left at zero
            device_address: 0,
        };

        let handle = unsafe { fns.create_acceleration_structure(&info, None)? };

        #[cfg(feature = "log-objects")]
        trace!("Created new VkAccelerationStructureKHR {:p}", handle);

        Ok(Self {
            device,
            handle,
            ty,
        })
    }

    /// Get unsafe access to the underlying handle
    /// # Safety
    /// The caller must not destroy this handle.
    pub unsafe fn handle(&self) -> vk::AccelerationStructureKHR {
        self.handle
    }

    /// Query the device address. This is only meaningful after the structure has been built.
    pub fn query_address(&self) -> Result<vk::DeviceAddress> {
        let fns = self.device.acceleration_structure()?;
        let info = vk::AccelerationStructureDeviceAddressInfoKHR::builder().acceleration_structure(self.handle);
        Ok(unsafe { fns.get_acceleration_structure_device_address(&info) })
    }

    /// The acceleration structure type
    pub fn ty(&self) -> AccelerationStructureType {
        self.ty
    }
}

impl Drop for RawAccelerationStructure {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkAccelerationStructureKHR {:p}", self.handle);
        unsafe {
            self.device
                .acceleration_structure()
                // Since we created this object successfully surely the extension is supported
                .unwrap()
                .destroy_acceleration_structure(self.handle, None);
        }
    }
}

/// A built, immutable acceleration structure together with the buffer backing it.
///
/// The only way to obtain one is through a finished [`AccelerationStructureBuilder`], so the
/// device address is always valid.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AccelerationStructure<A: Allocator = DedicatedAllocator> {
    // Declared before `buffer` so the handle is destroyed before its storage.
    raw: RawAccelerationStructure,
    buffer: Buffer<A>,
    address: vk::DeviceAddress,
    geometry: AccelerationStructureGeometry,
    primitive_count: u32,
}

impl<A: Allocator> AccelerationStructure<A> {
    pub(crate) fn from_parts(
        raw: RawAccelerationStructure,
        buffer: Buffer<A>,
        address: vk::DeviceAddress,
        geometry: AccelerationStructureGeometry,
        primitive_count: u32,
    ) -> Self {
        Self {
            raw,
            buffer,
            address,
            geometry,
            primitive_count,
        }
    }

    /// Run the full build protocol: query sizes, allocate storage and scratch memory, build on the
    /// device and query the resulting address. Blocks until the build has finished.
    ///
    /// A top level structure must only be built after every bottom level structure it references.
    /// # Example
    /// ```no_run
    /// # use firstlight::prelude::*;
    /// # use anyhow::Result;
    /// # fn build(device: Device, exec: ExecutionManager, mut alloc: DedicatedAllocator, triangles: AccelerationStructureGeometryTrianglesData) -> Result<()> {
    /// let blas = AccelerationStructure::build(
    ///     device.clone(),
    ///     &exec,
    ///     &mut alloc,
    ///     AccelerationStructureType::BottomLevel,
    ///     triangles.into(),
    ///     1,
    /// )?;
    /// assert_ne!(blas.address(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(
        device: Device,
        exec: &ExecutionManager,
        allocator: &mut A,
        ty: AccelerationStructureType,
        geometry: AccelerationStructureGeometry,
        primitive_count: u32,
    ) -> Result<Self> {
        let mut builder = AccelerationStructureBuilder::new(device, ty, geometry, primitive_count)?;
        builder.query_sizes()?;
        builder.allocate(allocator)?;
        builder.build(exec)?;
        builder.finish()
    }

    /// Get unsafe access to the underlying handle
    /// # Safety
    /// The caller must not destroy this handle or use it after `self` is dropped.
    pub unsafe fn handle(&self) -> vk::AccelerationStructureKHR {
        self.raw.handle()
    }

    /// The device address of this structure. Never zero.
    pub fn address(&self) -> vk::DeviceAddress {
        self.address
    }

    /// The acceleration structure type
    pub fn ty(&self) -> AccelerationStructureType {
        self.raw.ty()
    }

    /// The geometry this structure was built over. Addresses in it may point to buffers that no longer exist.
    pub fn geometry(&self) -> &AccelerationStructureGeometry {
        &self.geometry
    }

    /// The number of primitives this structure was built over.
    pub fn primitive_count(&self) -> u32 {
        self.primitive_count
    }

    /// The buffer backing this structure.
    pub fn buffer(&self) -> &Buffer<A> {
        &self.buffer
    }
}
