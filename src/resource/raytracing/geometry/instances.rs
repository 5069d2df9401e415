//! Wrappers for acceleration structure instance geometry data

use anyhow::{ensure, Result};
use ash::vk;
use ash::vk::Packed24_8;

use crate::util::address::DeviceAddressConst;
use crate::util::to_vk::{AsVulkanType, IntoVulkanType};
use crate::util::transform::TransformMatrix;
use crate::{AccelerationStructure, AccelerationStructureType, Allocator, Buffer, DedicatedAllocator, Device, Error, MemoryType};

/// Largest value that fits in the 24 bit custom index and SBT record offset fields.
const MAX_24_BIT: u32 = (1 << 24) - 1;

/// Instance data in an acceleration structure
#[derive(Debug, Copy, Clone)]
pub struct AccelerationStructureGeometryInstancesData {
    /// Data buffer filled with packed [`AccelerationStructureInstance`] structs.
    pub data: DeviceAddressConst,
    /// Geometry flags
    pub flags: vk::GeometryFlagsKHR,
}

impl IntoVulkanType for AccelerationStructureGeometryInstancesData {
    type Output = vk::AccelerationStructureGeometryInstancesDataKHR;

    fn into_vulkan(self) -> Self::Output {
        vk::AccelerationStructureGeometryInstancesDataKHR {
            s_type: vk::StructureType::ACCELERATION_STRUCTURE_GEOMETRY_INSTANCES_DATA_KHR,
            p_next: std::ptr::null(),
            array_of_pointers: vk::FALSE,
            data: self.data.as_vulkan(),
        }
    }
}

/// An instance in the acceleration structure instance buffer. This has the exact memory layout of
/// `VkAccelerationStructureInstanceKHR`, so a slice of these can be uploaded directly.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct AccelerationStructureInstance(vk::AccelerationStructureInstanceKHR);

const_assert_eq!(std::mem::size_of::<AccelerationStructureInstance>(), 64);

impl Default for AccelerationStructureInstance {
    /// An instance with identity transform, mask 0, no flags and a null reference.
    fn default() -> Self {
        Self(vk::AccelerationStructureInstanceKHR {
            transform: TransformMatrix::identity().into_vulkan(),
            instance_custom_index_and_mask: Packed24_8::new(0, 0),
            instance_shader_binding_table_record_offset_and_flags: Packed24_8::new(0, 0),
            acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                device_handle: 0,
            },
        })
    }
}

impl AccelerationStructureInstance {
    /// Set the custom index of this instance, visible to shaders as `gl_InstanceCustomIndexEXT`.
    /// # Errors
    /// Fails if the index does not fit in 24 bits.
    pub fn custom_index(mut self, idx: u32) -> Result<Self> {
        ensure!(idx <= MAX_24_BIT, "instance custom index {idx} does not fit in 24 bits");
        self.0.instance_custom_index_and_mask = Packed24_8::new(idx, self.0.instance_custom_index_and_mask.high_8());
        Ok(self)
    }

    /// Set the mask of this instance, used to disable specific instances when tracing
    pub fn mask(mut self, mask: u8) -> Self {
        self.0.instance_custom_index_and_mask = Packed24_8::new(self.0.instance_custom_index_and_mask.low_24(), mask);
        self
    }

    /// Set the hit group offset into the shader binding table for this instance
    /// # Errors
    /// Fails if the offset does not fit in 24 bits.
    pub fn sbt_record_offset(mut self, offset: u32) -> Result<Self> {
        ensure!(offset <= MAX_24_BIT, "SBT record offset {offset} does not fit in 24 bits");
        self.0.instance_shader_binding_table_record_offset_and_flags =
            Packed24_8::new(offset, self.0.instance_shader_binding_table_record_offset_and_flags.high_8());
        Ok(self)
    }

    /// Set the instance flags
    pub fn flags(mut self, flags: vk::GeometryInstanceFlagsKHR) -> Self {
        self.0.instance_shader_binding_table_record_offset_and_flags = Packed24_8::new(
            self.0.instance_shader_binding_table_record_offset_and_flags.low_24(),
            flags.as_raw() as u8,
        );
        self
    }

    /// Set the bottom level acceleration structure this instance refers to. A copy of its
    /// device address is stored, the instance does not keep the structure alive.
    /// # Errors
    /// * Fails with [`Error::BottomLevelNotBuilt`] if the structure has no device address or is not bottom level.
    pub fn acceleration_structure<A: Allocator>(self, accel: &AccelerationStructure<A>) -> Result<Self> {
        if accel.ty() != AccelerationStructureType::BottomLevel {
            return Err(Error::BottomLevelNotBuilt.into());
        }
        self.reference(accel.address())
    }

    /// Set the device address of the referenced bottom level acceleration structure directly.
    /// # Errors
    /// * Fails with [`Error::BottomLevelNotBuilt`] if the address is 0.
    pub fn reference(mut self, address: vk::DeviceAddress) -> Result<Self> {
        if address == 0 {
            return Err(Error::BottomLevelNotBuilt.into());
        }
        self.0.acceleration_structure_reference = vk::AccelerationStructureReferenceKHR {
            device_handle: address,
        };
        Ok(self)
    }

    /// Set this instance's transform matrix
    pub fn transform(mut self, transform: TransformMatrix) -> Self {
        self.0.transform = transform.into_vulkan();
        self
    }

    /// The referenced bottom level device address, or 0 if none was set.
    pub fn referenced_address(&self) -> vk::DeviceAddress {
        // SAFETY: Only the device_handle member is ever written.
        unsafe { self.0.acceleration_structure_reference.device_handle }
    }

    /// Access the raw Vulkan instance record.
    pub fn raw(&self) -> &vk::AccelerationStructureInstanceKHR {
        &self.0
    }
}

impl std::fmt::Debug for AccelerationStructureInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccelerationStructureInstance")
            .field("transform", &self.0.transform.matrix)
            .field("custom_index", &self.0.instance_custom_index_and_mask.low_24())
            .field("mask", &self.0.instance_custom_index_and_mask.high_8())
            .field("sbt_record_offset", &self.0.instance_shader_binding_table_record_offset_and_flags.low_24())
            .field("flags", &self.0.instance_shader_binding_table_record_offset_and_flags.high_8())
            .field("reference", &self.referenced_address())
            .finish()
    }
}

/// Host visible buffer of packed instances, used as the build input of a top level acceleration structure.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct InstanceBuffer<A: Allocator = DedicatedAllocator> {
    buffer: Buffer<A>,
    count: u32,
}

impl<A: Allocator> InstanceBuffer<A> {
    /// Upload instances into a new host visible and coherent buffer.
    pub fn new(device: Device, allocator: &mut A, instances: &[AccelerationStructureInstance]) -> Result<Self> {
        let buffer = Buffer::from_slice(
            device,
            allocator,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            MemoryType::CpuToGpu,
            instances,
        )?;
        Ok(Self {
            buffer,
            count: instances.len() as u32,
        })
    }

    /// Instance geometry over this buffer, without array-of-pointers indirection.
    pub fn geometry(&self, flags: vk::GeometryFlagsKHR) -> AccelerationStructureGeometryInstancesData {
        AccelerationStructureGeometryInstancesData {
            data: self.buffer.address().into(),
            flags,
        }
    }

    /// Number of instances in the buffer. This is the primitive count of the top level build.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The underlying buffer
    pub fn buffer(&self) -> &Buffer<A> {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instance_is_identity_and_unreferenced() {
        let instance = AccelerationStructureInstance::default();
        assert_eq!(instance.raw().transform.matrix, TransformMatrix::identity().into_vulkan().matrix);
        assert_eq!(instance.referenced_address(), 0);
    }

    #[test]
    fn packs_index_mask_offset_and_flags() {
        let instance = AccelerationStructureInstance::default()
            .custom_index(0x00AB_CDEF)
            .unwrap()
            .mask(0xFF)
            .sbt_record_offset(3)
            .unwrap()
            .flags(vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE);
        let raw = instance.raw();
        assert_eq!(raw.instance_custom_index_and_mask.low_24(), 0x00AB_CDEF);
        assert_eq!(raw.instance_custom_index_and_mask.high_8(), 0xFF);
        assert_eq!(raw.instance_shader_binding_table_record_offset_and_flags.low_24(), 3);
        assert_eq!(
            raw.instance_shader_binding_table_record_offset_and_flags.high_8() as u32,
            vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw()
        );
    }

    #[test]
    fn setters_do_not_clobber_neighbouring_bits() {
        let instance = AccelerationStructureInstance::default()
            .mask(0x0F)
            .custom_index(42)
            .unwrap()
            .flags(vk::GeometryInstanceFlagsKHR::FORCE_OPAQUE)
            .sbt_record_offset(7)
            .unwrap();
        let raw = instance.raw();
        assert_eq!(raw.instance_custom_index_and_mask.high_8(), 0x0F);
        assert_eq!(raw.instance_custom_index_and_mask.low_24(), 42);
        assert_eq!(
            raw.instance_shader_binding_table_record_offset_and_flags.high_8() as u32,
            vk::GeometryInstanceFlagsKHR::FORCE_OPAQUE.as_raw()
        );
        assert_eq!(raw.instance_shader_binding_table_record_offset_and_flags.low_24(), 7);
    }

    #[test]
    fn rejects_values_wider_than_24_bits() {
        assert!(AccelerationStructureInstance::default().custom_index(1 << 24).is_err());
        assert!(AccelerationStructureInstance::default().sbt_record_offset(1 << 24).is_err());
        assert!(AccelerationStructureInstance::default().custom_index(MAX_24_BIT).is_ok());
    }

    #[test]
    fn null_reference_is_rejected() {
        let err = AccelerationStructureInstance::default().reference(0).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BottomLevelNotBuilt)));
    }

    #[test]
    fn reference_stores_address_copy() {
        let instance = AccelerationStructureInstance::default().reference(0xDEAD_0000).unwrap();
        assert_eq!(instance.referenced_address(), 0xDEAD_0000);
    }
}
