//! Shader binding table assembly.
//!
//! The handle blob is fetched from the pipeline once, then each role's record is copied into its
//! own small buffer. Every record occupies one aligned slot, with the handle bytes at offset 0.

use anyhow::Result;
use ash::vk;

use crate::core::device::ExtensionID;
use crate::util::align::align;
use crate::{Allocator, Buffer, DedicatedAllocator, Device, Error, MemoryType, RayTracingPipeline, ShaderGroupRole};

/// Size and alignment of shader group handles on a device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HandleLayout {
    /// `shaderGroupHandleSize`
    pub handle_size: u32,
    /// `shaderGroupHandleAlignment`
    pub handle_alignment: u32,
}

impl HandleLayout {
    /// Read the handle layout from the device's ray tracing pipeline properties.
    pub fn from_device(device: &Device) -> Result<Self> {
        let properties = device.raytracing_properties()?;
        Ok(Self {
            handle_size: properties.shader_group_handle_size,
            handle_alignment: properties.shader_group_handle_alignment,
        })
    }

    /// Size of one handle slot, the handle size rounded up to the alignment.
    pub fn aligned_size(&self) -> u32 {
        align(self.handle_size, self.handle_alignment)
    }

    /// Size of the blob holding `group_count` slots.
    pub fn blob_size(&self, group_count: u32) -> usize {
        group_count as usize * self.aligned_size() as usize
    }
}

/// The shader group handles of a pipeline, as returned by a single query for all groups.
#[derive(Debug, Clone)]
pub struct ShaderGroupHandles {
    blob: Vec<u8>,
    layout: HandleLayout,
    count: u32,
}

impl ShaderGroupHandles {
    /// Fetch the handles of every group in the pipeline, starting at group 0.
    /// # Errors
    /// Fails with [`Error::ShaderGroupHandles`] if the query fails.
    pub fn query(device: &Device, pipeline: &RayTracingPipeline, layout: HandleLayout) -> Result<Self> {
        device.require_extension(ExtensionID::RayTracingPipeline)?;
        let fns = device.raytracing_pipeline()?;
        let count = pipeline.group_count();
        let blob = unsafe { fns.get_ray_tracing_shader_group_handles(pipeline.handle(), 0, count, layout.blob_size(count)) }
            .map_err(Error::ShaderGroupHandles)?;
        Ok(Self::from_blob(blob, layout, count))
    }

    /// Wrap an existing handle blob of `count` groups.
    pub fn from_blob(blob: Vec<u8>, layout: HandleLayout, count: u32) -> Self {
        Self {
            blob,
            layout,
            count,
        }
    }

    /// The handle bytes of a group.
    /// # Errors
    /// Fails with [`Error::ShaderGroupOutOfRange`] if the group was not part of the query.
    pub fn record(&self, group: u32) -> Result<&[u8]> {
        let out_of_range = || Error::ShaderGroupOutOfRange {
            group,
            count: self.count,
        };
        if group >= self.count {
            return Err(out_of_range().into());
        }
        let start = group as usize * self.layout.aligned_size() as usize;
        let end = start + self.layout.handle_size as usize;
        self.blob.get(start..end).ok_or_else(|| out_of_range().into())
    }

    /// Number of groups in the blob
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The raw blob
    pub fn blob(&self) -> &[u8] {
        self.blob.as_slice()
    }
}

/// Three host visible buffers, one per [`ShaderGroupRole`], each holding a single aligned record.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ShaderBindingTable<A: Allocator = DedicatedAllocator> {
    raygen: Buffer<A>,
    miss: Buffer<A>,
    hit: Buffer<A>,
    layout: HandleLayout,
}

impl<A: Allocator> ShaderBindingTable<A> {
    /// Query the pipeline's group handles and upload each role's record into its own buffer.
    pub fn new(device: Device, allocator: &mut A, pipeline: &RayTracingPipeline, layout: HandleLayout) -> Result<Self> {
        let handles = ShaderGroupHandles::query(&device, pipeline, layout)?;
        let table = pipeline.group_table();
        let mut make_buffer = |role: ShaderGroupRole| -> Result<Buffer<A>> {
            let record = handles.record(table.index(role))?;
            Buffer::new_with_data(
                device.clone(),
                allocator,
                layout.aligned_size() as vk::DeviceSize,
                vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
                    | vk::BufferUsageFlags::TRANSFER_SRC
                    | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
                MemoryType::CpuToGpu,
                record,
            )
        };
        let raygen = make_buffer(ShaderGroupRole::RayGen)?;
        let miss = make_buffer(ShaderGroupRole::Miss)?;
        let hit = make_buffer(ShaderGroupRole::Hit)?;

        info!(
            "Assembled shader binding table: handle size {}, alignment {}, stride {}, groups {:?}",
            layout.handle_size,
            layout.handle_alignment,
            layout.aligned_size(),
            table
        );

        Ok(Self {
            raygen,
            miss,
            hit,
            layout,
        })
    }

    /// The buffer holding the record of a role.
    pub fn buffer(&self, role: ShaderGroupRole) -> &Buffer<A> {
        match role {
            ShaderGroupRole::RayGen => &self.raygen,
            ShaderGroupRole::Miss => &self.miss,
            ShaderGroupRole::Hit => &self.hit,
        }
    }

    /// Stride between records, the aligned handle size.
    pub fn stride(&self) -> vk::DeviceSize {
        self.layout.aligned_size() as vk::DeviceSize
    }

    /// The region of a role, as passed to `vkCmdTraceRaysKHR`.
    pub fn region(&self, role: ShaderGroupRole) -> vk::StridedDeviceAddressRegionKHR {
        vk::StridedDeviceAddressRegionKHR {
            device_address: self.buffer(role).address(),
            stride: self.stride(),
            size: self.stride(),
        }
    }

    /// The handle layout this table was built with.
    pub fn layout(&self) -> HandleLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: HandleLayout = HandleLayout {
        handle_size: 32,
        handle_alignment: 64,
    };

    fn blob(layout: HandleLayout, count: u32) -> Vec<u8> {
        (0..layout.blob_size(count)).map(|i| i as u8).collect()
    }

    #[test]
    fn aligned_size_rounds_up() {
        assert_eq!(LAYOUT.aligned_size(), 64);
        let packed = HandleLayout {
            handle_size: 32,
            handle_alignment: 32,
        };
        assert_eq!(packed.aligned_size(), 32);
        let odd = HandleLayout {
            handle_size: 48,
            handle_alignment: 32,
        };
        assert_eq!(odd.aligned_size(), 64);
        for layout in [LAYOUT, packed, odd] {
            assert_eq!(layout.aligned_size() % layout.handle_alignment, 0);
            assert!(layout.aligned_size() >= layout.handle_size);
        }
    }

    #[test]
    fn three_groups_fill_three_slots() {
        assert_eq!(LAYOUT.blob_size(3), 192);
    }

    #[test]
    fn records_are_sliced_at_aligned_offsets() {
        let bytes = blob(LAYOUT, 3);
        let handles = ShaderGroupHandles::from_blob(bytes.clone(), LAYOUT, 3);
        assert_eq!(handles.record(0).unwrap(), &bytes[0..32]);
        assert_eq!(handles.record(1).unwrap(), &bytes[64..96]);
        assert_eq!(handles.record(2).unwrap(), &bytes[128..160]);
    }

    #[test]
    fn record_past_the_end_fails() {
        let handles = ShaderGroupHandles::from_blob(blob(LAYOUT, 3), LAYOUT, 3);
        let err = handles.record(3).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::ShaderGroupOutOfRange {
                group,
                count,
            }) => {
                assert_eq!(*group, 3);
                assert_eq!(*count, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn short_blob_fails_instead_of_panicking() {
        let handles = ShaderGroupHandles::from_blob(vec![0; 100], LAYOUT, 3);
        assert!(handles.record(1).is_ok());
        assert!(handles.record(2).is_err());
    }
}
