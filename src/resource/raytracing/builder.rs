//! The acceleration structure build protocol.
//!
//! An [`AccelerationStructureBuilder`] walks through the build steps in a fixed order. Each step
//! checks the current [`BuildStage`] and fails with [`Error::InvalidBuildState`] when called out of
//! order, in which case the builder is left as it was.
//!
//! # Example
//! ```no_run
//! # use firstlight::prelude::*;
//! # use anyhow::Result;
//! # fn build(device: Device, exec: ExecutionManager, mut alloc: DedicatedAllocator, triangles: AccelerationStructureGeometryTrianglesData) -> Result<()> {
//! let mut builder = AccelerationStructureBuilder::new(device, AccelerationStructureType::BottomLevel, triangles.into(), 1)?;
//! builder.query_sizes()?;
//! builder.allocate(&mut alloc)?;
//! builder.build(&exec)?;
//! let blas = builder.finish()?;
//! # Ok(())
//! # }
//! ```

use anyhow::{ensure, Result};
use ash::vk;

use crate::core::device::ExtensionID;
use crate::util::align::align;
use crate::{
    query_build_size, AccelerationStructure, AccelerationStructureBuildInfo, AccelerationStructureBuildSize, AccelerationStructureGeometry,
    AccelerationStructureType, Allocator, Buffer, DedicatedAllocator, Device, Error, ExecutionManager, MemoryType, RawAccelerationStructure,
};

/// Usage of the buffer an acceleration structure lives in. The structure has its own device address,
/// so the buffer does not need one.
const STORAGE_USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR;
const SCRATCH_USAGE: vk::BufferUsageFlags =
    vk::BufferUsageFlags::from_raw(vk::BufferUsageFlags::STORAGE_BUFFER.as_raw() | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS.as_raw());

/// The step an [`AccelerationStructureBuilder`] is at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BuildStage {
    /// Nothing has happened yet.
    Unbuilt,
    /// Build sizes are known.
    Sized,
    /// Storage, structure handle and scratch memory exist.
    Allocated,
    /// The structure is built and has a device address.
    Built,
}

enum BuildState<A: Allocator> {
    Unbuilt,
    Sized(AccelerationStructureBuildSize),
    Allocated {
        structure: RawAccelerationStructure,
        buffer: Buffer<A>,
        scratch: Buffer<A>,
        scratch_address: vk::DeviceAddress,
    },
    Built {
        structure: RawAccelerationStructure,
        buffer: Buffer<A>,
        address: vk::DeviceAddress,
    },
}

impl<A: Allocator> BuildState<A> {
    fn stage(&self) -> BuildStage {
        match self {
            BuildState::Unbuilt => BuildStage::Unbuilt,
            BuildState::Sized(_) => BuildStage::Sized,
            BuildState::Allocated {
                ..
            } => BuildStage::Allocated,
            BuildState::Built {
                ..
            } => BuildStage::Built,
        }
    }
}

fn check_stage(expected: BuildStage, actual: BuildStage) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::InvalidBuildState {
            expected,
            actual,
        }
        .into())
    }
}

/// Extra bytes needed so the scratch memory can start at an aligned address.
fn scratch_padding(address: vk::DeviceAddress, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment <= 1 || address % alignment == 0 {
        0
    } else {
        alignment
    }
}

/// Drives a single acceleration structure build from size query to a finished [`AccelerationStructure`].
pub struct AccelerationStructureBuilder<A: Allocator = DedicatedAllocator> {
    device: Device,
    ty: AccelerationStructureType,
    geometry: AccelerationStructureGeometry,
    primitive_count: u32,
    state: BuildState<A>,
}

impl<A: Allocator> AccelerationStructureBuilder<A> {
    /// Start a new build over a single geometry.
    /// # Errors
    /// * Fails if the acceleration structure extension is not enabled.
    /// * Fails if the geometry cannot be built into a structure of type `ty`, e.g. triangles into a top level structure.
    pub fn new(device: Device, ty: AccelerationStructureType, geometry: AccelerationStructureGeometry, primitive_count: u32) -> Result<Self> {
        device.require_extension(ExtensionID::AccelerationStructure)?;
        ensure!(
            geometry.structure_type() == ty,
            "geometry for {:?} acceleration structure cannot be built into {:?}",
            geometry.structure_type(),
            ty
        );
        Ok(Self {
            device,
            ty,
            geometry,
            primitive_count,
            state: BuildState::Unbuilt,
        })
    }

    /// The step this build is at.
    pub fn stage(&self) -> BuildStage {
        self.state.stage()
    }

    fn build_info(&self) -> AccelerationStructureBuildInfo {
        AccelerationStructureBuildInfo::new_build()
            .set_type(self.ty)
            .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
            .push_geometry(&self.geometry)
            .push_range(self.primitive_count, 0, 0, 0)
    }

    /// Query the storage and scratch sizes for this build. Moves `Unbuilt` to `Sized`.
    pub fn query_sizes(&mut self) -> Result<AccelerationStructureBuildSize> {
        check_stage(BuildStage::Unbuilt, self.stage())?;
        let sizes = query_build_size(&self.device, &self.build_info())?;
        info!(
            "{:?} acceleration structure over {} primitive(s) needs {} bytes of storage, {} bytes of scratch",
            self.ty, self.primitive_count, sizes.size, sizes.build_scratch_size
        );
        self.state = BuildState::Sized(sizes);
        Ok(sizes)
    }

    /// Create the storage buffer, the structure on top of it, and the scratch buffer. Moves `Sized` to `Allocated`.
    pub fn allocate(&mut self, allocator: &mut A) -> Result<()> {
        let sizes = match &self.state {
            BuildState::Sized(sizes) => *sizes,
            other => return check_stage(BuildStage::Sized, other.stage()),
        };

        let buffer = Buffer::new(self.device.clone(), allocator, sizes.size, STORAGE_USAGE, MemoryType::GpuOnly)?;
        let structure = RawAccelerationStructure::new(self.device.clone(), self.ty, buffer.view_full())?;

        let alignment = self
            .device
            .acceleration_structure_properties()?
            .min_acceleration_structure_scratch_offset_alignment as vk::DeviceSize;
        let mut scratch = Buffer::new(self.device.clone(), allocator, sizes.build_scratch_size, SCRATCH_USAGE, MemoryType::GpuOnly)?;
        let padding = scratch_padding(scratch.address(), alignment);
        if padding != 0 {
            scratch = Buffer::new(
                self.device.clone(),
                allocator,
                sizes.build_scratch_size + padding,
                SCRATCH_USAGE,
                MemoryType::GpuOnly,
            )?;
        }
        let scratch_address = align(scratch.address(), alignment.max(1));

        self.state = BuildState::Allocated {
            structure,
            buffer,
            scratch,
            scratch_address,
        };
        Ok(())
    }

    /// Record and execute the build, then query the device address. Blocks until the build is done.
    /// The scratch buffer is released afterwards. Moves `Allocated` to `Built`.
    pub fn build(&mut self, exec: &ExecutionManager) -> Result<()> {
        let address = match &self.state {
            BuildState::Allocated {
                structure,
                scratch_address,
                ..
            } => {
                let info = self.build_info().dst(structure).scratch_data(*scratch_address);
                exec.execute_once(|cmd| {
                    cmd.build_acceleration_structure(&info)?;
                    Ok(())
                })?;
                structure.query_address()?
            }
            other => return check_stage(BuildStage::Allocated, other.stage()),
        };
        ensure!(address != 0, "built acceleration structure reported a null device address");
        info!("Built {:?} acceleration structure at address {:#x}", self.ty, address);

        self.state = match std::mem::replace(&mut self.state, BuildState::Unbuilt) {
            BuildState::Allocated {
                structure,
                buffer,
                ..
            } => BuildState::Built {
                structure,
                buffer,
                address,
            },
            other => other,
        };
        Ok(())
    }

    /// The device address of the built structure.
    /// # Errors
    /// Fails with [`Error::InvalidBuildState`] before the build has finished.
    pub fn address(&self) -> Result<vk::DeviceAddress> {
        match &self.state {
            BuildState::Built {
                address,
                ..
            } => Ok(*address),
            other => Err(Error::InvalidBuildState {
                expected: BuildStage::Built,
                actual: other.stage(),
            }
            .into()),
        }
    }

    /// Turn a finished build into an [`AccelerationStructure`].
    pub fn finish(self) -> Result<AccelerationStructure<A>> {
        let Self {
            geometry,
            primitive_count,
            state,
            ..
        } = self;
        match state {
            BuildState::Built {
                structure,
                buffer,
                address,
            } => Ok(AccelerationStructure::from_parts(structure, buffer, address, geometry, primitive_count)),
            other => Err(Error::InvalidBuildState {
                expected: BuildStage::Built,
                actual: other.stage(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_buffer_has_no_device_address() {
        assert_eq!(STORAGE_USAGE, vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR);
        assert!(!STORAGE_USAGE.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
        assert!(SCRATCH_USAGE.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
    }

    #[test]
    fn matching_stage_passes() {
        assert!(check_stage(BuildStage::Unbuilt, BuildStage::Unbuilt).is_ok());
        assert!(check_stage(BuildStage::Built, BuildStage::Built).is_ok());
    }

    #[test]
    fn out_of_order_step_reports_both_stages() {
        let err = check_stage(BuildStage::Sized, BuildStage::Unbuilt).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::InvalidBuildState {
                expected,
                actual,
            }) => {
                assert_eq!(*expected, BuildStage::Sized);
                assert_eq!(*actual, BuildStage::Unbuilt);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_state_reports_unbuilt() {
        let state = BuildState::<DedicatedAllocator>::Unbuilt;
        assert_eq!(state.stage(), BuildStage::Unbuilt);
        let state = BuildState::<DedicatedAllocator>::Sized(AccelerationStructureBuildSize::default());
        assert_eq!(state.stage(), BuildStage::Sized);
    }

    #[test]
    fn aligned_scratch_needs_no_padding() {
        assert_eq!(scratch_padding(0x1000, 128), 0);
        assert_eq!(scratch_padding(0x1080, 128), 0);
        assert_eq!(scratch_padding(0x1001, 1), 0);
    }

    #[test]
    fn misaligned_scratch_is_padded_by_alignment() {
        assert_eq!(scratch_padding(0x1010, 128), 128);
        assert_eq!(align(0x1010u64, 128u64), 0x1080);
    }
}
