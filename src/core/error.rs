//! Exposes the firstlight error type

use std::ffi::NulError;
use std::sync::PoisonError;

use ash;
use ash::vk;
use gpu_allocator::AllocationError;
use thiserror::Error;

use crate::core::device::ExtensionID;
use crate::resource::raytracing::BuildStage;

/// Error type that firstlight can return. All functions return `anyhow::Result`, so to inspect a specific
/// failure use `err.downcast_ref::<Error>()`.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load the Vulkan library.
    #[error("Failed to load Vulkan.")]
    LoadFailed(ash::LoadingError),
    /// Could not convert rust string to C-String because it has null bytes
    #[error("Invalid C string")]
    InvalidString(NulError),
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(vk::Result),
    /// The Vulkan loader is older than the 1.2 API firstlight needs.
    #[error("Vulkan {major}.{minor} loader found, but firstlight needs at least Vulkan 1.2.")]
    UnsupportedApiVersion {
        /// Major version reported by the loader
        major: u32,
        /// Minor version reported by the loader
        minor: u32,
    },
    /// No suitable GPU found.
    #[error("No physical device found matching requirements.")]
    NoGPU,
    /// No memory type satisfies both the type mask of the memory requirements and the requested properties.
    #[error("No memory type in mask {type_bits:#b} supports properties {flags:?}.")]
    NoMemoryType {
        /// `memoryTypeBits` of the memory requirements.
        type_bits: u32,
        /// Requested property flags.
        flags: vk::MemoryPropertyFlags,
    },
    /// Pooled allocation error.
    #[error("Vulkan allocation error: `{0}`")]
    AllocationError(AllocationError),
    /// Tried to upload more bytes than the buffer holds.
    #[error("Upload of {len} bytes does not fit in buffer of {size} bytes.")]
    UploadOutOfRange {
        /// Length of the data
        len: u64,
        /// Size of the destination buffer
        size: u64,
    },
    /// Buffer view out of range of original buffer
    #[error("Buffer view is not a valid range in the parent buffer.")]
    BufferViewOutOfRange,
    /// Mappable buffer expected
    #[error("Requested host access, but buffer memory is not host visible")]
    UnmappableBuffer,
    /// Function call requires extension to be enabled, but this extension was not requested or not available.
    #[error("Extension {0} required for this feature, but not enabled.")]
    ExtensionNotSupported(ExtensionID),
    /// An acceleration structure build step was called out of order.
    #[error("Acceleration structure build step requires state {expected:?}, but the build is {actual:?}.")]
    InvalidBuildState {
        /// State the called step needs
        expected: BuildStage,
        /// State the builder is actually in
        actual: BuildStage,
    },
    /// An instance referenced a bottom level acceleration structure that has no device address yet.
    #[error("Instance references a bottom level acceleration structure that has not been built.")]
    BottomLevelNotBuilt,
    /// Creating the ray tracing pipeline failed.
    #[error("Failed to create ray tracing pipeline: `{0}`")]
    PipelineCreation(vk::Result),
    /// Fetching the shader group handles from the pipeline failed.
    #[error("Failed to get ray tracing shader group handles: `{0}`")]
    ShaderGroupHandles(vk::Result),
    /// Group index is outside the queried shader group handles.
    #[error("Shader group {group} out of range, only {count} groups were queried.")]
    ShaderGroupOutOfRange {
        /// Requested group
        group: u32,
        /// Number of groups in the handle blob
        count: u32,
    },
    /// The shader groups do not contain exactly one group of each role.
    #[error("Shader group table needs exactly one ray generation, miss and hit group: {0}")]
    ShaderGroupTableMismatch(String),
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl From<ash::LoadingError> for Error {
    fn from(value: ash::LoadingError) -> Self {
        Error::LoadFailed(value)
    }
}

impl From<NulError> for Error {
    fn from(value: NulError) -> Self {
        Error::InvalidString(value)
    }
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::VkError(value)
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Error::AllocationError(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
