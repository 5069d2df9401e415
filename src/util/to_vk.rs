//! Conversions from firstlight wrapper types into the raw Vulkan structs passed to `ash`.

/// Convert an owned wrapper into its Vulkan counterpart.
pub trait IntoVulkanType {
    /// The Vulkan struct or enum produced
    type Output;

    /// Consume self and return the Vulkan value
    fn into_vulkan(self) -> Self::Output;
}

/// Borrowing conversion. The output may contain pointers into `self`, so it must not outlive it.
pub trait AsVulkanType {
    /// The Vulkan struct or enum produced
    type Output;

    /// Return the Vulkan value
    fn as_vulkan(&self) -> Self::Output;
}
