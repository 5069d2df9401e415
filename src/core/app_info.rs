//! Exposes all structs needed to store initialization parameters.

use ash::vk;

/// Minimum requirements for the GPU. This will be used to determine what physical device is selected, and enable
/// optional Vulkan features and extensions.
/// # Example
/// ```
/// # use firstlight::prelude::*;
/// let requirements = GPURequirements {
///     dedicated: true,
///     min_video_memory: 1024 * 1024 * 1024,
///     ..Default::default()
/// };
/// ```
#[derive(Default, Debug, Clone)]
pub struct GPURequirements {
    /// Whether a dedicated GPU is required. Setting this to true will discard integrated GPUs.
    pub dedicated: bool,
    /// Minimum amount of video memory required, in bytes. Note that this might count shared memory if RAM is shared.
    pub min_video_memory: usize,
    /// Minimum amount of dedicated video memory, in bytes. This only counts memory that is on the device.
    pub min_dedicated_video_memory: usize,
    /// Optional Vulkan 1.0 features that are required from the physical device.
    /// See also: [`VkPhysicalDeviceFeatures`](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPhysicalDeviceFeatures.html)
    pub features: vk::PhysicalDeviceFeatures,
    /// Additional Vulkan device extensions that should be present and enabled.
    pub device_extensions: Vec<String>,
}

/// Application settings used to initialize the firstlight context.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Application name. Possibly displayed in debugging tools.
    pub name: String,
    /// Application version.
    pub version: (u32, u32, u32),
    /// Enable Vulkan validation layers for additional debug output. For developing this should almost always be on.
    pub enable_validation: bool,
    /// Minimum requirements the selected physical device should have.
    pub gpu_requirements: GPURequirements,
    /// Whether to require the ray tracing extensions. When set, only devices supporting
    /// `VK_KHR_acceleration_structure`, `VK_KHR_ray_tracing_pipeline` and
    /// `VK_KHR_deferred_host_operations` are considered.
    pub raytracing: bool,
}

/// The app builder is a convenience struct to easily create [`AppSettings`].
///
/// # Example
/// ```
/// # use firstlight::prelude::*;
/// let settings = AppBuilder::new()
///     .name("firstlight")
///     .validation(true)
///     .raytracing(true)
///     .build();
/// ```
pub struct AppBuilder {
    inner: AppSettings,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    /// Create a new app builder with default settings.
    pub fn new() -> Self {
        AppBuilder {
            inner: AppSettings {
                name: String::from(""),
                version: (0, 0, 0),
                enable_validation: false,
                gpu_requirements: GPURequirements::default(),
                raytracing: true,
            },
        }
    }

    /// Sets the application name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Sets the application version.
    pub fn version(mut self, ver: impl Into<(u32, u32, u32)>) -> Self {
        self.inner.version = ver.into();
        self
    }

    /// Enable the Vulkan validation layers.
    pub fn validation(mut self, val: bool) -> Self {
        self.inner.enable_validation = val;
        self
    }

    /// The gpu requirements that the physical device must satisfy.
    pub fn gpu(mut self, gpu: GPURequirements) -> Self {
        self.inner.gpu_requirements = gpu;
        self
    }

    /// Require the ray tracing extensions. On by default.
    pub fn raytracing(mut self, enabled: bool) -> Self {
        self.inner.raytracing = enabled;
        self
    }

    /// Build the resulting application settings.
    pub fn build(self) -> AppSettings {
        self.inner
    }
}
