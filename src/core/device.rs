use std::collections::HashSet;
use std::ffi::{CString, NulError};
use std::fmt::Formatter;
use std::ops::Deref;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::physical_device::raytracing_extension_names;
use crate::util::string::unwrap_to_raw_strings;
use crate::{AppSettings, Error, Instance, PhysicalDevice};

/// Device extensions that firstlight enables on request.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum ExtensionID {
    AccelerationStructure,
    RayTracingPipeline,
}

impl std::fmt::Display for ExtensionID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
    queue_family: u32,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    raytracing_properties: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR,
    acceleration_structure_properties: vk::PhysicalDeviceAccelerationStructurePropertiesKHR,
    extensions: HashSet<ExtensionID>,
    #[derivative(Debug = "ignore")]
    acceleration_structure: Option<ash::extensions::khr::AccelerationStructure>,
    #[derivative(Debug = "ignore")]
    raytracing_pipeline: Option<ash::extensions::khr::RayTracingPipeline>,
}

/// Wrapper around a `VkDevice`. The device provides access to almost the entire
/// Vulkan API. Internal state is wrapped in an `Arc<DeviceInner>`, so this is safe
/// to clone
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

// SAFETY: The property structs only contain null p_next pointers, see PhysicalDevice.
unsafe impl Send for DeviceInner {}
unsafe impl Sync for DeviceInner {}

impl Device {
    /// Create a new Vulkan device on the queue family selected by the physical device.
    pub fn new(instance: &Instance, physical_device: &PhysicalDevice, settings: &AppSettings) -> Result<Self> {
        let priorities = [1.0f32];
        let queue_family = physical_device.queue().family_index;
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)
            .build();

        let mut extension_names: Vec<CString> = settings
            .gpu_requirements
            .device_extensions
            .iter()
            .map(|ext| CString::new(ext.clone()))
            .collect::<Result<Vec<CString>, NulError>>()?;

        let mut enabled_extensions = HashSet::new();
        if settings.raytracing {
            extension_names.extend(raytracing_extension_names().into_iter().map(CString::from));
            enabled_extensions.insert(ExtensionID::AccelerationStructure);
            enabled_extensions.insert(ExtensionID::RayTracingPipeline);
        }

        info!("Enabled device extensions:");
        for ext in &extension_names {
            info!("{:?}", ext);
        }

        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features {
            buffer_device_address: vk::TRUE,
            ..Default::default()
        };
        let mut features_acceleration_structure = vk::PhysicalDeviceAccelerationStructureFeaturesKHR {
            acceleration_structure: vk::TRUE,
            ..Default::default()
        };
        let mut features_raytracing_pipeline = vk::PhysicalDeviceRayTracingPipelineFeaturesKHR {
            ray_tracing_pipeline: vk::TRUE,
            ..Default::default()
        };

        let extension_names_raw = unwrap_to_raw_strings(extension_names.as_slice());
        let mut info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(extension_names_raw.as_slice())
            .enabled_features(&settings.gpu_requirements.features)
            .push_next(&mut features_1_2);
        if settings.raytracing {
            info = info
                .push_next(&mut features_acceleration_structure)
                .push_next(&mut features_raytracing_pipeline);
        }

        let handle = unsafe { instance.create_device(physical_device.handle(), &info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDevice {:p}", handle.handle());

        let (acceleration_structure, raytracing_pipeline) = if settings.raytracing {
            (
                Some(ash::extensions::khr::AccelerationStructure::new(instance, &handle)),
                Some(ash::extensions::khr::RayTracingPipeline::new(instance, &handle)),
            )
        } else {
            (None, None)
        };

        let inner = DeviceInner {
            handle,
            queue_family,
            properties: *physical_device.properties(),
            memory_properties: *physical_device.memory_properties(),
            raytracing_properties: *physical_device.raytracing_properties(),
            acceleration_structure_properties: *physical_device.acceleration_structure_properties(),
            extensions: enabled_extensions,
            acceleration_structure,
            raytracing_pipeline,
        };

        Ok(Device {
            inner: Arc::new(inner),
        })
    }

    /// Wait for the device to be completely idle.
    /// This should not be used as a synchronization measure, except on exit.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { Ok(self.inner.handle.device_wait_idle()?) }
    }

    /// Get unsafe access to the underlying VkDevice handle
    /// # Safety
    /// * The caller should not call `vkDestroyDevice` on this.
    /// * This handle is valid as long as there is a copy of `self` alive.
    pub unsafe fn handle(&self) -> ash::Device {
        self.inner.handle.clone()
    }

    /// Get the queue family all work is submitted on.
    pub fn queue_family(&self) -> u32 {
        self.inner.queue_family
    }

    /// Get the device properties
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.inner.properties
    }

    /// Get the memory types and heaps of the physical device.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.inner.memory_properties
    }

    /// Get the ray tracing pipeline properties, such as shader group handle size and alignment.
    pub fn raytracing_properties(&self) -> Result<&vk::PhysicalDeviceRayTracingPipelinePropertiesKHR> {
        self.require_extension(ExtensionID::RayTracingPipeline)?;
        Ok(&self.inner.raytracing_properties)
    }

    /// Get the acceleration structure properties.
    pub fn acceleration_structure_properties(&self) -> Result<&vk::PhysicalDeviceAccelerationStructurePropertiesKHR> {
        self.require_extension(ExtensionID::AccelerationStructure)?;
        Ok(&self.inner.acceleration_structure_properties)
    }

    /// Check if an extension is enabled.
    pub fn is_extension_enabled(&self, ext: ExtensionID) -> bool {
        self.inner.extensions.contains(&ext)
    }

    /// Returns an error if the extension is not enabled.
    pub fn require_extension(&self, ext: ExtensionID) -> Result<()> {
        if self.is_extension_enabled(ext) {
            Ok(())
        } else {
            Err(Error::ExtensionNotSupported(ext).into())
        }
    }

    /// Access to the function pointers for `VK_KHR_acceleration_structure`
    pub fn acceleration_structure(&self) -> Result<&ash::extensions::khr::AccelerationStructure> {
        self.inner
            .acceleration_structure
            .as_ref()
            .ok_or_else(|| Error::ExtensionNotSupported(ExtensionID::AccelerationStructure).into())
    }

    /// Access to the function pointers for `VK_KHR_ray_tracing_pipeline`
    pub fn raytracing_pipeline(&self) -> Result<&ash::extensions::khr::RayTracingPipeline> {
        self.inner
            .raytracing_pipeline
            .as_ref()
            .ok_or_else(|| Error::ExtensionNotSupported(ExtensionID::RayTracingPipeline).into())
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.inner.handle
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDevice {:p}", self.handle.handle());
        unsafe {
            self.handle.destroy_device(None);
        }
    }
}
