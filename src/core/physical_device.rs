use std::ffi::CStr;

use anyhow::Result;
use ash::vk;

use crate::core::queue::QueueInfo;
use crate::util::string::wrap_c_str;
use crate::{AppSettings, Error, Instance};

/// Stores queried properties of a Vulkan extension.
#[derive(Debug, Default, Clone)]
pub struct ExtensionProperties {
    /// Name of the extension.
    pub name: String,
    /// Specification version of the extension.
    pub spec_version: u32,
}

/// Device extensions that a ray tracing context cannot work without.
pub(crate) fn raytracing_extension_names() -> [&'static CStr; 3] {
    [
        ash::extensions::khr::AccelerationStructure::name(),
        ash::extensions::khr::RayTracingPipeline::name(),
        ash::extensions::khr::DeferredHostOperations::name(),
    ]
}

/// A physical device abstracts away an actual device, like a graphics card or integrated graphics card.
#[derive(Default, Debug)]
pub struct PhysicalDevice {
    /// Handle to the [`VkPhysicalDevice`](vk::PhysicalDevice).
    handle: vk::PhysicalDevice,
    /// [`VkPhysicalDeviceProperties`](vk::PhysicalDeviceProperties) structure with properties of this physical device.
    properties: vk::PhysicalDeviceProperties,
    /// Memory types and heaps of the device. Used to select memory types for allocations.
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Shader group handle size and alignment, needed to lay out the shader binding table.
    raytracing_properties: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR,
    /// Scratch buffer alignment for acceleration structure builds.
    acceleration_structure_properties: vk::PhysicalDeviceAccelerationStructurePropertiesKHR,
    /// Available Vulkan extensions.
    extension_properties: Vec<ExtensionProperties>,
    /// List of [`VkQueueFamilyProperties`](vk::QueueFamilyProperties) with properties of each queue family on the device.
    queue_families: Vec<vk::QueueFamilyProperties>,
    /// The queue all work is submitted to.
    queue: QueueInfo,
}

// SAFETY: The only pointers in the property structs are p_next chain pointers, which are reset to null after querying.
unsafe impl Send for PhysicalDevice {}
unsafe impl Sync for PhysicalDevice {}

impl PhysicalDevice {
    /// Selects the first physical device matching the given requirements.
    pub fn select(instance: &Instance, settings: &AppSettings) -> Result<Self> {
        let devices = unsafe { instance.enumerate_physical_devices()? };
        if devices.is_empty() {
            return Err(anyhow::Error::from(Error::NoGPU));
        }

        devices
            .iter()
            .find_map(|device| -> Option<PhysicalDevice> {
                let extension_properties: Vec<ExtensionProperties> = unsafe {
                    instance
                        .enumerate_device_extension_properties(*device)
                        .ok()?
                        .iter()
                        .map(|vk_properties| ExtensionProperties {
                            name: wrap_c_str(vk_properties.extension_name.as_ptr()),
                            spec_version: vk_properties.spec_version,
                        })
                        .collect()
                };

                let mut physical_device = PhysicalDevice {
                    handle: *device,
                    properties: unsafe { instance.get_physical_device_properties(*device) },
                    memory_properties: unsafe { instance.get_physical_device_memory_properties(*device) },
                    extension_properties,
                    queue_families: unsafe { instance.get_physical_device_queue_family_properties(*device) },
                    ..Default::default()
                };

                let name = unsafe { CStr::from_ptr(physical_device.properties.device_name.as_ptr()) };

                if settings.gpu_requirements.dedicated && physical_device.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
                    return None;
                }
                if settings.gpu_requirements.min_video_memory > total_video_memory(&physical_device) {
                    return None;
                }
                if settings.gpu_requirements.min_dedicated_video_memory > total_device_memory(&physical_device) {
                    return None;
                }

                let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE;
                let family_index = physical_device
                    .queue_families
                    .iter()
                    .position(|family| family.queue_flags.contains(required))?;
                physical_device.queue = QueueInfo {
                    family_index: family_index as u32,
                    flags: physical_device.queue_families[family_index].queue_flags,
                };

                if !settings
                    .gpu_requirements
                    .device_extensions
                    .iter()
                    .all(|requested| physical_device.supports_extension(requested))
                {
                    return None;
                }

                if settings.raytracing {
                    let missing = raytracing_extension_names()
                        .into_iter()
                        .map(|ext| ext.to_string_lossy())
                        .find(|ext| !physical_device.supports_extension(ext));
                    if let Some(missing) = missing {
                        info!("Skipping physical device {:?}: missing extension {}.", name, missing);
                        return None;
                    }
                    physical_device.query_raytracing_properties(instance);
                }

                info!(
                    "Picked physical device {:?}, driver version {:?}.",
                    name, physical_device.properties.driver_version
                );
                info!(
                    "Device has {} bytes of available video memory, of which {} are device local.",
                    total_video_memory(&physical_device),
                    total_device_memory(&physical_device)
                );
                Some(physical_device)
            })
            .ok_or_else(|| anyhow::Error::from(Error::NoGPU))
    }

    fn query_raytracing_properties(&mut self, instance: &Instance) {
        let mut raytracing = vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default();
        let mut acceleration_structure = vk::PhysicalDeviceAccelerationStructurePropertiesKHR::default();
        {
            let mut properties = vk::PhysicalDeviceProperties2::builder()
                .push_next(&mut raytracing)
                .push_next(&mut acceleration_structure);
            unsafe { instance.get_physical_device_properties2(self.handle, &mut properties) };
        }
        raytracing.p_next = std::ptr::null_mut();
        acceleration_structure.p_next = std::ptr::null_mut();
        info!(
            "Shader group handle size {}, handle alignment {}, base alignment {}.",
            raytracing.shader_group_handle_size, raytracing.shader_group_handle_alignment, raytracing.shader_group_base_alignment
        );
        self.raytracing_properties = raytracing;
        self.acceleration_structure_properties = acceleration_structure;
    }

    /// Check whether the device exposes an extension with this name.
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extension_properties.iter().any(|ext| ext.name == name)
    }

    /// Get all queue families available on this device
    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        self.queue_families.as_slice()
    }

    /// Get the queue selected for submitting work
    pub fn queue(&self) -> &QueueInfo {
        &self.queue
    }

    /// Get unsafe access to the physical device handle
    /// # Safety
    /// Any vulkan calls that mutate the physical device may put the system in an undefined state.
    pub unsafe fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Get the device properties
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Get the memory types and heaps of this device
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Get the ray tracing pipeline properties. Only filled in when ray tracing was requested.
    pub fn raytracing_properties(&self) -> &vk::PhysicalDeviceRayTracingPipelinePropertiesKHR {
        &self.raytracing_properties
    }

    /// Get the acceleration structure properties. Only filled in when ray tracing was requested.
    pub fn acceleration_structure_properties(&self) -> &vk::PhysicalDeviceAccelerationStructurePropertiesKHR {
        &self.acceleration_structure_properties
    }
}

fn total_video_memory(device: &PhysicalDevice) -> usize {
    device
        .memory_properties
        .memory_heaps
        .iter()
        .take(device.memory_properties.memory_heap_count as usize)
        .map(|heap| heap.size as usize)
        .sum()
}

fn total_device_memory(device: &PhysicalDevice) -> usize {
    device
        .memory_properties
        .memory_heaps
        .iter()
        .take(device.memory_properties.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size as usize)
        .sum()
}
