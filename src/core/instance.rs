//! Exposes the Vulkan instance. firstlight never presents, so the instance is always headless and
//! only needs the debug utils extension when validation is on.

use std::ffi::CString;
use std::ops::Deref;

use anyhow::Result;
use ash::vk;

use crate::util::string::{unwrap_to_raw_strings, wrap_c_str};
use crate::{AppSettings, Error};

/// Buffer device address and the ray tracing extensions need at least Vulkan 1.2.
pub const API_VERSION: u32 = vk::API_VERSION_1_2;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// The loaded Vulkan library together with a headless `VkInstance`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Instance {
    #[derivative(Debug = "ignore")]
    entry: ash::Entry,
    #[derivative(Debug = "ignore")]
    instance: ash::Instance,
    validation: bool,
}

fn supports_api_version(loader_version: u32) -> bool {
    (vk::api_version_major(loader_version), vk::api_version_minor(loader_version))
        >= (vk::api_version_major(API_VERSION), vk::api_version_minor(API_VERSION))
}

fn has_layer(layers: &[vk::LayerProperties], name: &str) -> bool {
    layers
        .iter()
        .any(|layer| unsafe { wrap_c_str(layer.layer_name.as_ptr()) } == name)
}

impl Instance {
    /// Load the Vulkan library and create the instance.
    /// # Errors
    /// * Fails if the Vulkan loader was not found.
    /// * Fails with [`Error::UnsupportedApiVersion`] if the loader is older than Vulkan 1.2.
    ///
    /// Requesting validation without the layer installed is not an error: a warning is logged and the
    /// instance is created without it. Check [`Instance::validation_enabled()`] afterwards.
    pub fn new(settings: &AppSettings) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let loader_version = entry.try_enumerate_instance_version()?.unwrap_or(vk::API_VERSION_1_0);
        if !supports_api_version(loader_version) {
            return Err(Error::UnsupportedApiVersion {
                major: vk::api_version_major(loader_version),
                minor: vk::api_version_minor(loader_version),
            }
            .into());
        }

        let validation = settings.enable_validation && {
            let found = has_layer(&entry.enumerate_instance_layer_properties()?, VALIDATION_LAYER);
            if !found {
                warn!("Validation requested, but {VALIDATION_LAYER} is not installed. Continuing without it.");
            }
            found
        };

        let instance = create_headless_instance(&entry, settings, validation)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkInstance {:p}", instance.handle());
        Ok(Instance {
            entry,
            instance,
            validation,
        })
    }

    /// Whether the validation layer and debug utils extension are enabled on this instance.
    pub fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Get unsafe access to the vulkan entry point.
    /// # Safety
    /// Any vulkan calls that modify the system's state may put the system in an undefined state.
    pub unsafe fn loader(&self) -> &ash::Entry {
        &self.entry
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkInstance {:p}", self.instance.handle());
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

fn create_headless_instance(entry: &ash::Entry, settings: &AppSettings, validation: bool) -> Result<ash::Instance> {
    let app_name = CString::new(settings.name.clone())?;
    let engine_name = CString::new("firstlight")?;
    let (major, minor, patch) = settings.version;
    let app_info = vk::ApplicationInfo::builder()
        .api_version(API_VERSION)
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, major, minor, patch))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0));

    let (layers, extensions): (Vec<CString>, Vec<CString>) = if validation {
        (
            vec![CString::new(VALIDATION_LAYER)?],
            vec![CString::from(ash::extensions::ext::DebugUtils::name())],
        )
    } else {
        (Vec::new(), Vec::new())
    };
    info!(
        "Creating Vulkan {}.{} instance, layers {:?}, extensions {:?}",
        vk::api_version_major(API_VERSION),
        vk::api_version_minor(API_VERSION),
        layers,
        extensions
    );

    let layers_raw = unwrap_to_raw_strings(&layers);
    let extensions_raw = unwrap_to_raw_strings(&extensions);
    let info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_layer_names(&layers_raw)
        .enabled_extension_names(&extensions_raw);

    Ok(unsafe { entry.create_instance(&info, None)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str) -> vk::LayerProperties {
        let mut layer = vk::LayerProperties::default();
        for (dst, src) in layer.layer_name.iter_mut().zip(name.bytes()) {
            *dst = src as std::ffi::c_char;
        }
        layer
    }

    #[test]
    fn loader_must_be_at_least_1_2() {
        assert!(!supports_api_version(vk::API_VERSION_1_0));
        assert!(!supports_api_version(vk::API_VERSION_1_1));
        assert!(supports_api_version(vk::API_VERSION_1_2));
        assert!(supports_api_version(vk::API_VERSION_1_3));
        assert!(supports_api_version(vk::make_api_version(0, 1, 2, 198)));
    }

    #[test]
    fn finds_validation_layer_by_name() {
        let layers = [layer("VK_LAYER_MESA_device_select"), layer(VALIDATION_LAYER)];
        assert!(has_layer(&layers, VALIDATION_LAYER));
        assert!(!has_layer(&layers[..1], VALIDATION_LAYER));
        assert!(!has_layer(&[], VALIDATION_LAYER));
    }
}
