//! Typed device addresses for acceleration structure build inputs.
//!
//! Builds always run on the device, so the host address half of the Vulkan unions is never used.

use ash::vk;

use crate::util::to_vk::AsVulkanType;

/// Device address of data the build only reads, such as vertex, index or instance data.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddressConst(pub vk::DeviceAddress);

/// Device address of data the build writes to. This is the scratch buffer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddressMut(pub vk::DeviceAddress);

impl DeviceAddressConst {
    /// A null address, for optional inputs such as the transform data.
    pub fn null() -> Self {
        Self(0)
    }

    /// Get the raw address
    pub fn get(&self) -> vk::DeviceAddress {
        self.0
    }
}

impl DeviceAddressMut {
    /// A null address
    pub fn null() -> Self {
        Self(0)
    }

    /// Get the raw address
    pub fn get(&self) -> vk::DeviceAddress {
        self.0
    }
}

impl From<vk::DeviceAddress> for DeviceAddressConst {
    fn from(value: vk::DeviceAddress) -> Self {
        Self(value)
    }
}

impl From<vk::DeviceAddress> for DeviceAddressMut {
    fn from(value: vk::DeviceAddress) -> Self {
        Self(value)
    }
}

impl AsVulkanType for DeviceAddressConst {
    type Output = vk::DeviceOrHostAddressConstKHR;

    fn as_vulkan(&self) -> Self::Output {
        vk::DeviceOrHostAddressConstKHR {
            device_address: self.0,
        }
    }
}

impl AsVulkanType for DeviceAddressMut {
    type Output = vk::DeviceOrHostAddressKHR;

    fn as_vulkan(&self) -> Self::Output {
        vk::DeviceOrHostAddressKHR {
            device_address: self.0,
        }
    }
}
