use std::slice;

use anyhow::Result;
use ash::vk;

use crate::Device;

/// Wrapper around a [`VkFence`](vk::Fence) object. Fences are used for CPU-GPU sync.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Fence {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::Fence,
}

impl Fence {
    /// Create a new fence, possibly in the signaled status.
    pub fn new(device: Device, signaled: bool) -> Result<Self> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
        };
        let handle = unsafe { device.create_fence(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkFence {handle:p}");
        Ok(Fence {
            device,
            handle,
        })
    }

    /// Waits for the fence to be signaled with no timeout. Note that this is a blocking call.
    pub fn wait(&self) -> Result<()> {
        unsafe { Ok(self.device.wait_for_fences(slice::from_ref(&self.handle), true, u64::MAX)?) }
    }

    /// Get unsafe access to the underlying `VkFence`.
    /// # Safety
    /// The caller must not destroy this fence.
    pub unsafe fn handle(&self) -> vk::Fence {
        self.handle
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkFence {:p}", self.handle);
        unsafe {
            self.device.destroy_fence(self.handle, None);
        }
    }
}
