//! Exposes the single device queue all firstlight work is submitted to.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use ash::vk;

use crate::command_buffer::command_pool::CommandPool;
use crate::{Device, Error, Fence};

/// Stores all information of a queue that was found on the physical device.
#[derive(Default, Debug, Copy, Clone)]
pub struct QueueInfo {
    /// The queue family index.
    pub family_index: u32,
    /// All supported operations on this queue.
    pub flags: vk::QueueFlags,
}

/// Exposes a logical command queue on the device, together with the transient command pool
/// that one-time command buffers are allocated from.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Queue {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: Mutex<vk::Queue>,
    pool: CommandPool,
    info: QueueInfo,
}

impl Queue {
    pub(crate) fn new(device: Device, info: QueueInfo) -> Result<Self> {
        let handle = unsafe { device.get_device_queue(info.family_index, 0) };
        // Command buffers are allocated and freed for every single submission
        let pool = CommandPool::new(device.clone(), info.family_index, vk::CommandPoolCreateFlags::TRANSIENT)?;
        Ok(Queue {
            device,
            handle: Mutex::new(handle),
            pool,
            info,
        })
    }

    fn acquire_device_queue(&self) -> Result<MutexGuard<vk::Queue>> {
        Ok(self.handle.lock().map_err(|_| Error::PoisonError)?)
    }

    /// Submits a batch of submissions to the queue, and signals the given fence when the
    /// submission is done
    pub fn submit(&self, submits: &[vk::SubmitInfo], fence: Option<&Fence>) -> Result<()> {
        let fence = match fence {
            None => vk::Fence::null(),
            Some(fence) => unsafe { fence.handle() },
        };
        let queue = self.acquire_device_queue()?;
        unsafe { Ok(self.device.queue_submit(*queue, submits, fence)?) }
    }

    /// Block until all work on this queue has completed.
    pub fn wait_idle(&self) -> Result<()> {
        let queue = self.acquire_device_queue()?;
        unsafe { Ok(self.device.queue_wait_idle(*queue)?) }
    }

    /// Allocate a single primary command buffer from the transient pool.
    pub(crate) fn allocate_command_buffer(&self) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            p_next: std::ptr::null(),
            command_pool: unsafe { self.pool.handle() },
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
        };
        unsafe { self.device.allocate_command_buffers(&info)? }
            .into_iter()
            .next()
            .ok_or_else(|| Error::Uncategorized("Command buffer allocation failed.").into())
    }

    /// Instantly delete a command buffer, without taking synchronization into account.
    /// # Safety
    /// The command buffer must not be pending execution.
    pub(crate) unsafe fn free_command_buffer(&self, cmd: vk::CommandBuffer) {
        self.device.free_command_buffers(self.pool.handle(), std::slice::from_ref(&cmd));
    }

    /// Information about this queue, such as supported operations and family index.
    pub fn info(&self) -> &QueueInfo {
        &self.info
    }
}
