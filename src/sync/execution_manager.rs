//! Exposes the [`ExecutionManager`], used to record and submit one-time command buffers.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use ash::vk;

use crate::core::queue::Queue;
use crate::{CommandBuffer, Device, Error, Fence, PhysicalDevice};

/// The execution manager owns the single queue firstlight submits to. The only way to run
/// commands is [`ExecutionManager::execute_once()`], which records, submits and waits for a
/// command buffer before returning. Calls are serialized through the queue lock.
///
/// # Example
/// ```
/// # use firstlight::prelude::*;
/// # use anyhow::Result;
/// fn build(exec: &ExecutionManager, info: &AccelerationStructureBuildInfo) -> Result<()> {
///     exec.execute_once(|cmd| {
///         cmd.build_acceleration_structure(info)?;
///         Ok(())
///     })
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionManager {
    device: Device,
    queue: Arc<Mutex<Queue>>,
}

/// How far a one-time submission got.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Progress {
    Recording,
    Submitted,
    Completed,
}

impl Progress {
    /// Whether the command buffer is known not to be pending on the GPU.
    fn is_settled(self) -> bool {
        self != Progress::Submitted
    }
}

impl ExecutionManager {
    /// Create a new execution manager on the queue selected by the physical device.
    pub fn new(device: Device, physical_device: &PhysicalDevice) -> Result<Self> {
        let queue = Queue::new(device.clone(), *physical_device.queue())?;
        info!(
            "Created device queue on family {} supporting {:?}",
            queue.info().family_index,
            queue.info().flags
        );
        Ok(ExecutionManager {
            device,
            queue: Arc::new(Mutex::new(queue)),
        })
    }

    fn lock_queue(&self) -> Result<MutexGuard<Queue>> {
        Ok(self.queue.lock().map_err(|_| Error::PoisonError)?)
    }

    /// Record commands into a fresh command buffer, submit it and block until the GPU is done with it.
    /// If the callback fails, nothing is submitted and its error is returned. The command buffer is freed
    /// unless a wait fails after submission and the device cannot be idled, in which case it is leaked
    /// instead of being freed while possibly pending.
    pub fn execute_once<R, F: FnOnce(&mut CommandBuffer) -> Result<R>>(&self, f: F) -> Result<R> {
        let queue = self.lock_queue()?;
        let fence = Fence::new(self.device.clone(), false)?;
        let handle = queue.allocate_command_buffer()?;
        let mut progress = Progress::Recording;
        let result = self.record_and_submit(&queue, handle, &fence, f, &mut progress);
        if result.is_err() && !progress.is_settled() {
            if let Err(err) = self.device.wait_idle() {
                error!("Leaking one-time command buffer {handle:?}, device did not become idle: {err}");
                // The fence may still be signaled by the pending submission.
                std::mem::forget(fence);
                return result;
            }
        }
        // SAFETY: The submission completed, nothing was submitted, or the device has gone idle.
        unsafe {
            queue.free_command_buffer(handle);
        }
        result
    }

    fn record_and_submit<R, F: FnOnce(&mut CommandBuffer) -> Result<R>>(
        &self,
        queue: &Queue,
        handle: vk::CommandBuffer,
        fence: &Fence,
        f: F,
        progress: &mut Progress,
    ) -> Result<R> {
        let mut cmd = CommandBuffer::new(self.device.clone(), handle);
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        let value = f(&mut cmd)?;
        cmd.end()?;

        let info = vk::SubmitInfo::builder()
            .command_buffers(std::slice::from_ref(&handle))
            .build();
        *progress = Progress::Submitted;
        queue.submit(std::slice::from_ref(&info), Some(fence))?;
        fence.wait()?;
        queue.wait_idle()?;
        *progress = Progress::Completed;
        Ok(value)
    }
}
