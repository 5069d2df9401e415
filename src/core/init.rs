//! Exposes methods to make initialization of the library easier without losing flexibility.

use anyhow::Result;

use crate::{Allocator, AppSettings, DebugMessenger, DedicatedAllocator, Device, ExecutionManager, Instance, PhysicalDevice};

/// All objects needed to build acceleration structures and shader binding tables, in the order
/// they are created.
pub type Context<A> = (Instance, PhysicalDevice, Device, A, ExecutionManager, Option<DebugMessenger>);

/// Initialize the context with the dedicated allocator.
/// # Example
/// ```no_run
/// # use firstlight::prelude::*;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let settings = AppBuilder::new().name("firstlight").build();
/// let (instance, physical_device, device, mut allocator, exec, debug_messenger) = firstlight::initialize(&settings)?;
/// # Ok(())
/// # }
/// ```
pub fn initialize(settings: &AppSettings) -> Result<Context<DedicatedAllocator>> {
    initialize_with_allocator(settings, |_, _, device| Ok(DedicatedAllocator::new(device.clone())))
}

/// Initialize the context with a custom allocator
pub fn initialize_with_allocator<A: Allocator + 'static, F: FnOnce(&Instance, &PhysicalDevice, &Device) -> Result<A>>(
    settings: &AppSettings,
    make_alloc: F,
) -> Result<Context<A>> {
    let instance = Instance::new(settings)?;
    let debug_messenger = if instance.validation_enabled() {
        Some(DebugMessenger::new(&instance)?)
    } else {
        None
    };

    let physical_device = PhysicalDevice::select(&instance, settings)?;
    let device = Device::new(&instance, &physical_device, settings)?;
    let allocator = make_alloc(&instance, &physical_device, &device)?;
    let exec = ExecutionManager::new(device.clone(), &physical_device)?;

    Ok((instance, physical_device, device, allocator, exec, debug_messenger))
}
