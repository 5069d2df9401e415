#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::Result;
use firstlight::{
    Allocator, AppBuilder, AppSettings, Context as Parts, DedicatedAllocator, DefaultAllocator, Device, ExecutionManager, GPURequirements,
    Instance, PhysicalDevice,
};

// Field order is drop order: everything created from the device goes before it.
#[derive(Debug)]
pub struct Context<A: Allocator = DedicatedAllocator> {
    pub exec: ExecutionManager,
    pub allocator: A,
    pub device: Device,
    pub phys_device: PhysicalDevice,
    pub instance: Instance,
}

fn settings() -> AppSettings {
    AppBuilder::new()
        .name("firstlight test framework")
        .version((0, 0, 1))
        .validation(false)
        .raytracing(true)
        .gpu(GPURequirements {
            dedicated: false,
            min_video_memory: 0,
            min_dedicated_video_memory: 0,
            ..Default::default()
        })
        .build()
}

fn into_context<A: Allocator>(parts: Result<Parts<A>>) -> Option<Context<A>> {
    match parts {
        Ok((instance, phys_device, device, allocator, exec, _)) => Some(Context {
            exec,
            allocator,
            device,
            phys_device,
            instance,
        }),
        Err(err) => {
            eprintln!("skipping test, no ray tracing context available: {err:?}");
            None
        }
    }
}

/// Creates a headless ray tracing context ready for automated tests. Returns `None` when there is no
/// Vulkan loader or no GPU with ray tracing support, so tests can pass trivially on such machines.
pub fn make_context() -> Option<Context> {
    let _ = pretty_env_logger::try_init();
    into_context(firstlight::initialize(&settings()))
}

/// Same as [`make_context`], but everything is allocated through the pooled `gpu_allocator` backend.
pub fn make_pooled_context() -> Option<Context<DefaultAllocator>> {
    let _ = pretty_env_logger::try_init();
    into_context(firstlight::initialize_with_allocator(&settings(), DefaultAllocator::new))
}

/// Directory with the compiled ray tracing shaders, if they have been built.
pub fn shader_dir() -> Option<PathBuf> {
    let dir = std::env::var_os("FIRSTLIGHT_SHADER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/spv")));
    let complete = ["raygen.rgen.spv", "miss.rmiss.spv", "closesthit.rchit.spv"]
        .iter()
        .all(|file| dir.join(file).exists());
    complete.then_some(dir)
}
