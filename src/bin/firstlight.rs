//! Builds the one-triangle scene once, waits for the device to go idle and exits.
//!
//! Set `FIRSTLIGHT_SHADER_DIR` to the directory holding the compiled ray tracing shaders. Without
//! them, the acceleration structures are still built but the shader binding table is skipped.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use log::{error, info, warn};

use firstlight::prelude::*;

const SHADER_DIR_VAR: &str = "FIRSTLIGHT_SHADER_DIR";

fn shader_dir() -> PathBuf {
    std::env::var_os(SHADER_DIR_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/spv")))
}

fn load_pipeline(device: &Device) -> Result<Option<RayTracingPipeline>> {
    let dir = shader_dir();
    let raygen = dir.join("raygen.rgen.spv");
    if !raygen.exists() {
        warn!(
            "No compiled shaders in {} (set {SHADER_DIR_VAR} or build with the shaderc feature), skipping the shader binding table",
            dir.display()
        );
        return Ok(None);
    }

    let info = RayTracingPipelineBuilder::new("firstlight")
        .add_ray_gen_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::RAYGEN_KHR, raygen)?)
        .add_ray_miss_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::MISS_KHR, dir.join("miss.rmiss.spv"))?)
        .add_ray_hit_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::CLOSEST_HIT_KHR, dir.join("closesthit.rchit.spv"))?)
        .build();
    Ok(Some(RayTracingPipeline::new(device.clone(), &info)?))
}

fn run() -> Result<()> {
    let settings = AppBuilder::new()
        .version((0, 1, 0))
        .name("firstlight")
        .validation(cfg!(debug_assertions))
        .raytracing(true)
        .build();
    let (_instance, _physical_device, device, mut allocator, exec, _debug_messenger) = firstlight::initialize(&settings)?;

    let pipeline = load_pipeline(&device)?;
    let scene = Scene::build(device.clone(), &exec, &mut allocator, pipeline.as_ref())?;
    info!("Scene ready: BLAS {:#x}, TLAS {:#x}", scene.blas().address(), scene.tlas().address());
    if let Some(sbt) = scene.sbt() {
        for role in ShaderGroupRole::ALL {
            let region = sbt.region(role);
            info!("SBT {role:?} record at {:#x} (stride {})", region.device_address, region.stride);
        }
    }

    device.wait_idle()?;
    Ok(())
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
