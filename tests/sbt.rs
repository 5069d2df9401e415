use anyhow::Result;
use ash::vk;

use firstlight::{
    HandleLayout, RayTracingPipeline, RayTracingPipelineBuilder, Scene, ShaderBindingTable, ShaderCreateInfo, ShaderGroupHandles,
    ShaderGroupRole,
};

mod framework;

fn make_pipeline(context: &framework::Context) -> Result<Option<RayTracingPipeline>> {
    let Some(dir) = framework::shader_dir() else {
        eprintln!("skipping test, ray tracing shaders have not been compiled");
        return Ok(None);
    };
    // Hit group first, so the role table cannot be positional.
    let info = RayTracingPipelineBuilder::new("sbt test")
        .add_ray_hit_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::CLOSEST_HIT_KHR, dir.join("closesthit.rchit.spv"))?)
        .add_ray_gen_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::RAYGEN_KHR, dir.join("raygen.rgen.spv"))?)
        .add_ray_miss_group(ShaderCreateInfo::from_file(vk::ShaderStageFlags::MISS_KHR, dir.join("miss.rmiss.spv"))?)
        .build();
    Ok(Some(RayTracingPipeline::new(context.device.clone(), &info)?))
}

#[test]
pub fn records_match_queried_handles() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };
    let Some(pipeline) = make_pipeline(&context)? else {
        return Ok(());
    };
    assert_eq!(pipeline.group_count(), 3);
    assert_eq!(pipeline.group_table().index(ShaderGroupRole::Hit), 0);
    assert_eq!(pipeline.group_table().index(ShaderGroupRole::RayGen), 1);
    assert_eq!(pipeline.group_table().index(ShaderGroupRole::Miss), 2);

    let layout = HandleLayout::from_device(&context.device)?;
    let handles = ShaderGroupHandles::query(&context.device, &pipeline, layout)?;
    assert_eq!(handles.blob().len(), layout.blob_size(3));

    let sbt = ShaderBindingTable::new(context.device.clone(), &mut context.allocator, &pipeline, layout)?;
    assert_eq!(sbt.stride(), layout.aligned_size() as u64);
    for role in ShaderGroupRole::ALL {
        let buffer = sbt.buffer(role);
        assert_eq!(buffer.size(), layout.aligned_size() as u64);
        assert_ne!(buffer.address(), 0);

        let bytes = buffer.read_bytes()?;
        let record = handles.record(pipeline.group_table().index(role))?;
        assert_eq!(&bytes[..layout.handle_size as usize], record, "{role:?} record should sit at offset 0");

        let region = sbt.region(role);
        assert_eq!(region.device_address, buffer.address());
        assert_eq!(region.stride, sbt.stride());
        assert_eq!(region.size, sbt.stride());
    }
    Ok(())
}

#[test]
pub fn scene_with_pipeline_has_sbt() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };
    let Some(pipeline) = make_pipeline(&context)? else {
        return Ok(());
    };
    let scene = Scene::build(context.device.clone(), &context.exec, &mut context.allocator, Some(&pipeline))?;
    let sbt = scene.sbt().expect("scene built with a pipeline should have an SBT");
    assert_ne!(sbt.region(ShaderGroupRole::RayGen).device_address, 0);
    Ok(())
}

#[test]
pub fn handle_layout_matches_device() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };
    let layout = HandleLayout::from_device(&context.device)?;
    assert!(layout.aligned_size() >= layout.handle_size);
    assert_eq!(layout.aligned_size() % layout.handle_alignment, 0);
    Ok(())
}
