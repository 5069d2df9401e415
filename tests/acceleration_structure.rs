use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use firstlight::scene::{triangle_geometry, triangle_instance, TRIANGLE_INDICES, TRIANGLE_VERTICES};
use firstlight::{
    AccelerationStructure, AccelerationStructureBuilder, AccelerationStructureInstance, AccelerationStructureType, Allocator, BuildStage,
    Buffer, DedicatedAllocator, Error, InstanceBuffer, MemoryType, Scene,
};

mod framework;

const BUILD_INPUT: vk::BufferUsageFlags = vk::BufferUsageFlags::from_raw(
    vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR.as_raw() | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS.as_raw(),
);

fn expect_state_error(err: anyhow::Error, expected: BuildStage, actual: BuildStage) {
    match err.downcast_ref::<Error>() {
        Some(Error::InvalidBuildState {
            expected: e,
            actual: a,
        }) => {
            assert_eq!(*e, expected);
            assert_eq!(*a, actual);
        }
        other => panic!("expected invalid build state error, got {other:?}"),
    }
}

fn build_triangle_blas<A: Allocator>(context: &mut framework::Context<A>) -> Result<AccelerationStructure<A>> {
    let vertices = Buffer::from_slice(context.device.clone(), &mut context.allocator, BUILD_INPUT, MemoryType::CpuToGpu, &TRIANGLE_VERTICES)?;
    let indices = Buffer::from_slice(context.device.clone(), &mut context.allocator, BUILD_INPUT, MemoryType::CpuToGpu, &TRIANGLE_INDICES)?;
    let geometry = triangle_geometry(vertices.address(), indices.address());
    AccelerationStructure::build(
        context.device.clone(),
        &context.exec,
        &mut context.allocator,
        AccelerationStructureType::BottomLevel,
        geometry.into(),
        1,
    )
}

#[test]
pub fn build_bottom_level() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };

    let blas = build_triangle_blas(&mut context)?;
    assert_ne!(blas.address(), 0, "Built BLAS must have a device address.");
    assert_ne!(unsafe { blas.handle().as_raw() }, 0);
    assert_eq!(blas.ty(), AccelerationStructureType::BottomLevel);
    assert_eq!(blas.primitive_count(), 1);
    assert!(blas.buffer().size() > 0);
    assert_eq!(blas.buffer().usage(), vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR);
    assert_eq!(blas.buffer().address(), 0, "Only the structure itself is addressed, not its storage buffer.");
    Ok(())
}

#[test]
pub fn build_top_level_over_bottom_level() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };

    let blas = build_triangle_blas(&mut context)?;
    let instance = AccelerationStructureInstance::default()
        .mask(0xFF)
        .flags(vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE)
        .acceleration_structure(&blas)?;
    assert_eq!(instance.referenced_address(), blas.address());

    let instances = InstanceBuffer::new(context.device.clone(), &mut context.allocator, &[instance])?;
    assert_eq!(instances.buffer().size(), 64);
    let tlas = AccelerationStructure::build(
        context.device.clone(),
        &context.exec,
        &mut context.allocator,
        AccelerationStructureType::TopLevel,
        instances.geometry(vk::GeometryFlagsKHR::OPAQUE).into(),
        instances.count(),
    )?;
    assert_ne!(tlas.address(), 0, "Built TLAS must have a device address.");
    assert_ne!(tlas.address(), blas.address());
    assert_eq!(tlas.ty(), AccelerationStructureType::TopLevel);
    Ok(())
}

#[test]
pub fn top_level_cannot_reference_top_level() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };

    let scene = Scene::build(context.device.clone(), &context.exec, &mut context.allocator, None)?;
    let err = AccelerationStructureInstance::default()
        .acceleration_structure(scene.tlas())
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BottomLevelNotBuilt)));
    Ok(())
}

#[test]
pub fn instance_without_reference_fails() -> Result<()> {
    let err = triangle_instance(0).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BottomLevelNotBuilt)));
    Ok(())
}

#[test]
pub fn builder_walks_every_stage() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };

    let vertices = Buffer::from_slice(context.device.clone(), &mut context.allocator, BUILD_INPUT, MemoryType::CpuToGpu, &TRIANGLE_VERTICES)?;
    let indices = Buffer::from_slice(context.device.clone(), &mut context.allocator, BUILD_INPUT, MemoryType::CpuToGpu, &TRIANGLE_INDICES)?;
    let geometry = triangle_geometry(vertices.address(), indices.address());
    let mut builder = AccelerationStructureBuilder::<DedicatedAllocator>::new(
        context.device.clone(),
        AccelerationStructureType::BottomLevel,
        geometry.into(),
        1,
    )?;
    assert_eq!(builder.stage(), BuildStage::Unbuilt);

    expect_state_error(builder.build(&context.exec).unwrap_err(), BuildStage::Allocated, BuildStage::Unbuilt);
    expect_state_error(builder.address().unwrap_err(), BuildStage::Built, BuildStage::Unbuilt);
    assert_eq!(builder.stage(), BuildStage::Unbuilt, "A failed step must not change the stage.");

    let sizes = builder.query_sizes()?;
    assert!(sizes.size > 0);
    assert_eq!(builder.stage(), BuildStage::Sized);
    expect_state_error(builder.query_sizes().unwrap_err(), BuildStage::Unbuilt, BuildStage::Sized);

    builder.allocate(&mut context.allocator)?;
    assert_eq!(builder.stage(), BuildStage::Allocated);
    expect_state_error(builder.allocate(&mut context.allocator).unwrap_err(), BuildStage::Sized, BuildStage::Allocated);

    builder.build(&context.exec)?;
    assert_eq!(builder.stage(), BuildStage::Built);
    let address = builder.address()?;
    assert_ne!(address, 0);

    let blas = builder.finish()?;
    assert_eq!(blas.address(), address);
    Ok(())
}

#[test]
pub fn unfinished_build_cannot_finish() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };

    let geometry = triangle_geometry(0, 0);
    let builder = AccelerationStructureBuilder::<DedicatedAllocator>::new(
        context.device.clone(),
        AccelerationStructureType::BottomLevel,
        geometry.into(),
        1,
    )?;
    expect_state_error(builder.finish().unwrap_err(), BuildStage::Built, BuildStage::Unbuilt);
    Ok(())
}

#[test]
pub fn geometry_must_match_structure_type() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };

    let geometry = triangle_geometry(0, 0);
    let result = AccelerationStructureBuilder::<DedicatedAllocator>::new(
        context.device.clone(),
        AccelerationStructureType::TopLevel,
        geometry.into(),
        1,
    );
    assert!(result.is_err());
    Ok(())
}

#[test]
pub fn scene_builds_bottom_before_top() -> Result<()> {
    let Some(mut context) = framework::make_context() else {
        return Ok(());
    };

    let scene = Scene::build(context.device.clone(), &context.exec, &mut context.allocator, None)?;
    assert_ne!(scene.blas().address(), 0);
    assert_ne!(scene.tlas().address(), 0);
    assert_eq!(scene.blas().ty(), AccelerationStructureType::BottomLevel);
    assert_eq!(scene.tlas().ty(), AccelerationStructureType::TopLevel);
    assert!(scene.sbt().is_none());
    context.device.wait_idle()?;
    Ok(())
}

#[test]
pub fn build_bottom_level_with_pooled_allocator() -> Result<()> {
    let Some(mut context) = framework::make_pooled_context() else {
        return Ok(());
    };

    let blas = build_triangle_blas(&mut context)?;
    assert_ne!(blas.address(), 0, "BLAS on sub-allocated memory must have a device address.");
    assert_eq!(blas.primitive_count(), 1);
    assert!(blas.buffer().memory_size() >= blas.buffer().size());
    Ok(())
}

#[test]
pub fn scene_with_pooled_allocator() -> Result<()> {
    let Some(mut context) = framework::make_pooled_context() else {
        return Ok(());
    };

    let scene = Scene::build(context.device.clone(), &context.exec, &mut context.allocator, None)?;
    assert_ne!(scene.blas().address(), 0);
    assert_ne!(scene.tlas().address(), 0);
    context.device.wait_idle()?;
    Ok(())
}
