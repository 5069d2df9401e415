use anyhow::Result;
use ash::vk::Handle;

use firstlight::ExtensionID;

mod framework;

#[test]
pub fn can_initialize() -> Result<()> {
    let Some(_context) = framework::make_context() else {
        return Ok(());
    };
    Ok(())
}

#[test]
pub fn raytracing_extensions_enabled() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };
    assert!(context.device.is_extension_enabled(ExtensionID::AccelerationStructure));
    assert!(context.device.is_extension_enabled(ExtensionID::RayTracingPipeline));
    assert!(context.device.acceleration_structure().is_ok());
    assert!(context.device.raytracing_pipeline().is_ok());
    Ok(())
}

#[test]
pub fn raytracing_properties_are_sane() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };
    let rt = context.device.raytracing_properties()?;
    assert!(rt.shader_group_handle_size > 0);
    assert!(rt.shader_group_handle_alignment.is_power_of_two());
    let accel = context.device.acceleration_structure_properties()?;
    assert!(accel.min_acceleration_structure_scratch_offset_alignment.is_power_of_two());
    Ok(())
}

#[test]
pub fn execute_once_returns_callback_value() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };
    let value = context.exec.execute_once(|cmd| {
        assert_ne!(unsafe { cmd.handle().as_raw() }, 0);
        Ok(42)
    })?;
    assert_eq!(value, 42);
    Ok(())
}

#[test]
pub fn execute_once_propagates_callback_error() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };
    let result = context.exec.execute_once(|_| -> Result<()> { anyhow::bail!("callback failed") });
    assert!(result.is_err());
    // The queue is still usable afterwards.
    context.exec.execute_once(|_| Ok(()))?;
    Ok(())
}

#[test]
pub fn failed_callbacks_release_their_command_buffers() -> Result<()> {
    let Some(context) = framework::make_context() else {
        return Ok(());
    };
    for attempt in 0..64 {
        let result = context.exec.execute_once(|_| -> Result<()> { anyhow::bail!("attempt {attempt} failed") });
        assert!(result.is_err());
    }
    let value = context.exec.execute_once(|_| Ok(7))?;
    assert_eq!(value, 7);
    context.device.wait_idle()?;
    Ok(())
}

#[test]
pub fn validation_falls_back_when_layer_is_missing() -> Result<()> {
    let settings = firstlight::AppBuilder::new()
        .name("firstlight validation test")
        .validation(true)
        .raytracing(true)
        .build();
    let Ok((instance, _physical_device, device, _allocator, _exec, debug_messenger)) = firstlight::initialize(&settings) else {
        return Ok(());
    };
    assert_eq!(
        debug_messenger.is_some(),
        instance.validation_enabled(),
        "A debug messenger exists exactly when the validation layer could be enabled."
    );
    device.wait_idle()?;
    Ok(())
}
