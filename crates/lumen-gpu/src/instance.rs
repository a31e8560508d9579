//! Vulkan instance creation.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

/// Validation layers to enable when requested.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Create a Vulkan instance.
///
/// The instance extension list comes from the windowing layer: the platform
/// reports which surface extensions its display handle needs.
///
/// # Safety
/// The entry must be a valid Vulkan entry point and the display handle must
/// outlive the returned instance.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display_handle: RawDisplayHandle,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::SurfaceCreation(format!("Invalid application name: {e}")))?;
    let engine_name = c"Lumen";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    #[cfg_attr(not(target_os = "macos"), allow(unused_mut))]
    let mut extension_names: Vec<*const i8> =
        ash_window::enumerate_required_extensions(display_handle)
            .map_err(GpuError::from)?
            .to_vec();

    #[cfg(target_os = "macos")]
    extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());

    // Check that requested layers are available; missing layers are skipped
    // with a warning rather than failing instance creation.
    let mut layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };
    let available_layers = entry.enumerate_instance_layer_properties()?;
    layers.retain(|layer| {
        let found = available_layers.iter().any(|props| {
            let name = unsafe { CStr::from_ptr(props.layer_name.as_ptr()) };
            name == *layer
        });
        if !found {
            tracing::warn!("Validation layer {:?} not available", layer);
        }
        found
    });
    let layer_names: Vec<*const i8> = layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = entry.create_instance(&create_info, None)?;

    Ok(instance)
}
