//! Physical device selection and logical device creation.

use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use ash::vk;
use std::ffi::CStr;

/// Device extensions every selected GPU must carry.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Graphics and presentation queue family indices.
///
/// The two families may coincide; shared swapchain images use exclusive
/// sharing in that case and concurrent sharing with both indices otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Sharing mode and the family index list for swapchain images.
    pub fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.graphics == self.present {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (
                vk::SharingMode::CONCURRENT,
                vec![self.graphics, self.present],
            )
        }
    }
}

/// Graphics and presentation queue handles.
pub struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

/// Physical device selector.
///
/// Owns the enumerated device list as an explicit cache scoped to the
/// instance lifetime; dropping the selector (or the instance) invalidates it.
pub struct DeviceSelector {
    devices: Vec<vk::PhysicalDevice>,
}

impl DeviceSelector {
    /// Enumerate all physical devices exposed by the instance.
    ///
    /// # Safety
    /// The instance must be valid and must outlive the selector.
    pub unsafe fn new(instance: &ash::Instance) -> Result<Self> {
        let devices = instance.enumerate_physical_devices()?;
        tracing::debug!("Enumerated {} physical device(s)", devices.len());
        Ok(Self { devices })
    }

    /// Select the first device that carries every required extension and can
    /// both render and present to the given surface.
    ///
    /// Selection is pass/fail in enumeration order; no scoring.
    ///
    /// # Safety
    /// The instance and surface must be valid.
    pub unsafe fn select(
        &self,
        instance: &ash::Instance,
        surface: &SurfaceContext,
        required_extensions: &[&CStr],
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let mut suitable = None;
        for &device in &self.devices {
            let extensions = instance.enumerate_device_extension_properties(device)?;
            if has_all_extensions(&extensions, required_extensions) {
                suitable = Some(device);
                break;
            }
        }
        let device = suitable.ok_or(GpuError::NoSuitableDevice)?;

        let families = find_queue_families(instance, device, surface)?;
        Ok((device, families))
    }
}

/// Check that every required extension name appears in the reported list.
pub fn has_all_extensions(available: &[vk::ExtensionProperties], required: &[&CStr]) -> bool {
    required.iter().all(|&name| {
        available
            .iter()
            .any(|props| extension_name(props) == Some(name))
    })
}

fn extension_name(props: &vk::ExtensionProperties) -> Option<&CStr> {
    let bytes: &[u8] = unsafe {
        std::slice::from_raw_parts(props.extension_name.as_ptr().cast(), props.extension_name.len())
    };
    CStr::from_bytes_until_nul(bytes).ok()
}

/// Resolve the graphics and presentation queue families.
///
/// First match in each category via linear scan of the family properties.
///
/// # Safety
/// The instance, device, and surface must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: &SurfaceContext,
) -> Result<QueueFamilies> {
    let families = instance.get_physical_device_queue_family_properties(device);

    let mut graphics = None;
    let mut present = None;
    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(i);
        }
        if present.is_none() && surface.supports_present(device, i)? {
            present = Some(i);
        }
    }

    Ok(QueueFamilies {
        graphics: graphics.ok_or(GpuError::NoQueueSupport("no graphics-capable family"))?,
        present: present.ok_or(GpuError::NoQueueSupport(
            "no family can present to the surface",
        ))?,
    })
}

/// Create the logical device and retrieve its queues.
///
/// Requests one queue per distinct family at priority 1.0, enables exactly
/// the presentation extension set, and the non-solid fill mode feature used
/// for wireframe rasterization.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: QueueFamilies,
) -> Result<(ash::Device, Queues)> {
    let queue_priority = 1.0_f32;
    let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
        .queue_family_index(families.graphics)
        .queue_priorities(std::slice::from_ref(&queue_priority))];
    if families.present != families.graphics {
        queue_create_infos.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(families.present)
                .queue_priorities(std::slice::from_ref(&queue_priority)),
        );
    }

    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Wireframe rasterization needs non-solid fill modes
    let features = vk::PhysicalDeviceFeatures::default().fill_mode_non_solid(true);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

    let graphics = device.get_device_queue(families.graphics, 0);
    if graphics == vk::Queue::null() {
        device.destroy_device(None);
        return Err(GpuError::QueueRetrieval("graphics queue handle is null"));
    }
    let present = device.get_device_queue(families.present, 0);
    if present == vk::Queue::null() {
        device.destroy_device(None);
        return Err(GpuError::QueueRetrieval("present queue handle is null"));
    }

    Ok((device, Queues { graphics, present }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_char;

    fn ext(name: &str) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (i, b) in name.bytes().enumerate() {
            props.extension_name[i] = b as c_char;
        }
        props
    }

    #[test]
    fn all_extensions_present() {
        let available = vec![ext("VK_KHR_swapchain"), ext("VK_KHR_maintenance4")];
        assert!(has_all_extensions(&available, &[c"VK_KHR_swapchain"]));
        assert!(has_all_extensions(
            &available,
            &[c"VK_KHR_swapchain", c"VK_KHR_maintenance4"]
        ));
    }

    #[test]
    fn missing_extension_rejects_device() {
        let available = vec![ext("VK_KHR_maintenance4")];
        assert!(!has_all_extensions(&available, &[c"VK_KHR_swapchain"]));
    }

    #[test]
    fn prefix_does_not_match() {
        let available = vec![ext("VK_KHR_swapchain_mutable_format")];
        assert!(!has_all_extensions(&available, &[c"VK_KHR_swapchain"]));
    }

    #[test]
    fn empty_requirement_always_passes() {
        assert!(has_all_extensions(&[], &[]));
    }

    #[test]
    fn coinciding_families_share_exclusively() {
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let (mode, indices) = families.sharing();
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());
    }

    #[test]
    fn distinct_families_share_concurrently() {
        let families = QueueFamilies {
            graphics: 0,
            present: 2,
        };
        let (mode, indices) = families.sharing();
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![0, 2]);
    }
}
