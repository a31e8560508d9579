//! GPU context management.

use crate::device::{create_device, required_device_extensions, DeviceSelector, QueueFamilies, Queues};
use crate::error::{GpuError, Result};
use crate::instance::create_instance;
use crate::surface::SurfaceContext;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Main GPU context holding the negotiated Vulkan objects.
///
/// Owns the instance, the presentation surface, and the logical device;
/// teardown mirrors reverse creation order.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    surface: SurfaceContext,
    physical_device: vk::PhysicalDevice,
    families: QueueFamilies,
    device: ash::Device,
    queues: Queues,
}

impl GpuContext {
    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the graphics and presentation queue family indices.
    pub fn families(&self) -> QueueFamilies {
        self.families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.queues.graphics
    }

    /// Get the presentation queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.queues.present
    }

    /// Wait for the device to go idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.surface.destroy();
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context against a window.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Lumen".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Negotiate instance, surface, physical device, and logical device.
    ///
    /// Any creation failure aborts the remaining steps and destroys what
    /// was already built.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::DeviceCreation(format!("Failed to load Vulkan: {e}")))?;

        let display = window.display_handle().map_err(|e| {
            GpuError::SurfaceCreation(format!("Failed to get display handle: {e}"))
        })?;

        let instance = unsafe {
            create_instance(
                &entry,
                &self.app_name,
                display.as_raw(),
                self.enable_validation,
            )
        }?;

        let surface = match unsafe { SurfaceContext::from_window(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        let selected = unsafe { DeviceSelector::new(&instance) }.and_then(|selector| unsafe {
            selector.select(&instance, &surface, &required_device_extensions())
        });
        let (physical_device, families) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe {
                    surface.destroy();
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let (device, queues) = match unsafe { create_device(&instance, physical_device, families) }
        {
            Ok(created) => created,
            Err(e) => {
                unsafe {
                    surface.destroy();
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "GPU ready (graphics family {}, present family {})",
            families.graphics,
            families.present
        );

        Ok(GpuContext {
            entry,
            instance,
            surface,
            physical_device,
            families,
            device,
            queues,
        })
    }
}
