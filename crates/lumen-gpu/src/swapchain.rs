//! Swapchain lifecycle.
//!
//! The swapchain is rebuilt wholesale (images, views, and the caller's
//! dependent frame buffers) whenever the presentation engine reports the
//! surface out of date; it is never partially rebuilt.

use crate::device::QueueFamilies;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use ash::vk;

/// Extent used when the surface reports the "undefined" sentinel.
pub const FALLBACK_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 1600,
    height: 900,
};

/// Outcome of a swapchain image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// An image was acquired. When `suboptimal`, the image is still usable
    /// for this frame but the swapchain should be rebuilt before the next
    /// acquire.
    Ready { image_index: u32, suboptimal: bool },
    /// No image was acquired; the swapchain must be rebuilt and the frame
    /// skipped.
    OutOfDate,
}

/// Swapchain wrapper owning the presentable images and their views.
pub struct Swapchain {
    /// Swapchain extension loader.
    pub loader: ash::khr::swapchain::Device,
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    families: QueueFamilies,
}

impl Swapchain {
    /// Create a new swapchain for the surface.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: &SurfaceContext,
        families: QueueFamilies,
    ) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(instance, device);
        let mut swapchain = Self {
            loader,
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
            families,
        };
        swapchain.build(device, physical_device, surface)?;
        Ok(swapchain)
    }

    /// Discard and recreate the swapchain, its images, and its views.
    ///
    /// Surface support is re-queried from scratch. The caller is responsible
    /// for rebuilding dependent frame buffers afterwards.
    ///
    /// # Safety
    /// No submitted work may still reference the old images.
    pub unsafe fn rebuild(
        &mut self,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: &SurfaceContext,
    ) -> Result<()> {
        self.destroy(device);
        self.build(device, physical_device, surface)
    }

    unsafe fn build(
        &mut self,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: &SurfaceContext,
    ) -> Result<()> {
        let support = surface.query_support(physical_device)?;

        let format = select_surface_format(&support.formats);
        let present_mode = select_present_mode(&support.present_modes);
        let extent = select_extent(&support.capabilities);
        let image_count = select_image_count(&support.capabilities);
        let (sharing_mode, family_indices) = self.families.sharing();

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let handle = self
            .loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;
        self.handle = handle;
        self.format = format;
        self.extent = extent;

        self.load_images()?;
        self.load_image_views(device)?;

        tracing::info!(
            "Swapchain built: {}x{}, {:?}, {} images",
            extent.width,
            extent.height,
            format.format,
            self.images.len()
        );

        Ok(())
    }

    /// Retrieve the presentable image handles from the driver.
    unsafe fn load_images(&mut self) -> Result<()> {
        self.images = self
            .loader
            .get_swapchain_images(self.handle)
            .map_err(|e| GpuError::ImageRetrieval(e.to_string()))?;
        Ok(())
    }

    /// Create one 2D color view per presentable image.
    unsafe fn load_image_views(&mut self, device: &ash::Device) -> Result<()> {
        self.image_views.clear();
        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );

            match device.create_image_view(&view_info, None) {
                Ok(view) => self.image_views.push(view),
                Err(e) => {
                    // No partially built view set escapes to the caller
                    for &view in &self.image_views {
                        device.destroy_image_view(view, None);
                    }
                    self.image_views.clear();
                    return Err(GpuError::ImageViewCreation(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Acquire the next presentable image.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireResult> {
        match self
            .loader
            .acquire_next_image(self.handle, timeout_ns, semaphore, vk::Fence::null())
        {
            Ok((image_index, suboptimal)) => Ok(AcquireResult::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(e) => Err(GpuError::FrameAcquisition(e)),
        }
    }

    /// Present an image on the given queue.
    ///
    /// Returns `true` when the presentation engine reported the swapchain
    /// out of date or suboptimal and a rebuild is needed.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool> {
        let swapchains = [self.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match self.loader.queue_present(queue, &present_info) {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(GpuError::Presentation(e)),
        }
    }

    /// Destroy the swapchain and its image views.
    ///
    /// # Safety
    /// The swapchain must not be in use. Views are destroyed before the
    /// swapchain handle, mirroring reverse creation order.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for &view in &self.image_views {
            device.destroy_image_view(view, None);
        }
        self.image_views.clear();
        self.images.clear();
        if self.handle != vk::SwapchainKHR::null() {
            self.loader.destroy_swapchain(self.handle, None);
            self.handle = vk::SwapchainKHR::null();
        }
    }
}

/// Select the surface format: prefer 8-bit BGR with a non-linear color
/// space, otherwise take the first reported format.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    for format in available {
        if format.format == vk::Format::B8G8R8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return *format;
        }
    }

    // The surface is guaranteed to report at least one format
    available[0]
}

/// Select the present mode: prefer low-latency mailbox, fall back to the
/// universally supported FIFO.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    for &mode in available {
        if mode == vk::PresentModeKHR::MAILBOX {
            return mode;
        }
    }
    vk::PresentModeKHR::FIFO
}

/// Select the extent: the surface's current extent unless it reports the
/// undefined sentinel, in which case a fixed default is substituted.
pub fn select_extent(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        FALLBACK_EXTENT
    }
}

/// Select the image count: one above the minimum, capped by the maximum
/// when the maximum is nonzero.
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn prefers_bgr_nonlinear_format() {
        let formats = vec![
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_surface_format(&formats).format, vk::Format::B8G8R8_SRGB);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = vec![
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        // Neither entry is the preferred one; the first wins, never an
        // arbitrary other
        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn bgr_format_with_wrong_color_space_is_not_preferred() {
        let formats = vec![
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn prefers_mailbox_present_mode() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn falls_back_to_fifo() {
        let modes = vec![vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn uses_current_extent_when_defined() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };
        assert_eq!(
            select_extent(&caps),
            vk::Extent2D {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn substitutes_fallback_for_undefined_extent() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            ..Default::default()
        };
        assert_eq!(select_extent(&caps), FALLBACK_EXTENT);
    }

    #[test]
    fn image_count_is_min_plus_one() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(select_image_count(&caps), 3);
    }

    #[test]
    fn image_count_clamped_to_nonzero_max() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(select_image_count(&caps), 3);
    }
}
