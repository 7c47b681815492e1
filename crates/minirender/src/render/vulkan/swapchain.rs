//! Vulkan swapchain management
//!
//! Handles swapchain creation and the format/extent negotiation behind it.
//! A swapchain is never patched: recreation drops the old one and builds a
//! fresh value from re-queried surface capabilities.

use ash::{vk, Device};
use ash::extensions::khr::Swapchain as SwapchainLoader;
use crate::render::vulkan::{DeviceContext, PresentationSurface, VulkanResult, VulkanError};

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a new swapchain
    ///
    /// `framebuffer_size` is only consulted when the surface leaves the
    /// extent up to the application. `min_frames` raises the image count so
    /// every frame slot can hold an image.
    pub fn new(
        context: &DeviceContext,
        surface: &PresentationSurface,
        framebuffer_size: (u32, u32),
        min_frames: u32,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let swapchain_loader = context.swapchain_loader().clone();
        let support = surface.query_support(context.physical_device().device)?;

        let format = choose_surface_format(&support.formats)
            .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, framebuffer_size);
        let image_count = choose_image_count(&support.capabilities, min_frames);

        let families = context.queue_families();
        let family_indices = [families.graphics, families.present];

        let mut swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        swapchain_create_info = if families.is_shared() {
            swapchain_create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            swapchain_create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            match unsafe { device.create_image_view(&create_info, None) } {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    unsafe {
                        for &view in &image_views {
                            device.destroy_image_view(view, None);
                        }
                        swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(VulkanError::Api(e));
                }
            }
        }

        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format,
            present_mode
        );

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Acquire the next presentable image
    ///
    /// `Ok(None)` means the surface is out of date and nothing was signaled.
    /// The boolean is the suboptimal flag.
    pub fn acquire_next_image(
        &self,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> VulkanResult<Option<(u32, bool)>> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(self.swapchain, timeout_ns, signal, vk::Fence::null())
        };
        match result {
            Ok(acquired) => Ok(Some(acquired)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Err(VulkanError::Timeout {
                what: "swapchain image",
                timeout_ns,
            }),
            Err(e) => Err(VulkanError::from(e)),
        }
    }

    /// Queue an image for presentation after `wait` signals
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> VulkanResult<PresentResult> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentResult::Optimal),
            Ok(true) => Ok(PresentResult::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
            Err(e) => Err(VulkanError::from(e)),
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images the driver actually created
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("Swapchain destroyed");
    }
}

/// Outcome of a present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    /// Presented and the surface still matches
    Optimal,
    /// Presented, but the surface no longer matches exactly
    Suboptimal,
    /// The surface changed and the swapchain must be rebuilt
    OutOfDate,
}

/// Pick the swapchain extent
///
/// A `current_extent` width of `u32::MAX` means the surface accepts any
/// size; the framebuffer size is then clamped into the allowed range.
/// Otherwise the surface dictates the extent.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, at least `min_frames`, capped by the surface
/// maximum when it has one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, min_frames: u32) -> u32 {
    let desired = (capabilities.min_image_count + 1).max(min_frames);
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Prefer 8-bit BGRA sRGB; fall back to whatever comes first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    // A single UNDEFINED entry leaves the choice to us
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return Some(preferred);
    }

    formats
        .iter()
        .find(|sf| sf.format == preferred.format && sf.color_space == preferred.color_space)
        .or_else(|| formats.first())
        .copied()
}

/// MAILBOX when offered, otherwise FIFO
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096));
        let extent = choose_extent(&caps, (1920, 1080));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn sentinel_extent_uses_framebuffer_size() {
        let caps = capabilities((u32::MAX, u32::MAX), (1, 1), (4096, 4096));
        let extent = choose_extent(&caps, (1920, 1080));
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn sentinel_extent_is_clamped_and_stable() {
        let caps = capabilities((u32::MAX, u32::MAX), (64, 64), (1024, 768));
        for size in [(0, 0), (10, 5000), (5000, 10), (800, 600), (u32::MAX, u32::MAX)] {
            let first = choose_extent(&caps, size);
            let second = choose_extent(&caps, size);
            assert_eq!((first.width, first.height), (second.width, second.height));
            assert!((64..=1024).contains(&first.width));
            assert!((64..=768).contains(&first.height));
        }
        let extent = choose_extent(&caps, (10, 5000));
        assert_eq!((extent.width, extent.height), (64, 768));
    }

    #[test]
    fn image_count_covers_frames_in_flight() {
        let mut caps = capabilities((800, 600), (1, 1), (4096, 4096));
        assert_eq!(choose_image_count(&caps, 2), 3);
        assert_eq!(choose_image_count(&caps, 5), 5);

        caps.max_image_count = 3;
        assert_eq!(choose_image_count(&caps, 5), 3);

        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps, 6), 6);
    }

    #[test]
    fn prefers_srgb_bgra_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(choose_surface_format(&formats[..1]).unwrap().format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn undefined_format_means_free_choice() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn mailbox_preferred_over_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }
}
