//! Presentable image chain
//!
//! Surface-format, present-mode and extent selection are pure functions so
//! they can be tested against synthetic capability tables. The chain itself
//! is whole-or-absent: construction either yields a fully built chain
//! (handle, images, views) or unwinds everything it created.

use ash::vk;
use nova_engine::nova::{Error, Result};
use nova_engine::{nova_err, nova_info, nova_warn};
use std::sync::Arc;

use crate::vulkan_context::GraphicsContext;
use crate::vulkan_device::SurfaceSupport;

/// Requested chain parameters
///
/// `preferred_format` is a wish, not a demand; selection falls back per
/// `choose_surface_format`. `window_extent` is only consulted when the
/// surface does not dictate an exact extent.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    pub window_extent: vk::Extent2D,
    pub preferred_format: vk::SurfaceFormatKHR,
    pub vsync: bool,
    pub triple_buffering: bool,
    /// Usage flags OR'd with COLOR_ATTACHMENT, for downstream passes that
    /// sample or copy from chain images
    pub extra_usage: vk::ImageUsageFlags,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            window_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            preferred_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vsync: true,
            triple_buffering: true,
            extra_usage: vk::ImageUsageFlags::empty(),
        }
    }
}

/// Pick a surface format: exact preferred match, then B8G8R8A8_SRGB with
/// SRGB_NONLINEAR, then whatever the surface lists first
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    if available.is_empty() {
        return None;
    }

    let exact = available
        .iter()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space);
    if let Some(&format) = exact {
        return Some(format);
    }

    let srgb_fallback = available.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB
            && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = srgb_fallback {
        return Some(format);
    }

    Some(available[0])
}

/// Pick a present mode from the vsync/triple-buffering request
///
/// vsync always resolves to FIFO, which every surface must support.
/// Without vsync, MAILBOX is preferred when triple buffering is requested,
/// IMMEDIATE otherwise, each falling back to FIFO when unavailable.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    vsync: bool,
    triple_buffering: bool,
) -> vk::PresentModeKHR {
    if !vsync {
        if triple_buffering && available.contains(&vk::PresentModeKHR::MAILBOX) {
            return vk::PresentModeKHR::MAILBOX;
        }
        if available.contains(&vk::PresentModeKHR::IMMEDIATE) {
            return vk::PresentModeKHR::IMMEDIATE;
        }
    }
    vk::PresentModeKHR::FIFO
}

/// Resolve the chain extent from surface capabilities
///
/// When the surface dictates an exact extent (current width is not the
/// u32::MAX sentinel), that wins; otherwise the window extent is clamped
/// into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image above the minimum, clamped when the surface caps the count
pub fn clamp_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

/// Result of an acquire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// Image acquired and fully usable
    Success,
    /// Image acquired but the chain no longer matches the surface; usable
    /// for this frame, recreate soon
    Suboptimal,
    /// No image; the chain must be recreated before the next acquire
    OutOfDate,
}

/// An acquired presentable image index plus chain health
#[derive(Debug, Clone, Copy)]
pub struct AcquiredImage {
    pub index: u32,
    pub status: AcquireStatus,
}

/// The presentable image chain and its views
pub struct Swapchain {
    context: Arc<GraphicsContext>,
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    // Set by acquire/present when the surface and chain disagree; cleared
    // only by a fully successful present or a recreate
    out_of_date: bool,
}

impl Swapchain {
    pub fn new(context: Arc<GraphicsContext>, config: &SwapchainConfig) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(context.instance(), context.device());
        let built = Self::build_chain(&context, &loader, config, vk::SwapchainKHR::null())?;

        nova_info!(
            "nova::vulkan",
            "Swapchain created: {}x{} {:?} {:?} ({} images)",
            built.extent.width,
            built.extent.height,
            built.format.format,
            built.present_mode,
            built.images.len()
        );

        Ok(Self {
            context,
            loader,
            handle: built.handle,
            images: built.images,
            image_views: built.image_views,
            framebuffers: Vec::new(),
            format: built.format,
            extent: built.extent,
            present_mode: built.present_mode,
            out_of_date: false,
        })
    }

    fn build_chain(
        context: &GraphicsContext,
        loader: &ash::khr::swapchain::Device,
        config: &SwapchainConfig,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<BuiltChain> {
        let support = SurfaceSupport::query(
            context.surface_loader(),
            context.physical_device(),
            context.surface(),
        )?;
        if !support.is_adequate() {
            return Err(Error::InitializationFailed(
                "Surface reports no formats or present modes".to_string(),
            ));
        }

        let format = choose_surface_format(&support.formats, config.preferred_format)
            .ok_or_else(|| {
                Error::InitializationFailed("Surface reports no formats".to_string())
            })?;
        let present_mode =
            choose_present_mode(&support.present_modes, config.vsync, config.triple_buffering);
        let extent = choose_extent(&support.capabilities, config.window_extent);
        if extent.width == 0 || extent.height == 0 {
            return Err(Error::InvalidUsage(
                "Swapchain extent is zero; window is minimized".to_string(),
            ));
        }
        let image_count = clamp_image_count(&support.capabilities);

        let families = context.queue_families();
        let graphics_family = families.graphics.ok_or_else(|| {
            Error::InitializationFailed("context has no graphics queue family".to_string())
        })?;
        let present_family = families.present.ok_or_else(|| {
            Error::InitializationFailed("context has no present queue family".to_string())
        })?;

        // CONCURRENT avoids explicit ownership transfers when graphics and
        // present live on different families
        let family_indices = [graphics_family, present_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(context.surface())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | config.extra_usage)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        if graphics_family != present_family {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let handle = unsafe {
            loader.create_swapchain(&create_info, None).map_err(|e| {
                nova_err!("nova::vulkan", "Failed to create swapchain: {:?}", e)
            })?
        };

        let images = unsafe {
            match loader.get_swapchain_images(handle) {
                Ok(images) => images,
                Err(e) => {
                    loader.destroy_swapchain(handle, None);
                    return Err(nova_err!(
                        "nova::vulkan",
                        "Failed to get swapchain images: {:?}",
                        e
                    ));
                }
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for (i, &image) in images.iter().enumerate() {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );

            let view = unsafe { context.device().create_image_view(&view_info, None) };
            match view {
                Ok(view) => {
                    context.name_object(view, &format!("nova.swapchain.view{}", i));
                    image_views.push(view);
                }
                Err(e) => {
                    unsafe {
                        for view in image_views {
                            context.device().destroy_image_view(view, None);
                        }
                        loader.destroy_swapchain(handle, None);
                    }
                    return Err(nova_err!(
                        "nova::vulkan",
                        "Failed to create swapchain image view: {:?}",
                        e
                    ));
                }
            }
        }

        Ok(BuiltChain {
            handle,
            images,
            image_views,
            format,
            extent,
            present_mode,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// True after an out-of-date acquire or present; cleared by a fully
    /// successful present or a recreate
    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date
    }

    /// One framebuffer per chain image against the given render pass
    ///
    /// Any existing framebuffers are destroyed first. `depth_view`, when
    /// present, is shared across all framebuffers.
    pub fn create_framebuffers(
        &mut self,
        render_pass: vk::RenderPass,
        depth_view: Option<vk::ImageView>,
    ) -> Result<()> {
        self.destroy_framebuffers();

        for (i, &view) in self.image_views.iter().enumerate() {
            let mut attachments = vec![view];
            if let Some(depth) = depth_view {
                attachments.push(depth);
            }

            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                self.context
                    .device()
                    .create_framebuffer(&framebuffer_info, None)
            };
            match framebuffer {
                Ok(framebuffer) => {
                    self.context
                        .name_object(framebuffer, &format!("nova.swapchain.fb{}", i));
                    self.framebuffers.push(framebuffer);
                }
                Err(e) => {
                    self.destroy_framebuffers();
                    return Err(nova_err!(
                        "nova::vulkan",
                        "Failed to create swapchain framebuffer: {:?}",
                        e
                    ));
                }
            }
        }

        debug_assert_eq!(self.framebuffers.len(), self.images.len());
        Ok(())
    }

    fn destroy_framebuffers(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.context.device().destroy_framebuffer(framebuffer, None);
            }
        }
    }

    /// Acquire the next presentable image
    ///
    /// OUT_OF_DATE is reported as a status, not an error; the caller is
    /// expected to recreate and retry. SUBOPTIMAL still yields a usable
    /// image but marks the chain for recreation.
    pub fn acquire_next_image(&mut self, signal_semaphore: vk::Semaphore) -> Result<AcquiredImage> {
        let result = unsafe {
            self.loader.acquire_next_image(
                self.handle,
                u64::MAX,
                signal_semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok(AcquiredImage {
                index,
                status: AcquireStatus::Success,
            }),
            Ok((index, true)) => {
                self.out_of_date = true;
                Ok(AcquiredImage {
                    index,
                    status: AcquireStatus::Suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.out_of_date = true;
                Ok(AcquiredImage {
                    index: 0,
                    status: AcquireStatus::OutOfDate,
                })
            }
            Err(e) => Err(nova_err!(
                "nova::vulkan",
                "Failed to acquire swapchain image: {:?}",
                e
            )),
        }
    }

    /// Present an acquired image on the present queue
    ///
    /// The out-of-date flag clears only when presentation fully succeeds;
    /// SUBOPTIMAL and OUT_OF_DATE keep or set it so the caller recreates.
    pub fn present(&mut self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.loader
                .queue_present(self.context.present_queue(), &present_info)
        };

        match result {
            Ok(false) => {
                self.out_of_date = false;
                Ok(())
            }
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.out_of_date = true;
                Ok(())
            }
            Err(e) => Err(nova_err!(
                "nova::vulkan",
                "Failed to present swapchain image: {:?}",
                e
            )),
        }
    }

    /// Tear the chain down and rebuild it against the current surface
    ///
    /// Waits for device idle first; framebuffers are destroyed and must be
    /// rebuilt by the caller, whose render pass they reference.
    pub fn recreate(&mut self, config: &SwapchainConfig) -> Result<()> {
        self.context.wait_idle();

        self.destroy_framebuffers();
        unsafe {
            for view in self.image_views.drain(..) {
                self.context.device().destroy_image_view(view, None);
            }
        }

        let old_handle = self.handle;
        let built = Self::build_chain(&self.context, &self.loader, config, old_handle);
        unsafe {
            self.loader.destroy_swapchain(old_handle, None);
        }
        let built = match built {
            Ok(built) => built,
            Err(e) => {
                // The old chain is gone either way; leave a null handle so
                // Drop does not double-free
                self.handle = vk::SwapchainKHR::null();
                self.images.clear();
                nova_warn!("nova::vulkan", "Swapchain recreate failed: {}", e);
                return Err(e);
            }
        };

        self.handle = built.handle;
        self.images = built.images;
        self.image_views = built.image_views;
        self.format = built.format;
        self.extent = built.extent;
        self.present_mode = built.present_mode;
        self.out_of_date = false;

        nova_info!(
            "nova::vulkan",
            "Swapchain recreated: {}x{} ({} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.context.wait_idle();
        self.destroy_framebuffers();
        unsafe {
            for view in self.image_views.drain(..) {
                self.context.device().destroy_image_view(view, None);
            }
            if self.handle != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.handle, None);
            }
        }
    }
}

struct BuiltChain {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}
