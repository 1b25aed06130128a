//! Unit tests for swapchain parameter selection
//!
//! All selection rules are pure functions over surface data, so these run
//! without a GPU.

use ash::vk;

use crate::vulkan_swapchain::{
    choose_extent, choose_present_mode, choose_surface_format, clamp_image_count,
};

fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space,
    }
}

const PREFERRED: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

// ============================================================================
// SURFACE FORMAT SELECTION TESTS
// ============================================================================

#[test]
fn test_format_exact_preferred_match_wins() {
    let available = [
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&available, PREFERRED).unwrap();
    assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
}

#[test]
fn test_format_srgb_fallback() {
    // Preferred not present, B8G8R8A8_SRGB is
    let available = [
        format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&available, PREFERRED).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
}

#[test]
fn test_format_first_available_as_last_resort() {
    let available = [
        format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&available, PREFERRED).unwrap();
    assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
}

#[test]
fn test_format_requires_matching_color_space() {
    // Same format as preferred but a different color space is not an exact
    // match
    let available = [
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];

    let chosen = choose_surface_format(&available, PREFERRED).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_format_empty_list() {
    assert!(choose_surface_format(&[], PREFERRED).is_none());
}

// ============================================================================
// PRESENT MODE SELECTION TESTS
// ============================================================================

#[test]
fn test_present_mode_vsync_forces_fifo() {
    // MAILBOX availability must not matter under vsync
    let available = [
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
        vk::PresentModeKHR::FIFO,
    ];

    assert_eq!(
        choose_present_mode(&available, true, true),
        vk::PresentModeKHR::FIFO
    );
    assert_eq!(
        choose_present_mode(&available, true, false),
        vk::PresentModeKHR::FIFO
    );
}

#[test]
fn test_present_mode_no_vsync_triple_prefers_mailbox() {
    let available = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ];

    assert_eq!(
        choose_present_mode(&available, false, true),
        vk::PresentModeKHR::MAILBOX
    );
}

#[test]
fn test_present_mode_no_vsync_without_triple_uses_immediate() {
    let available = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ];

    assert_eq!(
        choose_present_mode(&available, false, false),
        vk::PresentModeKHR::IMMEDIATE
    );
}

#[test]
fn test_present_mode_falls_back_through_immediate_to_fifo() {
    // Triple requested but no MAILBOX: IMMEDIATE next
    let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(
        choose_present_mode(&available, false, true),
        vk::PresentModeKHR::IMMEDIATE
    );

    // Only FIFO on offer
    let available = [vk::PresentModeKHR::FIFO];
    assert_eq!(
        choose_present_mode(&available, false, true),
        vk::PresentModeKHR::FIFO
    );
}

// ============================================================================
// EXTENT AND IMAGE COUNT TESTS
// ============================================================================

fn capabilities(
    current: vk::Extent2D,
    min: vk::Extent2D,
    max: vk::Extent2D,
    min_images: u32,
    max_images: u32,
) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        current_extent: current,
        min_image_extent: min,
        max_image_extent: max,
        min_image_count: min_images,
        max_image_count: max_images,
        ..Default::default()
    }
}

#[test]
fn test_extent_surface_dictates() {
    let caps = capabilities(
        vk::Extent2D { width: 1920, height: 1080 },
        vk::Extent2D { width: 1, height: 1 },
        vk::Extent2D { width: 4096, height: 4096 },
        2,
        0,
    );

    let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
    assert_eq!(extent.width, 1920);
    assert_eq!(extent.height, 1080);
}

#[test]
fn test_extent_clamps_window_size_when_flexible() {
    // u32::MAX sentinel means the surface defers to the window
    let caps = capabilities(
        vk::Extent2D { width: u32::MAX, height: u32::MAX },
        vk::Extent2D { width: 640, height: 480 },
        vk::Extent2D { width: 2048, height: 2048 },
        2,
        0,
    );

    let inside = choose_extent(&caps, vk::Extent2D { width: 1280, height: 720 });
    assert_eq!(inside, vk::Extent2D { width: 1280, height: 720 });

    let too_big = choose_extent(&caps, vk::Extent2D { width: 8192, height: 100 });
    assert_eq!(too_big, vk::Extent2D { width: 2048, height: 480 });
}

#[test]
fn test_image_count_one_above_minimum() {
    let caps = capabilities(
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        2,
        0,
    );

    // max_image_count of zero means unbounded
    assert_eq!(clamp_image_count(&caps), 3);
}

#[test]
fn test_image_count_clamped_by_surface_maximum() {
    let caps = capabilities(
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        3,
        3,
    );

    assert_eq!(clamp_image_count(&caps), 3);
}
