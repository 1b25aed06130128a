/*!
# Nova Engine - Vulkan Frame Pipeline

Vulkan frame-pipeline backend for the Nova engine core.

This crate covers device and queue selection, the presentable image chain,
per-frame command buffer pools, and frame synchronization, using the Ash
library for Vulkan bindings. All components share one `GraphicsContext`
behind an `Arc`; the context always outlives its dependents, so teardown
order never needs manual sequencing.
*/

mod debug;
mod vulkan_command_buffer;
mod vulkan_context;
mod vulkan_device;
mod vulkan_swapchain;
mod vulkan_sync;

#[cfg(test)]
mod vulkan_swapchain_tests;
#[cfg(test)]
mod vulkan_sync_tests;

pub use vulkan_command_buffer::{CommandBuffer, CommandBufferManager, QueueRole};
pub use vulkan_context::GraphicsContext;
pub use vulkan_device::{
    find_memory_type, partition_queue_families, score_device, DeviceCapabilities,
    QueueFamilyIndices, SurfaceSupport, REQUIRED_DEVICE_EXTENSIONS,
};
pub use vulkan_swapchain::{
    choose_extent, choose_present_mode, choose_surface_format, clamp_image_count, AcquireStatus,
    AcquiredImage, Swapchain, SwapchainConfig,
};
pub use vulkan_sync::{
    FrameCursor, FrameSync, FrameSyncSlot, WaitStatus, DEFAULT_FRAMES_IN_FLIGHT,
};
