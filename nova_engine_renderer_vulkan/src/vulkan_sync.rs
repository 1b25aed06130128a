//! Frame synchronization
//!
//! Fixed ring of per-frame sync slots: three fences (created signaled so
//! the first frame never blocks) and four binary semaphores each. The
//! cursor arithmetic is a pure type so slot cycling is testable without a
//! device. Timeline semaphores are used when the device advertises them,
//! with a logged binary-semaphore fallback otherwise.

use ash::vk;
use nova_engine::nova::{Error, Result};
use nova_engine::{nova_err, nova_warn};
use std::sync::Arc;

use crate::vulkan_context::GraphicsContext;

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

/// Outcome of a fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    TimedOut,
}

/// Pure frame-slot cursor, `0..frame_count` with wraparound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    frame_count: usize,
}

impl FrameCursor {
    pub fn new(frame_count: usize) -> Self {
        debug_assert!(frame_count > 0);
        Self {
            current: 0,
            frame_count,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frame_count;
    }
}

/// Sync objects for one frame slot
pub struct FrameSyncSlot {
    pub render_fence: vk::Fence,
    pub compute_fence: vk::Fence,
    pub transfer_fence: vk::Fence,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub compute_finished: vk::Semaphore,
    pub transfer_finished: vk::Semaphore,
}

impl FrameSyncSlot {
    fn create(context: &GraphicsContext, frame: usize) -> Result<Self> {
        // Signaled so the very first wait_for_frame returns immediately
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let semaphore_info = vk::SemaphoreCreateInfo::default();

        let mut fences = Vec::with_capacity(3);
        let mut semaphores = Vec::with_capacity(4);
        let cleanup = |fences: &Vec<vk::Fence>, semaphores: &Vec<vk::Semaphore>| unsafe {
            for &fence in fences {
                context.device().destroy_fence(fence, None);
            }
            for &semaphore in semaphores {
                context.device().destroy_semaphore(semaphore, None);
            }
        };

        for name in ["render", "compute", "transfer"] {
            let fence = unsafe { context.device().create_fence(&fence_info, None) };
            match fence {
                Ok(fence) => {
                    context.name_object(fence, &format!("nova.fence.{}.frame{}", name, frame));
                    fences.push(fence);
                }
                Err(e) => {
                    cleanup(&fences, &semaphores);
                    return Err(nova_err!(
                        "nova::vulkan",
                        "Failed to create {} fence: {:?}",
                        name,
                        e
                    ));
                }
            }
        }

        for name in [
            "image_available",
            "render_finished",
            "compute_finished",
            "transfer_finished",
        ] {
            let semaphore = unsafe { context.device().create_semaphore(&semaphore_info, None) };
            match semaphore {
                Ok(semaphore) => {
                    context.name_object(semaphore, &format!("nova.sem.{}.frame{}", name, frame));
                    semaphores.push(semaphore);
                }
                Err(e) => {
                    cleanup(&fences, &semaphores);
                    return Err(nova_err!(
                        "nova::vulkan",
                        "Failed to create {} semaphore: {:?}",
                        name,
                        e
                    ));
                }
            }
        }

        Ok(Self {
            render_fence: fences[0],
            compute_fence: fences[1],
            transfer_fence: fences[2],
            image_available: semaphores[0],
            render_finished: semaphores[1],
            compute_finished: semaphores[2],
            transfer_finished: semaphores[3],
        })
    }

    fn destroy(&self, context: &GraphicsContext) {
        unsafe {
            context.device().destroy_fence(self.render_fence, None);
            context.device().destroy_fence(self.compute_fence, None);
            context.device().destroy_fence(self.transfer_fence, None);
            context.device().destroy_semaphore(self.image_available, None);
            context.device().destroy_semaphore(self.render_finished, None);
            context.device().destroy_semaphore(self.compute_finished, None);
            context
                .device()
                .destroy_semaphore(self.transfer_finished, None);
        }
    }
}

/// Frame pacing over a fixed ring of sync slots
pub struct FrameSync {
    context: Arc<GraphicsContext>,
    slots: Vec<FrameSyncSlot>,
    cursor: FrameCursor,
    timeline_supported: bool,
}

impl FrameSync {
    pub fn new(context: Arc<GraphicsContext>, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InvalidUsage(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        // Missing timeline support is already logged once at context init
        let timeline_supported = context.capabilities().timeline_semaphores;

        let mut slots = Vec::with_capacity(frames_in_flight);
        for frame in 0..frames_in_flight {
            match FrameSyncSlot::create(&context, frame) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in &slots {
                        slot.destroy(&context);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            context,
            cursor: FrameCursor::new(frames_in_flight),
            slots,
            timeline_supported,
        })
    }

    pub fn with_default_frames(context: Arc<GraphicsContext>) -> Result<Self> {
        Self::new(context, DEFAULT_FRAMES_IN_FLIGHT)
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current_frame(&self) -> usize {
        self.cursor.current()
    }

    pub fn current_slot(&self) -> &FrameSyncSlot {
        &self.slots[self.cursor.current()]
    }

    pub fn slot(&self, frame: usize) -> &FrameSyncSlot {
        &self.slots[frame % self.slots.len()]
    }

    pub fn supports_timeline(&self) -> bool {
        self.timeline_supported
    }

    /// Wait for the current frame's render fence
    ///
    /// Timeout is a distinguishable status, not an error, so callers can
    /// keep pumping events while the GPU catches up.
    pub fn wait_for_frame(&self, timeout_ns: u64) -> Result<WaitStatus> {
        let fence = self.current_slot().render_fence;
        let result = unsafe {
            self.context
                .device()
                .wait_for_fences(&[fence], true, timeout_ns)
        };
        match result {
            Ok(()) => Ok(WaitStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(WaitStatus::TimedOut),
            Err(e) => Err(nova_err!(
                "nova::vulkan",
                "Failed to wait for frame fence: {:?}",
                e
            )),
        }
    }

    /// Reset the current frame's render fence. Call only after a
    /// `Signaled` wait, otherwise the frame's submission can deadlock.
    pub fn reset_frame(&self) -> Result<()> {
        let fence = self.current_slot().render_fence;
        unsafe {
            self.context
                .device()
                .reset_fences(&[fence])
                .map_err(|e| nova_err!("nova::vulkan", "Failed to reset frame fence: {:?}", e))
        }
    }

    pub fn advance_frame(&mut self) {
        self.cursor.advance();
    }

    /// Create a timeline semaphore at `initial_value`
    ///
    /// Without timeline support this falls back to an ordinary binary
    /// semaphore with a logged warning, so callers keep making progress;
    /// the value-based `signal_timeline`/`wait_timeline` calls are what
    /// report the missing capability.
    pub fn create_timeline_semaphore(&self, initial_value: u64, name: &str) -> Result<vk::Semaphore> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let mut create_info = vk::SemaphoreCreateInfo::default();
        if self.timeline_supported {
            create_info = create_info.push_next(&mut type_info);
        } else {
            nova_warn!(
                "nova::vulkan",
                "Timeline semaphore '{}' requested without device support, creating binary semaphore",
                name
            );
        }

        let semaphore = unsafe {
            self.context
                .device()
                .create_semaphore(&create_info, None)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to create timeline semaphore: {:?}", e)
                })?
        };
        self.context.name_object(semaphore, name);
        Ok(semaphore)
    }

    /// Signal a timeline semaphore to `value` from the host
    pub fn signal_timeline(&self, semaphore: vk::Semaphore, value: u64) -> Result<()> {
        if !self.timeline_supported {
            return Err(Error::FeatureNotPresent("timeline semaphores"));
        }

        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(semaphore)
            .value(value);
        unsafe {
            self.context
                .device()
                .signal_semaphore(&signal_info)
                .map_err(|e| {
                    nova_err!("nova::vulkan", "Failed to signal timeline semaphore: {:?}", e)
                })
        }
    }

    /// Wait until a timeline semaphore reaches `value`
    pub fn wait_timeline(
        &self,
        semaphore: vk::Semaphore,
        value: u64,
        timeout_ns: u64,
    ) -> Result<WaitStatus> {
        if !self.timeline_supported {
            return Err(Error::FeatureNotPresent("timeline semaphores"));
        }

        let semaphores = [semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let result = unsafe { self.context.device().wait_semaphores(&wait_info, timeout_ns) };
        match result {
            Ok(()) => Ok(WaitStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(WaitStatus::TimedOut),
            Err(e) => Err(nova_err!(
                "nova::vulkan",
                "Failed to wait on timeline semaphore: {:?}",
                e
            )),
        }
    }

    /// Destroy a semaphore created through this synchronizer
    pub fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe {
            self.context.device().destroy_semaphore(semaphore, None);
        }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        // Slots may be referenced by in-flight work
        self.context.wait_idle();
        for slot in &self.slots {
            slot.destroy(&self.context);
        }
    }
}
