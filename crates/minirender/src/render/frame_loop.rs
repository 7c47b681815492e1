//! Frame pacing and swapchain invalidation state machine
//!
//! [`FrameLoop`] decides *what* happens each frame: which slot is used,
//! which fences must be observed, when the swapchain is rebuilt. The
//! [`FrameBackend`] it drives does the GPU work. Splitting the two keeps the
//! ordering rules testable without a device.
//!
//! Per frame, with `slot = frame_index % max_frames`:
//!
//! 1. wait on the slot's fence
//! 2. acquire an image; out of date means rebuild and drop the frame
//! 3. wait on the fence of whichever slot last rendered that image
//! 4. reset the slot's fence
//! 5. update the image's uniforms, submit, present
//! 6. advance the slot, unless presentation reported out of date

use std::time::{Duration, Instant};

use crate::render::vulkan::{PresentResult, VulkanResult};

/// Result of asking the swapchain for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available
    Image {
        /// Swapchain image index
        index: u32,
        /// The surface no longer matches exactly but the image is usable
        suboptimal: bool,
    },
    /// The swapchain no longer matches the surface
    OutOfDate,
}

/// Result of a swapchain rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// A new generation of swapchain resources is live
    Rebuilt {
        /// Image count of the new swapchain
        image_count: usize,
    },
    /// The framebuffer has zero area; nothing was torn down
    Deferred,
}

/// What happened during one `draw_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented
    Presented,
    /// Presented, but the surface reported a suboptimal match
    Suboptimal,
    /// The swapchain was rebuilt; the frame may have been dropped
    SwapchainRecreated,
    /// The window has no drawable area; nothing was rendered
    Deferred,
}

/// GPU operations the frame loop sequences
///
/// Slots index the per-frame semaphores and fence. Images index the
/// per-image command buffer, uniform buffer and descriptor set.
pub trait FrameBackend {
    /// Block until the slot's last submission retired
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Return the slot's fence to unsignaled
    fn reset_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next image, signaling the slot's image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Write the uniforms for an image
    fn update_uniforms(&mut self, image: u32, elapsed: Duration) -> VulkanResult<()>;

    /// Submit the image's command buffer, signaling the slot's fence
    fn submit(&mut self, slot: usize, image: u32) -> VulkanResult<()>;

    /// Present the image once the slot's render-finished semaphore signals
    fn present(&mut self, slot: usize, image: u32) -> VulkanResult<PresentResult>;

    /// Tear down and rebuild everything that depends on the swapchain
    fn recreate_swapchain(&mut self) -> VulkanResult<RecreateOutcome>;
}

/// Frame-slot rotation and image ownership tracking
#[derive(Debug)]
pub struct FrameLoop {
    current_frame: usize,
    max_frames: usize,
    images_in_flight: Vec<Option<usize>>,
    recreate_pending: bool,
    resized: bool,
    start: Instant,
}

impl FrameLoop {
    /// Start at slot 0 with no image owned by any slot
    pub fn new(max_frames: usize, image_count: usize) -> Self {
        Self {
            current_frame: 0,
            max_frames: max_frames.max(1),
            images_in_flight: vec![None; image_count],
            recreate_pending: false,
            resized: false,
            start: Instant::now(),
        }
    }

    /// Slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Mark the surface as resized; the swapchain is rebuilt after the next present
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    /// Whether a rebuild is waiting for a non-zero framebuffer
    pub fn is_recreate_pending(&self) -> bool {
        self.recreate_pending
    }

    /// Time since the loop was created, drives animation
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Run one frame
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<FrameStatus> {
        if self.recreate_pending {
            return self.recreate(backend);
        }

        let slot = self.current_frame;
        backend.wait_for_slot(slot)?;

        let (image, acquire_suboptimal) = match backend.acquire_image(slot)? {
            AcquireOutcome::Image { index, suboptimal } => (index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date on acquire");
                return self.recreate(backend);
            }
        };

        // The image may still be in use by a different slot's submission
        let image_slot = image as usize;
        if image_slot >= self.images_in_flight.len() {
            self.images_in_flight.resize(image_slot + 1, None);
        }
        if let Some(owner) = self.images_in_flight[image_slot] {
            if owner != slot {
                backend.wait_for_slot(owner)?;
            }
        }
        self.images_in_flight[image_slot] = Some(slot);

        backend.reset_slot(slot)?;
        backend.update_uniforms(image, self.elapsed())?;
        backend.submit(slot, image)?;

        let present = backend.present(slot, image)?;
        if present == PresentResult::OutOfDate {
            log::warn!("Swapchain out of date on present");
            return self.recreate(backend);
        }

        self.current_frame = (self.current_frame + 1) % self.max_frames;

        if self.resized {
            self.resized = false;
            log::info!("Surface resized, rebuilding swapchain");
            return self.recreate(backend);
        }

        if acquire_suboptimal || present == PresentResult::Suboptimal {
            log::debug!("Swapchain suboptimal, continuing");
            return Ok(FrameStatus::Suboptimal);
        }

        Ok(FrameStatus::Presented)
    }

    fn recreate<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<FrameStatus> {
        let outcome = backend.recreate_swapchain()?;
        Ok(self.apply_recreate(outcome))
    }

    /// Record the outcome of a rebuild, including ones requested from outside the loop
    pub fn apply_recreate(&mut self, outcome: RecreateOutcome) -> FrameStatus {
        match outcome {
            RecreateOutcome::Rebuilt { image_count } => {
                self.recreate_pending = false;
                self.resized = false;
                self.images_in_flight = vec![None; image_count];
                FrameStatus::SwapchainRecreated
            }
            RecreateOutcome::Deferred => {
                self.recreate_pending = true;
                FrameStatus::Deferred
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Reset(usize),
        Acquire(usize),
        Update(u32),
        Submit(usize, u32),
        Present(usize, u32),
        Recreate,
    }

    /// Scripted backend that records every call
    struct MockBackend {
        calls: Vec<Call>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentResult>,
        recreates: VecDeque<RecreateOutcome>,
        next_image: u32,
        image_count: u32,
    }

    impl MockBackend {
        fn new(image_count: u32) -> Self {
            Self {
                calls: Vec::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                recreates: VecDeque::new(),
                next_image: 0,
                image_count,
            }
        }

        fn take_calls(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::Wait(slot));
            Ok(())
        }

        fn reset_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                AcquireOutcome::Image { index, suboptimal: false }
            }))
        }

        fn update_uniforms(&mut self, image: u32, _elapsed: Duration) -> VulkanResult<()> {
            self.calls.push(Call::Update(image));
            Ok(())
        }

        fn submit(&mut self, slot: usize, image: u32) -> VulkanResult<()> {
            self.calls.push(Call::Submit(slot, image));
            Ok(())
        }

        fn present(&mut self, slot: usize, image: u32) -> VulkanResult<PresentResult> {
            self.calls.push(Call::Present(slot, image));
            Ok(self.presents.pop_front().unwrap_or(PresentResult::Optimal))
        }

        fn recreate_swapchain(&mut self) -> VulkanResult<RecreateOutcome> {
            self.calls.push(Call::Recreate);
            Ok(self.recreates.pop_front().unwrap_or(RecreateOutcome::Rebuilt {
                image_count: self.image_count as usize,
            }))
        }
    }

    #[test]
    fn normal_frame_follows_fixed_order() {
        let mut backend = MockBackend::new(2);
        let mut frames = FrameLoop::new(2, 2);

        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        assert_eq!(
            backend.take_calls(),
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Update(0),
                Call::Submit(0, 0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn slots_rotate_modulo_frame_count() {
        let mut backend = MockBackend::new(3);
        let mut frames = FrameLoop::new(2, 3);

        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(frames.current_frame());
            frames.draw_frame(&mut backend).unwrap();
        }
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn out_of_date_acquire_rebuilds_and_drops_frame() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        let mut frames = FrameLoop::new(2, 2);

        let status = frames.draw_frame(&mut backend).unwrap();
        assert_eq!(status, FrameStatus::SwapchainRecreated);

        let calls = backend.take_calls();
        assert_eq!(calls, vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]);
        assert!(!calls.iter().any(|c| matches!(c, Call::Submit(..) | Call::Present(..) | Call::Reset(..))));
        assert_eq!(frames.current_frame(), 0);
    }

    #[test]
    fn out_of_date_present_rebuilds_without_advancing() {
        let mut backend = MockBackend::new(2);
        backend.presents.push_back(PresentResult::OutOfDate);
        let mut frames = FrameLoop::new(2, 2);

        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::SwapchainRecreated);
        assert_eq!(backend.take_calls().last(), Some(&Call::Recreate));
        assert_eq!(frames.current_frame(), 0);
    }

    #[test]
    fn suboptimal_present_is_not_rebuilt() {
        let mut backend = MockBackend::new(2);
        backend.presents.push_back(PresentResult::Suboptimal);
        let mut frames = FrameLoop::new(2, 2);

        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::Suboptimal);
        assert!(!backend.take_calls().contains(&Call::Recreate));
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn image_owned_by_other_slot_is_waited_on() {
        let mut backend = MockBackend::new(3);
        let mut frames = FrameLoop::new(2, 3);

        // Slot 0 renders image 2, then slot 1 is handed the same image
        backend.acquires.push_back(AcquireOutcome::Image { index: 2, suboptimal: false });
        backend.acquires.push_back(AcquireOutcome::Image { index: 2, suboptimal: false });

        frames.draw_frame(&mut backend).unwrap();
        backend.take_calls();
        frames.draw_frame(&mut backend).unwrap();

        let calls = backend.take_calls();
        assert_eq!(&calls[..4], &[Call::Wait(1), Call::Acquire(1), Call::Wait(0), Call::Reset(1)]);
    }

    #[test]
    fn slot_fence_waited_before_reuse() {
        let mut backend = MockBackend::new(3);
        let mut frames = FrameLoop::new(2, 3);

        for _ in 0..6 {
            frames.draw_frame(&mut backend).unwrap();
        }

        // Every submit on a slot is preceded by a wait on that slot since its last submit
        let calls = backend.take_calls();
        let mut observed = [true; 2];
        for call in calls {
            match call {
                Call::Wait(slot) => observed[slot] = true,
                Call::Submit(slot, _) => {
                    assert!(observed[slot], "slot {slot} reused before its fence was observed");
                    observed[slot] = false;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn resize_rebuilds_after_present() {
        let mut backend = MockBackend::new(2);
        let mut frames = FrameLoop::new(2, 2);
        frames.notify_resized();

        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::SwapchainRecreated);
        let calls = backend.take_calls();
        assert_eq!(&calls[calls.len() - 2..], &[Call::Present(0, 0), Call::Recreate]);
        assert_eq!(frames.current_frame(), 1);

        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
    }

    #[test]
    fn minimized_window_defers_until_rebuild_succeeds() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        backend.recreates.push_back(RecreateOutcome::Deferred);
        backend.recreates.push_back(RecreateOutcome::Deferred);
        let mut frames = FrameLoop::new(2, 2);

        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::Deferred);
        assert!(frames.is_recreate_pending());
        backend.take_calls();

        // Still minimized: only the rebuild is retried, no fence or acquire work
        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::Deferred);
        assert_eq!(backend.take_calls(), vec![Call::Recreate]);

        // Restored
        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::SwapchainRecreated);
        assert!(!frames.is_recreate_pending());
        assert_eq!(frames.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
    }

    #[test]
    fn rebuild_resets_image_ownership_to_new_count() {
        let mut backend = MockBackend::new(2);
        let mut frames = FrameLoop::new(2, 2);
        frames.draw_frame(&mut backend).unwrap();

        backend.image_count = 4;
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        frames.draw_frame(&mut backend).unwrap();
        assert_eq!(frames.images_in_flight, vec![None; 4]);
    }
}
