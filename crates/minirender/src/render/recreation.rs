//! Swapchain generation bookkeeping
//!
//! Decides what a rebuild tears down and what it keeps. The GPU work sits
//! behind [`GenerationFactory`]; [`SwapchainState`] only sequences it and
//! numbers the generations.

use crate::render::frame_loop::RecreateOutcome;
use crate::render::vulkan::VulkanResult;

/// Objects tied to one swapchain, dropped as a unit
///
/// Field order is teardown order: framebuffers, command buffers, pipeline,
/// render pass, then the swapchain with its image views.
pub struct GenerationParts<Fb, Cb, Pl, Rp, Sc> {
    /// One framebuffer per swapchain image
    pub framebuffers: Fb,
    /// Pre-recorded draw commands, one per swapchain image
    pub command_buffers: Cb,
    /// Graphics pipeline and its layout
    pub pipeline: Pl,
    /// Color render pass matching the swapchain format
    pub render_pass: Rp,
    /// Swapchain, images and views
    pub swapchain: Sc,
}

/// Creates everything a rebuild needs
pub trait GenerationFactory {
    /// Presentable image chain
    type Swapchain;
    /// Uniform buffers and descriptor sets sized by image count
    type PerImage;
    /// Swapchain-dependent objects built around a swapchain
    type Generation;

    /// Block until the GPU no longer uses any generation
    fn wait_idle(&mut self) -> VulkanResult<()>;

    /// Negotiate and create a swapchain for the framebuffer size
    fn create_swapchain(&mut self, framebuffer_size: (u32, u32)) -> VulkanResult<Self::Swapchain>;

    /// Images the swapchain actually holds
    fn swapchain_image_count(&self, swapchain: &Self::Swapchain) -> usize;

    /// Per-image resources for `image_count` images
    fn create_per_image(&mut self, image_count: usize) -> VulkanResult<Self::PerImage>;

    /// Render pass, pipeline, framebuffers and recorded commands
    fn build_generation(
        &mut self,
        swapchain: Self::Swapchain,
        per_image: &Self::PerImage,
    ) -> VulkanResult<Self::Generation>;
}

/// Per-image resources are sized by image count and nothing else
pub fn per_image_needs_rebuild(current: usize, new: usize) -> bool {
    current != new
}

/// The generation currently in use
pub struct LiveGeneration<G> {
    /// Sequence number, starting at 0 for the first swapchain
    pub id: u64,
    /// Swapchain image count of this generation
    pub image_count: usize,
    /// The objects themselves
    pub parts: G,
}

/// Live generation plus the per-image resources that outlast it
///
/// The generation is declared first so it drops before the descriptor sets
/// its command buffers reference.
pub struct SwapchainState<G, P> {
    live: Option<LiveGeneration<G>>,
    per_image: P,
    per_image_count: usize,
    next_id: u64,
}

impl<G, P> SwapchainState<G, P> {
    /// Start with per-image resources and no generation
    pub fn new(per_image: P, per_image_count: usize) -> Self {
        Self {
            live: None,
            per_image,
            per_image_count,
            next_id: 0,
        }
    }

    /// Build a generation around an already created swapchain
    pub fn install<F>(&mut self, factory: &mut F, swapchain: F::Swapchain) -> VulkanResult<()>
    where
        F: GenerationFactory<Generation = G, PerImage = P>,
    {
        let image_count = factory.swapchain_image_count(&swapchain);
        let parts = factory.build_generation(swapchain, &self.per_image)?;

        let id = self.next_id;
        self.next_id += 1;
        self.live = Some(LiveGeneration { id, image_count, parts });
        Ok(())
    }

    /// Tear down the live generation and build the next one
    ///
    /// A zero-sized framebuffer leaves everything as it is. Any creation
    /// failure leaves no live generation; the next rebuild starts clean.
    pub fn rebuild<F>(&mut self, factory: &mut F, framebuffer_size: (u32, u32)) -> VulkanResult<RecreateOutcome>
    where
        F: GenerationFactory<Generation = G, PerImage = P>,
    {
        let (width, height) = framebuffer_size;
        if width == 0 || height == 0 {
            log::debug!("Framebuffer is {}x{}, deferring swapchain rebuild", width, height);
            return Ok(RecreateOutcome::Deferred);
        }

        factory.wait_idle()?;
        self.live = None;

        let swapchain = factory.create_swapchain(framebuffer_size)?;
        let image_count = factory.swapchain_image_count(&swapchain);

        if per_image_needs_rebuild(self.per_image_count, image_count) {
            log::info!(
                "Swapchain image count changed from {} to {}, rebuilding descriptor resources",
                self.per_image_count,
                image_count
            );
            self.per_image = factory.create_per_image(image_count)?;
            self.per_image_count = image_count;
        }

        self.install(factory, swapchain)?;
        Ok(RecreateOutcome::Rebuilt { image_count })
    }

    /// Generation in use, if any
    pub fn live(&self) -> Option<&LiveGeneration<G>> {
        self.live.as_ref()
    }

    /// Mutable access to the generation in use
    pub fn live_mut(&mut self) -> Option<&mut LiveGeneration<G>> {
        self.live.as_mut()
    }

    /// Per-image resources, sized for the live generation
    pub fn per_image(&self) -> &P {
        &self.per_image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Appends its label to a shared log when dropped
    struct Tracked {
        label: String,
        log: Log,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.borrow_mut().push(format!("drop {}", self.label));
        }
    }

    struct FakeSwapchain {
        serial: u32,
        images: usize,
        _tracked: Tracked,
    }

    struct FakePerImage {
        serial: u32,
        sets: usize,
        _tracked: Tracked,
    }

    struct FakeGeneration {
        framebuffers: Vec<u32>,
        command_buffers: Vec<u32>,
        per_image_serial: u32,
        swapchain: FakeSwapchain,
    }

    /// Hands out fresh serial numbers for every object it creates
    struct FakeFactory {
        log: Log,
        image_counts: Vec<usize>,
        next_serial: u32,
    }

    impl FakeFactory {
        fn new(image_counts: &[usize]) -> Self {
            Self {
                log: Rc::new(RefCell::new(Vec::new())),
                image_counts: image_counts.iter().rev().copied().collect(),
                next_serial: 0,
            }
        }

        fn serial(&mut self) -> u32 {
            self.next_serial += 1;
            self.next_serial
        }

        fn tracked(&self, label: String) -> Tracked {
            self.log.borrow_mut().push(format!("create {}", label));
            Tracked { label, log: self.log.clone() }
        }

        fn take_log(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.borrow_mut())
        }
    }

    impl GenerationFactory for FakeFactory {
        type Swapchain = FakeSwapchain;
        type PerImage = FakePerImage;
        type Generation = FakeGeneration;

        fn wait_idle(&mut self) -> VulkanResult<()> {
            self.log.borrow_mut().push("wait idle".to_string());
            Ok(())
        }

        fn create_swapchain(&mut self, _framebuffer_size: (u32, u32)) -> VulkanResult<FakeSwapchain> {
            let images = self.image_counts.pop().unwrap_or(3);
            let serial = self.serial();
            Ok(FakeSwapchain {
                serial,
                images,
                _tracked: self.tracked(format!("swapchain {}", serial)),
            })
        }

        fn swapchain_image_count(&self, swapchain: &FakeSwapchain) -> usize {
            swapchain.images
        }

        fn create_per_image(&mut self, image_count: usize) -> VulkanResult<FakePerImage> {
            let serial = self.serial();
            Ok(FakePerImage {
                serial,
                sets: image_count,
                _tracked: self.tracked(format!("per-image {}", serial)),
            })
        }

        fn build_generation(
            &mut self,
            swapchain: FakeSwapchain,
            per_image: &FakePerImage,
        ) -> VulkanResult<FakeGeneration> {
            let framebuffers = (0..swapchain.images).map(|_| self.serial()).collect();
            let command_buffers = (0..per_image.sets).map(|_| self.serial()).collect();
            Ok(FakeGeneration {
                framebuffers,
                command_buffers,
                per_image_serial: per_image.serial,
                swapchain,
            })
        }
    }

    fn started(factory: &mut FakeFactory, image_count: usize) -> SwapchainState<FakeGeneration, FakePerImage> {
        let per_image = factory.create_per_image(image_count).unwrap();
        let mut state = SwapchainState::new(per_image, image_count);
        let swapchain = factory.create_swapchain((800, 600)).unwrap();
        state.install(factory, swapchain).unwrap();
        factory.take_log();
        state
    }

    #[test]
    fn count_change_decides_per_image_rebuild() {
        assert!(per_image_needs_rebuild(2, 4));
        assert!(per_image_needs_rebuild(3, 2));
        assert!(!per_image_needs_rebuild(3, 3));
    }

    #[test]
    fn generation_id_increases_on_every_rebuild() {
        let mut factory = FakeFactory::new(&[3, 3, 3, 3]);
        let mut state = started(&mut factory, 3);
        assert_eq!(state.live().map(|g| g.id), Some(0));

        for expected in 1..=3 {
            state.rebuild(&mut factory, (800, 600)).unwrap();
            assert_eq!(state.live().map(|g| g.id), Some(expected));
        }
    }

    #[test]
    fn per_image_rebuilt_when_image_count_grows() {
        let mut factory = FakeFactory::new(&[2, 4]);
        let mut state = started(&mut factory, 2);
        let before = state.per_image().serial;

        let outcome = state.rebuild(&mut factory, (800, 600)).unwrap();

        assert_eq!(outcome, RecreateOutcome::Rebuilt { image_count: 4 });
        assert_ne!(state.per_image().serial, before);
        assert_eq!(state.per_image().sets, 4);
    }

    #[test]
    fn per_image_kept_when_image_count_unchanged() {
        let mut factory = FakeFactory::new(&[3, 3]);
        let mut state = started(&mut factory, 3);
        let before = state.per_image().serial;

        state.rebuild(&mut factory, (800, 600)).unwrap();

        assert_eq!(state.per_image().serial, before);
        assert!(!factory.take_log().iter().any(|entry| entry.contains("per-image")));
    }

    #[test]
    fn rebuilt_generation_matches_new_image_count() {
        let mut factory = FakeFactory::new(&[2, 4]);
        let mut state = started(&mut factory, 2);
        state.rebuild(&mut factory, (800, 600)).unwrap();

        let live = state.live().unwrap();
        assert_eq!(live.image_count, 4);
        assert_eq!(live.parts.framebuffers.len(), 4);
        assert_eq!(live.parts.command_buffers.len(), 4);
        assert_eq!(live.parts.per_image_serial, state.per_image().serial);
    }

    #[test]
    fn rebuilt_generation_shares_no_objects_with_the_old_one() {
        let mut factory = FakeFactory::new(&[3, 3]);
        let mut state = started(&mut factory, 3);
        let old = state.live().unwrap();
        let mut old_serials = old.parts.framebuffers.clone();
        old_serials.extend(&old.parts.command_buffers);
        old_serials.push(old.parts.swapchain.serial);

        state.rebuild(&mut factory, (800, 600)).unwrap();

        let new = &state.live().unwrap().parts;
        let new_serials = new
            .framebuffers
            .iter()
            .chain(&new.command_buffers)
            .chain(std::iter::once(&new.swapchain.serial));
        for serial in new_serials {
            assert!(!old_serials.contains(serial), "object {} reused", serial);
        }
    }

    #[test]
    fn old_generation_is_gone_before_the_new_swapchain() {
        let mut factory = FakeFactory::new(&[3, 3]);
        let mut state = started(&mut factory, 3);
        let old_swapchain = state.live().unwrap().parts.swapchain.serial;

        state.rebuild(&mut factory, (800, 600)).unwrap();

        let log = factory.take_log();
        assert_eq!(log[0], "wait idle");
        assert_eq!(log[1], format!("drop swapchain {}", old_swapchain));
        assert!(log[2].starts_with("create swapchain"));
    }

    #[test]
    fn zero_size_defers_without_touching_anything() {
        let mut factory = FakeFactory::new(&[3]);
        let mut state = started(&mut factory, 3);

        assert_eq!(state.rebuild(&mut factory, (0, 600)).unwrap(), RecreateOutcome::Deferred);
        assert_eq!(state.rebuild(&mut factory, (800, 0)).unwrap(), RecreateOutcome::Deferred);

        assert!(factory.take_log().is_empty());
        assert_eq!(state.live().map(|g| g.id), Some(0));
    }

    #[test]
    fn generation_parts_drop_in_teardown_order() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let part = |label: &str| Tracked {
            label: label.to_string(),
            log: log.clone(),
        };

        let parts = GenerationParts {
            framebuffers: part("framebuffers"),
            command_buffers: part("command buffers"),
            pipeline: part("pipeline"),
            render_pass: part("render pass"),
            swapchain: part("swapchain"),
        };
        drop(parts);

        assert_eq!(
            *log.borrow(),
            vec![
                "drop framebuffers",
                "drop command buffers",
                "drop pipeline",
                "drop render pass",
                "drop swapchain",
            ]
        );
    }

    #[test]
    fn generation_drops_before_per_image_resources() {
        let mut factory = FakeFactory::new(&[3]);
        let state = started(&mut factory, 3);
        let swapchain = state.live().unwrap().parts.swapchain.serial;
        let per_image = state.per_image().serial;

        drop(state);

        assert_eq!(
            factory.take_log(),
            vec![format!("drop swapchain {}", swapchain), format!("drop per-image {}", per_image)]
        );
    }
}
