//! Vulkan texture management
//!
//! A sampled RGBA8 texture: image, memory, view and sampler owned together
//! and released in reverse creation order.

use ash::{vk, Device};
use crate::assets::ImageData;
use crate::render::vulkan::{BufferManager, CommandPool, DeviceContext, VulkanError, VulkanResult};

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Sampled texture with image, memory, image view and sampler
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
}

impl Texture {
    /// Upload decoded pixels into a new device-local texture
    ///
    /// The pixels go through a staging buffer. The image moves
    /// UNDEFINED → TRANSFER_DST → SHADER_READ_ONLY, each step its own
    /// single-use submission.
    pub fn from_image_data(
        context: &DeviceContext,
        buffers: &BufferManager,
        command_pool: &CommandPool,
        image_data: &ImageData,
    ) -> VulkanResult<Self> {
        if image_data.channels != 4 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("texture needs RGBA8 pixels, got {} channels", image_data.channels),
            });
        }
        if image_data.width == 0 || image_data.height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "texture has no pixels".to_string(),
            });
        }

        let device = context.raw_device();
        let extent = vk::Extent2D {
            width: image_data.width,
            height: image_data.height,
        };

        let staging = buffers.create_staging_buffer(&image_data.data)?;

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(TEXTURE_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe {
            device.create_image(&image_create_info, None)
                .map_err(VulkanError::Api)?
        };

        // From here on every handle is owned by `texture`, so an early return
        // releases whatever was created. Null handles are ignored on destroy.
        let mut texture = Self {
            device: device.clone(),
            image,
            memory: vk::DeviceMemory::null(),
            image_view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            extent,
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        texture.memory = buffers.allocate(requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        unsafe {
            device.bind_image_memory(image, texture.memory, 0)
                .map_err(VulkanError::Api)?;
        }

        transition_layout(command_pool, image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        command_pool.execute_single_time(|recorder| {
            recorder.cmd_copy_buffer_to_image(staging.handle(), image, extent)
        })?;
        transition_layout(
            command_pool,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let image_view_create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .subresource_range(color_subresource_range());

        texture.image_view = unsafe {
            device.create_image_view(&image_view_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let physical = context.physical_device();
        let anisotropy = physical.features.sampler_anisotropy == vk::TRUE;
        let max_anisotropy = if anisotropy {
            physical.properties.limits.max_sampler_anisotropy.min(16.0)
        } else {
            1.0
        };

        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        texture.sampler = unsafe {
            device.create_sampler(&sampler_create_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!(
            "Texture uploaded ({}x{}, anisotropy {})",
            extent.width,
            extent.height,
            max_anisotropy
        );
        Ok(texture)
    }

    /// Get image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Get sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Pixel dimensions
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.image_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Access masks and pipeline stages for one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage that waits on the barrier
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier masks for the two transitions a texture upload needs
///
/// Any other pair is a caller bug and yields
/// [`VulkanError::UnsupportedLayoutTransition`].
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        _ => Err(VulkanError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Move a color image between layouts with a synchronous single-use submission
pub fn transition_layout(
    command_pool: &CommandPool,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<()> {
    let masks = transition_masks(old, new)?;

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access)
        .build();

    command_pool.execute_single_time(|recorder| {
        recorder.cmd_image_barrier(masks.src_stage, masks.dst_stage, barrier)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_transition_waits_for_nothing() {
        let masks = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn sampling_transition_waits_for_copy() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn other_transitions_are_rejected() {
        let err = transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap_err();
        match err {
            VulkanError::UnsupportedLayoutTransition { old, new } => {
                assert_eq!(old, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
                assert_eq!(new, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR).is_err());
    }
}
