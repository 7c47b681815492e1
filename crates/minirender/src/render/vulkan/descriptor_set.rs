//! Descriptor set layouts, pools and writes
//!
//! The renderer binds one set per swapchain image: the image's uniform
//! buffer at binding 0 and the shared texture at binding 1.

use ash::{vk, Device};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Binding slot of the per-image uniform buffer
pub const UNIFORM_BINDING: u32 = 0;
/// Binding slot of the texture sampler
pub const TEXTURE_BINDING: u32 = 1;

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build()
        );
        self
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build()
        );
        self
    }

    /// The renderer's layout: vertex-stage UBO, fragment-stage texture
    pub fn textured_mesh() -> Self {
        Self::new()
            .add_uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT)
    }

    /// Bindings collected so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes for `image_count` sets of one UBO and one sampler each
pub fn pool_sizes(image_count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: image_count,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: image_count,
        },
    ]
}

/// Descriptor pool sized exactly for one set per swapchain image
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
    max_sets: u32,
}

impl DescriptorPool {
    /// Create a pool holding `image_count` sets
    pub fn for_image_count(device: Device, image_count: u32) -> VulkanResult<Self> {
        let sizes = pool_sizes(image_count);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(image_count)
            .pool_sizes(&sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::Api)?;

        log::debug!("Descriptor pool created for {} sets", image_count);
        Ok(Self {
            pool,
            device,
            max_sets: image_count,
        })
    }

    /// Allocate one set per swapchain image with the same layout
    pub fn allocate_per_image(&self, layout: vk::DescriptorSetLayout) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; self.max_sets as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)
    }

    /// Number of sets the pool was sized for
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // Destroying the pool frees every set allocated from it
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// One queued descriptor write
#[derive(Debug, Clone, Copy)]
pub enum PendingWrite {
    /// Uniform buffer range
    Buffer {
        /// Target set
        set: vk::DescriptorSet,
        /// Target binding
        binding: u32,
        /// Buffer, offset and range
        info: vk::DescriptorBufferInfo,
    },
    /// Combined image sampler
    Image {
        /// Target set
        set: vk::DescriptorSet,
        /// Target binding
        binding: u32,
        /// View, sampler and layout
        info: vk::DescriptorImageInfo,
    },
}

impl PendingWrite {
    /// Binding the write targets
    pub fn binding(&self) -> u32 {
        match self {
            Self::Buffer { binding, .. } | Self::Image { binding, .. } => *binding,
        }
    }

    /// Descriptor type the write fills
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::Buffer { .. } => vk::DescriptorType::UNIFORM_BUFFER,
            Self::Image { .. } => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// Collects descriptor writes and submits them in one update call
///
/// Info structs are kept by value until [`DescriptorSetWriter::update`], which
/// builds the `vk::WriteDescriptorSet` array against storage that stays put
/// for the duration of the call.
#[derive(Default)]
pub struct DescriptorSetWriter {
    pending: Vec<PendingWrite>,
}

impl DescriptorSetWriter {
    /// Create a new descriptor set writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a uniform buffer to a descriptor set
    pub fn write_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> Self {
        self.pending.push(PendingWrite::Buffer {
            set,
            binding,
            info: vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            },
        });
        self
    }

    /// Write a shader-readable image and its sampler to a descriptor set
    pub fn write_image(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Self {
        self.pending.push(PendingWrite::Image {
            set,
            binding,
            info: vk::DescriptorImageInfo {
                sampler,
                image_view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        });
        self
    }

    /// Writes queued so far
    pub fn pending(&self) -> &[PendingWrite] {
        &self.pending
    }

    /// Apply every queued write
    pub fn update(self, device: &Device) {
        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = self.pending
            .iter()
            .map(|write| match write {
                PendingWrite::Buffer { info, .. } => [*info],
                PendingWrite::Image { .. } => [vk::DescriptorBufferInfo::default()],
            })
            .collect();
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = self.pending
            .iter()
            .map(|write| match write {
                PendingWrite::Image { info, .. } => [*info],
                PendingWrite::Buffer { .. } => [vk::DescriptorImageInfo::default()],
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = self.pending
            .iter()
            .enumerate()
            .map(|(i, write)| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_array_element(0)
                    .descriptor_type(write.descriptor_type());
                match write {
                    PendingWrite::Buffer { set, binding, .. } => builder
                        .dst_set(*set)
                        .dst_binding(*binding)
                        .buffer_info(&buffer_infos[i])
                        .build(),
                    PendingWrite::Image { set, binding, .. } => builder
                        .dst_set(*set)
                        .dst_binding(*binding)
                        .image_info(&image_infos[i])
                        .build(),
                }
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn pool_holds_one_of_each_per_image() {
        for count in [1, 2, 3, 5] {
            let sizes = pool_sizes(count);
            assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
            assert_eq!(sizes[0].descriptor_count, count);
            assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
            assert_eq!(sizes[1].descriptor_count, count);
        }
    }

    #[test]
    fn layout_puts_uniforms_at_zero_and_texture_at_one() {
        let builder = DescriptorSetLayoutBuilder::textured_mesh();
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 2);

        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn writer_targets_expected_bindings() {
        let set = vk::DescriptorSet::from_raw(7);
        let writer = DescriptorSetWriter::new()
            .write_buffer(set, UNIFORM_BINDING, vk::Buffer::from_raw(1), 192)
            .write_image(set, TEXTURE_BINDING, vk::ImageView::from_raw(2), vk::Sampler::from_raw(3));

        let pending = writer.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].binding(), 0);
        assert_eq!(pending[0].descriptor_type(), vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(pending[1].binding(), 1);
        assert_eq!(pending[1].descriptor_type(), vk::DescriptorType::COMBINED_IMAGE_SAMPLER);

        match pending[1] {
            PendingWrite::Image { info, .. } => {
                assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            }
            PendingWrite::Buffer { .. } => panic!("expected image write"),
        }
    }
}
