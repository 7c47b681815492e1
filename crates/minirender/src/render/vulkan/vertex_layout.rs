//! Vulkan vertex input layout for [`Vertex`]
//!
//! Keeps the Vulkan-specific description out of the mesh module so that
//! `Vertex` stays a plain data type.

use ash::vk;
use std::mem::{offset_of, size_of};
use crate::render::mesh::Vertex;

/// Vertex input description for the interleaved [`Vertex`] buffer
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// One binding, advancing per vertex
    pub fn get_binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position, color, texture coordinate and normal at locations 0 to 3
    pub fn get_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, color) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, tex_coord) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, normal) as u32,
            },
        ]
    }

    /// Binding and attributes together, for pipeline creation
    pub fn get_input_state() -> (vk::VertexInputBindingDescription, [vk::VertexInputAttributeDescription; 4]) {
        (Self::get_binding_description(), Self::get_attribute_descriptions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_are_packed_in_declaration_order() {
        let attributes = VulkanVertexLayout::get_attribute_descriptions();
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
        let locations: Vec<u32> = attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2, 3]);
    }

    #[test]
    fn stride_matches_vertex_size() {
        assert_eq!(VulkanVertexLayout::get_binding_description().stride, 44);
    }
}
