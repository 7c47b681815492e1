//! Mesh representation
//!
//! Backend-agnostic geometry: an interleaved vertex list and 32-bit
//! triangle indices. The Vulkan input layout lives in
//! `vulkan::vertex_layout`.

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex as the shaders consume it
///
/// `#[repr(C)]` keeps the field order and offsets stable for GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Vertex color
    pub color: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Normal vector
    pub normal: [f32; 3],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            color,
            tex_coord,
            normal,
        }
    }

    /// Exact bit pattern, for de-duplicating identical vertices in a hash map
    pub(crate) fn bit_key(&self) -> [u32; 11] {
        let mut key = [0u32; 11];
        let floats = self.position
            .iter()
            .chain(&self.color)
            .chain(&self.tex_coord)
            .chain(&self.normal);
        for (slot, value) in key.iter_mut().zip(floats) {
            *slot = value.to_bits();
        }
        key
    }
}

/// Geometry container used by the renderer for its single draw
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit quad in the XY plane facing +Z, one color per corner
    pub fn quad() -> Self {
        let normal = [0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0], normal),
            Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0], normal),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0], normal),
            Vertex::new([-0.5, 0.5, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0], normal),
        ];
        let indices = vec![0, 1, 2, 2, 3, 0];
        Self::new(vertices, indices)
    }

    /// Get the number of triangles in this mesh
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the mesh can be drawn: non-empty, whole triangles, indices in range
    pub fn is_drawable(&self) -> bool {
        !self.indices.is_empty()
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < self.vertices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_two_triangles() {
        let quad = Mesh::quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(quad.triangle_count(), 2);
        assert!(quad.is_drawable());
    }

    #[test]
    fn out_of_range_index_is_not_drawable() {
        let mesh = Mesh::new(vec![Vertex::default(); 2], vec![0, 1, 2]);
        assert!(!mesh.is_drawable());
        assert!(!Mesh::new(Vec::new(), Vec::new()).is_drawable());
    }

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        let v = Vertex::new([1.0, 2.0, 3.0], [0.0; 3], [0.5, 0.5], [0.0, 0.0, 1.0]);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&v));
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[6], 0.5);
        assert_eq!(floats[10], 1.0);
    }

    #[test]
    fn bit_key_distinguishes_signed_zero() {
        let a = Vertex::new([0.0; 3], [0.0; 3], [0.0; 2], [0.0; 3]);
        let b = Vertex::new([-0.0, 0.0, 0.0], [0.0; 3], [0.0; 2], [0.0; 3]);
        assert_ne!(a.bit_key(), b.bit_key());
        assert_eq!(a.bit_key(), a.bit_key());
    }
}
