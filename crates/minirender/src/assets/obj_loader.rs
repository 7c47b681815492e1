//! OBJ file loader for 3D models
//!
//! Faces are triangulated and all objects in the file are merged into a
//! single indexed mesh. Identical vertices are shared.

use crate::assets::AssetError;
use crate::render::{Mesh, Vertex};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const VERTEX_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

/// Load an OBJ file and return a mesh
pub fn read_obj_file(path: impl AsRef<Path>) -> Result<Mesh, AssetError> {
    let path = path.as_ref();
    log::debug!("Loading mesh from: {:?}", path);

    let file = File::open(path)?;
    let mesh = parse_obj(&mut BufReader::new(file))?;

    log::info!(
        "Loaded mesh {:?}: {} vertices, {} triangles",
        path,
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Parse OBJ text into a mesh; material libraries are ignored
pub fn parse_obj<R: BufRead>(reader: &mut R) -> Result<Mesh, AssetError> {
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj_buf(reader, &options, |_| Err(tobj::LoadError::OpenFileFailed))
        .map_err(|e| AssetError::LoadFailed(format!("Failed to parse OBJ: {}", e)))?;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut unique: HashMap<[u32; 11], u32> = HashMap::new();

    for model in &models {
        let mesh = &model.mesh;
        for &index in &mesh.indices {
            let i = index as usize;
            let position = mesh
                .positions
                .get(3 * i..3 * i + 3)
                .ok_or_else(|| AssetError::InvalidFormat("Position index out of bounds".to_string()))?;

            // OBJ puts v = 0 at the bottom of the image, Vulkan samples from the top
            let tex_coord = mesh
                .texcoords
                .get(2 * i..2 * i + 2)
                .map_or([0.0, 0.0], |uv| [uv[0], 1.0 - uv[1]]);

            let normal = mesh
                .normals
                .get(3 * i..3 * i + 3)
                .map_or(DEFAULT_NORMAL, |n| [n[0], n[1], n[2]]);

            let vertex = Vertex::new([position[0], position[1], position[2]], VERTEX_COLOR, tex_coord, normal);
            let slot = *unique.entry(vertex.bit_key()).or_insert_with(|| {
                vertices.push(vertex);
                (vertices.len() - 1) as u32
            });
            indices.push(slot);
        }
    }

    if vertices.is_empty() {
        return Err(AssetError::InvalidFormat("No vertices found in OBJ file".to_string()));
    }

    Ok(Mesh::new(vertices, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SQUARE: &str = "\
# unit square as one quad face
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_face_is_triangulated_and_shared() {
        let mesh = parse_obj(&mut Cursor::new(SQUARE)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.is_drawable());
    }

    #[test]
    fn texture_v_is_flipped() {
        let mesh = parse_obj(&mut Cursor::new(SQUARE)).unwrap();
        let first = mesh
            .vertices
            .iter()
            .find(|v| v.position == [-0.5, -0.5, 0.0])
            .unwrap();
        assert_eq!(first.tex_coord, [0.0, 1.0]);
        assert_eq!(first.color, VERTEX_COLOR);
        assert_eq!(first.normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(&mut Cursor::new(src)).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == [0.0, 0.0]));
        assert!(mesh.vertices.iter().all(|v| v.normal == DEFAULT_NORMAL));
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = parse_obj(&mut Cursor::new("# nothing here\n")).unwrap_err();
        assert!(matches!(err, AssetError::InvalidFormat(_)));
    }
}
