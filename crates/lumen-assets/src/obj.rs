//! Wavefront OBJ mesh loading.
//!
//! Parses position and face statements into the flat arrays the renderer
//! consumes; the rendering core never sees the file format.

use crate::error::{AssetError, Result};
use glam::Vec3;
use std::fmt::Display;
use std::path::Path;

/// A mesh as flat arrays: tightly packed 3-float positions and u32 indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Load a mesh from a Wavefront OBJ file.
    pub fn from_obj_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mesh = Self::from_obj_str(&text)?;
        tracing::info!(
            "Loaded {}: {} vertices, {} triangles",
            path.as_ref().display(),
            mesh.vertex_count(),
            mesh.indices.len() / 3
        );
        Ok(mesh)
    }

    /// Parse OBJ text: `v` position statements and `f` face statements.
    ///
    /// Faces with more than three corners are triangulated as a fan. Vertex
    /// references are 1-based; negative references count back from the most
    /// recently declared vertex.
    pub fn from_obj_str(text: &str) -> Result<Self> {
        let mut mesh = Self::default();

        for (line_index, line) in text.lines().enumerate() {
            let line_number = line_index + 1;
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("v") => {
                    for _ in 0..3 {
                        let field = fields
                            .next()
                            .ok_or_else(|| parse_error(line_number, "vertex needs 3 coordinates"))?;
                        let value: f32 = field
                            .parse()
                            .map_err(|e| parse_error(line_number, format_args!("bad coordinate {field:?}: {e}")))?;
                        mesh.vertices.push(value);
                    }
                }
                Some("f") => {
                    let vertex_count = mesh.vertices.len() / 3;
                    let corners: Vec<u32> = fields
                        .map(|field| parse_face_corner(field, vertex_count, line_number))
                        .collect::<Result<_>>()?;
                    if corners.len() < 3 {
                        return Err(parse_error(line_number, "face needs at least 3 corners"));
                    }
                    // Fan triangulation
                    for i in 1..corners.len() - 1 {
                        mesh.indices.push(corners[0]);
                        mesh.indices.push(corners[i]);
                        mesh.indices.push(corners[i + 1]);
                    }
                }
                // Normals, texcoords, groups, materials, comments: ignored
                _ => {}
            }
        }

        Ok(mesh)
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Scale every vertex componentwise.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.map_positions(|v| v * Vec3::new(x, y, z));
    }

    /// Translate every vertex.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.map_positions(|v| v + Vec3::new(x, y, z));
    }

    /// Rotate every vertex around the Y axis by `radians`.
    pub fn rotate_y(&mut self, radians: f32) {
        let rotation = glam::Mat3::from_rotation_y(radians);
        self.map_positions(|v| rotation * v);
    }

    fn map_positions(&mut self, f: impl Fn(Vec3) -> Vec3) {
        for chunk in self.vertices.chunks_exact_mut(3) {
            let v = f(Vec3::new(chunk[0], chunk[1], chunk[2]));
            chunk[0] = v.x;
            chunk[1] = v.y;
            chunk[2] = v.z;
        }
    }
}

/// Parse one face corner (`i`, `i/t`, `i//n`, or `i/t/n`) into a 0-based
/// vertex index.
fn parse_face_corner(field: &str, vertex_count: usize, line_number: usize) -> Result<u32> {
    let reference = field.split('/').next().unwrap_or(field);
    let index: i64 = reference
        .parse()
        .map_err(|e| parse_error(line_number, format_args!("bad face reference {field:?}: {e}")))?;

    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        vertex_count as i64 + index
    } else {
        return Err(parse_error(line_number, "face reference 0 is not valid"));
    };

    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(parse_error(
            line_number,
            format_args!("face reference {index} out of range"),
        ));
    }
    Ok(resolved as u32)
}

fn parse_error(line: usize, msg: impl Display) -> AssetError {
    AssetError::Parse {
        line,
        msg: msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
# a lone triangle
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
";

    #[test]
    fn parses_triangle() {
        let mesh = MeshData::from_obj_str(TRIANGLE).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn triangulates_quad_as_fan() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = MeshData::from_obj_str(text).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn resolves_negative_references() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = MeshData::from_obj_str(text).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn ignores_texcoord_and_normal_references() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1/1 2//2 3/3\n";
        let mesh = MeshData::from_obj_str(text).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn rejects_out_of_range_reference() {
        let text = "v 0 0 0\nf 1 2 3\n";
        let err = MeshData::from_obj_str(text).unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_short_vertex() {
        let text = "v 1.0 2.0\n";
        let err = MeshData::from_obj_str(text).unwrap_err();
        assert!(matches!(err, AssetError::Parse { line: 1, .. }));
    }

    #[test]
    fn scale_and_translate_compose() {
        let mut mesh = MeshData::from_obj_str(TRIANGLE).unwrap();
        mesh.scale(2.0, 2.0, 2.0);
        mesh.translate(0.0, -0.5, 0.0);
        assert_eq!(&mesh.vertices[..3], &[0.0, -0.5, 0.0]);
        assert_eq!(&mesh.vertices[3..6], &[2.0, -0.5, 0.0]);
    }

    #[test]
    fn rotate_y_half_turn_flips_x_and_z() {
        let mut mesh = MeshData {
            vertices: vec![1.0, 0.0, 2.0],
            indices: vec![],
        };
        mesh.rotate_y(std::f32::consts::PI);
        assert!((mesh.vertices[0] - -1.0).abs() < 1e-5);
        assert!((mesh.vertices[1]).abs() < 1e-5);
        assert!((mesh.vertices[2] - -2.0).abs() < 1e-5);
    }
}
