//! Wavefront OBJ surfaces with optional sibling textures

use crate::decode::{Decoder, StandardImageDecoder};
use crate::error::{Result, VolpkgError};
use crate::types::ChunkData;
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

/// Triangle mesh. Texture coordinates and normals, when present, are per
/// vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// `(n, 3)` vertex positions
    pub vertices: Array2<f32>,

    /// `(m, 3)` zero-based vertex indices
    pub faces: Array2<u32>,

    /// `(n, 3)` vertex normals
    pub normals: Option<Array2<f32>>,

    /// `(n, 2)` texture coordinates
    pub texcoords: Option<Array2<f32>>,
}

/// A mesh together with its display name and texture image
#[derive(Debug, Clone)]
pub struct Surface {
    pub mesh: Mesh,
    pub name: String,
    pub texture: Option<ChunkData>,
}

/// Read an OBJ file. Polygons are triangulated as fans.
pub fn read_mesh(path: impl AsRef<Path>) -> Result<Mesh> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| VolpkgError::unreadable(path, e))?;
    parse_obj(&text).map_err(|reason| {
        VolpkgError::InvalidFormat(format!("{}: {}", path.display(), reason))
    })
}

/// Read a mesh plus `<stem>.tif` next to it, if that file exists
pub fn read_surface(path: impl AsRef<Path>) -> Result<Surface> {
    let path = path.as_ref();
    let mesh = read_mesh(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let texture_path = texture_path(path);
    let texture = if texture_path.is_file() {
        Some(StandardImageDecoder.decode(&texture_path)?)
    } else {
        None
    };

    tracing::debug!(
        path = %path.display(),
        vertices = mesh.vertices.nrows(),
        faces = mesh.faces.nrows(),
        textured = texture.is_some(),
        "read surface"
    );

    Ok(Surface {
        mesh,
        name,
        texture,
    })
}

fn texture_path(mesh_path: &Path) -> PathBuf {
    mesh_path.with_extension("tif")
}

/// One `f` corner: vertex, optional texcoord, optional normal (zero-based)
type Corner = (usize, Option<usize>, Option<usize>);

fn parse_obj(text: &str) -> std::result::Result<Mesh, String> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::new();
    let mut vertex_uv: Vec<Option<usize>> = Vec::new();
    let mut vertex_normal: Vec<Option<usize>> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let at = |msg: String| format!("line {}: {}", line_no + 1, msg);

        match keyword {
            "v" => {
                let v = parse_floats::<3>(&mut parts).map_err(at)?;
                positions.push(v);
                vertex_uv.push(None);
                vertex_normal.push(None);
            }
            "vt" => uvs.push(parse_floats::<2>(&mut parts).map_err(at)?),
            "vn" => normals.push(parse_floats::<3>(&mut parts).map_err(at)?),
            "f" => {
                let corners = parts
                    .map(|token| parse_corner(token, positions.len(), uvs.len(), normals.len()))
                    .collect::<std::result::Result<Vec<Corner>, String>>()
                    .map_err(at)?;
                if corners.len() < 3 {
                    return Err(at(format!("face has {} vertices", corners.len())));
                }
                for &(v, t, n) in &corners {
                    if t.is_some() {
                        vertex_uv[v] = t;
                    }
                    if n.is_some() {
                        vertex_normal[v] = n;
                    }
                }
                for i in 1..corners.len() - 1 {
                    triangles.push([
                        corners[0].0 as u32,
                        corners[i].0 as u32,
                        corners[i + 1].0 as u32,
                    ]);
                }
            }
            _ => {}
        }
    }

    let n = positions.len();
    let vertices = Array2::from_shape_vec((n, 3), positions.into_iter().flatten().collect())
        .map_err(|e| e.to_string())?;
    let faces = Array2::from_shape_vec(
        (triangles.len(), 3),
        triangles.into_iter().flatten().collect(),
    )
    .map_err(|e| e.to_string())?;

    let texcoords = per_vertex(&vertex_uv, &uvs)?;
    let normals = per_vertex(&vertex_normal, &normals)?;

    Ok(Mesh {
        vertices,
        faces,
        normals,
        texcoords,
    })
}

/// Gather attributes by vertex; `None` when no face referenced any
fn per_vertex<const N: usize>(
    indices: &[Option<usize>],
    values: &[[f32; N]],
) -> std::result::Result<Option<Array2<f32>>, String> {
    if indices.iter().all(Option::is_none) {
        return Ok(None);
    }
    let flat: Vec<f32> = indices
        .iter()
        .flat_map(|idx| idx.map(|i| values[i]).unwrap_or([0.0; N]))
        .collect();
    Array2::from_shape_vec((indices.len(), N), flat)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
) -> std::result::Result<[f32; N], String> {
    let mut out = [0.0f32; N];
    for slot in out.iter_mut() {
        let token = parts
            .next()
            .ok_or_else(|| format!("expected {} values", N))?;
        *slot = token
            .parse()
            .map_err(|e| format!("invalid number '{}': {}", token, e))?;
    }
    Ok(out)
}

fn parse_corner(
    token: &str,
    n_positions: usize,
    n_uvs: usize,
    n_normals: usize,
) -> std::result::Result<Corner, String> {
    let mut fields = token.split('/');
    let v = resolve_index(fields.next(), n_positions)?
        .ok_or_else(|| format!("face corner '{}' has no vertex index", token))?;
    let t = resolve_index(fields.next(), n_uvs)?;
    let n = resolve_index(fields.next(), n_normals)?;
    Ok((v, t, n))
}

/// Convert a one-based (or negative, relative) OBJ index to zero-based
fn resolve_index(field: Option<&str>, count: usize) -> std::result::Result<Option<usize>, String> {
    let field = match field {
        Some(f) if !f.is_empty() => f,
        _ => return Ok(None),
    };
    let raw: i64 = field
        .parse()
        .map_err(|e| format!("invalid index '{}': {}", field, e))?;
    let index = if raw > 0 {
        raw - 1
    } else {
        count as i64 + raw
    };
    if raw == 0 || index < 0 || index >= count as i64 {
        return Err(format!("index {} out of range (have {})", raw, count));
    }
    Ok(Some(index as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use tempfile::TempDir;

    const QUAD: &str = "\
# unit quad
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_parse_quad_triangulates() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertices.shape(), &[4, 3]);
        assert_eq!(mesh.faces.shape(), &[2, 3]);
        assert_eq!(mesh.faces.row(0).to_vec(), vec![0, 1, 2]);
        assert_eq!(mesh.faces.row(1).to_vec(), vec![0, 2, 3]);
        let uv = mesh.texcoords.unwrap();
        assert_eq!(uv.row(2).to_vec(), vec![1.0, 1.0]);
        assert_eq!(mesh.normals.unwrap().row(3).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_negative_indices_and_plain_faces() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.faces.row(0).to_vec(), vec![0, 1, 2]);
        assert!(mesh.texcoords.is_none());
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_bad_index() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(err.starts_with("line 2"));
    }

    #[test]
    fn test_read_surface_with_texture() {
        let temp_dir = TempDir::new().unwrap();
        let mesh_path = temp_dir.path().join("20230503.obj");
        fs::write(&mesh_path, QUAD).unwrap();
        let texture: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(4, 4, Luma([5]));
        texture.save(temp_dir.path().join("20230503.tif")).unwrap();

        let surface = read_surface(&mesh_path).unwrap();
        assert_eq!(surface.name, "20230503");
        assert_eq!(surface.texture.unwrap().shape(), &[4, 4]);
    }

    #[test]
    fn test_read_surface_without_texture() {
        let temp_dir = TempDir::new().unwrap();
        let mesh_path = temp_dir.path().join("plain.obj");
        fs::write(&mesh_path, QUAD).unwrap();

        let surface = read_surface(&mesh_path).unwrap();
        assert!(surface.texture.is_none());
    }
}
