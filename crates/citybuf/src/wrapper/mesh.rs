use super::{pack_fields, Buffers, Wrap, WrapConfig};
use crate::error::{Result, WrapError};
use crate::fields::{self, Fields, Granularity};
use crate::geometry::{GeometryKind, Mesh};
use crate::parts::Submeshes;
use crate::texture::TexelLayout;
use crate::vertex::{IndexBuffer, MeshVertex, Primitive};
use glam::DVec3;
use log::{debug, warn};

/// How vertex records relate to the source mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshLayout {
    /// One record per source vertex; faces index shared records.
    Shared,
    /// Three records per face so each face carries its own normal and data.
    PerFace,
}

/// Triangle mesh packed into `MeshVertex` records.
///
/// The layout is chosen once, the same way for every mesh: `PerFace` when a
/// face-granular field was accepted, when parts with different ids share a
/// vertex, or when flat shading is configured; `Shared` otherwise. The shared
/// layout keeps only vertices referenced by a drawn face.
///
/// Faces with out-of-range indices, non-finite corners or zero area are
/// dropped and counted in `skipped()`.
#[derive(Debug, Clone)]
pub struct MeshWrapper {
    buffers: Buffers<MeshVertex>,
    layout: MeshLayout,
    parts: Option<Submeshes>,
    face_count: usize,
}

struct ValidFace {
    index: usize,
    corners: [u32; 3],
    /// Unnormalised `(b - a) x (c - a)`, twice the face area in length.
    cross: DVec3,
}

/// Faces worth drawing, or `None` for a degenerate one.
fn check_face(mesh: &Mesh, index: usize, face: [u32; 3]) -> Option<ValidFace> {
    let n = mesh.vertices.len();
    if face.iter().any(|&i| i as usize >= n) {
        return None;
    }

    let [a, b, c] = face.map(|i| DVec3::from_array(mesh.vertices[i as usize]));
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return None;
    }

    let e1 = b - a;
    let e2 = c - a;
    let cross = e1.cross(e2);

    // Relative test so large geographic coordinates are judged like small ones.
    let scale = e1.length() * e2.length();
    if scale == 0.0 || cross.length() <= scale * 1e-12 {
        return None;
    }

    Some(ValidFace {
        index,
        corners: face,
        cross,
    })
}

impl MeshWrapper {
    /// Wrap `mesh`, optionally with scalar `data` and picking `parts`.
    ///
    /// `parts` must describe exactly `mesh.faces.len()` faces; its (already
    /// offset) ids are written per face. Without parts every record gets
    /// `config.first_id`.
    pub fn new(
        name: &str,
        mesh: &Mesh,
        config: &WrapConfig,
        data: Option<&Fields>,
        parts: Option<&Submeshes>,
    ) -> Result<Self> {
        let n_vertices = mesh.vertices.len();
        let n_faces = mesh.faces.len();

        // ---------------------------------------------------------------------
        // Picking ids per source face
        // ---------------------------------------------------------------------
        let face_ids: Option<Vec<u32>> = match parts {
            Some(parts) => {
                if parts.face_count() != n_faces {
                    return Err(WrapError::PartsMismatch {
                        faces: n_faces,
                        covered: parts.face_count(),
                    });
                }
                Some(parts.face_ids())
            }
            None => None,
        };
        let id_of_face = |f: usize| -> f32 {
            face_ids
                .as_ref()
                .map_or(config.first_id, |ids| ids[f]) as f32
        };

        // ---------------------------------------------------------------------
        // Drop degenerate faces
        // ---------------------------------------------------------------------
        let valid: Vec<ValidFace> = mesh
            .faces
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| check_face(mesh, i, f))
            .collect();

        let skipped = n_faces - valid.len();
        if skipped > 0 {
            warn!("{name}: skipped {skipped} of {n_faces} degenerate faces");
        }
        if valid.is_empty() {
            return Err(WrapError::EmptyGeometry {
                name: name.to_owned(),
            });
        }

        // ---------------------------------------------------------------------
        // Fields decide the layout
        // ---------------------------------------------------------------------
        let set = fields::resolve(
            name,
            data,
            &[(Granularity::Vertex, n_vertices), (Granularity::Face, n_faces)],
            &mesh.vertices,
        );

        // A vertex shared by faces of different parts cannot carry one id.
        let split_ids = face_ids.as_ref().is_some_and(|ids| {
            let mut seen: Vec<Option<u32>> = vec![None; n_vertices];
            valid.iter().any(|face| {
                let id = ids[face.index];
                face.corners
                    .iter()
                    .any(|&v| *seen[v as usize].get_or_insert(id) != id)
            })
        });

        let layout = if set.has_face_data() || split_ids || config.shading == super::Shading::Flat
        {
            MeshLayout::PerFace
        } else {
            MeshLayout::Shared
        };
        debug!(
            "{name}: {n_vertices} vertices, {} faces, {layout:?} layout",
            valid.len()
        );

        let mut positions = Vec::new();
        let mut records = Vec::new();
        let mut indices = Vec::with_capacity(valid.len() * 3);
        // (source vertex, source face) per record
        let mut source = Vec::new();

        match layout {
            MeshLayout::Shared => {
                // Area-weighted normals: summing raw cross products weights by area.
                let mut normals = vec![DVec3::ZERO; n_vertices];
                let mut owner: Vec<Option<usize>> = vec![None; n_vertices];

                for face in &valid {
                    for &v in &face.corners {
                        normals[v as usize] += face.cross;
                        owner[v as usize].get_or_insert(face.index);
                    }
                }

                // Only vertices of drawn faces get a record.
                let mut remap = vec![u32::MAX; n_vertices];
                for (v, p) in mesh.vertices.iter().enumerate() {
                    let Some(face) = owner[v] else {
                        continue;
                    };
                    remap[v] = records.len() as u32;
                    positions.push(*p);
                    records.push(MeshVertex {
                        position: DVec3::from_array(*p).as_vec3().to_array(),
                        texel: [0.0; 2],
                        id: id_of_face(face),
                        normal: normals[v].normalize_or_zero().as_vec3().to_array(),
                    });
                    source.push((v, face));
                }

                for face in &valid {
                    indices.extend(face.corners.map(|v| remap[v as usize]));
                }
            }
            MeshLayout::PerFace => {
                positions.reserve(valid.len() * 3);
                records.reserve(valid.len() * 3);
                source.reserve(valid.len() * 3);

                for face in &valid {
                    let normal = face.cross.normalize().as_vec3().to_array();
                    let id = id_of_face(face.index);

                    for &v in &face.corners {
                        let p = mesh.vertices[v as usize];
                        indices.push(records.len() as u32);
                        positions.push(p);
                        records.push(MeshVertex {
                            position: DVec3::from_array(p).as_vec3().to_array(),
                            texel: [0.0; 2],
                            id,
                            normal,
                        });
                        source.push((v as usize, face.index));
                    }
                }
            }
        }

        // ---------------------------------------------------------------------
        // Data texture
        // ---------------------------------------------------------------------
        let texels = TexelLayout::new(records.len(), config.max_texture_size)?;
        for (i, r) in records.iter_mut().enumerate() {
            r.texel = texels.texel_f32(i);
        }
        let texture = pack_fields(texels, &set, &source);

        let (first_id, id_count) = match parts {
            Some(parts) => (parts.first_id().unwrap_or(config.first_id), parts.len() as u32),
            None => (config.first_id, 1),
        };

        let buffers = Buffers::new(
            name,
            positions,
            records,
            IndexBuffer::new(Primitive::Triangles, indices),
        )
        .with_texture(texture, set.active)
        .with_skipped(skipped)
        .with_ids(first_id, id_count)?;

        Ok(Self {
            buffers,
            layout,
            parts: parts.cloned(),
            face_count: valid.len(),
        })
    }

    #[inline]
    pub fn layout(&self) -> MeshLayout {
        self.layout
    }

    /// Faces actually drawn.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn parts(&self) -> Option<&Submeshes> {
        self.parts.as_ref()
    }
}

impl Wrap for MeshWrapper {
    type Vertex = MeshVertex;

    const KIND: GeometryKind = GeometryKind::Mesh;

    fn buffers(&self) -> &Buffers<MeshVertex> {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut Buffers<MeshVertex> {
        &mut self.buffers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrapper::Shading;

    fn quad() -> Mesh {
        Mesh::new(
            vec![
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 2.0],
                [1.0, 1.0, 3.0],
                [0.0, 1.0, 4.0],
            ],
            vec![[0, 1, 2], [2, 3, 0]],
        )
    }

    fn flat_quad() -> Mesh {
        let mut m = quad();
        for v in &mut m.vertices {
            v[2] = 0.0;
        }
        m
    }

    #[test]
    fn test_quad_shared_layout() {
        let w = MeshWrapper::new("quad", &quad(), &WrapConfig::default(), None, None).unwrap();

        assert_eq!(w.layout(), MeshLayout::Shared);
        assert_eq!(w.vertices().as_floats().len(), 4 * 9);
        assert_eq!(w.indices().indices, vec![0, 1, 2, 2, 3, 0]);

        let tex = w.data_texture().unwrap();
        assert_eq!(w.active_field(), Some("vertex_z"));
        let z = &tex.layer("vertex_z").unwrap().texels[..4];
        assert_eq!(z, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_default_field_is_raw_z() {
        let m = quad();
        let w = MeshWrapper::new("quad", &m, &WrapConfig::default(), None, None).unwrap();
        let tex = w.data_texture().unwrap();

        for (i, v) in m.vertices.iter().enumerate() {
            let texel = tex.layout().texel(i);
            assert_eq!(tex.value_at("vertex_z", texel), Some(v[2] as f32));
        }
    }

    #[test]
    fn test_face_data_triplicates() {
        let data: Fields = [("roof", vec![7.0, 9.0])].into_iter().collect();
        let w = MeshWrapper::new("quad", &quad(), &WrapConfig::default(), Some(&data), None)
            .unwrap();

        assert_eq!(w.layout(), MeshLayout::PerFace);
        assert_eq!(w.vertices().len(), 6);
        assert_eq!(w.indices().indices, vec![0, 1, 2, 3, 4, 5]);

        let tex = w.data_texture().unwrap();
        let roof = &tex.layer("roof").unwrap().texels[..6];
        assert_eq!(roof, &[7.0, 7.0, 7.0, 9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_vertex_data_keeps_shared_layout() {
        let data: Fields = [("h", vec![0.5, 1.5, 2.5, 3.5])].into_iter().collect();
        let w = MeshWrapper::new("quad", &quad(), &WrapConfig::default(), Some(&data), None)
            .unwrap();

        assert_eq!(w.layout(), MeshLayout::Shared);
        assert_eq!(w.active_field(), Some("h"));
        assert!(w.data_texture().unwrap().layer("vertex_z").is_none());
    }

    #[test]
    fn test_mismatched_data_falls_back() {
        let data: Fields = [("h", vec![1.0; 3])].into_iter().collect();
        let w = MeshWrapper::new("quad", &quad(), &WrapConfig::default(), Some(&data), None)
            .unwrap();

        assert_eq!(w.active_field(), Some("vertex_z"));
        assert_eq!(w.layout(), MeshLayout::Shared);
    }

    #[test]
    fn test_flat_shading_normals() {
        let cfg = WrapConfig {
            shading: Shading::Flat,
            ..WrapConfig::default()
        };
        let w = MeshWrapper::new("quad", &flat_quad(), &cfg, None, None).unwrap();

        assert_eq!(w.layout(), MeshLayout::PerFace);
        for r in w.vertices().records() {
            assert_eq!(r.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_smooth_normals_are_unit() {
        let w = MeshWrapper::new("quad", &quad(), &WrapConfig::default(), None, None).unwrap();
        for r in w.vertices().records() {
            let [x, y, z] = r.normal;
            assert!(((x * x + y * y + z * z).sqrt() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_faces_skipped() {
        let mut m = quad();
        m.faces.push([0, 0, 1]); // zero area
        m.faces.push([0, 1, 9]); // out of range

        let w = MeshWrapper::new("quad", &m, &WrapConfig::default(), None, None).unwrap();
        assert_eq!(w.skipped(), 2);
        assert_eq!(w.face_count(), 2);
        assert_eq!(w.indices().indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn test_all_degenerate_is_empty() {
        let m = Mesh::new(vec![[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], vec![[0, 1, 2]]);
        assert!(matches!(
            MeshWrapper::new("line", &m, &WrapConfig::default(), None, None),
            Err(WrapError::EmptyGeometry { .. })
        ));
    }

    #[test]
    fn test_parts_ids_per_face() {
        let a = quad();
        let mut b = quad();
        for v in &mut b.vertices {
            v[0] += 5.0;
        }

        let mut parts = Submeshes::new(&[a.clone(), b.clone()], &["a", "b"]).unwrap();
        parts.offset_ids(10).unwrap();

        let merged = Mesh::concatenate(&[a, b]);
        let w = MeshWrapper::new("block", &merged, &WrapConfig::default(), None, Some(&parts))
            .unwrap();

        assert_eq!(w.first_id(), 10);
        assert_eq!(w.id_count(), 2);
        let ids: Vec<f32> = w.vertices().records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10.0, 10.0, 10.0, 10.0, 11.0, 11.0, 11.0, 11.0]);
    }

    #[test]
    fn test_parts_must_cover_mesh() {
        let parts = Submeshes::new(&[quad()], &["a"]).unwrap();
        let merged = Mesh::concatenate(&[quad(), quad()]);
        assert_eq!(
            MeshWrapper::new("m", &merged, &WrapConfig::default(), None, Some(&parts)).err(),
            Some(WrapError::PartsMismatch {
                faces: 4,
                covered: 2
            })
        );
    }

    #[test]
    fn test_texture_wraps_rows() {
        let cfg = WrapConfig {
            max_texture_size: 3,
            ..WrapConfig::default()
        };
        let w = MeshWrapper::new("quad", &quad(), &cfg, None, None).unwrap();
        let tex = w.data_texture().unwrap();
        assert_eq!((tex.width(), tex.height()), (3, 2));

        let texels: Vec<[f32; 2]> = w.vertices().records().iter().map(|r| r.texel).collect();
        assert_eq!(texels, vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0]]);
        assert_eq!(tex.value_at("vertex_z", [0, 1]), Some(4.0));
    }

    #[test]
    fn test_parts_sharing_vertices_triplicate() {
        let parts = Submeshes::from_face_counts(&[1, 1], &["a", "b"]).unwrap();
        let w = MeshWrapper::new("quad", &quad(), &WrapConfig::default(), None, Some(&parts))
            .unwrap();

        assert_eq!(w.layout(), MeshLayout::PerFace);
        let ids: Vec<f32> = w.vertices().records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unreferenced_vertices_dropped() {
        let mut m = quad();
        m.vertices.push([f64::NAN, 0.0, 0.0]);
        m.vertices.push([9.0, 9.0, 9.0]);
        m.faces.push([4, 5, 0]); // non-finite corner

        let w = MeshWrapper::new("quad", &m, &WrapConfig::default(), None, None).unwrap();

        assert_eq!(w.layout(), MeshLayout::Shared);
        assert_eq!(w.skipped(), 1);
        assert_eq!(w.vertex_positions(), &m.vertices[..4]);
        assert_eq!(w.indices().indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(w.vertices().as_floats().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_shared_layout_renumbers_used_vertices() {
        let m = Mesh::new(
            vec![[7.0; 3], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[1, 2, 3]],
        );
        let w = MeshWrapper::new("tri", &m, &WrapConfig::default(), None, None).unwrap();

        assert_eq!(w.indices().indices, vec![0, 1, 2]);
        let x = &w.data_texture().unwrap().layer("vertex_x").unwrap().texels[..3];
        assert_eq!(x, &[0.0, 1.0, 0.0]);
    }
}
