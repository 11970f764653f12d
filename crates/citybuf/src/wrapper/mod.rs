//! Geometry wrappers: one domain object in, GPU-ready buffers out.
//!
//! Each wrapper is built once from an immutable geometry snapshot. Until
//! [`Wrap::preprocess_drawing`] runs, its `f64` positions are the raw
//! (possibly geographic) coordinates; afterwards they are translated by the
//! scene's `center_vec` and the `f32` position fields of the vertex buffer are
//! rewritten from them. Recentring happens exactly once per wrapper.

mod grid;
mod lines;
mod mesh;
mod points;
mod raster;

pub use grid::GridWrapper;
pub use lines::LineStringWrapper;
pub use mesh::{MeshLayout, MeshWrapper};
pub use points::PointCloudWrapper;
pub use raster::{RasterImage, RasterWrapper};

use crate::bounds::BoundingBox;
use crate::error::{Result, WrapError};
use crate::fields::{FieldSet, Fields};
use crate::geometry::{Geometry, GeometryKind, MultiLineString};
use crate::texture::{DataTexture, TexelLayout};
use crate::vertex::{IndexBuffer, Vertex, VertexAttribute, VertexBuffer};
use glam::DVec3;
use log::debug;
use serde::{Deserialize, Serialize};

/// Typical `GL_MAX_TEXTURE_SIZE` of desktop GPUs.
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 16_384;

/// Ids are written into `f32` vertex attributes, which hold every integer
/// below 2^24 exactly. All picking ids must stay below this bound.
pub const MAX_PICK_ID: u32 = 1 << 24;

/// `id_count` ids starting at `first_id` must all be exact as `f32`.
pub(crate) fn check_ids(first_id: u32, id_count: u32) -> Result<()> {
    match first_id.checked_add(id_count) {
        Some(end) if end <= MAX_PICK_ID => Ok(()),
        _ => Err(WrapError::IdOverflow),
    }
}

/// How mesh normals are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shading {
    /// Shared vertices, area-weighted vertex normals.
    #[default]
    Smooth,
    /// Three records per face carrying the face normal.
    Flat,
}

/// Settings every wrapper constructor receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapConfig {
    /// Hardware limit on each data-texture dimension.
    pub max_texture_size: u32,
    pub shading: Shading,
    /// First picking id this wrapper may hand out.
    pub first_id: u32,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            shading: Shading::Smooth,
            first_id: 0,
        }
    }
}

impl WrapConfig {
    #[inline]
    pub fn with_first_id(mut self, first_id: u32) -> Self {
        self.first_id = first_id;
        self
    }
}

/// Buffers and recentring state common to every wrapper.
#[derive(Debug, Clone)]
pub struct Buffers<V: Vertex> {
    name: String,
    /// One `f64` position per vertex record.
    positions: Vec<[f64; 3]>,
    vertices: VertexBuffer<V>,
    indices: IndexBuffer,
    texture: Option<DataTexture>,
    active_field: Option<String>,
    local_bounds: Option<BoundingBox>,
    translation: Option<DVec3>,
    skipped: usize,
    first_id: u32,
    id_count: u32,
}

impl<V: Vertex> Buffers<V> {
    pub(crate) fn new(
        name: &str,
        positions: Vec<[f64; 3]>,
        vertices: Vec<V>,
        indices: IndexBuffer,
    ) -> Self {
        debug_assert_eq!(positions.len(), vertices.len());
        debug_assert!(indices
            .max_index()
            .map_or(true, |i| (i as usize) < vertices.len()));

        Self {
            name: name.to_owned(),
            positions,
            vertices: VertexBuffer::new(vertices),
            indices,
            texture: None,
            active_field: None,
            local_bounds: None,
            translation: None,
            skipped: 0,
            first_id: 0,
            id_count: 0,
        }
    }

    pub(crate) fn with_texture(mut self, texture: DataTexture, active: String) -> Self {
        self.texture = Some(texture);
        self.active_field = Some(active);
        self
    }

    pub(crate) fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    pub(crate) fn with_ids(mut self, first_id: u32, id_count: u32) -> Result<Self> {
        check_ids(first_id, id_count)?;
        self.first_id = first_id;
        self.id_count = id_count;
        Ok(self)
    }

    fn recentre(&mut self, global: &BoundingBox) -> Result<()> {
        if self.translation.is_some() {
            return Err(WrapError::AlreadyPreprocessed {
                name: self.name.clone(),
            });
        }

        let local = BoundingBox::from_point_sets(&self.name, [self.positions.as_slice()])?;

        let shift = global.center_vec;
        for (p, v) in self.positions.iter_mut().zip(self.vertices.records_mut()) {
            let moved = DVec3::from_array(*p) + shift;
            *p = moved.to_array();
            v.set_position(moved.as_vec3().to_array());
        }

        debug!(
            "{}: recentred {} vertices by ({:.3}, {:.3}, {:.3})",
            self.name,
            self.positions.len(),
            shift.x,
            shift.y,
            shift.z
        );

        self.local_bounds = Some(local);
        self.translation = Some(shift);

        Ok(())
    }
}

/// Shared behaviour of the per-geometry wrappers.
pub trait Wrap {
    type Vertex: Vertex;

    const KIND: GeometryKind;

    fn buffers(&self) -> &Buffers<Self::Vertex>;
    fn buffers_mut(&mut self) -> &mut Buffers<Self::Vertex>;

    fn name(&self) -> &str {
        &self.buffers().name
    }

    /// Position of every vertex record, without the interleaved attributes.
    ///
    /// Raw coordinates before recentring, translated ones after.
    fn vertex_positions(&self) -> &[[f64; 3]] {
        &self.buffers().positions
    }

    /// Translate every position by `global.center_vec`.
    ///
    /// Also records the wrapper's own (pre-translation) bounding box. Fails
    /// with `AlreadyPreprocessed`, changing nothing, when called twice.
    fn preprocess_drawing(&mut self, global: &BoundingBox) -> Result<()> {
        self.buffers_mut().recentre(global)
    }

    fn is_preprocessed(&self) -> bool {
        self.buffers().translation.is_some()
    }

    /// Translation applied by `preprocess_drawing`, if it ran.
    fn translation(&self) -> Option<DVec3> {
        self.buffers().translation
    }

    /// Bounding box of the raw positions, known once recentred.
    fn local_bounds(&self) -> Option<&BoundingBox> {
        self.buffers().local_bounds.as_ref()
    }

    fn vertices(&self) -> &VertexBuffer<Self::Vertex> {
        &self.buffers().vertices
    }

    fn indices(&self) -> &IndexBuffer {
        &self.buffers().indices
    }

    fn data_texture(&self) -> Option<&DataTexture> {
        self.buffers().texture.as_ref()
    }

    /// Field the colormap starts on.
    fn active_field(&self) -> Option<&str> {
        self.buffers().active_field.as_deref()
    }

    /// Degenerate items (faces, segments, points) dropped while building.
    fn skipped(&self) -> usize {
        self.buffers().skipped
    }

    fn first_id(&self) -> u32 {
        self.buffers().first_id
    }

    /// Picking ids used, starting at `first_id`.
    fn id_count(&self) -> u32 {
        self.buffers().id_count
    }
}

/// Pack the resolved fields of a geometry into a data texture.
///
/// `source` maps each vertex record to (source vertex, face or line).
pub(crate) fn pack_fields(
    layout: TexelLayout,
    set: &FieldSet,
    source: &[(usize, usize)],
) -> DataTexture {
    let mut texture = DataTexture::new(layout);
    for field in &set.fields {
        let values: Vec<f32> = source
            .iter()
            .map(|&(vertex, element)| field.sample(vertex, element))
            .collect();
        texture.insert(&field.name, &values);
    }
    texture
}

/// Any wrapper, tagged by geometry family.
#[derive(Debug, Clone)]
pub enum Wrapper {
    Mesh(MeshWrapper),
    Lines(LineStringWrapper),
    Points(PointCloudWrapper),
    Grid(GridWrapper),
    Raster(RasterWrapper),
}

macro_rules! each {
    ($self:expr, $w:ident => $body:expr) => {
        match $self {
            Wrapper::Mesh($w) => $body,
            Wrapper::Lines($w) => $body,
            Wrapper::Points($w) => $body,
            Wrapper::Grid($w) => $body,
            Wrapper::Raster($w) => $body,
        }
    };
}

impl Wrapper {
    /// Build the wrapper matching `geometry`.
    pub fn build(
        name: &str,
        geometry: &Geometry,
        config: &WrapConfig,
        data: Option<&Fields>,
    ) -> Result<Self> {
        Ok(match geometry {
            Geometry::Mesh(mesh) => Wrapper::Mesh(MeshWrapper::new(name, mesh, config, data, None)?),
            Geometry::LineString(line) => Wrapper::Lines(LineStringWrapper::new(
                name,
                &MultiLineString::from(line.clone()),
                config,
                data,
            )?),
            Geometry::MultiLineString(lines) => {
                Wrapper::Lines(LineStringWrapper::new(name, lines, config, data)?)
            }
            Geometry::PointCloud(pc) => {
                Wrapper::Points(PointCloudWrapper::new(name, pc, config, data)?)
            }
            Geometry::Grid(grid) => Wrapper::Grid(GridWrapper::new(name, grid, config, data)?),
            Geometry::VolumeGrid(volume) => {
                Wrapper::Grid(GridWrapper::from_volume(name, volume, config, data)?)
            }
            Geometry::Raster(raster) => Wrapper::Raster(RasterWrapper::new(name, raster, config)?),
        })
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            Wrapper::Mesh(_) => MeshWrapper::KIND,
            Wrapper::Lines(_) => LineStringWrapper::KIND,
            Wrapper::Points(_) => PointCloudWrapper::KIND,
            Wrapper::Grid(_) => GridWrapper::KIND,
            Wrapper::Raster(_) => RasterWrapper::KIND,
        }
    }

    pub fn name(&self) -> &str {
        each!(self, w => w.name())
    }

    pub fn vertex_positions(&self) -> &[[f64; 3]] {
        each!(self, w => w.vertex_positions())
    }

    pub fn preprocess_drawing(&mut self, global: &BoundingBox) -> Result<()> {
        each!(self, w => w.preprocess_drawing(global))
    }

    pub fn is_preprocessed(&self) -> bool {
        each!(self, w => w.is_preprocessed())
    }

    pub fn translation(&self) -> Option<DVec3> {
        each!(self, w => w.translation())
    }

    pub fn local_bounds(&self) -> Option<&BoundingBox> {
        each!(self, w => w.local_bounds())
    }

    /// Floats per vertex record.
    pub fn stride(&self) -> usize {
        each!(self, w => w.vertices().stride())
    }

    pub fn attributes(&self) -> &'static [VertexAttribute] {
        each!(self, w => w.vertices().attributes())
    }

    pub fn vertex_count(&self) -> usize {
        each!(self, w => w.vertices().len())
    }

    pub fn vertex_floats(&self) -> &[f32] {
        each!(self, w => w.vertices().as_floats())
    }

    pub fn indices(&self) -> &IndexBuffer {
        each!(self, w => w.indices())
    }

    pub fn data_texture(&self) -> Option<&DataTexture> {
        each!(self, w => w.data_texture())
    }

    pub fn active_field(&self) -> Option<&str> {
        each!(self, w => w.active_field())
    }

    pub fn skipped(&self) -> usize {
        each!(self, w => w.skipped())
    }

    pub fn first_id(&self) -> u32 {
        each!(self, w => w.first_id())
    }

    pub fn id_count(&self) -> u32 {
        each!(self, w => w.id_count())
    }
}

impl From<MeshWrapper> for Wrapper {
    fn from(w: MeshWrapper) -> Self {
        Wrapper::Mesh(w)
    }
}

impl From<LineStringWrapper> for Wrapper {
    fn from(w: LineStringWrapper) -> Self {
        Wrapper::Lines(w)
    }
}

impl From<PointCloudWrapper> for Wrapper {
    fn from(w: PointCloudWrapper) -> Self {
        Wrapper::Points(w)
    }
}

impl From<GridWrapper> for Wrapper {
    fn from(w: GridWrapper) -> Self {
        Wrapper::Grid(w)
    }
}

impl From<RasterWrapper> for Wrapper {
    fn from(w: RasterWrapper) -> Self {
        Wrapper::Raster(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LineString, Mesh, PointCloud};

    fn far_quad() -> Mesh {
        Mesh::new(
            vec![
                [500_000.0, 6_400_000.0, 10.0],
                [500_010.0, 6_400_000.0, 11.0],
                [500_010.0, 6_400_010.0, 12.0],
                [500_000.0, 6_400_010.0, 13.0],
            ],
            vec![[0, 1, 2], [2, 3, 0]],
        )
    }

    fn all_kinds() -> Vec<Wrapper> {
        let cfg = WrapConfig::default();
        let geometries = [
            Geometry::Mesh(far_quad()),
            Geometry::LineString(LineString::new(vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
            ])),
            Geometry::PointCloud(PointCloud::new(vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])),
            Geometry::Grid(crate::geometry::Grid {
                origin: [0.0, 0.0],
                cell_size: [1.0, 1.0],
                nodes: [3, 2],
                elevation: 0.0,
            }),
            Geometry::Raster(crate::geometry::Raster {
                width: 2,
                height: 2,
                channels: 1,
                data: vec![0.0, 1.0, 2.0, 3.0],
                extent: [0.0, 0.0, 10.0, 10.0],
                elevation: 0.0,
            }),
        ];

        geometries
            .iter()
            .map(|g| Wrapper::build("obj", g, &cfg, None).unwrap())
            .collect()
    }

    #[test]
    fn test_positions_shift_by_center_vec() {
        let global = BoundingBox::from_points(&[[499_000.0, 6_399_000.0, 0.0], [501_000.0, 6_401_000.0, 20.0]])
            .unwrap();

        for mut w in all_kinds() {
            let before = w.vertex_positions().to_vec();
            w.preprocess_drawing(&global).unwrap();
            let after = w.vertex_positions();

            assert_eq!(before.len(), after.len());
            for (b, a) in before.iter().zip(after) {
                for axis in 0..3 {
                    assert_eq!(a[axis], b[axis] + global.center_vec[axis], "{}", w.kind());
                }
            }
            assert_eq!(w.translation(), Some(global.center_vec));
            assert!(w.local_bounds().is_some());
        }
    }

    #[test]
    fn test_second_preprocess_is_rejected() {
        let global = BoundingBox::from_points(&[[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]]).unwrap();

        for mut w in all_kinds() {
            w.preprocess_drawing(&global).unwrap();
            let once = w.vertex_floats().to_vec();

            assert!(matches!(
                w.preprocess_drawing(&global),
                Err(WrapError::AlreadyPreprocessed { .. })
            ));
            assert_eq!(w.vertex_floats(), once.as_slice());
        }
    }

    #[test]
    fn test_buffer_invariants() {
        for w in all_kinds() {
            assert_eq!(w.vertex_floats().len() % w.stride(), 0, "{}", w.kind());
            assert_eq!(w.vertex_floats().len(), w.vertex_count() * w.stride());

            let n = w.vertex_count() as u32;
            assert!(w.indices().indices.iter().all(|&i| i < n), "{}", w.kind());
            assert_eq!(w.indices().len() % w.indices().primitive.group(), 0);
        }
    }

    #[test]
    fn test_recentred_floats_follow_f64_positions() {
        let mut w = Wrapper::build("m", &Geometry::Mesh(far_quad()), &WrapConfig::default(), None)
            .unwrap();
        let global = BoundingBox::from_points(&far_quad().vertices).unwrap();
        w.preprocess_drawing(&global).unwrap();

        // 10 m square centred on the origin survives f32 exactly.
        let floats = w.vertex_floats();
        let stride = w.stride();
        assert_eq!(&floats[..3], &[-5.0, -5.0, -1.5]);
        assert_eq!(&floats[stride * 2..stride * 2 + 3], &[5.0, 5.0, 0.5]);
    }
}
