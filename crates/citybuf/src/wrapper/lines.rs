use super::{pack_fields, Buffers, Wrap, WrapConfig};
use crate::error::{Result, WrapError};
use crate::fields::{self, Fields, Granularity};
use crate::geometry::{GeometryKind, MultiLineString};
use crate::texture::TexelLayout;
use crate::vertex::{DataVertex, IndexBuffer, Primitive};
use glam::DVec3;
use log::{debug, warn};

/// Line network packed into `DataVertex` records and segment index pairs.
///
/// Vertices are the coordinates of every line string, concatenated in
/// order. Line string `k` gets picking id `first_id + k`. Data may be given
/// per vertex or per line string.
#[derive(Debug, Clone)]
pub struct LineStringWrapper {
    buffers: Buffers<DataVertex>,
    line_count: usize,
}

impl LineStringWrapper {
    pub fn new(
        name: &str,
        lines: &MultiLineString,
        config: &WrapConfig,
        data: Option<&Fields>,
    ) -> Result<Self> {
        let n_lines = lines.lines.len();
        let n_vertices: usize = lines.lines.iter().map(|l| l.coords.len()).sum();

        let mut positions = Vec::with_capacity(n_vertices);
        let mut source = Vec::with_capacity(n_vertices);
        let mut indices = Vec::new();
        let mut skipped = 0usize;

        // ---------------------------------------------------------------------
        // Segments between consecutive points, per line string
        // ---------------------------------------------------------------------
        for (k, line) in lines.lines.iter().enumerate() {
            let base = positions.len() as u32;

            if line.coords.len() < 2 {
                skipped += 1;
            } else {
                for (i, pair) in line.coords.windows(2).enumerate() {
                    let a = DVec3::from_array(pair[0]);
                    let b = DVec3::from_array(pair[1]);

                    if !(a.is_finite() && b.is_finite()) || a == b {
                        skipped += 1;
                        continue;
                    }

                    let i = i as u32;
                    indices.extend_from_slice(&[base + i, base + i + 1]);
                }
            }

            for p in &line.coords {
                source.push((positions.len(), k));
                positions.push(*p);
            }
        }

        if skipped > 0 {
            warn!("{name}: skipped {skipped} degenerate lines or segments");
        }
        if indices.is_empty() {
            return Err(WrapError::EmptyGeometry {
                name: name.to_owned(),
            });
        }
        debug!(
            "{name}: {n_lines} line strings, {n_vertices} vertices, {} segments",
            indices.len() / 2
        );

        let set = fields::resolve(
            name,
            data,
            &[(Granularity::Vertex, n_vertices), (Granularity::Line, n_lines)],
            &positions,
        );

        let texels = TexelLayout::new(positions.len(), config.max_texture_size)?;
        let records: Vec<DataVertex> = positions
            .iter()
            .zip(&source)
            .enumerate()
            .map(|(i, (p, &(_, line)))| DataVertex {
                position: DVec3::from_array(*p).as_vec3().to_array(),
                texel: texels.texel_f32(i),
                id: (config.first_id as usize + line) as f32,
            })
            .collect();
        let texture = pack_fields(texels, &set, &source);

        let id_count = u32::try_from(n_lines).map_err(|_| WrapError::IdOverflow)?;

        let buffers = Buffers::new(
            name,
            positions,
            records,
            IndexBuffer::new(Primitive::Lines, indices),
        )
        .with_texture(texture, set.active)
        .with_skipped(skipped)
        .with_ids(config.first_id, id_count)?;

        Ok(Self {
            buffers,
            line_count: n_lines,
        })
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.indices().primitive_count()
    }
}

impl Wrap for LineStringWrapper {
    type Vertex = DataVertex;

    const KIND: GeometryKind = GeometryKind::Lines;

    fn buffers(&self) -> &Buffers<DataVertex> {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut Buffers<DataVertex> {
        &mut self.buffers
    }
}
