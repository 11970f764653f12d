use super::{pack_fields, Buffers, Wrap, WrapConfig};
use crate::error::{Result, WrapError};
use crate::fields::{self, Fields, Granularity};
use crate::geometry::{Grid, GeometryKind, VolumeGrid};
use crate::texture::TexelLayout;
use crate::vertex::{DataVertex, IndexBuffer, Primitive};
use glam::DVec3;
use log::debug;

/// Structured 2D grid or 3D volume grid drawn as a wireframe lattice.
///
/// Node `(i, j, k)` is record `i + nx * (j + ny * k)`; edges join each node
/// to its successor along every axis. Fields are per node.
#[derive(Debug, Clone)]
pub struct GridWrapper {
    buffers: Buffers<DataVertex>,
    nodes: [usize; 3],
}

fn invalid(name: &str, reason: impl Into<String>) -> WrapError {
    WrapError::InvalidGrid {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

impl GridWrapper {
    pub fn new(name: &str, grid: &Grid, config: &WrapConfig, data: Option<&Fields>) -> Result<Self> {
        Self::lattice(
            name,
            [grid.origin[0], grid.origin[1], grid.elevation],
            [grid.cell_size[0], grid.cell_size[1], 1.0],
            [grid.nodes[0], grid.nodes[1], 1],
            config,
            data,
        )
    }

    pub fn from_volume(
        name: &str,
        volume: &VolumeGrid,
        config: &WrapConfig,
        data: Option<&Fields>,
    ) -> Result<Self> {
        Self::lattice(name, volume.origin, volume.spacing, volume.nodes, config, data)
    }

    fn lattice(
        name: &str,
        origin: [f64; 3],
        spacing: [f64; 3],
        nodes: [usize; 3],
        config: &WrapConfig,
        data: Option<&Fields>,
    ) -> Result<Self> {
        // ---------------------------------------------------------------------
        // Validate dimensions
        // ---------------------------------------------------------------------
        if nodes.iter().any(|&n| n == 0) {
            return Err(invalid(name, format!("zero node count in {nodes:?}")));
        }
        if nodes.iter().all(|&n| n < 2) {
            return Err(invalid(name, "a single node has no edges"));
        }
        if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(invalid(name, format!("spacing must be positive, got {spacing:?}")));
        }
        if !origin.iter().all(|c| c.is_finite()) {
            return Err(invalid(name, "non-finite origin"));
        }

        let [nx, ny, nz] = nodes;
        let count = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .ok_or_else(|| invalid(name, "node count overflows"))?;
        if count > u32::MAX as usize {
            return Err(invalid(name, "too many nodes for 32-bit indices"));
        }

        let texels = TexelLayout::new(count, config.max_texture_size)?;

        let origin = DVec3::from_array(origin);
        let spacing = DVec3::from_array(spacing);
        let node = |i: usize, j: usize, k: usize| (i + nx * (j + ny * k)) as u32;

        // ---------------------------------------------------------------------
        // Nodes and edges
        // ---------------------------------------------------------------------
        let mut positions = Vec::with_capacity(count);
        let mut indices = Vec::new();

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let p = origin + spacing * DVec3::new(i as f64, j as f64, k as f64);
                    positions.push(p.to_array());

                    let here = node(i, j, k);
                    if i + 1 < nx {
                        indices.extend_from_slice(&[here, node(i + 1, j, k)]);
                    }
                    if j + 1 < ny {
                        indices.extend_from_slice(&[here, node(i, j + 1, k)]);
                    }
                    if k + 1 < nz {
                        indices.extend_from_slice(&[here, node(i, j, k + 1)]);
                    }
                }
            }
        }

        debug!(
            "{name}: {nx}x{ny}x{nz} lattice, {count} nodes, {} edges",
            indices.len() / 2
        );

        let set = fields::resolve(name, data, &[(Granularity::Vertex, count)], &positions);

        let records: Vec<DataVertex> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| DataVertex {
                position: DVec3::from_array(*p).as_vec3().to_array(),
                texel: texels.texel_f32(i),
                id: config.first_id as f32,
            })
            .collect();

        let source: Vec<(usize, usize)> = (0..count).map(|i| (i, 0)).collect();
        let texture = pack_fields(texels, &set, &source);

        let buffers = Buffers::new(
            name,
            positions,
            records,
            IndexBuffer::new(Primitive::Lines, indices),
        )
        .with_texture(texture, set.active)
        .with_ids(config.first_id, 1)?;

        Ok(Self { buffers, nodes })
    }

    /// Node counts along x, y and z (z is 1 for a 2D grid).
    #[inline]
    pub fn nodes(&self) -> [usize; 3] {
        self.nodes
    }
}

impl Wrap for GridWrapper {
    type Vertex = DataVertex;

    const KIND: GeometryKind = GeometryKind::Grid;

    fn buffers(&self) -> &Buffers<DataVertex> {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut Buffers<DataVertex> {
        &mut self.buffers
    }
}
