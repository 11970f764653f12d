use super::{pack_fields, Buffers, Wrap, WrapConfig};
use crate::error::{Result, WrapError};
use crate::fields::{self, Fields, Granularity};
use crate::geometry::{GeometryKind, PointCloud};
use crate::texture::TexelLayout;
use crate::vertex::{DataVertex, IndexBuffer, Primitive};
use glam::DVec3;
use log::{debug, warn};

/// Point cloud packed into `DataVertex` records plus a point index buffer.
///
/// Non-finite points are dropped (and counted); per-point data is filtered
/// alongside so values stay aligned with the kept points.
#[derive(Debug, Clone)]
pub struct PointCloudWrapper {
    buffers: Buffers<DataVertex>,
}

impl PointCloudWrapper {
    pub fn new(
        name: &str,
        cloud: &PointCloud,
        config: &WrapConfig,
        data: Option<&Fields>,
    ) -> Result<Self> {
        let n_points = cloud.points.len();

        // Validate against the source count, then map values onto kept points.
        let set = fields::resolve(
            name,
            data,
            &[(Granularity::Vertex, n_points)],
            &cloud.points,
        );

        let kept: Vec<usize> = cloud
            .points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.iter().all(|c| c.is_finite()))
            .map(|(i, _)| i)
            .collect();

        let skipped = n_points - kept.len();
        if skipped > 0 {
            warn!("{name}: skipped {skipped} non-finite points");
        }
        if kept.is_empty() {
            return Err(WrapError::EmptyGeometry {
                name: name.to_owned(),
            });
        }
        debug!("{name}: {} points", kept.len());

        let texels = TexelLayout::new(kept.len(), config.max_texture_size)?;
        let positions: Vec<[f64; 3]> = kept.iter().map(|&i| cloud.points[i]).collect();
        let records: Vec<DataVertex> = positions
            .iter()
            .enumerate()
            .map(|(r, p)| DataVertex {
                position: DVec3::from_array(*p).as_vec3().to_array(),
                texel: texels.texel_f32(r),
                id: config.first_id as f32,
            })
            .collect();

        let source: Vec<(usize, usize)> = kept.iter().map(|&i| (i, 0)).collect();
        let texture = pack_fields(texels, &set, &source);

        let indices = IndexBuffer::new(Primitive::Points, (0..records.len() as u32).collect());

        let buffers = Buffers::new(name, positions, records, indices)
            .with_texture(texture, set.active)
            .with_skipped(skipped)
            .with_ids(config.first_id, 1)?;

        Ok(Self { buffers })
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.vertices().len()
    }
}

impl Wrap for PointCloudWrapper {
    type Vertex = DataVertex;

    const KIND: GeometryKind = GeometryKind::Points;

    fn buffers(&self) -> &Buffers<DataVertex> {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut Buffers<DataVertex> {
        &mut self.buffers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_and_defaults() {
        let pc = PointCloud::new(vec![[0.0, 0.0, 5.0], [1.0, 1.0, 6.0], [2.0, 2.0, 7.0]]);
        let w = PointCloudWrapper::new("lidar", &pc, &WrapConfig::default(), None).unwrap();

        assert_eq!(w.point_count(), 3);
        assert_eq!(w.indices().indices, vec![0, 1, 2]);
        assert_eq!(w.indices().primitive, Primitive::Points);

        let z = &w.data_texture().unwrap().layer("vertex_z").unwrap().texels[..3];
        assert_eq!(z, &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_non_finite_points_drop_their_values() {
        let pc = PointCloud::new(vec![[0.0, 0.0, 0.0], [f64::NAN, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let data: Fields = [("intensity", vec![10.0, 20.0, 30.0])].into_iter().collect();
        let w = PointCloudWrapper::new("lidar", &pc, &WrapConfig::default(), Some(&data)).unwrap();

        assert_eq!(w.skipped(), 1);
        assert_eq!(w.vertex_positions(), &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let layer = &w.data_texture().unwrap().layer("intensity").unwrap().texels[..2];
        assert_eq!(layer, &[10.0, 30.0]);
    }

    #[test]
    fn test_ids_constant() {
        let pc = PointCloud::new(vec![[0.0; 3], [1.0; 3]]);
        let cfg = WrapConfig::default().with_first_id(3);
        let w = PointCloudWrapper::new("lidar", &pc, &cfg, None).unwrap();
        assert!(w.vertices().records().iter().all(|r| r.id == 3.0));
        assert_eq!((w.first_id(), w.id_count()), (3, 1));
    }

    #[test]
    fn test_empty_cloud() {
        assert!(matches!(
            PointCloudWrapper::new("none", &PointCloud::default(), &WrapConfig::default(), None),
            Err(WrapError::EmptyGeometry { .. })
        ));
    }

    #[test]
    fn test_ids_beyond_float_precision() {
        let pc = PointCloud::new(vec![[0.0; 3]]);

        let cfg = WrapConfig::default().with_first_id(crate::wrapper::MAX_PICK_ID);
        assert_eq!(
            PointCloudWrapper::new("lidar", &pc, &cfg, None).err(),
            Some(WrapError::IdOverflow)
        );

        let cfg = WrapConfig::default().with_first_id(crate::wrapper::MAX_PICK_ID - 1);
        let w = PointCloudWrapper::new("lidar", &pc, &cfg, None).unwrap();
        assert_eq!(w.vertices().records()[0].id, 16_777_215.0);
    }
}
