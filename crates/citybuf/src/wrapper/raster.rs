use super::{Buffers, Wrap, WrapConfig};
use crate::error::{Result, WrapError};
use crate::geometry::{GeometryKind, Raster};
use crate::texture::FieldStats;
use crate::vertex::{IndexBuffer, Primitive, QuadVertex};
use glam::DVec3;
use log::debug;

/// Image uploaded as its own texture alongside the raster quad.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// 1 (scalar, colormapped), 3 (RGB) or 4 (RGBA).
    pub channels: u32,
    pub data: Vec<f32>,
    /// Per-channel range over finite samples.
    pub stats: Vec<Option<FieldStats>>,
}

impl RasterImage {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Georeferenced raster drawn as one textured quad.
///
/// Corners go counter-clockwise from `(xmin, ymin)`, so the index buffer is
/// always `[0, 1, 2, 2, 3, 0]`.
#[derive(Debug, Clone)]
pub struct RasterWrapper {
    buffers: Buffers<QuadVertex>,
    image: RasterImage,
}

impl RasterWrapper {
    pub fn new(name: &str, raster: &Raster, config: &WrapConfig) -> Result<Self> {
        let invalid = |reason: String| WrapError::InvalidRaster {
            name: name.to_owned(),
            reason,
        };

        // ---------------------------------------------------------------------
        // Validate shape and sample count
        // ---------------------------------------------------------------------
        if !matches!(raster.channels, 1 | 3 | 4) {
            return Err(invalid(format!(
                "{} channels, expected 1, 3 or 4",
                raster.channels
            )));
        }
        if raster.width == 0 || raster.height == 0 {
            return Err(invalid(format!("{}x{} pixels", raster.width, raster.height)));
        }

        let expected = raster.width * raster.height * raster.channels;
        if raster.data.len() != expected {
            return Err(invalid(format!(
                "{} samples, expected {expected}",
                raster.data.len()
            )));
        }

        if config.max_texture_size == 0 {
            return Err(WrapError::InvalidTextureSize);
        }
        let max = config.max_texture_size as usize;
        if raster.width > max || raster.height > max {
            return Err(WrapError::TextureOverflow {
                count: raster.width.max(raster.height),
                max: config.max_texture_size,
            });
        }

        let [xmin, ymin, xmax, ymax] = raster.extent;
        if !(xmin.is_finite() && ymin.is_finite() && xmax.is_finite() && ymax.is_finite())
            || xmin >= xmax
            || ymin >= ymax
        {
            return Err(invalid(format!("bad extent {:?}", raster.extent)));
        }

        // ---------------------------------------------------------------------
        // Quad and image
        // ---------------------------------------------------------------------
        let z = raster.elevation;
        let positions = vec![[xmin, ymin, z], [xmax, ymin, z], [xmax, ymax, z], [xmin, ymax, z]];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let records: Vec<QuadVertex> = positions
            .iter()
            .zip(uvs)
            .map(|(p, uv)| QuadVertex {
                position: DVec3::from_array(*p).as_vec3().to_array(),
                uv,
            })
            .collect();

        let channels = raster.channels;
        let stats = (0..channels)
            .map(|c| {
                let channel: Vec<f32> = raster.data.iter().skip(c).step_by(channels).copied().collect();
                FieldStats::of(&channel)
            })
            .collect();

        debug!(
            "{name}: {}x{} raster, {channels} channels",
            raster.width, raster.height
        );

        let image = RasterImage {
            width: raster.width as u32,
            height: raster.height as u32,
            channels: channels as u32,
            data: raster.data.clone(),
            stats,
        };

        let buffers = Buffers::new(
            name,
            positions,
            records,
            IndexBuffer::new(Primitive::Triangles, vec![0, 1, 2, 2, 3, 0]),
        );

        Ok(Self { buffers, image })
    }

    pub fn image(&self) -> &RasterImage {
        &self.image
    }
}

impl Wrap for RasterWrapper {
    type Vertex = QuadVertex;

    const KIND: GeometryKind = GeometryKind::Raster;

    fn buffers(&self) -> &Buffers<QuadVertex> {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut Buffers<QuadVertex> {
        &mut self.buffers
    }
}
