//! Scalar-field data textures.
//!
//! Every vertex owns one texel. Vertex `i` lives at column `i % width`,
//! row `i / width`, where `width = min(count, max_texture_size)`; once a row
//! is full the packer wraps to the next one. Shaders read the value back
//! with `texelFetch(tex, ivec2(texel), 0)`, so this addressing is part of
//! the GPU contract.

use crate::error::{Result, WrapError};
use serde::{Deserialize, Serialize};

/// Row-major texel addressing for `count` items under a hardware limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexelLayout {
    pub width: u32,
    pub height: u32,
    pub count: usize,
}

impl TexelLayout {
    pub fn new(count: usize, max_texture_size: u32) -> Result<Self> {
        if max_texture_size == 0 {
            return Err(WrapError::InvalidTextureSize);
        }

        let max = max_texture_size as usize;
        let width = count.clamp(1, max);
        let height = count.div_ceil(width).max(1);

        if height > max {
            return Err(WrapError::TextureOverflow {
                count,
                max: max_texture_size,
            });
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            count,
        })
    }

    /// `[column, row]` of item `i`.
    #[inline]
    pub fn texel(&self, i: usize) -> [u32; 2] {
        let w = self.width as usize;
        [(i % w) as u32, (i / w) as u32]
    }

    /// Same as [`texel`](Self::texel) in the float form stored in vertex records.
    #[inline]
    pub fn texel_f32(&self, i: usize) -> [f32; 2] {
        let [x, y] = self.texel(i);
        [x as f32, y as f32]
    }

    #[inline]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Value range of a field, over finite samples only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub min: f32,
    pub max: f32,
}

impl FieldStats {
    /// `None` when no sample is finite.
    pub fn of(values: &[f32]) -> Option<Self> {
        values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None::<FieldStats>, |acc, v| match acc {
                None => Some(FieldStats { min: v, max: v }),
                Some(s) => Some(FieldStats {
                    min: s.min.min(v),
                    max: s.max.max(v),
                }),
            })
    }
}

/// One named layer of a [`DataTexture`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataLayer {
    pub name: String,
    /// `width * height` values, zero padded past `count`.
    pub texels: Vec<f32>,
    pub stats: Option<FieldStats>,
}

/// 2D `f32` texture holding one layer per named scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTexture {
    layout: TexelLayout,
    layers: Vec<DataLayer>,
}

impl DataTexture {
    pub fn new(layout: TexelLayout) -> Self {
        Self {
            layout,
            layers: Vec::new(),
        }
    }

    #[inline]
    pub fn layout(&self) -> TexelLayout {
        self.layout
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.layout.height
    }

    /// Pack `values` (one per item, in item order) as layer `name`.
    ///
    /// Returns `false` and leaves the texture untouched when the length does
    /// not match the layout. Re-inserting a name replaces that layer in place.
    pub fn insert(&mut self, name: &str, values: &[f32]) -> bool {
        if values.len() != self.layout.count {
            return false;
        }

        let mut texels = vec![0.0f32; self.layout.texel_count()];
        texels[..values.len()].copy_from_slice(values);

        let layer = DataLayer {
            name: name.to_owned(),
            texels,
            stats: FieldStats::of(values),
        };

        match self.layers.iter_mut().find(|l| l.name == name) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }

        true
    }

    pub fn layer(&self, name: &str) -> Option<&DataLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layers(&self) -> &[DataLayer] {
        &self.layers
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    pub fn stats(&self, name: &str) -> Option<FieldStats> {
        self.layer(name).and_then(|l| l.stats)
    }

    /// Value stored at texel `[column, row]` of layer `name`.
    pub fn value_at(&self, name: &str, texel: [u32; 2]) -> Option<f32> {
        let [x, y] = texel;
        if x >= self.layout.width || y >= self.layout.height {
            return None;
        }
        let idx = y as usize * self.layout.width as usize + x as usize;
        self.layer(name).map(|l| l.texels[idx])
    }

    /// Raw little-endian bytes of one layer, ready for a `R32F` upload.
    pub fn as_bytes(&self, name: &str) -> Option<&[u8]> {
        self.layer(name).map(|l| bytemuck::cast_slice(&l.texels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row() {
        let layout = TexelLayout::new(3, 16).unwrap();
        assert_eq!((layout.width, layout.height), (3, 1));
        assert_eq!(layout.texel(2), [2, 0]);
    }

    #[test]
    fn test_wraps_to_next_row() {
        let layout = TexelLayout::new(10, 4).unwrap();
        assert_eq!((layout.width, layout.height), (4, 3));
        assert_eq!(layout.texel(3), [3, 0]);
        assert_eq!(layout.texel(4), [0, 1]);
        assert_eq!(layout.texel(9), [1, 2]);
        assert_eq!(layout.texel_f32(9), [1.0, 2.0]);
    }

    #[test]
    fn test_exact_fit_and_overflow() {
        let layout = TexelLayout::new(16, 4).unwrap();
        assert_eq!((layout.width, layout.height), (4, 4));

        assert_eq!(
            TexelLayout::new(17, 4),
            Err(WrapError::TextureOverflow { count: 17, max: 4 })
        );
        assert_eq!(TexelLayout::new(1, 0), Err(WrapError::InvalidTextureSize));
    }

    #[test]
    fn test_insert_and_lookup() {
        let layout = TexelLayout::new(5, 3).unwrap();
        assert_eq!((layout.width, layout.height), (3, 2));
        let mut tex = DataTexture::new(layout);

        assert!(tex.insert("height", &[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert!(!tex.insert("short", &[1.0]));
        assert!(tex.insert("class", &[0.0; 5]));

        let names: Vec<_> = tex.field_names().collect();
        assert_eq!(names, ["height", "class"]);

        let height = tex.layer("height").unwrap();
        assert_eq!(height.texels, vec![1.0, 2.0, 3.0, 4.0, 5.0, 0.0]);
        assert_eq!(tex.value_at("height", layout.texel(4)), Some(5.0));
        assert_eq!(layout.texel(4), [1, 1]);
        assert_eq!(tex.value_at("height", [2, 1]), Some(0.0));
        assert_eq!(tex.value_at("height", [3, 0]), None);
        assert_eq!(tex.value_at("height", [0, 2]), None);
        assert_eq!(tex.stats("height"), Some(FieldStats { min: 1.0, max: 5.0 }));
        assert_eq!(tex.as_bytes("class").unwrap().len(), 6 * 4);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut tex = DataTexture::new(TexelLayout::new(2, 8).unwrap());
        tex.insert("a", &[1.0, 1.0]);
        tex.insert("b", &[2.0, 2.0]);
        tex.insert("a", &[3.0, f32::NAN]);

        let names: Vec<_> = tex.field_names().collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(tex.stats("a"), Some(FieldStats { min: 3.0, max: 3.0 }));
    }
}
