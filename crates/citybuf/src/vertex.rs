//! GPU vertex records and the flat buffers built from them.
//!
//! Every record is `#[repr(C)]` and made of `f32` only, so a buffer is a
//! flat `float32` array whose length is a multiple of the record stride.
//! Field order below is what the attribute pointers in the shaders expect.

use bytemuck::{Pod, Zeroable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Position,
    /// Integer-valued `[column, row]` into the data texture.
    Texel,
    /// Picking id, stored as an exact float.
    Id,
    Normal,
    /// Normalised image coordinate.
    Uv,
}

/// One attribute pointer: `components` floats starting `offset` bytes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub kind: AttributeKind,
    pub components: u32,
    pub offset: u32,
}

const fn attr(kind: AttributeKind, components: u32, offset_floats: u32) -> VertexAttribute {
    VertexAttribute {
        kind,
        components,
        offset: offset_floats * 4,
    }
}

/// A record the wrappers can recentre in place.
pub trait Vertex: Pod {
    const ATTRIBUTES: &'static [VertexAttribute];

    fn position(&self) -> [f32; 3];
    fn set_position(&mut self, p: [f32; 3]);

    /// Number of `f32` per record.
    #[inline]
    fn stride() -> usize {
        std::mem::size_of::<Self>() / std::mem::size_of::<f32>()
    }
}

/// Mesh record: position, texel, id, normal.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub texel: [f32; 2],
    pub id: f32,
    pub normal: [f32; 3],
}

/// Record for lines, points and grid lattices: position, texel, id.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DataVertex {
    pub position: [f32; 3],
    pub texel: [f32; 2],
    pub id: f32,
}

/// Raster quad corner: position and image uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex for MeshVertex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        attr(AttributeKind::Position, 3, 0),
        attr(AttributeKind::Texel, 2, 3),
        attr(AttributeKind::Id, 1, 5),
        attr(AttributeKind::Normal, 3, 6),
    ];

    #[inline]
    fn position(&self) -> [f32; 3] {
        self.position
    }

    #[inline]
    fn set_position(&mut self, p: [f32; 3]) {
        self.position = p;
    }
}

impl Vertex for DataVertex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        attr(AttributeKind::Position, 3, 0),
        attr(AttributeKind::Texel, 2, 3),
        attr(AttributeKind::Id, 1, 5),
    ];

    #[inline]
    fn position(&self) -> [f32; 3] {
        self.position
    }

    #[inline]
    fn set_position(&mut self, p: [f32; 3]) {
        self.position = p;
    }
}

impl Vertex for QuadVertex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        attr(AttributeKind::Position, 3, 0),
        attr(AttributeKind::Uv, 2, 3),
    ];

    #[inline]
    fn position(&self) -> [f32; 3] {
        self.position
    }

    #[inline]
    fn set_position(&mut self, p: [f32; 3]) {
        self.position = p;
    }
}

/// Interleaved vertex records of one wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer<V: Vertex> {
    records: Vec<V>,
}

impl<V: Vertex> VertexBuffer<V> {
    pub fn new(records: Vec<V>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn stride(&self) -> usize {
        V::stride()
    }

    #[inline]
    pub fn attributes(&self) -> &'static [VertexAttribute] {
        V::ATTRIBUTES
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[V] {
        &self.records
    }

    #[inline]
    pub(crate) fn records_mut(&mut self) -> &mut [V] {
        &mut self.records
    }

    /// Flat float view; `as_floats().len() == len() * stride()`.
    #[inline]
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.records)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    /// Position fields only, stripped of the interleaved attributes.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.records.iter().map(|v| v.position()).collect()
    }
}

/// Primitive the index buffer is grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
}

impl Primitive {
    /// Indices per primitive.
    #[inline]
    pub fn group(self) -> usize {
        match self {
            Primitive::Points => 1,
            Primitive::Lines => 2,
            Primitive::Triangles => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    pub primitive: Primitive,
    pub indices: Vec<u32>,
}

impl IndexBuffer {
    pub fn new(primitive: Primitive, indices: Vec<u32>) -> Self {
        debug_assert_eq!(indices.len() % primitive.group(), 0);
        Self { primitive, indices }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn primitive_count(&self) -> usize {
        self.indices.len() / self.primitive.group()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Largest index, `None` for an empty buffer.
    pub fn max_index(&self) -> Option<u32> {
        self.indices.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_attributes<V: Vertex>() {
        let mut end = 0;
        for a in V::ATTRIBUTES {
            assert_eq!(a.offset, end, "attributes must be tightly packed");
            end += a.components * 4;
        }
        assert_eq!(end as usize, std::mem::size_of::<V>());
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 36);
        assert_eq!(MeshVertex::stride(), 9);
        assert_eq!(std::mem::size_of::<DataVertex>(), 24);
        assert_eq!(DataVertex::stride(), 6);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        assert_eq!(QuadVertex::stride(), 5);
    }

    #[test]
    fn test_attribute_tables() {
        check_attributes::<MeshVertex>();
        check_attributes::<DataVertex>();
        check_attributes::<QuadVertex>();
    }

    #[test]
    fn test_flat_view() {
        let buf = VertexBuffer::new(vec![
            DataVertex {
                position: [1.0, 2.0, 3.0],
                texel: [0.0, 0.0],
                id: 7.0,
            },
            DataVertex {
                position: [4.0, 5.0, 6.0],
                texel: [1.0, 0.0],
                id: 7.0,
            },
        ]);

        assert_eq!(buf.as_floats().len(), buf.len() * buf.stride());
        assert_eq!(&buf.as_floats()[6..9], &[4.0, 5.0, 6.0]);
        assert_eq!(buf.positions(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(buf.as_bytes().len(), 48);
    }

    #[test]
    fn test_index_buffer() {
        let ib = IndexBuffer::new(Primitive::Triangles, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(ib.primitive_count(), 2);
        assert_eq!(ib.max_index(), Some(3));
        assert_eq!(ib.as_bytes().len(), 24);
    }
}
