//! CITYBUF: restructures city-model geometry into GPU-ready buffers.
//!
//! - Meshes, line networks, point clouds, 2D/3D grids and georeferenced
//!   rasters each get a wrapper producing an interleaved `f32` vertex buffer
//!   and a `u32` index buffer.
//! - Scalar fields (per vertex, per face or per line) are packed into a data
//!   texture; every vertex record carries the texel it reads from.
//! - A scene computes one global bounding box and recentres every wrapper by
//!   its `center_vec` exactly once, so large projected coordinates keep their
//!   precision after the cast to `f32`.
//! - Meshes assembled from several sources carry per-face picking ids that
//!   resolve back to the source uuid.
//!
//! Vertex record layouts (4-byte floats, interleaved):
//!   MeshVertex  : position[3] texel[2] id normal[3]   (9 floats)
//!   DataVertex  : position[3] texel[2] id             (6 floats)
//!   QuadVertex  : position[3] uv[2]                   (5 floats)
//!
//! Data texture layout: record `i` reads texel `(i % width, i / width)`,
//! with `width = min(count, max_texture_size)`.

pub mod bounds;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod parts;
pub mod scene;
pub mod texture;
pub mod vertex;
pub mod wrapper;

pub use bounds::BoundingBox;
pub use error::{Result, WrapError};
pub use fields::{Fields, Granularity, DEFAULT_ACTIVE_FIELD, DEFAULT_FIELDS};
pub use geometry::{
    Geometry, GeometryKind, Grid, LineString, Mesh, MultiLineString, PointCloud, Raster,
    VolumeGrid,
};
pub use parts::{Submesh, Submeshes};
pub use scene::{Failure, Pick, Scene, SceneReport};
pub use texture::{DataLayer, DataTexture, FieldStats, TexelLayout};
pub use vertex::{
    AttributeKind, DataVertex, IndexBuffer, MeshVertex, Primitive, QuadVertex, Vertex,
    VertexAttribute, VertexBuffer,
};
pub use wrapper::{
    Buffers, GridWrapper, LineStringWrapper, MeshLayout, MeshWrapper, PointCloudWrapper,
    RasterImage, RasterWrapper, Shading, Wrap, WrapConfig, Wrapper, DEFAULT_MAX_TEXTURE_SIZE,
    MAX_PICK_ID,
};
