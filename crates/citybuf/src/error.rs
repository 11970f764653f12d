//! Error type shared by every wrapper, the parts table and the scene.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WrapError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WrapError {
    /// No finite point was available to build a bounding box or a buffer.
    #[error("{name}: geometry has no usable points")]
    EmptyGeometry { name: String },

    #[error("got {meshes} meshes but {uuids} uuids")]
    MismatchedInput { meshes: usize, uuids: usize },

    #[error("uuid {uuid:?} is used by more than one part")]
    DuplicateUuid { uuid: String },

    /// `preprocess_drawing` (or `Scene::preprocess`) ran a second time.
    #[error("{name}: already recentred")]
    AlreadyPreprocessed { name: String },

    #[error("max_texture_size must be > 0")]
    InvalidTextureSize,

    #[error("{count} texels do not fit a {max}x{max} texture")]
    TextureOverflow { count: usize, max: u32 },

    #[error("{name}: invalid raster ({reason})")]
    InvalidRaster { name: String, reason: String },

    #[error("{name}: invalid grid ({reason})")]
    InvalidGrid { name: String, reason: String },

    /// The parts table does not describe the mesh it was handed with.
    #[error("parts cover {covered} faces but the mesh has {faces}")]
    PartsMismatch { faces: usize, covered: usize },

    /// Picking ids ran past the range a `f32` attribute holds exactly.
    #[error("picking id space exhausted")]
    IdOverflow,

    /// A wrapper's picking ids overlap ids already used in the scene.
    #[error("{name}: picking ids {first_id}..{end} are already in use")]
    IdConflict { name: String, first_id: u32, end: u32 },
}
