//! Read-only domain geometry handed to the wrappers.

/// Triangle mesh with shared vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Append several meshes into one, re-basing face indices.
    ///
    /// Face order is kept, so face `i` of `meshes[k]` lands at
    /// `sum(faces of meshes[..k]) + i`; `Submeshes` relies on this.
    pub fn concatenate(meshes: &[Mesh]) -> Mesh {
        let n_vertices = meshes.iter().map(|m| m.vertices.len()).sum();
        let n_faces = meshes.iter().map(|m| m.faces.len()).sum();

        let mut out = Mesh {
            vertices: Vec::with_capacity(n_vertices),
            faces: Vec::with_capacity(n_faces),
        };

        for mesh in meshes {
            let base = out.vertices.len() as u32;
            out.vertices.extend_from_slice(&mesh.vertices);
            out.faces
                .extend(mesh.faces.iter().map(|f| [f[0] + base, f[1] + base, f[2] + base]));
        }

        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineString {
    pub coords: Vec<[f64; 3]>,
}

impl LineString {
    pub fn new(coords: Vec<[f64; 3]>) -> Self {
        Self { coords }
    }
}

/// A network of independent line strings (roads, pipes, contour lines).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiLineString {
    pub lines: Vec<LineString>,
}

impl MultiLineString {
    pub fn new(lines: Vec<LineString>) -> Self {
        Self { lines }
    }
}

impl From<LineString> for MultiLineString {
    fn from(line: LineString) -> Self {
        Self { lines: vec![line] }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<[f64; 3]>,
}

impl PointCloud {
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }
}

/// Regular 2D node lattice at a fixed elevation.
///
/// Node `(i, j)` sits at `origin + (i * cell_size[0], j * cell_size[1])`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub origin: [f64; 2],
    pub cell_size: [f64; 2],
    /// Number of nodes along x and y.
    pub nodes: [usize; 2],
    pub elevation: f64,
}

/// Regular 3D node lattice carrying volumetric scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGrid {
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    /// Number of nodes along x, y and z.
    pub nodes: [usize; 3],
}

/// Georeferenced image (orthophoto, DEM, land-use classes).
///
/// Samples are row-major, `channels` interleaved values per pixel, row 0 at
/// `extent` ymin.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f32>,
    /// `[xmin, ymin, xmax, ymax]` in world units.
    pub extent: [f64; 4],
    pub elevation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Mesh,
    Lines,
    Points,
    Grid,
    Raster,
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GeometryKind::Mesh => "mesh",
            GeometryKind::Lines => "lines",
            GeometryKind::Points => "points",
            GeometryKind::Grid => "grid",
            GeometryKind::Raster => "raster",
        };

        f.write_str(s)
    }
}

/// Every geometry the scene knows how to wrap.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh(Mesh),
    LineString(LineString),
    MultiLineString(MultiLineString),
    PointCloud(PointCloud),
    Grid(Grid),
    VolumeGrid(VolumeGrid),
    Raster(Raster),
}

impl Geometry {
    /// Wrapper family this geometry ends up in.
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Mesh(_) => GeometryKind::Mesh,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => GeometryKind::Lines,
            Geometry::PointCloud(_) => GeometryKind::Points,
            Geometry::Grid(_) | Geometry::VolumeGrid(_) => GeometryKind::Grid,
            Geometry::Raster(_) => GeometryKind::Raster,
        }
    }
}
