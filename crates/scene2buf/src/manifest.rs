use anyhow::{Context, Result};
use citybuf::{
    Fields, Geometry, Grid, LineString, Mesh, MultiLineString, PointCloud, Raster, VolumeGrid,
};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// JSON scene description: a list of named objects.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub objects: Vec<ManifestObject>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestObject {
    pub name: String,
    #[serde(flatten)]
    pub geometry: ManifestGeometry,
    /// Kept in the order given; the first one starts active.
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestGeometry {
    Mesh {
        vertices: Vec<[f64; 3]>,
        faces: Vec<[u32; 3]>,
    },
    Lines {
        lines: Vec<Vec<[f64; 3]>>,
    },
    Points {
        points: Vec<[f64; 3]>,
    },
    Grid {
        origin: [f64; 2],
        cell_size: [f64; 2],
        nodes: [usize; 2],
        #[serde(default)]
        elevation: f64,
    },
    Volume {
        origin: [f64; 3],
        spacing: [f64; 3],
        nodes: [usize; 3],
    },
    Raster {
        width: usize,
        height: usize,
        #[serde(default = "one")]
        channels: usize,
        data: Vec<f32>,
        /// `[xmin, ymin, xmax, ymax]`
        extent: [f64; 4],
        #[serde(default)]
        elevation: f64,
    },
}

fn one() -> usize {
    1
}

impl From<ManifestGeometry> for Geometry {
    fn from(g: ManifestGeometry) -> Self {
        match g {
            ManifestGeometry::Mesh { vertices, faces } => Geometry::Mesh(Mesh::new(vertices, faces)),
            ManifestGeometry::Lines { lines } => Geometry::MultiLineString(MultiLineString::new(
                lines.into_iter().map(LineString::new).collect(),
            )),
            ManifestGeometry::Points { points } => Geometry::PointCloud(PointCloud::new(points)),
            ManifestGeometry::Grid {
                origin,
                cell_size,
                nodes,
                elevation,
            } => Geometry::Grid(Grid {
                origin,
                cell_size,
                nodes,
                elevation,
            }),
            ManifestGeometry::Volume {
                origin,
                spacing,
                nodes,
            } => Geometry::VolumeGrid(VolumeGrid {
                origin,
                spacing,
                nodes,
            }),
            ManifestGeometry::Raster {
                width,
                height,
                channels,
                data,
                extent,
                elevation,
            } => Geometry::Raster(Raster {
                width,
                height,
                channels,
                data,
                extent,
                elevation,
            }),
        }
    }
}

impl ManifestObject {
    /// Split into the object name, its geometry and its fields (if any).
    pub fn into_parts(self) -> (String, Geometry, Option<Fields>) {
        let fields = if self.fields.is_empty() {
            None
        } else {
            Some(self.fields.into_iter().map(|f| (f.name, f.values)).collect())
        };
        (self.name, self.geometry.into(), fields)
    }
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse manifest {}", path.display()))
}
