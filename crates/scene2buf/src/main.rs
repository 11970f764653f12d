use anyhow::{Context, Result};
use citybuf::{
    BoundingBox, Fields, Geometry, GeometryKind, Mesh, Scene, SceneReport, Shading, WrapConfig,
    Wrapper, DEFAULT_MAX_TEXTURE_SIZE,
};
use clap::Parser;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    collections::{btree_map::Entry, BTreeMap},
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

mod dump;
mod manifest;
mod obj;
mod xyz;

#[derive(Parser, Debug, Clone)]
#[command(name = "scene2buf", version)]
struct Args {
    /// Directory scanned for .obj, .zip (one OBJ inside) and .xyz inputs.
    #[arg(long, default_value = "tiles")]
    input_dir: String,

    #[arg(long, default_value = "buffers")]
    output_dir: String,

    /// Optional JSON scene manifest with lines, points, grids, volumes and rasters.
    #[arg(long)]
    manifest: Option<String>,

    /// Largest data-texture width/height the target GPU accepts.
    #[arg(long, default_value_t = DEFAULT_MAX_TEXTURE_SIZE)]
    max_texture_size: u32,

    /// Give every mesh face its own vertices and face normal.
    #[arg(long, default_value_t = false)]
    flat_shading: bool,

    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Where to write the JSON scene summary (default: <output-dir>/scene.json).
    #[arg(long)]
    summary: Option<String>,
}

/// One object loaded from disk, not yet wrapped.
#[derive(Debug)]
enum Input {
    Single {
        name: String,
        geometry: Geometry,
        data: Option<Fields>,
    },
    /// OBJ with several groups: one pickable mesh, one part per group.
    Parts {
        name: String,
        meshes: Vec<Mesh>,
        uuids: Vec<String>,
    },
}

impl Input {
    fn name(&self) -> &str {
        match self {
            Input::Single { name, .. } | Input::Parts { name, .. } => name,
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery and loading
// ---------------------------------------------------------------------------

/// Inputs keyed by file stem, walked in name order. A `.zip` wins over an
/// `.obj` of the same stem in the same directory; any other stem collision
/// keeps the first path and warns.
fn discover_inputs(input_dir: &str) -> Vec<PathBuf> {
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        if !matches!(ext.as_str(), "obj" | "zip" | "xyz") {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_owned();

        match found.entry(stem) {
            Entry::Vacant(slot) => {
                slot.insert(path);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                let existing_ext = existing
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_ascii_lowercase())
                    .unwrap_or_default();
                let same_dir = existing.parent() == path.parent();
                if same_dir && existing_ext == "obj" && ext == "zip" {
                    debug!("{}: replaced by {}", existing.display(), path.display());
                    slot.insert(path);
                } else if same_dir && existing_ext == "zip" && ext == "obj" {
                    debug!("{}: archive {} preferred", path.display(), existing.display());
                } else {
                    warn!(
                        "{}: object name '{}' already taken by {}, skipping",
                        path.display(),
                        slot.key(),
                        existing.display()
                    );
                }
            }
        }
    }

    found.into_values().collect()
}

fn load_input(path: &Path) -> Result<Input> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("input file has no usable name")?
        .to_owned();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    debug!("Loading {}", path.display());

    if ext == "xyz" {
        let (cloud, data) = xyz::parse_xyz(File::open(path)?)?;
        return Ok(Input::Single {
            name,
            geometry: Geometry::PointCloud(cloud),
            data,
        });
    }

    let mut groups = obj::load_obj(path)?;
    match groups.len() {
        0 => anyhow::bail!("no faces"),
        1 => {
            let group = groups.remove(0);
            Ok(Input::Single {
                name,
                geometry: Geometry::Mesh(group.mesh),
                data: None,
            })
        }
        _ => {
            let (uuids, meshes) = groups.into_iter().map(|g| (g.name, g.mesh)).unzip();
            Ok(Input::Parts {
                name,
                meshes,
                uuids,
            })
        }
    }
}

fn add_input(scene: &mut Scene, input: &Input) -> citybuf::Result<()> {
    match input {
        Input::Single {
            name,
            geometry,
            data,
        } => scene.add(name, geometry, data.as_ref()),
        Input::Parts {
            name,
            meshes,
            uuids,
        } => scene.add_parts(name, meshes, uuids, None),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ObjectSummary<'a> {
    name: &'a str,
    kind: GeometryKind,
    file: String,
    vertices: usize,
    indices: usize,
    first_id: u32,
    id_count: u32,
    active_field: Option<&'a str>,
    fields: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    scene: &'a str,
    config: &'a WrapConfig,
    bounds: Option<&'a BoundingBox>,
    report: &'a SceneReport,
    objects: Vec<ObjectSummary<'a>>,
}

/// Object name turned into a safe file name.
fn dump_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    format!("{stem}.gbuf")
}

fn write_dumps(objects: &[Wrapper], output_dir: &Path, overwrite: bool) {
    objects.par_iter().for_each(|w| {
        let out_path = output_dir.join(dump_file_name(w.name()));

        if out_path.exists() && !overwrite {
            debug!("Skipping existing file: {}", out_path.display());
            return;
        }

        if let Err(err) = dump::write_file(&out_path, w) {
            warn!("Error writing {}: {:#}", out_path.display(), err);
        }
    });
}

fn run(args: &Args) -> Result<SceneReport> {
    let output_dir = Path::new(&args.output_dir);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create {}", output_dir.display()))?;

    let paths = discover_inputs(&args.input_dir);
    info!("Loading {} files...", paths.len());

    let mut inputs: Vec<Input> = paths
        .par_iter()
        .filter_map(|path| match load_input(path) {
            Ok(input) => Some(input),
            Err(err) => {
                warn!("Error loading {}: {:#}", path.display(), err);
                None
            }
        })
        .collect();

    if let Some(manifest_path) = &args.manifest {
        let manifest = manifest::load_manifest(Path::new(manifest_path))?;
        inputs.extend(manifest.objects.into_iter().map(|o| {
            let (name, geometry, data) = o.into_parts();
            Input::Single {
                name,
                geometry,
                data,
            }
        }));
    }

    // Picking ids are handed out in this order.
    inputs.sort_by(|a, b| a.name().cmp(b.name()));

    let config = WrapConfig {
        max_texture_size: args.max_texture_size,
        shading: if args.flat_shading {
            Shading::Flat
        } else {
            Shading::Smooth
        },
        first_id: 0,
    };

    let scene_name = Path::new(&args.input_dir)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("scene");
    let mut scene = Scene::new(scene_name, config);

    for input in &inputs {
        // Failures are logged and kept in the scene report.
        if let Err(err) = add_input(&mut scene, input) {
            debug!("{}: not added: {err}", input.name());
        }
    }

    let report = scene.preprocess().context("nothing to draw")?;
    info!(
        "{} objects, {} vertices, {} indices, {} skipped items, {} failed",
        report.objects,
        report.vertices,
        report.indices,
        report.skipped,
        report.failed.len()
    );

    write_dumps(scene.objects(), output_dir, args.overwrite);

    let objects = scene
        .objects()
        .iter()
        .map(|w| ObjectSummary {
            name: w.name(),
            kind: w.kind(),
            file: dump_file_name(w.name()),
            vertices: w.vertex_count(),
            indices: w.indices().len(),
            first_id: w.first_id(),
            id_count: w.id_count(),
            active_field: w.active_field(),
            fields: w
                .data_texture()
                .map(|t| t.field_names().collect())
                .unwrap_or_default(),
        })
        .collect();

    let summary = Summary {
        scene: scene.name(),
        config: scene.config(),
        bounds: scene.bounds(),
        report: &report,
        objects,
    };

    let summary_path = args
        .summary
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| output_dir.join("scene.json"));
    let file = File::create(&summary_path)
        .with_context(|| format!("create {}", summary_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &summary)?;

    Ok(report)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    run(&args)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene2buf-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args(input: &Path, output: &Path) -> Args {
        Args::parse_from([
            "scene2buf",
            "--input-dir",
            input.to_str().unwrap(),
            "--output-dir",
            output.to_str().unwrap(),
        ])
    }

    #[test]
    fn test_dump_file_names() {
        assert_eq!(dump_file_name("tile_3"), "tile_3.gbuf");
        assert_eq!(dump_file_name("a/b c"), "a_b_c.gbuf");
    }

    #[test]
    fn test_discover_prefers_zip() {
        let dir = temp_dir("discover");
        for f in ["a.obj", "a.zip", "b.xyz", "notes.txt"] {
            fs::write(dir.join(f), b"").unwrap();
        }

        let found = discover_inputs(dir.to_str().unwrap());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.zip", "b.xyz"]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_discover_keeps_one_path_per_name() {
        let dir = temp_dir("collide");
        for sub in ["north", "south"] {
            fs::create_dir_all(dir.join(sub)).unwrap();
            fs::write(dir.join(sub).join("tile.obj"), b"").unwrap();
        }
        fs::write(dir.join("south").join("tile.zip"), b"").unwrap();

        let found = discover_inputs(dir.to_str().unwrap());
        assert_eq!(found, [dir.join("north").join("tile.obj")]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_end_to_end() {
        let input = temp_dir("in");
        let output = temp_dir("out");

        fs::write(
            input.join("block.obj"),
            "v 500000 6400000 10\nv 500001 6400000 10\nv 500000 6400001 10\n\
             v 500005 6400000 12\nv 500006 6400000 12\nv 500005 6400001 12\n\
             o house-a\nf 1 2 3\no house-b\nf 4 5 6\n",
        )
        .unwrap();
        fs::write(input.join("lidar.xyz"), "500000 6400000 11 0.5\n500010 6400010 15 0.7\n")
            .unwrap();
        fs::write(input.join("broken.obj"), "v 0 0 0\nf 1 2 3\n").unwrap();

        let report = run(&args(&input, &output)).unwrap();
        assert_eq!(report.objects, 2);
        assert!(report.failed.is_empty());

        let block = fs::read(output.join("block.gbuf")).unwrap();
        let header = dump::reader::parse_header(&block).unwrap();
        assert_eq!(header.kind, 0);
        assert_eq!(header.translation[0], -500_005.0);
        assert_ne!(header.flags & dump::FLAG_PIK1, 0);

        let summary: serde_json::Value =
            serde_json::from_slice(&fs::read(output.join("scene.json")).unwrap()).unwrap();
        assert_eq!(summary["objects"][0]["name"], "block");
        assert_eq!(summary["objects"][1]["first_id"], 2);
        assert_eq!(summary["objects"][1]["active_field"], "value");

        fs::remove_dir_all(&input).unwrap();
        fs::remove_dir_all(&output).unwrap();
    }
}
