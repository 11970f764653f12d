use anyhow::{bail, Context, Result};
use citybuf::Mesh;
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Faces of one `o`/`g` group, reindexed onto its own vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjGroup {
    pub name: String,
    pub mesh: Mesh,
}

/// Resolve one `v`, `v/vt`, `v/vt/vn` or `v//vn` reference to a 0-based index.
fn vertex_ref(token: &str, seen: usize) -> Result<u32> {
    let head = token.split('/').next().unwrap_or("");
    let raw: i64 = head
        .parse()
        .with_context(|| format!("bad vertex reference {token:?}"))?;

    // Negative references count back from the last vertex read so far.
    let index = match raw {
        0 => bail!("vertex reference 0 in {token:?}"),
        r if r > 0 => r - 1,
        r => seen as i64 + r,
    };

    if index < 0 || index >= seen as i64 {
        bail!("vertex reference {token:?} out of range ({seen} vertices)");
    }
    u32::try_from(index).context("vertex index overflows u32")
}

/// Read `v` and `f` records; `o` and `g` start a new group.
///
/// Faces before any group land in `default_name`. Polygons are
/// fan-triangulated. A group name seen twice keeps adding to the first
/// group, and groups without faces are dropped.
pub fn parse_obj<R: Read>(reader: R, default_name: &str) -> Result<Vec<ObjGroup>> {
    let mut vertices: Vec<[f64; 3]> = Vec::new();
    // (name, triangles in global vertex indices)
    let mut groups: Vec<(String, Vec<[u32; 3]>)> = vec![(default_name.to_owned(), Vec::new())];
    let mut current = 0usize;

    for (number, line_result) in BufReader::new(reader).lines().enumerate() {
        let line = line_result?;
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("v") => {
                let mut coord = |axis: &str| -> Result<f64> {
                    parts
                        .next()
                        .with_context(|| format!("line {}: missing {axis} coordinate", number + 1))?
                        .parse()
                        .with_context(|| format!("line {}: bad {axis} coordinate", number + 1))
                };
                let x = coord("x")?;
                let y = coord("y")?;
                let z = coord("z")?;
                vertices.push([x, y, z]);
            }
            Some("f") => {
                let refs = parts
                    .map(|t| vertex_ref(t, vertices.len()))
                    .collect::<Result<Vec<u32>>>()
                    .with_context(|| format!("line {}", number + 1))?;
                if refs.len() < 3 {
                    bail!("line {}: face with {} vertices", number + 1, refs.len());
                }

                let faces = &mut groups[current].1;
                for k in 1..refs.len() - 1 {
                    faces.push([refs[0], refs[k], refs[k + 1]]);
                }
            }
            Some("o") | Some("g") => {
                let name = parts.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    continue;
                }
                current = match groups.iter().position(|(n, _)| *n == name) {
                    Some(i) => i,
                    None => {
                        groups.push((name, Vec::new()));
                        groups.len() - 1
                    }
                };
            }
            _ => {}
        }
    }

    debug!(
        "{default_name}: {} vertices in {} groups",
        vertices.len(),
        groups.len()
    );

    Ok(groups
        .into_iter()
        .filter(|(_, faces)| !faces.is_empty())
        .map(|(name, faces)| ObjGroup {
            name,
            mesh: compact(&vertices, &faces),
        })
        .collect())
}

/// Keep only the vertices `faces` reference, in first-use order.
fn compact(vertices: &[[f64; 3]], faces: &[[u32; 3]]) -> Mesh {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut kept = Vec::new();

    let faces = faces
        .iter()
        .map(|face| {
            face.map(|v| {
                *remap.entry(v).or_insert_with(|| {
                    kept.push(vertices[v as usize]);
                    (kept.len() - 1) as u32
                })
            })
        })
        .collect();

    Mesh::new(kept, faces)
}

/// Load a plain `.obj` or a `.zip` archive holding one.
pub fn load_obj(path: &Path) -> Result<Vec<ObjGroup>> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_owned();

    if path.extension().and_then(|s| s.to_str()) == Some("zip") {
        debug!("Opening ZIP archive {}", path.display());
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let obj_name = archive
            .file_names()
            .find(|n| n.to_ascii_lowercase().ends_with(".obj"))
            .context("No .obj file found in zip archive")?
            .to_owned();

        debug!("Found OBJ file in ZIP: {obj_name}");
        let obj_file = archive.by_name(&obj_name)?;
        parse_obj(obj_file, &stem)
    } else {
        parse_obj(File::open(path)?, &stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_quad_is_fanned() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let groups = parse_obj(src.as_bytes(), "tile").unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "tile");
        assert_eq!(groups[0].mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(groups[0].mesh.vertices.len(), 4);
    }

    #[test]
    fn test_reference_forms() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vn 0 0 1
f 1/1 2/1/1 3//1
f -3 -2 -1
";
        let groups = parse_obj(src.as_bytes(), "t").unwrap();
        assert_eq!(groups[0].mesh.faces, vec![[0, 1, 2], [0, 1, 2]]);
    }

    #[test]
    fn test_groups_become_parts() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 5 5 5
o house-a
f 1 2 3
g house-b
f 2 4 3
o house-a
f 3 2 1
";
        let groups = parse_obj(src.as_bytes(), "tile").unwrap();
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["house-a", "house-b"]);

        assert_eq!(groups[0].mesh.faces.len(), 2);
        // house-b uses source vertices 2, 4, 3, renumbered from zero
        assert_eq!(groups[1].mesh.faces, vec![[0, 1, 2]]);
        assert_eq!(groups[1].mesh.vertices[1], [5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_bad_references() {
        assert!(parse_obj("v 0 0 0\nf 1 2 3\n".as_bytes(), "t").is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n".as_bytes(), "t").is_err());
        assert!(parse_obj("v 0 0\n".as_bytes(), "t").is_err());
        assert!(parse_obj("v 0 0 0\nf 0 1 1\n".as_bytes(), "t").is_err());
    }

    #[test]
    fn test_zip_archive() {
        let dir = std::env::temp_dir().join(format!("scene2buf-obj-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tile_7.zip");

        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("inner/Tile_7.OBJ", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        zip.finish().unwrap();

        let groups = load_obj(&path).unwrap();
        assert_eq!(groups[0].name, "tile_7");
        assert_eq!(groups[0].mesh.faces.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
