//! GBUF: per-object render buffer dump.
//!
//! File layout (little-endian):
//!   00  : [u8;4]  magic = b"GBUF"
//!   04  : u32     version = 1
//!   08  : u32     flags (bitfield)
//!                 bit 0 => TEX1 chunk present
//!                 bit 1 => IMG1 chunk present
//!                 bit 2 => PIK1 chunk present
//!   0C  : u8      kind (0 mesh, 1 lines, 2 points, 3 grid, 4 raster)
//!   0D  : u8      indices per primitive (1, 2 or 3)
//!   0E  : u16     floats per vertex record
//!   10  : u32     vertex_count
//!   14  : u32     index_count
//!   18  : f64[3]  translation applied to the source coordinates
//!   30  : f32[vertex_count * stride] interleaved vertex records
//!   ..  : u32[index_count]
//!   ..  : TEX1 chunk                  (if bit0)
//!   ..  : IMG1 chunk                  (if bit1)
//!   ..  : PIK1 chunk                  (if bit2)
//!
//! TEX1 chunk:
//!   "TEX1" u32 width u32 height u16 layer_count
//!   per layer: u16 name_len, name (utf-8), f32 min, f32 max (NaN if none),
//!              f32[width * height] texels
//!
//! IMG1 chunk:
//!   "IMG1" u32 width u32 height u32 channels f32[width * height * channels]
//!
//! PIK1 chunk:
//!   "PIK1" u32 first_id u32 id_count u32 part_count
//!   per part: u32 id, u32 first_face, u32 face_count, u16 uuid_len, uuid

use citybuf::{GeometryKind, Wrapper};
use std::fs::File;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::Path;

pub const GBUF_MAGIC: [u8; 4] = *b"GBUF";
pub const GBUF_VERSION: u32 = 1;

pub const FLAG_TEX1: u32 = 1 << 0;
pub const FLAG_IMG1: u32 = 1 << 1;
pub const FLAG_PIK1: u32 = 1 << 2;

fn kind_code(kind: GeometryKind) -> u8 {
    match kind {
        GeometryKind::Mesh => 0,
        GeometryKind::Lines => 1,
        GeometryKind::Points => 2,
        GeometryKind::Grid => 3,
        GeometryKind::Raster => 4,
    }
}

#[inline]
fn write_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[inline]
fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[inline]
fn write_f32<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[inline]
fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[cfg(target_endian = "little")]
fn write_floats<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    w.write_all(bytemuck::cast_slice(values))
}

#[cfg(not(target_endian = "little"))]
fn write_floats<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    for &v in values {
        write_f32(w, v)?;
    }
    Ok(())
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| bad("string longer than 65535 bytes"))?;
    write_u16(w, len)?;
    w.write_all(s.as_bytes())
}

fn count(n: usize) -> io::Result<u32> {
    u32::try_from(n).map_err(|_| bad("count exceeds u32"))
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Serialise one wrapper's buffers.
pub fn write_dump<W: Write>(w: &mut W, wrapper: &Wrapper) -> io::Result<()> {
    let texture = wrapper.data_texture();
    let image = match wrapper {
        Wrapper::Raster(r) => Some(r.image()),
        _ => None,
    };
    let parts = match wrapper {
        Wrapper::Mesh(m) => m.parts(),
        _ => None,
    };
    let picking = wrapper.id_count() > 0;

    let mut flags = 0u32;
    if texture.is_some() {
        flags |= FLAG_TEX1;
    }
    if image.is_some() {
        flags |= FLAG_IMG1;
    }
    if picking {
        flags |= FLAG_PIK1;
    }

    let indices = wrapper.indices();
    let stride = u16::try_from(wrapper.stride()).map_err(|_| bad("stride exceeds u16"))?;

    w.write_all(&GBUF_MAGIC)?;
    write_u32(w, GBUF_VERSION)?;
    write_u32(w, flags)?;

    w.write_all(&[kind_code(wrapper.kind()), indices.primitive.group() as u8])?;
    write_u16(w, stride)?;
    write_u32(w, count(wrapper.vertex_count())?)?;
    write_u32(w, count(indices.len())?)?;

    let shift = wrapper.translation().unwrap_or_default();
    write_f64(w, shift.x)?;
    write_f64(w, shift.y)?;
    write_f64(w, shift.z)?;

    write_floats(w, wrapper.vertex_floats())?;
    for &i in &indices.indices {
        write_u32(w, i)?;
    }

    if let Some(tex) = texture {
        w.write_all(b"TEX1")?;
        write_u32(w, tex.width())?;
        write_u32(w, tex.height())?;
        write_u16(w, u16::try_from(tex.layers().len()).map_err(|_| bad("too many layers"))?)?;

        for layer in tex.layers() {
            write_str(w, &layer.name)?;
            let (min, max) = layer.stats.map_or((f32::NAN, f32::NAN), |s| (s.min, s.max));
            write_f32(w, min)?;
            write_f32(w, max)?;
            write_floats(w, &layer.texels)?;
        }
    }

    if let Some(img) = image {
        w.write_all(b"IMG1")?;
        write_u32(w, img.width)?;
        write_u32(w, img.height)?;
        write_u32(w, img.channels)?;
        write_floats(w, &img.data)?;
    }

    if picking {
        w.write_all(b"PIK1")?;
        write_u32(w, wrapper.first_id())?;
        write_u32(w, wrapper.id_count())?;

        let parts: Vec<_> = parts.map(|p| p.iter().collect()).unwrap_or_default();
        write_u32(w, count(parts.len())?)?;
        for part in parts {
            write_u32(w, part.id)?;
            write_u32(w, count(part.faces.start)?)?;
            write_u32(w, count(part.face_count())?)?;
            write_str(w, &part.uuid)?;
        }
    }

    Ok(())
}

pub fn write_file<P: AsRef<Path>>(path: P, wrapper: &Wrapper) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_dump(&mut file, wrapper)?;
    file.flush()
}
