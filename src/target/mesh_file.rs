//! Content-addressed geometry files.
//!
//! Layout (native endianness): magic, `u16` version, `u32` counts for vertices, normals,
//! tex coords, tangents, triangles and material slots, the slot names as `u32`-length
//! prefixed UTF-8, then the raw arrays in the same order.

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};

use super::{MeshGeometry, Triangle};
use crate::{
    error::{ExportError, ExportResult},
    hash::ContentHash,
};

pub const GEOMETRY_DIR: &str = "_geometry";
pub const MESH_FILE_EXTENSION: &str = "binarymesh";
const MAGIC: &[u8; 10] = b"BINARYMESH";
const VERSION: u16 = 1;

/// Path of the geometry file for `hash`, relative to the project directory.
pub fn mesh_file_name(hash: &ContentHash) -> PathBuf {
    Path::new(GEOMETRY_DIR).join(format!("{}.{}", hash.to_hex(), MESH_FILE_EXTENSION))
}

/// Writes the geometry unless a file for the same hash already exists. Returns the
/// relative file name and whether anything was written.
pub fn write_mesh_file_if_missing(
    project_dir: &Path,
    hash: &ContentHash,
    geometry: &MeshGeometry,
    material_slots: &[String],
) -> ExportResult<(PathBuf, bool)> {
    let rel = mesh_file_name(hash);
    let path = project_dir.join(&rel);
    if path.exists() {
        return Ok((rel, false));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    let file = fs::File::create(&path).map_err(|e| ExportError::io(&path, e))?;
    let mut w = BufWriter::new(file);
    encode(&mut w, geometry, material_slots).map_err(|e| ExportError::io(&path, e))?;
    w.flush().map_err(|e| ExportError::io(&path, e))?;
    Ok((rel, true))
}

fn encode(w: &mut impl Write, g: &MeshGeometry, slots: &[String]) -> std::io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_ne_bytes())?;
    for count in [
        g.vertices.len(),
        g.normals.len(),
        g.tex_coords.len(),
        g.tangents.len(),
        g.triangles.len(),
        slots.len(),
    ] {
        w.write_all(&(count as u32).to_ne_bytes())?;
    }
    for slot in slots {
        w.write_all(&(slot.len() as u32).to_ne_bytes())?;
        w.write_all(slot.as_bytes())?;
    }
    w.write_all(bytemuck::cast_slice(&g.vertices))?;
    w.write_all(bytemuck::cast_slice(&g.normals))?;
    w.write_all(bytemuck::cast_slice(&g.tex_coords))?;
    w.write_all(bytemuck::cast_slice(&g.tangents))?;
    w.write_all(bytemuck::cast_slice(&g.triangles))?;
    Ok(())
}

struct ByteReader<'a> {
    buf: &'a [u8],
    path: &'a Path,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            bail!("truncated mesh file {}", self.path.display());
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn u32(&mut self) -> Result<usize> {
        Ok(u32::from_ne_bytes(self.take(4)?.try_into()?) as usize)
    }

    /// `count` elements of `T`, checked against the bytes left before allocating.
    fn array<T: bytemuck::Pod>(&mut self, count: usize) -> Result<Vec<T>> {
        let Some(len) = count.checked_mul(std::mem::size_of::<T>()) else {
            bail!("corrupt element count {count} in {}", self.path.display());
        };
        Ok(bytemuck::pod_collect_to_vec(self.take(len)?))
    }
}

/// Reads a file written by [`write_mesh_file_if_missing`].
pub fn read_mesh_file(path: &Path) -> Result<(MeshGeometry, Vec<String>)> {
    let bytes = fs::read(path)?;
    let mut reader = ByteReader {
        buf: bytes.as_slice(),
        path,
    };

    if reader.take(MAGIC.len())? != MAGIC {
        bail!("not a mesh file: {}", path.display());
    }
    let version = u16::from_ne_bytes(reader.take(2)?.try_into()?);
    if version != VERSION {
        bail!("unsupported mesh file version {version}");
    }
    let mut counts = [0usize; 6];
    for c in &mut counts {
        *c = reader.u32()?;
    }
    // Every slot takes at least its 4-byte length prefix.
    let mut slots = Vec::with_capacity(counts[5].min(reader.buf.len() / 4));
    for _ in 0..counts[5] {
        let len = reader.u32()?;
        slots.push(String::from_utf8(reader.take(len)?.to_vec())?);
    }

    let vertices: Vec<[f32; 3]> = reader.array(counts[0])?;
    let normals: Vec<[f32; 3]> = reader.array(counts[1])?;
    let tex_coords: Vec<[f32; 2]> = reader.array(counts[2])?;
    let tangents: Vec<[f32; 3]> = reader.array(counts[3])?;
    let triangles: Vec<Triangle> = reader.array(counts[4])?;

    Ok((
        MeshGeometry {
            vertices,
            normals,
            tex_coords,
            tangents,
            triangles,
            motion_poses: Vec::new(),
        },
        slots,
    ))
}
