//! Dataset directory layout and page I/O
//!
//! A dataset is a directory holding `volume.json` plus one LZ4-compressed file
//! per non-empty page under `pages/`. Every file is written to a temporary
//! name, synced and renamed into place.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::Region;
use crate::voxel::page::Page;
use crate::voxel::voxel::{Voxel, VolumeKind};

pub const METADATA_FILENAME: &str = "volume.json";
pub const PAGES_DIR: &str = "pages";
const PAGE_EXTENSION: &str = "cvp";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Contents of `volume.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetadata {
    pub version: u32,
    pub kind: VolumeKind,
    pub region: Region,
    pub base_node_size: u32,
}

impl VolumeMetadata {
    pub fn new(kind: VolumeKind, region: Region, base_node_size: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            kind,
            region,
            base_node_size,
        }
    }
}

/// Compress a page
pub fn compress_page<V: Voxel>(page: &Page<V>) -> Vec<u8> {
    lz4_flex::compress_prepend_size(page.as_bytes())
}

/// Decompress a page written by `compress_page`
pub fn decompress_page<V: Voxel>(data: &[u8]) -> io::Result<Page<V>> {
    let bytes = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("LZ4 decompression failed: {}", e)))?;
    Page::from_bytes(&bytes)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad page size: {} bytes", bytes.len())))
}

/// File path of the page at `coord`
pub fn page_path(root: &Path, coord: IVec3) -> PathBuf {
    root.join(PAGES_DIR)
        .join(format!("page_{}_{}_{}.{}", coord.x, coord.y, coord.z, PAGE_EXTENSION))
}

fn parse_page_name(name: &str) -> Option<IVec3> {
    let stem = name.strip_prefix("page_")?.strip_suffix(&format!(".{}", PAGE_EXTENSION))?;
    let mut parts = stem.split('_').map(|p| p.parse::<i32>().ok());
    let coord = IVec3::new(parts.next()??, parts.next()??, parts.next()??);
    parts.next().is_none().then_some(coord)
}

/// Write `bytes` to `path` so that a crash leaves either the old or new file
fn write_durable(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Platforms that cannot open or fsync a directory report one of these
fn dir_sync_unsupported(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied)
}

/// fsync a directory so renames and deletions inside it survive a crash
fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = match File::open(path) {
        Ok(dir) => dir,
        Err(e) if dir_sync_unsupported(&e) => return Ok(()),
        Err(e) => return Err(e),
    };
    match dir.sync_all() {
        Err(e) if dir_sync_unsupported(&e) => Ok(()),
        result => result,
    }
}

/// Handle on a dataset directory
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    /// Create a new, empty dataset. Fails if `root` already holds one.
    pub fn create(root: &Path, metadata: &VolumeMetadata) -> Result<Self> {
        if root.join(METADATA_FILENAME).exists() {
            return Err(Error::Storage(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("dataset already exists at {}", root.display()),
            )));
        }
        fs::create_dir_all(root.join(PAGES_DIR))?;
        let dataset = Self { root: root.to_path_buf() };
        dataset.write_metadata(metadata)?;
        Ok(dataset)
    }

    /// Open an existing dataset and read its metadata
    pub fn open(root: &Path) -> Result<(Self, VolumeMetadata)> {
        let json = fs::read_to_string(root.join(METADATA_FILENAME))?;
        let metadata: VolumeMetadata = serde_json::from_str(&json)?;
        if metadata.version != FORMAT_VERSION {
            return Err(Error::InvalidConfig(format!(
                "unsupported dataset version {} (expected {})",
                metadata.version, FORMAT_VERSION
            )));
        }
        fs::create_dir_all(root.join(PAGES_DIR))?;
        Ok((Self { root: root.to_path_buf() }, metadata))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_metadata(&self, metadata: &VolumeMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(metadata)?;
        write_durable(&self.root.join(METADATA_FILENAME), json.as_bytes())?;
        Ok(())
    }

    pub fn write_page<V: Voxel>(&self, coord: IVec3, page: &Page<V>) -> Result<()> {
        write_durable(&page_path(&self.root, coord), &compress_page(page))?;
        Ok(())
    }

    /// Delete a page file; a page that was never written is not an error
    pub fn remove_page(&self, coord: IVec3) -> Result<()> {
        match fs::remove_file(page_path(&self.root, coord)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Make renames and deletions in the pages directory and the root durable
    pub fn sync_pages_dir(&self) -> Result<()> {
        sync_dir(&self.root.join(PAGES_DIR))?;
        sync_dir(&self.root)?;
        Ok(())
    }

    /// Read every page in the dataset
    pub fn read_pages<V: Voxel>(&self) -> Result<Vec<(IVec3, Page<V>)>> {
        let mut pages = Vec::new();
        for entry in fs::read_dir(self.root.join(PAGES_DIR))? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(coord) = name.to_str().and_then(parse_page_name) else {
                continue;
            };
            let data = fs::read(entry.path())?;
            pages.push((coord, decompress_page(&data)?));
        }
        pages.sort_by_key(|(coord, _)| (coord.z, coord.y, coord.x));
        Ok(pages)
    }
}
