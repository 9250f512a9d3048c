//! Haiku resource tail detection and placement.
//!
//! Haiku binaries may carry a block of resource data appended after the
//! "real" ELF payload. This module computes where that block would sit
//! for a given ELF or FatELF file, and confirms its presence via a magic
//! word at the computed offset. The resource table's own contents are
//! opaque here; only its position and length matter to the glue engine,
//! which carries the bytes verbatim.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::classify::{self, Kind};
use crate::elf::{self, Ident};
use crate::error::Result;
use crate::fatelf::{self, Header};
use crate::io::{align_up, read_file};

/// Haiku resource header magic, as read in the file's own byte order.
const RESOURCE_MAGIC: u32 = 0x444f_1000;

/// Compute the offset at which a resource tail would sit in an ELF file,
/// given its identification and payload extent.
pub fn offset_for_elf(ident: Ident, extent: elf::PayloadExtent) -> u64 {
    let align = if ident.class == elf::class::ELFCLASS64 {
        8
    } else {
        extent.max_align.max(32)
    };
    align_up(extent.max_end, align)
}

/// Compute the offset at which a resource tail would sit in a FatELF
/// container, given its header.
pub fn offset_for_fatelf(header: &Header) -> u64 {
    let edge = header
        .records
        .iter()
        .map(|r| r.offset.saturating_add(r.size))
        .max()
        .unwrap_or(0);
    align_up(edge, 8)
}

/// A resource block found at `offset`, `size` bytes long, confirmed by
/// magic.
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    pub offset: u64,
    pub size: u64,
}

/// Check whether a resource tail is present at `offset` in `file`, whose
/// total length is `file_len`. Returns `None` if the offset is at or past
/// the end of the file, or the magic doesn't match in either byte order.
pub fn detect_at(file: &mut File, file_len: u64, offset: u64) -> Result<Option<Resource>> {
    if offset >= file_len {
        return Ok(None);
    }
    if file_len - offset < 4 {
        return Ok(None);
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut word = [0u8; 4];
    file.read_exact(&mut word)?;
    let native = u32::from_ne_bytes(word);
    let swapped = native.swap_bytes();
    if native != RESOURCE_MAGIC && swapped != RESOURCE_MAGIC {
        return Ok(None);
    }
    Ok(Some(Resource {
        offset,
        size: file_len - offset,
    }))
}

/// Locate a resource tail in an ELF file at `path`, already identified by
/// `ident`.
pub fn find_in_elf(path: &Path, ident: Ident, data: &[u8]) -> Result<Option<Resource>> {
    let extent = elf::payload_extent(data, path, ident)?;
    let offset = offset_for_elf(ident, extent);
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    detect_at(&mut file, len, offset)
}

/// Locate a resource tail in a FatELF container at `path`, given its
/// already-decoded header.
pub fn find_in_fatelf(path: &Path, header: &Header) -> Result<Option<Resource>> {
    let offset = offset_for_fatelf(header);
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    detect_at(&mut file, len, offset)
}

/// Composite entry point: classify `path` by its leading bytes and locate
/// a resource tail the way each container format would carry one. Returns
/// `None` for anything that isn't ELF or FatELF, since neither AR nor
/// arbitrary files define a resource tail.
pub fn find_resource(path: &Path) -> Result<Option<Resource>> {
    let data = read_file(path)?;
    match classify::classify(&data) {
        Kind::Elf => {
            let ident = elf::parse_ident(&data, path)?;
            find_in_elf(path, ident, &data)
        }
        Kind::FatElf => {
            let header = fatelf::read_header(&data, path)?;
            find_in_fatelf(path, &header)
        }
        Kind::Ar | Kind::Other => Ok(None),
    }
}
