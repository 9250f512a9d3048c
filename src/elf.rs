//! ELF header inspection.
//!
//! Parses just enough of an ELF file to drive the glue engine: the
//! identification bytes (class, byte order, OS/ABI), and the extent of the
//! "real" payload as determined by walking the program and section header
//! tables. Program/section header scanning follows the same field layout
//! used by `examples/Cach30verfl0w-libelf/src/header/mod.rs`'s
//! `ProgramHeader`/`SectionHeader` readers; this classifier-derived crate
//! never needed that scan before, since it only reports metadata rather
//! than computing payload extents for re-packaging.

use std::path::{Path, PathBuf};

use tracing::error;

use crate::error::{Error, Result};
use crate::io::{read_bytes, Endian};

/// ELF class (word size) values.
pub mod class {
    pub const ELFCLASS32: u8 = 1;
    pub const ELFCLASS64: u8 = 2;
}

/// ELF data encoding (byte order) values.
pub mod data {
    pub const ELFDATA2LSB: u8 = 1;
    pub const ELFDATA2MSB: u8 = 2;
}

const EI_NIDENT: usize = 16;
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_OSABI: usize = 7;
const EI_ABIVERSION: usize = 8;

const PT_NULL: u32 = 0;
const SHT_NULL: u32 = 0;
const SHT_NOBITS: u32 = 8;

/// The identification fields the glue engine needs to build a FatELF
/// record: the target-equivalence tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    pub class: u8,
    pub endian_byte: u8,
    pub osabi: u8,
    pub osabi_version: u8,
}

impl Ident {
    pub fn endian(&self) -> Endian {
        if self.endian_byte == data::ELFDATA2MSB {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn word_size(&self) -> u8 {
        if self.class == class::ELFCLASS64 {
            2
        } else {
            1
        }
    }
}

/// Result of scanning an ELF file's program and section header tables.
#[derive(Debug, Clone, Copy)]
pub struct PayloadExtent {
    /// Offset of the first byte past the ELF's own data.
    pub max_end: u64,
    /// Largest `p_align` seen among non-null program headers.
    pub max_align: u64,
}

/// Parse the 16-byte ELF identification at the start of `data`.
pub fn parse_ident(data: &[u8], path: &Path) -> Result<Ident> {
    let ident = read_bytes(data, path, 0, EI_NIDENT)?;
    if &ident[0..4] != b"\x7FELF" {
        error!(path = %path.display(), "missing ELF magic");
        return Err(Error::MalformedElf {
            path: path.to_path_buf(),
            message: "missing ELF magic".to_string(),
        });
    }
    let class = ident[EI_CLASS];
    if class != class::ELFCLASS32 && class != class::ELFCLASS64 {
        error!(path = %path.display(), class, "unrecognized ELF class");
        return Err(Error::MalformedElf {
            path: path.to_path_buf(),
            message: format!("unrecognized ELF class {class}"),
        });
    }
    let endian_byte = ident[EI_DATA];
    if endian_byte != data::ELFDATA2LSB && endian_byte != data::ELFDATA2MSB {
        error!(path = %path.display(), endian_byte, "unrecognized ELF data encoding");
        return Err(Error::MalformedElf {
            path: path.to_path_buf(),
            message: format!("unrecognized ELF data encoding {endian_byte}"),
        });
    }
    Ok(Ident {
        class,
        endian_byte,
        osabi: ident[EI_OSABI],
        osabi_version: ident[EI_ABIVERSION],
    })
}

/// Read the machine field (`e_machine`) out of the file header, needed to
/// populate a FatELF record alongside the identification tuple.
pub fn read_machine(data: &[u8], path: &Path, ident: Ident) -> Result<u16> {
    // e_machine sits at offset 18 in both the 32- and 64-bit headers:
    // 16 bytes of e_ident, 2 bytes of e_type, then e_machine.
    let bytes = read_bytes(data, path, 18, 2)?;
    Ok(ident.endian().read_u16(bytes))
}

struct HeaderLayout {
    phoff: u64,
    phentsize: u16,
    phnum: u16,
    shoff: u64,
    shentsize: u16,
    shnum: u16,
}

fn read_header_layout(data: &[u8], path: &Path, ident: Ident) -> Result<HeaderLayout> {
    let e = ident.endian();
    if ident.class == class::ELFCLASS32 {
        // e_ident(16) e_type(2) e_machine(2) e_version(4) e_entry(4)
        // e_phoff(4) e_shoff(4) e_flags(4) e_ehsize(2) e_phentsize(2)
        // e_phnum(2) e_shentsize(2) e_shnum(2) e_shstrndx(2)
        let phoff = e.read_u32(read_bytes(data, path, 28, 4)?) as u64;
        let shoff = e.read_u32(read_bytes(data, path, 32, 4)?) as u64;
        let phentsize = e.read_u16(read_bytes(data, path, 42, 2)?);
        let phnum = e.read_u16(read_bytes(data, path, 44, 2)?);
        let shentsize = e.read_u16(read_bytes(data, path, 46, 2)?);
        let shnum = e.read_u16(read_bytes(data, path, 48, 2)?);
        Ok(HeaderLayout {
            phoff,
            phentsize,
            phnum,
            shoff,
            shentsize,
            shnum,
        })
    } else {
        // e_ident(16) e_type(2) e_machine(2) e_version(4) e_entry(8)
        // e_phoff(8) e_shoff(8) e_flags(4) e_ehsize(2) e_phentsize(2)
        // e_phnum(2) e_shentsize(2) e_shnum(2) e_shstrndx(2)
        let phoff = e.read_u64(read_bytes(data, path, 32, 8)?);
        let shoff = e.read_u64(read_bytes(data, path, 40, 8)?);
        let phentsize = e.read_u16(read_bytes(data, path, 54, 2)?);
        let phnum = e.read_u16(read_bytes(data, path, 56, 2)?);
        let shentsize = e.read_u16(read_bytes(data, path, 58, 2)?);
        let shnum = e.read_u16(read_bytes(data, path, 60, 2)?);
        Ok(HeaderLayout {
            phoff,
            phentsize,
            phnum,
            shoff,
            shentsize,
            shnum,
        })
    }
}

/// Walk the program and section header tables and compute the offset of
/// the first byte past the ELF's own data, and the largest segment
/// alignment requested. Skips `PT_NULL` program headers and
/// `SHT_NULL`/`SHT_NOBITS` section headers per the spec.
pub fn payload_extent(data: &[u8], path: &Path, ident: Ident) -> Result<PayloadExtent> {
    let layout = read_header_layout(data, path, ident)?;
    let e = ident.endian();
    let mut max_end: u64 = 0;
    let mut max_align: u64 = 0;

    // Account for the header tables' own extent.
    let ph_table_end = layout
        .phoff
        .saturating_add(layout.phentsize as u64 * layout.phnum as u64);
    let sh_table_end = layout
        .shoff
        .saturating_add(layout.shentsize as u64 * layout.shnum as u64);
    max_end = max_end.max(ph_table_end).max(sh_table_end);

    for i in 0..layout.phnum as u64 {
        let off = (layout.phoff + i * layout.phentsize as u64) as usize;
        let entry = read_bytes(data, path, off, layout.phentsize as usize)?;
        let (p_type, p_offset, p_filesz, p_align) = if ident.class == class::ELFCLASS32 {
            let p_type = e.read_u32(&entry[0..4]);
            let p_offset = e.read_u32(&entry[4..8]) as u64;
            let p_filesz = e.read_u32(&entry[16..20]) as u64;
            let p_align = e.read_u32(&entry[28..32]) as u64;
            (p_type, p_offset, p_filesz, p_align)
        } else {
            let p_type = e.read_u32(&entry[0..4]);
            let p_offset = e.read_u64(&entry[8..16]);
            let p_filesz = e.read_u64(&entry[32..40]);
            let p_align = e.read_u64(&entry[48..56]);
            (p_type, p_offset, p_filesz, p_align)
        };
        if p_type == PT_NULL {
            continue;
        }
        max_end = max_end.max(p_offset.saturating_add(p_filesz));
        max_align = max_align.max(p_align);
    }

    for i in 0..layout.shnum as u64 {
        let off = (layout.shoff + i * layout.shentsize as u64) as usize;
        let entry = read_bytes(data, path, off, layout.shentsize as usize)?;
        let (sh_type, sh_offset, sh_size) = if ident.class == class::ELFCLASS32 {
            let sh_type = e.read_u32(&entry[4..8]);
            let sh_offset = e.read_u32(&entry[16..20]) as u64;
            let sh_size = e.read_u32(&entry[20..24]) as u64;
            (sh_type, sh_offset, sh_size)
        } else {
            let sh_type = e.read_u32(&entry[4..8]);
            let sh_offset = e.read_u64(&entry[24..32]);
            let sh_size = e.read_u64(&entry[32..40]);
            (sh_type, sh_offset, sh_size)
        };
        if sh_type == SHT_NULL || sh_type == SHT_NOBITS {
            continue;
        }
        max_end = max_end.max(sh_offset.saturating_add(sh_size));
    }

    Ok(PayloadExtent { max_end, max_align })
}
