//! The glue engine: assembles N ELF inputs into one FatELF container.
//!
//! New module — the teacher's classifier only ever reads FatELF files to
//! describe them, it never builds one. The algorithm here is the spec's
//! own (reserve the header, page-align and copy each payload in turn,
//! reject duplicate targets, carry at most one Haiku resource tail), with
//! the teacher's I/O helpers (`crate::io`) and error taxonomy
//! (`crate::error`) underneath it.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::elf;
use crate::error::{Error, Result};
use crate::fatelf::{self, Header, Record};
use crate::io::{copy_region, file_size, read_file, write_zeros};
use crate::rsrc;

/// Engine-wide configuration. The only knob the spec names is the
/// container's page alignment; everything else is either a compiled-in
/// default or a CLI flag threaded straight through.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub page_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: fatelf::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Unlinks `path` on drop unless `disarm`ed. Registered when the output
/// file is created, disarmed once the container is fully written, so any
/// early return via `?` cleans up the partial file without a manual
/// catch-all at every fallible step.
struct CleanupGuard {
    path: PathBuf,
    armed: bool,
}

impl CleanupGuard {
    fn new(path: &Path) -> Self {
        CleanupGuard {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Build a FatELF container at `out_path` from `inputs`, in order.
pub fn build(out_path: &Path, inputs: &[PathBuf], config: Config) -> Result<()> {
    if inputs.is_empty() || inputs.len() > fatelf::MAX_RECORDS {
        error!(count = inputs.len(), "bad input count for glue");
        return Err(Error::TooManyRecords {
            count: inputs.len(),
        });
    }

    let header_size = fatelf::HEADER_SIZE + inputs.len() * fatelf::RECORD_SIZE;
    let mut out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(out_path)?;
    let guard = CleanupGuard::new(out_path);
    write_zeros(&mut out, header_size as u64)?;

    let mut cursor = header_size as u64;
    let mut records: Vec<Record> = Vec::with_capacity(inputs.len());
    let mut carried_resource: Option<(usize, u64, u64)> = None;

    for (i, input_path) in inputs.iter().enumerate() {
        let binary_offset = fatelf::page_align(cursor, config.page_size);
        if binary_offset > cursor {
            write_zeros(&mut out, binary_offset - cursor)?;
        }

        let header_bytes = read_elf_header_bytes(input_path)?;
        let ident = elf::parse_ident(&header_bytes, input_path)?;
        let machine = elf::read_machine(&header_bytes, input_path, ident)?;

        let mut record = Record {
            machine,
            osabi: ident.osabi,
            osabi_version: ident.osabi_version,
            word_size: ident.word_size(),
            byte_order: if ident.endian_byte == elf::data::ELFDATA2MSB {
                2
            } else {
                1
            },
            offset: binary_offset,
            size: 0,
        };

        for prior in &records {
            if fatelf::record_matches(prior, &record) {
                error!(
                    input = %input_path.display(),
                    "duplicate target architecture/ABI in glue inputs"
                );
                return Err(Error::DuplicateTarget {
                    path: input_path.clone(),
                });
            }
        }

        let whole_size = file_size(input_path)?;
        // Every input's own resource tail is stripped from its record
        // payload regardless of carrying order; only the bookkeeping for
        // which one gets re-embedded in the output is limited to the
        // first input that has one.
        let resource = rsrc::find_in_elf(input_path, ident, &header_bytes)?;

        let mut src = File::open(input_path)?;
        if let Some(res) = resource {
            record.size = whole_size - res.size;
            if carried_resource.is_none() {
                carried_resource = Some((i, res.offset, res.size));
                debug!(
                    input = %input_path.display(),
                    resource_offset = res.offset,
                    resource_size = res.size,
                    "carrying Haiku resource tail"
                );
            } else {
                debug!(
                    input = %input_path.display(),
                    resource_offset = res.offset,
                    resource_size = res.size,
                    "stripping Haiku resource tail from non-carrying input"
                );
            }
        } else {
            record.size = whole_size;
        }

        copy_region(&mut src, 0, &mut out, record.size)?;
        cursor = binary_offset + record.size;
        debug!(
            input = %input_path.display(),
            offset = record.offset,
            size = record.size,
            "embedded record"
        );
        records.push(record);
    }

    let header = Header {
        version: fatelf::VERSION,
        records,
    };
    fatelf::write_header(&mut out, &header)?;

    if let Some((input_index, src_offset, size)) = carried_resource {
        let resource_offset = rsrc::offset_for_fatelf(&header);
        let current_len = header.records.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        if resource_offset > current_len {
            out.seek(SeekFrom::Start(current_len))?;
            write_zeros(&mut out, resource_offset - current_len)?;
        }
        out.seek(SeekFrom::Start(resource_offset))?;
        let mut src = File::open(&inputs[input_index])?;
        copy_region(&mut src, src_offset, &mut out, size)?;
    }

    guard.disarm();
    Ok(())
}

/// Read enough of an ELF file's head to cover its program/section header
/// tables. Most ELF files keep both tables near the start, but to stay
/// correct for pathological layouts this reads the whole file — payloads
/// handled by the glue engine are linked objects, not multi-gigabyte
/// images, so this is an acceptable simplification over a two-pass read.
fn read_elf_header_bytes(path: &Path) -> Result<Vec<u8>> {
    read_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_minimal_elf(path: &Path, machine: u16, class64: bool) {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"\x7FELF");
        data[4] = if class64 { 2 } else { 1 };
        data[5] = 1; // LE
        data[18..20].copy_from_slice(&machine.to_le_bytes());
        let mut f = File::create(path).unwrap();
        f.write_all(&data).unwrap();
    }

    /// A minimal ELF64 with one `PT_LOAD` header (so its payload extends
    /// past the file header) followed by a Haiku resource tail of
    /// `tail_len` bytes starting with the resource magic.
    fn write_elf_with_resource_tail(path: &Path, machine: u16, tail_len: usize) -> u64 {
        let mut data = vec![0u8; 128];
        data[0..4].copy_from_slice(b"\x7FELF");
        data[4] = 2; // ELFCLASS64
        data[5] = 1; // LE
        data[18..20].copy_from_slice(&machine.to_le_bytes());
        // e_phoff = 64, e_phentsize = 56, e_phnum = 1
        data[32..40].copy_from_slice(&64u64.to_le_bytes());
        data[54..56].copy_from_slice(&56u16.to_le_bytes());
        data[56..58].copy_from_slice(&1u16.to_le_bytes());
        // program header: p_type=PT_LOAD(1), p_offset=64, p_filesz=64, p_align=8
        data[64..68].copy_from_slice(&1u32.to_le_bytes());
        data[72..80].copy_from_slice(&64u64.to_le_bytes());
        data[96..104].copy_from_slice(&64u64.to_le_bytes());
        data[112..120].copy_from_slice(&8u64.to_le_bytes());

        let elf_len = data.len() as u64; // 128, already 8-aligned
        let mut tail = vec![0u8; tail_len];
        tail[0..4].copy_from_slice(&0x444f_1000u32.to_ne_bytes());
        data.extend_from_slice(&tail);

        let mut f = File::create(path).unwrap();
        f.write_all(&data).unwrap();
        elf_len
    }

    #[test]
    fn build_rejects_too_many_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let result = build(&out, &[], Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn build_glues_two_distinct_targets() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.elf");
        let b = dir.path().join("b.elf");
        write_minimal_elf(&a, 0x3E, true);
        write_minimal_elf(&b, 0xB7, true);

        let out = dir.path().join("out.fat");
        build(&out, &[a, b], Config::default()).unwrap();

        let header = fatelf::read_header_from_path(&out).unwrap();
        assert_eq!(header.records.len(), 2);
        assert_eq!(header.records[0].machine, 0x3E);
        assert_eq!(header.records[1].machine, 0xB7);
        for rec in &header.records {
            assert_eq!(rec.offset % fatelf::DEFAULT_PAGE_SIZE, 0);
        }
    }

    #[test]
    fn build_strips_resource_tail_from_every_carrying_input_not_just_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.elf");
        let b = dir.path().join("b.elf");
        let elf_len_a = write_elf_with_resource_tail(&a, 0x3E, 22);
        let elf_len_b = write_elf_with_resource_tail(&b, 0xB7, 30);

        let out = dir.path().join("out.fat");
        build(&out, &[a, b], Config::default()).unwrap();

        let header = fatelf::read_header_from_path(&out).unwrap();
        assert_eq!(header.records.len(), 2);
        // Both records must be stripped down to the ELF payload itself;
        // only the first input's tail is re-embedded, but the second
        // input's tail must not leak into its own record payload.
        assert_eq!(header.records[0].size, elf_len_a);
        assert_eq!(header.records[1].size, elf_len_b);
    }

    #[test]
    fn build_rejects_duplicate_targets() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.elf");
        let b = dir.path().join("b.elf");
        write_minimal_elf(&a, 0x3E, true);
        write_minimal_elf(&b, 0x3E, true);

        let out = dir.path().join("out.fat");
        let result = build(&out, &[a, b], Config::default());
        assert!(matches!(result, Err(Error::DuplicateTarget { .. })));
        assert!(!out.exists());
    }
}
