//! AR archive reader.
//!
//! Streams entries out of a System V/GNU `ar` archive, resolving BSD
//! `#1/<N>` and GNU `/<offset>` long-name extensions. Field offsets and
//! the special-member conventions are grounded on `formats/ar.rs`
//! (teacher); long-name resolution is new — the teacher only counted
//! members and collected short names for classification, it never had to
//! resolve a real name against a string table. The BSD/GNU naming
//! conventions below mirror (in reverse) the writer in
//! `examples/other_examples/ae4e7bfa_rust-lang-ar_archive_writer__src-archive_writer.rs.rs`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memchr::memchr2;
use tracing::error;

use crate::error::{Error, Result};

/// Build a `MalformedAr` error, logging it at `error` level first so the
/// failure is visible in structured logs even when the CLI only prints the
/// final `Display` line.
fn malformed(path: &Path, message: impl Into<String>) -> Error {
    let message = message.into();
    error!(path = %path.display(), %message, "malformed ar archive");
    Error::MalformedAr {
        path: path.to_path_buf(),
        message,
    }
}

/// Global archive magic.
pub const MAGIC: [u8; 8] = *b"!<arch>\n";

/// Fixed size of a member header.
pub const MEMBER_HEADER_SIZE: usize = 60;

mod header {
    pub const NAME_OFFSET: usize = 0;
    pub const NAME_SIZE: usize = 16;
    pub const SIZE_OFFSET: usize = 48;
    pub const SIZE_SIZE: usize = 10;
    pub const FMAG_OFFSET: usize = 58;
    pub const FMAG: [u8; 2] = [b'`', b'\n'];
}

/// Detect whether `data` begins with the archive magic.
pub fn detect(data: &[u8]) -> bool {
    data.len() >= 8 && data[0..8] == MAGIC
}

/// One entry streamed out of an archive. Control members (`/` and `//`)
/// are surfaced distinctly so callers filtering for real files don't have
/// to know the naming convention.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A regular archive member with a resolved name.
    File {
        name: String,
        size: u64,
        data_offset: u64,
    },
    /// The GNU long-name string table (the `//` member). Its bytes are
    /// captured by the reader as soon as this is seen; later `File`
    /// entries may reference it.
    StringTable,
    /// The symbol index (the `/` member). Its contents are opaque here.
    SymbolIndex,
}

/// A streaming reader over one archive's member table.
pub struct Reader {
    file: File,
    path: PathBuf,
    pos: u64,
    len: u64,
    string_table: Vec<u8>,
}

fn parse_ascii_field(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

impl Reader {
    /// Open `path` and validate the global magic.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)
            .map_err(|_| malformed(path, "file shorter than archive magic"))?;
        if magic != MAGIC {
            return Err(malformed(path, "missing \"!<arch>\\n\" magic"));
        }
        Ok(Reader {
            file,
            path: path.to_path_buf(),
            pos: 8,
            len,
            string_table: Vec::new(),
        })
    }

    /// Read the next entry, or `None` at end of archive.
    pub fn next(&mut self) -> Result<Option<Entry>> {
        // ar pads odd-length members to an even boundary with a newline.
        if self.pos % 2 != 0 {
            self.pos += 1;
        }
        if self.pos >= self.len {
            return Ok(None);
        }
        if self.pos + MEMBER_HEADER_SIZE as u64 > self.len {
            return Err(malformed(&self.path, "truncated member header"));
        }

        self.file.seek(SeekFrom::Start(self.pos))?;
        let mut raw = [0u8; MEMBER_HEADER_SIZE];
        self.file.read_exact(&mut raw)?;

        if raw[header::FMAG_OFFSET..header::FMAG_OFFSET + 2] != header::FMAG {
            return Err(malformed(&self.path, "bad member header terminator"));
        }

        let raw_name = &raw[header::NAME_OFFSET..header::NAME_OFFSET + header::NAME_SIZE];
        let size_str = parse_ascii_field(
            &raw[header::SIZE_OFFSET..header::SIZE_OFFSET + header::SIZE_SIZE],
        );
        let mut size: u64 = size_str
            .parse()
            .map_err(|_| malformed(&self.path, format!("invalid member size field {size_str:?}")))?;

        let mut data_offset = self.pos + MEMBER_HEADER_SIZE as u64;
        let name_field = String::from_utf8_lossy(raw_name).to_string();
        let trimmed = name_field.trim_end();

        let entry = if trimmed == "//" {
            let mut table = vec![0u8; size as usize];
            self.file.seek(SeekFrom::Start(data_offset))?;
            self.file.read_exact(&mut table)?;
            self.string_table = table;
            Entry::StringTable
        } else if trimmed == "/" {
            Entry::SymbolIndex
        } else if let Some(len_str) = trimmed.strip_prefix("#1/") {
            // BSD long name: the real name is stored as a `len`-byte
            // prefix of the member's own payload.
            let name_len: u64 = len_str
                .trim()
                .parse()
                .map_err(|_| malformed(&self.path, format!("invalid BSD long-name length {len_str:?}")))?;
            if name_len > size {
                return Err(malformed(&self.path, "BSD long-name length exceeds member size"));
            }
            let mut name_bytes = vec![0u8; name_len as usize];
            self.file.seek(SeekFrom::Start(data_offset))?;
            self.file.read_exact(&mut name_bytes)?;
            let name = String::from_utf8_lossy(&name_bytes)
                .trim_end_matches('\0')
                .to_string();
            data_offset += name_len;
            size -= name_len;
            Entry::File {
                name,
                size,
                data_offset,
            }
        } else if let Some(idx_str) = trimmed.strip_prefix('/') {
            // GNU long name: `/<offset>` indexes into the captured `//`
            // string table.
            let idx: usize = idx_str
                .trim()
                .parse()
                .map_err(|_| malformed(&self.path, format!("invalid GNU long-name offset {idx_str:?}")))?;
            if idx > self.string_table.len() {
                return Err(malformed(
                    &self.path,
                    "GNU long-name offset out of range of string table",
                ));
            }
            let rest = &self.string_table[idx..];
            let end = memchr2(b'/', b'\n', rest).unwrap_or(rest.len());
            let name = String::from_utf8_lossy(&rest[..end]).to_string();
            Entry::File {
                name,
                size,
                data_offset,
            }
        } else {
            let name = trimmed.trim_end_matches('/').to_string();
            Entry::File {
                name,
                size,
                data_offset,
            }
        };

        self.pos = data_offset + size;
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn push_header(data: &mut Vec<u8>, name: &str, size: usize) {
        let mut header = [b' '; MEMBER_HEADER_SIZE];
        let name_bytes = name.as_bytes();
        header[0..name_bytes.len().min(16)]
            .copy_from_slice(&name_bytes[..name_bytes.len().min(16)]);
        let size_str = format!("{size:<10}");
        header[48..58].copy_from_slice(size_str.as_bytes());
        header[58..60].copy_from_slice(&header::FMAG);
        data.extend_from_slice(&header);
    }

    #[test]
    fn reads_short_name_entry() {
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);
        push_header(&mut data, "test.o/", 4);
        data.extend_from_slice(&[1, 2, 3, 4]);

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        let mut reader = Reader::open(tmp.path()).unwrap();
        match reader.next().unwrap().unwrap() {
            Entry::File { name, size, .. } => {
                assert_eq!(name, "test.o");
                assert_eq!(size, 4);
            }
            other => panic!("expected File entry, got {other:?}"),
        }
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn resolves_gnu_long_name_via_string_table() {
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);

        let table = b"libverylongname.o/\n".to_vec();
        push_header(&mut data, "//", table.len());
        data.extend_from_slice(&table);
        if data.len() % 2 != 0 {
            data.push(b'\n');
        }

        push_header(&mut data, "/0", 3);
        data.extend_from_slice(&[9, 9, 9]);

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        let mut reader = Reader::open(tmp.path()).unwrap();

        assert!(matches!(reader.next().unwrap().unwrap(), Entry::StringTable));
        match reader.next().unwrap().unwrap() {
            Entry::File { name, size, .. } => {
                assert_eq!(name, "libverylongname.o");
                assert_eq!(size, 3);
            }
            other => panic!("expected File entry, got {other:?}"),
        }
    }

    #[test]
    fn resolves_bsd_long_name_from_payload_prefix() {
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);
        let name = b"a_very_long_name.o";
        push_header(&mut data, &format!("#1/{}", name.len()), name.len() + 4);
        data.extend_from_slice(name);
        data.extend_from_slice(&[7, 7, 7, 7]);

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        let mut reader = Reader::open(tmp.path()).unwrap();
        match reader.next().unwrap().unwrap() {
            Entry::File { name: n, size, .. } => {
                assert_eq!(n, "a_very_long_name.o");
                assert_eq!(size, 4);
            }
            other => panic!("expected File entry, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"not an archive..").unwrap();
        assert!(Reader::open(tmp.path()).is_err());
    }
}
