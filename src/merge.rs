//! File-set merger.
//!
//! Given a target path and a list of k source paths that are believed to
//! represent the "same" entity across separate trees, pick and execute a
//! merge strategy based on the first source's type. New module: the
//! teacher's classifier never merges anything, it only inspects single
//! files, so the dispatch and byte-equality-compare paths below are
//! grounded directly in the spec rather than adapted from existing
//! teacher code. The classification leg (`crate::classify`) and the AR
//! traversal (`crate::ar`) reuse the teacher-derived readers.

use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::{symlink, DirBuilderExt, FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::ar;
use crate::classify::{self, Kind};
use crate::error::{Error, Result};
use crate::glue::{self, Config};

/// Merge `sources` (in order) into `target`. `sources` must be non-empty;
/// all entries must share the same file type as `sources[0]`, which the
/// caller (the recursive tree merger, or a direct CLI invocation with a
/// single pair) is responsible for having verified via `lstat`.
pub fn merge_paths(target: &Path, sources: &[PathBuf], config: Config) -> Result<()> {
    let Some(first) = sources.first() else {
        error!(target = %target.display(), "merge_paths called with no source paths");
        return Err(Error::EmptySourceSet {
            target: target.to_path_buf(),
        });
    };
    let meta = fs::symlink_metadata(first)?;
    let file_type = meta.file_type();

    if file_type.is_dir() {
        merge_directory(target, first, &meta)
    } else if file_type.is_symlink() {
        merge_symlink(target, first)
    } else if file_type.is_file() {
        merge_regular_file(target, sources, config)
    } else if file_type.is_block_device()
        || file_type.is_char_device()
        || file_type.is_fifo()
        || file_type.is_socket()
    {
        error!(path = %first.display(), "unsupported file type (device/fifo/socket) in merge");
        Err(Error::UnsupportedFileType {
            path: first.clone(),
        })
    } else {
        error!(path = %first.display(), "unrecognized file type in merge");
        Err(Error::UnsupportedFileType {
            path: first.clone(),
        })
    }
}

fn merge_directory(target: &Path, source: &Path, meta: &fs::Metadata) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(existing) if !existing.file_type().is_dir() => {
            error!(target = %target.display(), source = %source.display(), "existing target is not a directory");
            return Err(Error::TypeMismatch {
                a: target.to_path_buf(),
                b: source.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::DirBuilder::new().mode(0o700).create(target)?;
        }
        Err(e) => return Err(e.into()),
    }
    let mut perms = fs::metadata(target)?.permissions();
    perms.set_mode(meta.permissions().mode());
    fs::set_permissions(target, perms)?;
    Ok(())
}

fn merge_symlink(target: &Path, source: &Path) -> Result<()> {
    let link_target = fs::read_link(source)?;
    match fs::symlink_metadata(target) {
        Ok(existing) if existing.file_type().is_symlink() => {
            let current = fs::read_link(target)?;
            if current != link_target {
                error!(target = %target.display(), source = %source.display(), "existing symlink target disagrees with source");
                return Err(Error::TypeMismatch {
                    a: target.to_path_buf(),
                    b: source.to_path_buf(),
                });
            }
            Ok(())
        }
        Ok(_) => {
            error!(target = %target.display(), source = %source.display(), "existing target is not a symlink");
            Err(Error::TypeMismatch {
                a: target.to_path_buf(),
                b: source.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            symlink(&link_target, target)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn merge_regular_file(target: &Path, sources: &[PathBuf], config: Config) -> Result<()> {
    let first = &sources[0];
    let mut header = vec![0u8; 8.max(4)];
    let mut f = File::open(first)?;
    let n = f.read(&mut header)?;
    header.truncate(n);

    match classify::classify(&header) {
        Kind::Elf => glue::build(target, sources, config),
        Kind::FatElf => {
            error!(path = %first.display(), "refusing to merge an already-fat FatELF input");
            Err(Error::UnsupportedInput {
                path: first.clone(),
                message: "refusing to merge an already-fat FatELF input".to_string(),
            })
        }
        Kind::Ar => merge_ar(target, sources),
        Kind::Other => merge_byte_equal(target, sources),
    }
}

fn merge_ar(_target: &Path, sources: &[PathBuf]) -> Result<()> {
    // Acknowledged but not specified: there is no defined on-disk layout
    // for a fat `ar` archive to merge into. See DESIGN.md open question 1.
    let _ = ar::Reader::open(&sources[0])?;
    error!(path = %sources[0].display(), "fat-merging ar archives is not implemented");
    Err(Error::Unimplemented(
        "fat-merging ar archives is not defined".to_string(),
    ))
}

fn merge_byte_equal(target: &Path, sources: &[PathBuf]) -> Result<()> {
    let first_bytes = fs::read(&sources[0])?;
    for other in &sources[1..] {
        match fs::read(other) {
            Ok(bytes) if bytes == first_bytes => {}
            Ok(_) => {
                warn!(
                    winner = %sources[0].display(),
                    diverged = %other.display(),
                    "inputs differ; keeping first input's content"
                );
            }
            Err(e) => {
                warn!(path = %other.display(), error = %e, "could not read peer for comparison");
            }
        }
    }
    fs::write(target, &first_bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn merges_identical_regular_files_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"hello").unwrap();
        fs::write(&b, b"hello").unwrap();

        let out = dir.path().join("out.txt");
        merge_paths(&out, &[a, b], Config::default()).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"hello");
    }

    #[test]
    fn merges_divergent_regular_files_keeping_first() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"from a").unwrap();
        fs::write(&b, b"from b").unwrap();

        let out = dir.path().join("out.txt");
        merge_paths(&out, &[a, b], Config::default()).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"from a");
    }

    #[test]
    fn merges_symlinks_with_matching_targets() {
        let dir = tempfile::tempdir().unwrap();
        let link_a = dir.path().join("link_a");
        let link_b = dir.path().join("link_b");
        symlink("libc.so.1", &link_a).unwrap();
        symlink("libc.so.1", &link_b).unwrap();

        let out = dir.path().join("out_link");
        merge_paths(&out, &[link_a, link_b], Config::default()).unwrap();
        assert_eq!(fs::read_link(&out).unwrap(), PathBuf::from("libc.so.1"));
    }

    #[test]
    fn rejects_empty_source_list() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let result = merge_paths(&out, &[], Config::default());
        assert!(matches!(result, Err(Error::EmptySourceSet { .. })));
    }

    #[test]
    fn rejects_fatelf_input() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("fat.bin");
        let mut data = vec![0u8; 8];
        data[0..4].copy_from_slice(&crate::fatelf::MAGIC.to_le_bytes());
        fs::File::create(&f).unwrap().write_all(&data).unwrap();

        let out = dir.path().join("out.bin");
        let result = merge_paths(&out, &[f], Config::default());
        assert!(matches!(result, Err(Error::UnsupportedInput { .. })));
    }
}
