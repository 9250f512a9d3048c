//! Recursive tree merger.
//!
//! Walks one or more source directory trees in lockstep and delegates
//! each resulting file-set to `crate::merge`. New module: recursive
//! traversal has no counterpart in the teacher's single-file classifier,
//! so the walk itself is grounded in the spec and built on `walkdir`
//! (promoted here from the teacher's optional `batch` feature to a
//! required dependency, since this tool always needs it in recursive
//! mode).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::glue::Config;
use crate::merge;

/// Recursively merge `roots` (in argument order) into `out_root`.
pub fn merge_trees(out_root: &Path, roots: &[PathBuf], config: Config) -> Result<()> {
    for root in roots {
        let meta = fs::metadata(root)?;
        if !meta.is_dir() {
            error!(root = %root.display(), "merge root is not a directory");
            return Err(Error::TypeMismatch {
                a: root.clone(),
                b: out_root.to_path_buf(),
            });
        }
    }

    for (i, root) in roots.iter().enumerate() {
        let walker = WalkDir::new(root).follow_links(false).contents_first(false);
        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            if entry.path() == root {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| {
                    error!(
                        path = %entry.path().display(),
                        root = %root.display(),
                        "walker yielded a path outside its own root"
                    );
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!(
                            "{} is not under walked root {}",
                            entry.path().display(),
                            root.display()
                        ),
                    ))
                })?
                .to_path_buf();
            let target = out_root.join(&rel);

            let mut peers: Vec<PathBuf> = Vec::new();
            let first_type = fs::symlink_metadata(entry.path())?.file_type();
            for other_root in &roots[..i] {
                maybe_push_peer(other_root, &rel, first_type, &mut peers)?;
            }
            let already_merged = i > 0 && target.exists() && !peers.is_empty();

            peers.clear();
            for candidate_root in roots {
                maybe_push_peer(candidate_root, &rel, first_type, &mut peers)?;
            }

            if already_merged {
                debug!(path = %rel.display(), "already merged by an earlier root, skipping");
                continue;
            }

            debug!(path = %rel.display(), sources = peers.len(), "merging file-set");
            merge::merge_paths(&target, &peers, config)?;
        }
    }

    Ok(())
}

fn maybe_push_peer(
    root: &Path,
    rel: &Path,
    expected_type: fs::FileType,
    peers: &mut Vec<PathBuf>,
) -> Result<()> {
    let candidate = root.join(rel);
    match fs::symlink_metadata(&candidate) {
        Ok(meta) => {
            if !file_types_match(meta.file_type(), expected_type) {
                error!(path = %candidate.display(), "peer path disagrees on file type");
                return Err(Error::TypeMismatch {
                    a: peers
                        .first()
                        .cloned()
                        .unwrap_or_else(|| candidate.clone()),
                    b: candidate.clone(),
                });
            }
            peers.push(candidate);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn file_types_match(a: fs::FileType, b: fs::FileType) -> bool {
    a.is_dir() == b.is_dir() && a.is_symlink() == b.is_symlink() && a.is_file() == b.is_file()
}
