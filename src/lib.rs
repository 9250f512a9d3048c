//! FatELF Glue Engine
//!
//! This library assembles and merges FatELF multi-architecture
//! containers: it packs several per-architecture ELF binaries behind a
//! single fixed header, and it recursively merges whole directory trees
//! of such binaries (plus whatever non-ELF files live alongside them).
//!
//! # Features
//!
//! - **Container codec**: encode/decode the FatELF header and record
//!   table.
//! - **ELF inspection**: compute the extent of an ELF file's own payload
//!   by walking its program and section header tables.
//! - **Haiku resource carrying**: detect and re-embed the optional
//!   resource tail some ELF files carry past their own payload.
//! - **Archive traversal**: stream `ar(1)` members, resolving BSD and GNU
//!   long-name extensions.
//! - **Recursive tree merge**: walk N directory trees in lockstep and
//!   merge each file-set with the right strategy.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fatelf_glue::glue::{self, Config};
//! use std::path::PathBuf;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let inputs = vec![PathBuf::from("a.elf"), PathBuf::from("b.elf")];
//!     glue::build(&PathBuf::from("out.fat"), &inputs, Config::default())?;
//!     Ok(())
//! }
//! ```
//!
//! # Non-goals
//!
//! Compiling, assembling, or linking; modifying ELF section content;
//! signing; compression; heuristic ISA classification of headerless
//! binaries; decoding formats other than ELF, AR, and FatELF.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]

pub mod ar;
pub mod classify;
pub mod elf;
pub mod error;
pub mod fatelf;
pub mod glue;
pub mod io;
pub mod merge;
pub mod rsrc;
pub mod tree;

pub use error::{Error, Result};
pub use glue::Config;
