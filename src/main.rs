//! FatELF glue engine CLI.
//!
//! Assembles per-architecture ELF binaries (or directory trees of them)
//! into a FatELF container.

use anyhow::Context;
use clap::Parser;
use fatelf_glue::glue::Config;
use fatelf_glue::{glue, tree};
use std::path::PathBuf;
use std::process::ExitCode;

/// Assemble FatELF multi-architecture containers.
#[derive(Parser, Debug)]
#[command(name = "glue")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Merge directory trees recursively instead of gluing single files.
    #[arg(short = 'r', long = "recursive")]
    recursive: bool,

    /// Raise logging verbosity (repeatable: -v, -vv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the container's page alignment (must be a power of two).
    #[arg(long = "page-size", default_value_t = fatelf_glue::fatelf::DEFAULT_PAGE_SIZE)]
    page_size: u64,

    /// Output path.
    out: PathBuf,

    /// Input paths: ELF binaries (default mode) or directory trees (`-r`).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose > 0 {
        let level = if args.verbose >= 2 { "debug" } else { "info" };
        let filter = format!("fatelf_glue={level}");
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
            )
            .init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "glue invocation failed");
            eprintln!("glue: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// The fallible body of `main`, separated out so every failure path can be
/// wrapped with `anyhow::Context` before `main` renders a single
/// diagnostic line and maps it to a process exit code.
fn run(args: &Args) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.page_size.is_power_of_two(),
        "--page-size must be a power of two, got {}",
        args.page_size
    );
    let config = Config {
        page_size: args.page_size,
    };

    if args.recursive {
        tree::merge_trees(&args.out, &args.inputs, config).with_context(|| {
            format!(
                "merging {} trees into {}",
                args.inputs.len(),
                args.out.display()
            )
        })?;
    } else {
        glue::build(&args.out, &args.inputs, config).with_context(|| {
            format!(
                "gluing {} inputs into {}",
                args.inputs.len(),
                args.out.display()
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_file_mode() {
        let args = Args::try_parse_from(["glue", "out.fat", "a.elf", "b.elf"]).unwrap();
        assert!(!args.recursive);
        assert_eq!(args.inputs.len(), 2);
    }

    #[test]
    fn parses_recursive_mode() {
        let args = Args::try_parse_from(["glue", "-r", "out/", "a/", "b/"]).unwrap();
        assert!(args.recursive);
        assert_eq!(args.inputs.len(), 2);
    }

    #[test]
    fn parses_page_size_override() {
        let args = Args::try_parse_from(["glue", "--page-size", "8192", "out", "a"]).unwrap();
        assert_eq!(args.page_size, 8192);
    }

    #[test]
    fn verbose_is_repeatable() {
        let args = Args::try_parse_from(["glue", "-vv", "out", "a"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn requires_at_least_one_input() {
        let result = Args::try_parse_from(["glue", "out"]);
        assert!(result.is_err());
    }
}
