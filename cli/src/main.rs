//! `sfs-mount`, format or open an SFS image and drive its VFS surface
//! directly from the command line.
//!
//! This binary does not perform a real kernel-level FUSE mount; wiring
//! the engine up to a kernel upcall surface is host integration work left
//! to whatever binds this crate into an actual mount point. What it does
//! do is exactly what the reference CLI's flags describe: pick an image
//! path, optionally format a fresh one, and run in the foreground or
//! background while logging at the requested verbosity.

use clap::{Parser, Subcommand};
use log::info;
use sfs_api::fs::{FileSystemSupport, VfsSupport};
use sfs_engine::error::SfsError;
use sfs_engine::Sfs;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_IMG: &str = "test.img";

/// Format or inspect an SFS image.
#[derive(Parser)]
#[command(name = "sfs-mount", version, about)]
struct Cli {
    /// Path of the SFS image to use.
    #[arg(short = 'i', long = "img", default_value = DEFAULT_IMG)]
    img: PathBuf,

    /// Run as if mounted in the background (suppresses interactive
    /// prompts; this build does not daemonize).
    #[arg(short = 'b', long = "background")]
    background: bool,

    /// Print debug-level trace of every engine call.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Format a new, empty image at the configured path.
    Mkfs,
    /// List the entries of a directory in the image (default: `/`).
    Ls {
        /// Directory to list.
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print the contents of a file in the image.
    Cat {
        /// File to read.
        path: String,
    },
}

fn run(cli: Cli) -> Result<(), SfsError> {
    if cli.background {
        info!("running non-interactively against {}", cli.img.display());
    }

    match cli.command {
        Some(Command::Mkfs) => {
            info!("formatting new image at {}", cli.img.display());
            Sfs::mkfs(&cli.img)?;
            Ok(())
        }
        Some(Command::Ls { path }) => {
            let sfs = Sfs::mountfs(&cli.img)?;
            for name in sfs.readdir(&path)? {
                println!("{}", name);
            }
            Ok(())
        }
        Some(Command::Cat { path }) => {
            let sfs = Sfs::mountfs(&cli.img)?;
            let attr = sfs.getattr(&path)?;
            let mut buf = vec![0u8; attr.size as usize];
            sfs.read(&path, 0, &mut buf)?;
            use std::io::Write;
            std::io::stdout().write_all(&buf).ok();
            Ok(())
        }
        None => {
            let sfs = Sfs::mountfs(&cli.img)?;
            info!("mounted {} ({} bytes)", cli.img.display(), sfs.unmountfs().len());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sfs-mount: {}", e);
            ExitCode::from((-e.to_errno()).min(255) as u8)
        }
    }
}
