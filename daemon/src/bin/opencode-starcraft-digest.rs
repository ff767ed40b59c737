use anyhow::{Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use opencode_starcraft::paths;
use opencode_starcraft::summary;

/// Prints the last session digest written by opencode-starcraft.
#[derive(Parser, Debug)]
#[command(name = "opencode-starcraft-digest", version, about)]
struct Args {
    /// Digest file (else $OPENCODE_STARCRAFT_DIGEST_PATH, else
    /// ~/.config/opencode/digests/opencode-starcraft-last.json)
    // OsString rather than PathBuf: clap rejects an empty PathBuf outright.
    path: Option<OsString>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let path = paths::viewer_digest_path(
        args.path.map(PathBuf::from),
        std::env::var_os(paths::DIGEST_PATH_ENV),
    );

    match render(&path) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to read digest at {}: {e:#}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn render(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).context("could not read file")?;
    summary::summarize(path, &raw).context("not a valid digest")
}
