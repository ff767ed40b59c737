/// Canonical file locations, all under ~/.config/opencode/:
///   - opencode-starcraft.json                  User settings, read once at start.
///   - sounds/starcraft/                        Flat cache of extracted voice lines.
///   - digests/opencode-starcraft-last.json     Most recent session digest.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const OPENCODE_DIR: &[&str] = &[".config", "opencode"];
pub const CONFIG_FILE_NAME: &str = "opencode-starcraft.json";
pub const DIGEST_FILE_NAME: &str = "opencode-starcraft-last.json";

/// Environment variable carrying the digest location to the digest command and viewer.
pub const DIGEST_PATH_ENV: &str = "OPENCODE_STARCRAFT_DIGEST_PATH";

/// Returns the user's home directory, or the working directory when none is known.
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns ~/.config/opencode
pub fn opencode_dir() -> PathBuf {
    OPENCODE_DIR.iter().fold(home_dir(), |p, part| p.join(part))
}

/// Returns ~/.config/opencode/opencode-starcraft.json
pub fn config_file_path() -> PathBuf {
    opencode_dir().join(CONFIG_FILE_NAME)
}

/// Returns ~/.config/opencode/sounds/starcraft
pub fn sounds_dir() -> PathBuf {
    opencode_dir().join("sounds").join("starcraft")
}

/// Returns ~/.config/opencode/digests/opencode-starcraft-last.json
pub fn default_digest_path() -> PathBuf {
    opencode_dir().join("digests").join(DIGEST_FILE_NAME)
}

/// Digest location for the viewer: the argument, else the environment value,
/// else the default. Empty values are skipped.
pub fn viewer_digest_path(arg: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    arg.filter(|p| !p.as_os_str().is_empty())
        .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(default_digest_path)
}

/// Expands a leading `~/` against `home`. Any other path is returned as given.
pub fn expand_home_in(input: &str, home: &Path) -> PathBuf {
    match input.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if input == "~" => home.to_path_buf(),
        None => PathBuf::from(input),
    }
}

/// Expands a leading `~/` against the current user's home directory.
pub fn expand_home(input: &str) -> PathBuf {
    expand_home_in(input, &home_dir())
}
