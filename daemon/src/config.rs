use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::event::EventKind;
use crate::paths;

pub const DEFAULT_PROFILE: &str = "classic";
pub const DEFAULT_MAX_LENGTH: usize = 120;
pub const DEFAULT_TELEMETRY_TIMEOUT_MS: u64 = 3000;
/// Expanded against the home directory when the digest is written.
pub const DEFAULT_DIGEST_PATH: &str = "~/.config/opencode/digests/opencode-starcraft-last.json";

/// Resolved settings. Loaded once at startup and never reloaded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub sound: SoundConfig,
    pub notifications: NotificationsConfig,
    pub digest: DigestConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundConfig {
    pub enabled: bool,
    /// Catalog profile name. Unknown names fall back to the catalog default.
    pub profile: String,
    /// Overrides the platform audio player (`afplay` / `paplay`).
    pub player: Option<String>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            profile: DEFAULT_PROFILE.to_string(),
            player: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationsConfig {
    pub enabled: bool,
    /// Longest notification body, in characters, before it is cut with an ellipsis.
    pub max_length: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestConfig {
    pub enabled: bool,
    pub on_idle: bool,
    pub on_exit: bool,
    /// Shell command run after each digest write, with the digest path in the environment.
    pub command: Option<String>,
    /// May start with `~/`.
    pub path: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            on_idle: true,
            on_exit: true,
            command: None,
            path: DEFAULT_DIGEST_PATH.to_string(),
        }
    }
}

impl DigestConfig {
    /// The digest path with `~/` expanded. An empty path means the default location.
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.trim().is_empty() {
            return paths::default_digest_path();
        }
        paths::expand_home(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Per-type forwarding switch. Types missing from the map are never forwarded.
    pub events: BTreeMap<EventKind, bool>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_ms: DEFAULT_TELEMETRY_TIMEOUT_MS,
            events: EventKind::ALL.into_iter().map(|k| (k, true)).collect(),
        }
    }
}

impl TelemetryConfig {
    /// Whether an event of `event_type` should be forwarded.
    pub fn forwards(&self, event_type: &str) -> bool {
        self.enabled
            && EventKind::from_type(event_type)
                .and_then(|k| self.events.get(&k).copied())
                .unwrap_or(false)
    }
}

/// Loads the settings file at `path`.
///
/// Never fails: a missing, unreadable, or malformed file yields `Config::default()`.
/// Otherwise every recognised leaf is taken from the file when it holds a value of
/// the right type and falls back to its default when it is absent, `null`, or
/// mistyped. `false`, `0` and `""` are kept. Unrecognised fields are ignored.
pub fn load(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("config unreadable at {}, using defaults: {e}", path.display());
            return Config::default();
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(root) => resolve(&root),
        Err(e) => {
            tracing::debug!("config malformed at {}, using defaults: {e}", path.display());
            Config::default()
        }
    }
}

/// Merges a parsed settings document over the defaults, leaf by leaf.
pub fn resolve(root: &Value) -> Config {
    let d = Config::default();
    Config {
        sound: SoundConfig {
            enabled: bool_leaf(root, "sound", "enabled").unwrap_or(d.sound.enabled),
            profile: string_leaf(root, "sound", "profile").unwrap_or(d.sound.profile),
            player: string_leaf(root, "sound", "player").or(d.sound.player),
        },
        notifications: NotificationsConfig {
            enabled: bool_leaf(root, "notifications", "enabled").unwrap_or(d.notifications.enabled),
            max_length: leaf(root, "notifications", "maxLength")
                .and_then(Value::as_i64)
                .map(|n| n.max(1) as usize)
                .unwrap_or(d.notifications.max_length),
        },
        digest: DigestConfig {
            enabled: bool_leaf(root, "digest", "enabled").unwrap_or(d.digest.enabled),
            on_idle: bool_leaf(root, "digest", "onIdle").unwrap_or(d.digest.on_idle),
            on_exit: bool_leaf(root, "digest", "onExit").unwrap_or(d.digest.on_exit),
            command: string_leaf(root, "digest", "command").or(d.digest.command),
            path: string_leaf(root, "digest", "path").unwrap_or(d.digest.path),
        },
        telemetry: TelemetryConfig {
            enabled: bool_leaf(root, "telemetry", "enabled").unwrap_or(d.telemetry.enabled),
            endpoint: string_leaf(root, "telemetry", "endpoint").or(d.telemetry.endpoint),
            timeout_ms: u64_leaf(root, "telemetry", "timeoutMs").unwrap_or(d.telemetry.timeout_ms),
            events: d
                .telemetry
                .events
                .iter()
                .map(|(&kind, &default)| {
                    let toggle = root
                        .get("telemetry")
                        .and_then(|t| t.get("events"))
                        .and_then(|e| e.get(kind.as_str()))
                        .and_then(Value::as_bool);
                    (kind, toggle.unwrap_or(default))
                })
                .collect(),
        },
    }
}

// `Value::get` returns None on non-objects, so a settings file whose root or
// section is not an object simply resolves to defaults.
fn leaf<'a>(root: &'a Value, section: &str, key: &str) -> Option<&'a Value> {
    root.get(section)?.get(key).filter(|v| !v.is_null())
}

fn bool_leaf(root: &Value, section: &str, key: &str) -> Option<bool> {
    leaf(root, section, key)?.as_bool()
}

fn string_leaf(root: &Value, section: &str, key: &str) -> Option<String> {
    leaf(root, section, key)?.as_str().map(str::to_string)
}

fn u64_leaf(root: &Value, section: &str, key: &str) -> Option<u64> {
    leaf(root, section, key)?.as_u64()
}
