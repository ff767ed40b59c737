/// OS-level side effects and the port through which the dispatcher runs them.
///
/// Every effect is a detached external process: the player, the notifier, or
/// the user's digest command. Nothing waits on it or looks at its exit status.
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{NotifierError, Result};
use crate::paths::DIGEST_PATH_ENV;

const APP_NAME: &str = "opencode-starcraft";

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PlaySound { path: PathBuf },
    Notify { title: String, body: String },
    /// The user's digest hook, run through the shell.
    DigestCommand { command: String, digest_path: PathBuf },
}

/// Runs one side effect. Implementations must return promptly and never block
/// on the effect itself.
pub trait EffectRunner: Send + Sync {
    fn run(&self, effect: &Effect) -> Result<()>;
}

/// A fully resolved external command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Spawns effects as detached child processes.
pub struct ProcessRunner {
    player: String,
}

impl ProcessRunner {
    /// `player` overrides the platform default audio player.
    pub fn new(player: Option<String>) -> Self {
        Self {
            player: player.unwrap_or_else(|| default_player().to_string()),
        }
    }

    pub fn invocation(&self, effect: &Effect) -> Invocation {
        match effect {
            Effect::PlaySound { path } => Invocation {
                program: self.player.clone(),
                args: vec![path.to_string_lossy().into_owned()],
                env: Vec::new(),
            },
            Effect::Notify { title, body } => notify_invocation(title, body),
            Effect::DigestCommand {
                command,
                digest_path,
            } => {
                let (shell, flag) = shell();
                Invocation {
                    program: shell.to_string(),
                    args: vec![flag.to_string(), command.clone()],
                    env: vec![(
                        DIGEST_PATH_ENV.to_string(),
                        digest_path.to_string_lossy().into_owned(),
                    )],
                }
            }
        }
    }
}

impl EffectRunner for ProcessRunner {
    fn run(&self, effect: &Effect) -> Result<()> {
        spawn_detached(&self.invocation(effect))
    }
}

fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "paplay"
    }
}

fn shell() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

fn notify_invocation(title: &str, body: &str) -> Invocation {
    if cfg!(target_os = "macos") {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            applescript_escape(body),
            applescript_escape(title)
        );
        Invocation {
            program: "osascript".to_string(),
            args: vec!["-e".to_string(), script],
            env: Vec::new(),
        }
    } else {
        Invocation {
            program: "notify-send".to_string(),
            args: vec![
                format!("--app-name={APP_NAME}"),
                title.to_string(),
                body.to_string(),
            ],
            env: Vec::new(),
        }
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Starts `invocation` in its own process group with all stdio closed and
/// drops the handle; tokio reaps the child in the background.
fn spawn_detached(invocation: &Invocation) -> Result<()> {
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(NotifierError::NoRuntime("child process"));
    }

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .envs(invocation.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    // Own process group, so a Ctrl+C aimed at the daemon does not cut a line short.
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    cmd.spawn()
        .map(drop)
        .map_err(|source| NotifierError::Spawn {
            program: invocation.program.clone(),
            source,
        })
}
