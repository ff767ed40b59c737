use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::DigestConfig;
use crate::effect::{Effect, EffectRunner};
use crate::error::{NotifierError, Result};
use crate::event::{EventKind, HostEvent};
use crate::outcome::{settle, Outcome, Step};

/// Details of the most recent permission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSummary {
    pub permission: Option<String>,
    pub patterns: Option<Value>,
}

/// Details of the most recent question put to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub header: Option<String>,
    pub question: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub reason: String,
    pub at: String,
}

/// Accumulates activity since process start.
#[derive(Debug, Clone)]
pub struct DigestState {
    pub started_at: String,
    pub event_counts: BTreeMap<String, u64>,
    pub last_error: Option<String>,
    pub last_permission: Option<PermissionSummary>,
    pub last_question: Option<QuestionSummary>,
    pub triggers: Vec<TriggerRecord>,
}

impl DigestState {
    pub fn new() -> Self {
        Self {
            started_at: now(),
            event_counts: BTreeMap::new(),
            last_error: None,
            last_permission: None,
            last_question: None,
            triggers: Vec::new(),
        }
    }

    /// Counts the event and, for errors, permission requests and questions,
    /// replaces the matching "last seen" summary.
    pub fn record(&mut self, event: &HostEvent) {
        *self
            .event_counts
            .entry(event.event_type.clone())
            .or_insert(0) += 1;

        match event.kind() {
            Some(EventKind::SessionError) => {
                self.last_error = event.error_summary().map(str::to_string);
            }
            Some(EventKind::PermissionAsked) => {
                self.last_permission = Some(PermissionSummary {
                    permission: event.text("/permission").map(str::to_string),
                    patterns: event
                        .properties
                        .get("patterns")
                        .filter(|v| !v.is_null())
                        .cloned(),
                });
            }
            Some(EventKind::QuestionAsked) => {
                self.last_question = Some(QuestionSummary {
                    header: event.text("/questions/0/header").map(str::to_string),
                    question: event.text("/questions/0/question").map(str::to_string),
                });
            }
            _ => {}
        }
    }

    /// Builds a snapshot without touching the state.
    pub fn snapshot(&self, reason: &str) -> DigestSnapshot {
        DigestSnapshot {
            started_at: self.started_at.clone(),
            ended_at: now(),
            reason: reason.to_string(),
            event_counts: self.event_counts.clone(),
            last_error: self.last_error.clone(),
            last_permission: self.last_permission.clone(),
            last_question: self.last_question.clone(),
            trigger_count: self.triggers.len(),
        }
    }
}

impl Default for DigestState {
    fn default() -> Self {
        Self::new()
    }
}

/// The JSON document written to disk and handed to the digest command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSnapshot {
    pub started_at: String,
    pub ended_at: String,
    pub reason: String,
    pub event_counts: BTreeMap<String, u64>,
    pub last_error: Option<String>,
    pub last_permission: Option<PermissionSummary>,
    pub last_question: Option<QuestionSummary>,
    pub trigger_count: usize,
}

/// Serializes `snapshot` as pretty JSON to `path`, creating parent directories.
pub fn write_digest(path: &Path, snapshot: &DigestSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| NotifierError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, content).map_err(|source| NotifierError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Digest state plus the rules for when it is written out.
pub struct DigestRecorder {
    config: DigestConfig,
    state: DigestState,
    exit_flushed: bool,
}

impl DigestRecorder {
    pub fn new(config: DigestConfig) -> Self {
        Self {
            config,
            state: DigestState::new(),
            exit_flushed: false,
        }
    }

    pub fn state(&self) -> &DigestState {
        &self.state
    }

    pub fn record(&mut self, event: &HostEvent) {
        if self.config.enabled {
            self.state.record(event);
        }
    }

    /// Where flushes are written.
    pub fn target(&self) -> PathBuf {
        self.config.resolved_path()
    }

    pub fn flushes_on(&self, event: &HostEvent) -> bool {
        self.config.enabled && self.config.on_idle && event.kind() == Some(EventKind::SessionIdle)
    }

    /// Writes a digest for `reason` and starts the digest command, if any.
    /// The command only runs once the file is on disk.
    pub fn flush(&mut self, reason: &str, runner: &dyn EffectRunner) -> Vec<Outcome> {
        if !self.config.enabled {
            return Vec::new();
        }

        self.state.triggers.push(TriggerRecord {
            reason: reason.to_string(),
            at: now(),
        });
        let snapshot = self.state.snapshot(reason);
        let path = self.target();

        let written = write_digest(&path, &snapshot);
        let wrote = written.is_ok();
        let mut outcomes = vec![settle(Step::DigestFlush, written)];
        if wrote {
            tracing::debug!("Digest written to {} ({reason})", path.display());
            if let Some(command) = self.config.command.as_deref().filter(|c| !c.is_empty()) {
                let effect = Effect::DigestCommand {
                    command: command.to_string(),
                    digest_path: path,
                };
                outcomes.push(settle(Step::DigestCommand, runner.run(&effect)));
            }
        }
        outcomes
    }

    /// Flush for process exit. Only the first call per process does anything.
    pub fn flush_on_exit(&mut self, reason: &str, runner: &dyn EffectRunner) -> Vec<Outcome> {
        if std::mem::replace(&mut self.exit_flushed, true) || !self.config.on_exit {
            return Vec::new();
        }
        self.flush(reason, runner)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::testing::RecordingRunner;
    use serde_json::json;

    fn enabled_config(dir: &Path) -> DigestConfig {
        DigestConfig {
            enabled: true,
            path: dir.join("digests").join("last.json").to_string_lossy().into_owned(),
            ..DigestConfig::default()
        }
    }

    fn read_snapshot(path: &Path) -> DigestSnapshot {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    // ── DigestState ───────────────────────────────────────────────────────────

    #[test]
    fn counts_events_by_type() {
        let mut state = DigestState::new();
        for t in ["session.created", "session.created", "session.idle"] {
            state.record(&HostEvent::new(t, Value::Null));
        }
        assert_eq!(state.event_counts["session.created"], 2);
        assert_eq!(state.event_counts["session.idle"], 1);
        assert_eq!(state.event_counts.len(), 2);
    }

    #[test]
    fn counts_unrecognised_types_too() {
        let mut state = DigestState::new();
        state.record(&HostEvent::new("message.updated", Value::Null));
        assert_eq!(state.event_counts["message.updated"], 1);
    }

    #[test]
    fn error_sets_last_error_from_message() {
        let mut state = DigestState::new();
        state.record(&HostEvent::new(
            "session.error",
            json!({"error": {"name": "IOError", "data": {"message": "disk full"}}}),
        ));
        assert_eq!(state.last_error.as_deref(), Some("disk full"));
    }

    #[test]
    fn later_error_without_details_clears_last_error() {
        let mut state = DigestState::new();
        state.record(&HostEvent::new("session.error", json!({"error": {"name": "IOError"}})));
        assert_eq!(state.last_error.as_deref(), Some("IOError"));
        state.record(&HostEvent::new("session.error", json!({})));
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn permission_and_question_are_last_write_wins() {
        let mut state = DigestState::new();
        state.record(&HostEvent::new(
            "permission.asked",
            json!({"permission": "bash", "patterns": ["git *"]}),
        ));
        state.record(&HostEvent::new("permission.asked", json!({"permission": "edit"})));
        state.record(&HostEvent::new(
            "question.asked",
            json!({"questions": [{"header": "Plan", "question": "Proceed?"}]}),
        ));

        assert_eq!(
            state.last_permission,
            Some(PermissionSummary {
                permission: Some("edit".to_string()),
                patterns: None
            })
        );
        assert_eq!(
            state.last_question,
            Some(QuestionSummary {
                header: Some("Plan".to_string()),
                question: Some("Proceed?".to_string())
            })
        );
    }

    #[test]
    fn snapshot_does_not_mutate_state() {
        let mut state = DigestState::new();
        state.record(&HostEvent::new("session.idle", Value::Null));
        let snap = state.snapshot("manual");
        assert_eq!(snap.reason, "manual");
        assert_eq!(snap.trigger_count, 0);
        assert_eq!(snap.started_at, state.started_at);
        assert!(state.triggers.is_empty());
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(DigestState::new().snapshot("session.idle")).unwrap();
        for key in [
            "startedAt",
            "endedAt",
            "reason",
            "eventCounts",
            "lastError",
            "lastPermission",
            "lastQuestion",
            "triggerCount",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["lastError"].is_null());
    }

    // ── write_digest ──────────────────────────────────────────────────────────

    #[test]
    fn write_digest_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("digest.json");
        let snap = DigestState::new().snapshot("session.idle");
        write_digest(&path, &snap).unwrap();
        assert_eq!(read_snapshot(&path), snap);
    }

    #[test]
    fn write_digest_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let snap = DigestState::new().snapshot("x");
        assert!(write_digest(&blocker.join("digest.json"), &snap).is_err());
    }

    // ── DigestRecorder ────────────────────────────────────────────────────────

    #[test]
    fn disabled_recorder_neither_counts_nor_writes() {
        let dir = tempfile::tempdir().unwrap();
        let config = DigestConfig {
            enabled: false,
            ..enabled_config(dir.path())
        };
        let path = config.resolved_path();
        let runner = RecordingRunner::default();
        let mut recorder = DigestRecorder::new(config);

        recorder.record(&HostEvent::new("session.idle", Value::Null));
        assert!(recorder.state().event_counts.is_empty());
        assert!(recorder.flush("session.idle", &runner).is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn flush_writes_snapshot_and_runs_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = DigestConfig {
            command: Some("digest-hook".to_string()),
            ..enabled_config(dir.path())
        };
        let path = config.resolved_path();
        let runner = RecordingRunner::default();
        let mut recorder = DigestRecorder::new(config);

        recorder.record(&HostEvent::new("session.idle", Value::Null));
        let outcomes = recorder.flush("session.idle", &runner);

        assert!(outcomes.iter().all(Outcome::is_ok));
        let snap = read_snapshot(&path);
        assert_eq!(snap.reason, "session.idle");
        assert_eq!(snap.trigger_count, 1);
        assert_eq!(snap.event_counts["session.idle"], 1);
        assert_eq!(
            runner.effects(),
            vec![Effect::DigestCommand {
                command: "digest-hook".to_string(),
                digest_path: path
            }]
        );
    }

    #[test]
    fn failed_write_skips_command() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let config = DigestConfig {
            enabled: true,
            command: Some("digest-hook".to_string()),
            path: blocker.join("d.json").to_string_lossy().into_owned(),
            ..DigestConfig::default()
        };
        let runner = RecordingRunner::default();
        let mut recorder = DigestRecorder::new(config);

        let outcomes = recorder.flush("session.idle", &runner);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].step, Step::DigestFlush);
        assert!(!outcomes[0].is_ok());
        assert!(runner.effects().is_empty());
    }

    #[test]
    fn empty_path_flushes_to_default_location() {
        let recorder = DigestRecorder::new(DigestConfig {
            enabled: true,
            path: String::new(),
            ..DigestConfig::default()
        });
        assert_eq!(recorder.target(), crate::paths::default_digest_path());
        assert!(recorder.target().file_name().is_some());
    }

    #[test]
    fn trigger_count_accumulates_across_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let config = enabled_config(dir.path());
        let path = config.resolved_path();
        let runner = RecordingRunner::default();
        let mut recorder = DigestRecorder::new(config);

        recorder.flush("session.idle", &runner);
        recorder.flush("session.idle", &runner);
        assert_eq!(read_snapshot(&path).trigger_count, 2);
    }

    #[test]
    fn exit_flush_fires_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = enabled_config(dir.path());
        let path = config.resolved_path();
        let runner = RecordingRunner::default();
        let mut recorder = DigestRecorder::new(config);

        assert!(!recorder.flush_on_exit("process.SIGINT", &runner).is_empty());
        assert!(recorder.flush_on_exit("process.SIGTERM", &runner).is_empty());
        assert_eq!(read_snapshot(&path).reason, "process.SIGINT");
    }

    #[test]
    fn exit_flush_respects_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config = DigestConfig {
            on_exit: false,
            ..enabled_config(dir.path())
        };
        let path = config.resolved_path();
        let runner = RecordingRunner::default();
        let mut recorder = DigestRecorder::new(config);

        assert!(recorder.flush_on_exit("process.SIGINT", &runner).is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn flushes_only_on_idle_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = DigestRecorder::new(enabled_config(dir.path()));
        assert!(recorder.flushes_on(&HostEvent::new("session.idle", Value::Null)));
        assert!(!recorder.flushes_on(&HostEvent::new("session.error", Value::Null)));

        let quiet = DigestRecorder::new(DigestConfig {
            on_idle: false,
            ..enabled_config(dir.path())
        });
        assert!(!quiet.flushes_on(&HostEvent::new("session.idle", Value::Null)));
    }
}
