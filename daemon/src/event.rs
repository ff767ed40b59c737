use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything the daemon's main loop reacts to.
#[derive(Debug)]
pub enum DaemonEvent {
    /// One lifecycle event read from the host.
    Host(HostEvent),
    /// An explicit request to write a digest now (SIGUSR1).
    DigestRequested(String),
    /// A termination signal or the host closing our input; flush and exit.
    Shutdown(String),
}

/// Lifecycle event types the catalog knows about. Anything else is still
/// counted by the digest but never produces a sound or notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    SessionCreated,
    SessionIdle,
    SessionCompacted,
    SessionError,
    PermissionAsked,
    QuestionAsked,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::SessionCreated,
        EventKind::SessionIdle,
        EventKind::SessionCompacted,
        EventKind::SessionError,
        EventKind::PermissionAsked,
        EventKind::QuestionAsked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SessionCreated => "session.created",
            EventKind::SessionIdle => "session.idle",
            EventKind::SessionCompacted => "session.compacted",
            EventKind::SessionError => "session.error",
            EventKind::PermissionAsked => "permission.asked",
            EventKind::QuestionAsked => "question.asked",
        }
    }

    pub fn from_type(event_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == event_type)
    }
}

/// An event as delivered by the host: `{ "type": "...", "properties": {...} }`.
///
/// Unknown top-level fields are kept in `extra` so the telemetry envelope can
/// forward the event exactly as it arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostEvent {
    pub fn new(event_type: &str, properties: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            properties,
            extra: Map::new(),
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_type(&self.event_type)
    }

    /// Looks up a JSON pointer under `properties`, accepting only non-empty strings.
    pub fn text(&self, pointer: &str) -> Option<&str> {
        self.properties
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// `error.data.message`, falling back to `error.name`.
    pub fn error_summary(&self) -> Option<&str> {
        self.text("/error/data/message")
            .or_else(|| self.text("/error/name"))
    }

    /// The first question's text, falling back to its header.
    pub fn question_summary(&self) -> Option<&str> {
        self.text("/questions/0/question")
            .or_else(|| self.text("/questions/0/header"))
    }

    /// The requested permission, falling back to the request title.
    pub fn permission_summary(&self) -> Option<&str> {
        self.text("/permission").or_else(|| self.text("/title"))
    }
}
