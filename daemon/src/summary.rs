/// Plain-text rendering of a digest file for the `opencode-starcraft-digest` viewer.
use serde_json::Value;
use std::fmt::Write;
use std::path::Path;

/// Renders `raw` (digest JSON read from `path`). Only fails if `raw` is not JSON.
/// Missing fields are tolerated so digests from older builds still display.
pub fn summarize(path: &Path, raw: &str) -> serde_json::Result<String> {
    let digest: Value = serde_json::from_str(raw)?;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Digest file: {}", path.display());
    let _ = writeln!(out, "Started: {}", show(digest.get("startedAt")));
    let _ = writeln!(out, "Ended: {}", show(digest.get("endedAt")));
    let _ = writeln!(out, "Reason: {}", show(digest.get("reason")));
    let _ = writeln!(out, "Events:");
    if let Some(counts) = digest.get("eventCounts").and_then(Value::as_object) {
        for (event_type, count) in counts {
            let _ = writeln!(out, "  - {event_type}: {}", show(Some(count)));
        }
    }

    if let Some(error) = non_empty(digest.get("lastError")) {
        let _ = writeln!(out, "Last error: {error}");
    }
    if let Some(permission) = non_empty(digest.pointer("/lastPermission/permission")) {
        let _ = writeln!(out, "Last permission: {permission}");
    }
    if let Some(question) = non_empty(digest.pointer("/lastQuestion/question")) {
        let _ = writeln!(out, "Last question: {question}");
    }
    Ok(out)
}

fn show(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(show(Some(other))),
    }
}
