//! Classification of protocol lines into typed stream events.
//!
//! Each frame is one `data: `-prefixed line carrying a JSON object with
//! a `type` field. Lines without the prefix are a compatibility path
//! for non-conforming responses and pass through as raw content.

use serde::Deserialize;
use tracing::debug;

/// One classified event from the feedback stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Markdown text delta to append to the document
    Content(String),
    /// Progress update for the status line, no document mutation
    Progress(String),
    /// Status update, same effect class as `Progress`
    Status(String),
    /// Section heading to insert into the document
    Section(String),
    /// Server-side failure; ends the session
    Error(String),
    /// Clean end of the stream
    Complete,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
}

/// Classify one complete line from the stream.
///
/// Returns `None` for frames that should be skipped: malformed JSON (a
/// frame boundary can arrive before its payload is fully transmitted,
/// so parse failures are discarded rather than treated as fatal) and
/// unrecognized event types.
pub fn classify_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches('\r');

    let payload = match line.strip_prefix("data: ") {
        Some(payload) => payload,
        // Legacy plain-text fallback
        None => return Some(StreamEvent::Content(line.to_string())),
    };

    let frame: RawFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "discarding unparseable frame");
            return None;
        }
    };

    let content = frame.content.unwrap_or_default();
    match frame.kind.as_str() {
        "content" => Some(StreamEvent::Content(content)),
        "progress" => Some(StreamEvent::Progress(content)),
        "status" => Some(StreamEvent::Status(content)),
        "section" => Some(StreamEvent::Section(content)),
        "error" => Some(StreamEvent::Error(content)),
        "complete" => Some(StreamEvent::Complete),
        other => {
            debug!(kind = other, "ignoring unknown event type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_all_known_types() {
        assert_eq!(
            classify_line(r#"data: {"type":"content","content":"abc"}"#),
            Some(StreamEvent::Content("abc".to_string()))
        );
        assert_eq!(
            classify_line(r#"data: {"type":"progress","content":"Step 1 of 3"}"#),
            Some(StreamEvent::Progress("Step 1 of 3".to_string()))
        );
        assert_eq!(
            classify_line(r#"data: {"type":"status","content":"GPT Analysis Started"}"#),
            Some(StreamEvent::Status("GPT Analysis Started".to_string()))
        );
        assert_eq!(
            classify_line(r#"data: {"type":"section","content":"GRADING PURPOSES"}"#),
            Some(StreamEvent::Section("GRADING PURPOSES".to_string()))
        );
        assert_eq!(
            classify_line(r#"data: {"type":"error","content":"model timeout"}"#),
            Some(StreamEvent::Error("model timeout".to_string()))
        );
        assert_eq!(
            classify_line(r#"data: {"type":"complete"}"#),
            Some(StreamEvent::Complete)
        );
    }

    #[test]
    fn malformed_json_is_discarded() {
        assert_eq!(classify_line(r#"data: {"type":"content","cont"#), None);
    }

    #[test]
    fn unknown_type_is_ignored() {
        assert_eq!(
            classify_line(r#"data: {"type":"telemetry","content":"x"}"#),
            None
        );
    }

    #[test]
    fn unprefixed_line_falls_back_to_raw_content() {
        assert_eq!(
            classify_line("plain text chunk"),
            Some(StreamEvent::Content("plain text chunk".to_string()))
        );
    }

    #[test]
    fn prefix_match_is_exact() {
        // "data:" without the trailing space is not the protocol prefix
        assert_eq!(
            classify_line(r#"data:{"type":"complete"}"#),
            Some(StreamEvent::Content(r#"data:{"type":"complete"}"#.to_string()))
        );
    }

    #[test]
    fn crlf_line_ending_is_tolerated() {
        assert_eq!(
            classify_line("data: {\"type\":\"complete\"}\r"),
            Some(StreamEvent::Complete)
        );
    }
}
