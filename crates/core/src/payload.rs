//! On-chain note payload.
//!
//! Builds the small JSON object that is attached to a transaction as
//! auxiliary metadata. Free-text fields are truncated here, before any
//! transaction is serialized, so that size limits are never hit later.

use std::fmt;
use std::str::FromStr;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Transaction metadata label the payload is stored under (CIP-20 messages).
pub const NOTE_METADATA_LABEL: u64 = 674;

/// Maximum number of title characters carried on-chain.
pub const MAX_PAYLOAD_TITLE_CHARS: usize = 50;

/// Maximum number of content characters carried on-chain.
pub const MAX_CONTENT_PREVIEW_CHARS: usize = 60;

/// Ledger limit for a single metadata text value, in UTF-8 bytes.
pub const MAX_METADATA_TEXT_BYTES: usize = 64;

// ---------------------------------------------------------------------------
// Action kinds
// ---------------------------------------------------------------------------

/// What happened to the note in the transaction that carries the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteAction {
    #[default]
    CreateNote,
    UpdateNote,
    DeleteNote,
}

impl NoteAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteAction::CreateNote => "CREATE_NOTE",
            NoteAction::UpdateNote => "UPDATE_NOTE",
            NoteAction::DeleteNote => "DELETE_NOTE",
        }
    }
}

impl fmt::Display for NoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE_NOTE" | "CREATE" => Ok(NoteAction::CreateNote),
            "UPDATE_NOTE" | "UPDATE" => Ok(NoteAction::UpdateNote),
            "DELETE_NOTE" | "DELETE" => Ok(NoteAction::DeleteNote),
            other => Err(CoreError::Validation(format!(
                "Unknown note action '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Truncation
// ---------------------------------------------------------------------------

/// Truncate `text` to at most `max_chars` characters and `max_bytes` bytes,
/// never splitting a UTF-8 sequence.
pub fn truncate_text(text: &str, max_chars: usize, max_bytes: usize) -> String {
    let mut end = 0;
    for (count, (idx, ch)) in text.char_indices().enumerate() {
        if count == max_chars || idx + ch.len_utf8() > max_bytes {
            break;
        }
        end = idx + ch.len_utf8();
    }
    text[..end].to_string()
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// JSON payload anchored on-chain for a note mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    pub action: NoteAction,
    pub note_id: DbId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    pub timestamp: String,
}

impl NotePayload {
    /// Build a payload, truncating every free-text field to its on-chain limit.
    pub fn new(
        action: NoteAction,
        note_id: DbId,
        title: &str,
        content: Option<&str>,
        hash: Option<&str>,
        at: Timestamp,
    ) -> Self {
        Self {
            action,
            note_id,
            title: truncate_text(title, MAX_PAYLOAD_TITLE_CHARS, MAX_METADATA_TEXT_BYTES),
            hash: hash.map(|h| truncate_text(h, usize::MAX, MAX_METADATA_TEXT_BYTES)),
            content_preview: content
                .map(|c| truncate_text(c, MAX_CONTENT_PREVIEW_CHARS, MAX_METADATA_TEXT_BYTES))
                .filter(|c| !c.is_empty()),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Render the payload as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing a struct of strings and integers cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn action_serializes_screaming_snake() {
        let json = serde_json::to_value(NoteAction::CreateNote).unwrap();
        assert_eq!(json, "CREATE_NOTE");
        assert_eq!(NoteAction::UpdateNote.to_string(), "UPDATE_NOTE");
    }

    #[test]
    fn action_parses_short_and_long_forms() {
        assert_eq!("create".parse::<NoteAction>().unwrap(), NoteAction::CreateNote);
        assert_eq!("DELETE_NOTE".parse::<NoteAction>().unwrap(), NoteAction::DeleteNote);
        assert!("publish".parse::<NoteAction>().is_err());
    }

    #[test]
    fn truncate_respects_char_limit() {
        assert_eq!(truncate_text("abcdef", 3, 64), "abc");
        assert_eq!(truncate_text("ab", 3, 64), "ab");
    }

    #[test]
    fn truncate_respects_byte_limit_on_char_boundary() {
        // Each 'é' is two bytes; five bytes only fit two of them.
        assert_eq!(truncate_text("ééééé", 50, 5), "éé");
    }

    #[test]
    fn payload_truncates_title_and_preview() {
        let title = "t".repeat(80);
        let content = "c".repeat(500);
        let payload = NotePayload::new(
            NoteAction::CreateNote,
            7,
            &title,
            Some(&content),
            None,
            at(),
        );
        assert_eq!(payload.title.chars().count(), MAX_PAYLOAD_TITLE_CHARS);
        assert_eq!(
            payload.content_preview.as_deref().map(str::len),
            Some(MAX_CONTENT_PREVIEW_CHARS)
        );
    }

    #[test]
    fn payload_json_shape() {
        let payload = NotePayload::new(
            NoteAction::CreateNote,
            1,
            "Hello",
            None,
            Some("abc123"),
            at(),
        );
        let json = payload.to_json();
        assert_eq!(json["action"], "CREATE_NOTE");
        assert_eq!(json["noteId"], 1);
        assert_eq!(json["title"], "Hello");
        assert_eq!(json["hash"], "abc123");
        assert_eq!(json["timestamp"], "2025-03-01T12:00:00Z");
        assert!(json.get("contentPreview").is_none());
    }
}
