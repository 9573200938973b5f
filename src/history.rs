//! Conversation history reconstruction
//!
//! Clients send prior turns as a JSON array of
//! `{isUser: bool, content?: string, image?: "data:<mime>;base64,<payload>"}`.
//! Only the top-level array shape is strict. A record that does not match the
//! schema is dropped on its own, a bad image is dropped from its turn, and a
//! turn left with no parts is dropped from the history.

use crate::ai::mime::recognized_image_mime;
use crate::models::{ContentPart, ConversationTurn, Role};
use crate::{Error, Result};
use base64::Engine as _;
use serde::Deserialize;
use tracing::{info, warn};

/// One serialized turn as sent by the client. Unknown fields such as
/// timestamps are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub is_user: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Successfully parsed history, with counts of what had to be discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedHistory {
    pub turns: Vec<ConversationTurn>,
    pub skipped_images: usize,
    pub dropped_turns: usize,
}

/// Parses a serialized history. Only a document that is not a JSON array is
/// an error; per-turn problems are recorded in the returned counts.
pub fn parse_history(raw: &str) -> Result<ParsedHistory> {
    let records: Vec<serde_json::Value> = serde_json::from_str(raw)?;

    let mut parsed = ParsedHistory::default();
    for (index, record) in records.into_iter().enumerate() {
        let entry: HistoryEntry = match serde_json::from_value(record) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable history record {}: {}", index, e);
                parsed.dropped_turns += 1;
                continue;
            }
        };
        let role = if entry.is_user { Role::User } else { Role::Model };
        let mut parts = Vec::new();

        if let Some(text) = entry.content.filter(|t| !t.is_empty()) {
            parts.push(ContentPart::Text(text));
        }

        if let Some(uri) = entry.image.as_deref() {
            match decode_data_uri(uri) {
                Ok((bytes, mime_type)) => parts.push(ContentPart::Image { bytes, mime_type }),
                Err(e) => {
                    warn!("Error processing history image: {}", e);
                    parsed.skipped_images += 1;
                }
            }
        }

        match ConversationTurn::new(role, parts) {
            Some(turn) => parsed.turns.push(turn),
            None => parsed.dropped_turns += 1,
        }
    }

    Ok(parsed)
}

/// Reconstructs the conversation so far. Absent or malformed history is
/// treated as an empty conversation.
pub fn reconstruct(raw: Option<&str>) -> Vec<ConversationTurn> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };

    match parse_history(raw) {
        Ok(parsed) => {
            let roles: Vec<&str> = parsed.turns.iter().map(|t| t.role.as_str()).collect();
            info!(
                "Processed history: {} turns kept, {} dropped, {} images skipped, roles {:?}",
                parsed.turns.len(),
                parsed.dropped_turns,
                parsed.skipped_images,
                roles
            );
            parsed.turns
        }
        Err(e) => {
            warn!("Error parsing history, continuing without it: {}", e);
            Vec::new()
        }
    }
}

/// Decodes `data:<mime>;base64,<payload>` into bytes and a supported image
/// MIME type.
pub fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, String)> {
    let (header, payload) = uri
        .split_once("base64,")
        .ok_or_else(|| Error::Parse("image data URI is missing the base64 marker".to_string()))?;

    let declared = header
        .split_once(':')
        .map(|(_, rest)| rest.split(';').next().unwrap_or_default())
        .ok_or_else(|| Error::Parse(format!("image data URI header '{}' has no type", header)))?;

    let mime_type = recognized_image_mime(declared).ok_or_else(|| {
        Error::Parse(format!("unsupported image type '{}' in data URI", declared))
    })?;

    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    if bytes.is_empty() {
        return Err(Error::Parse("image data URI has an empty payload".to_string()));
    }

    Ok((bytes, mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(t: &str) -> ContentPart {
        ContentPart::Text(t.to_string())
    }

    #[test]
    fn test_absent_or_blank_history_is_empty() {
        assert!(reconstruct(None).is_empty());
        assert!(reconstruct(Some("")).is_empty());
        assert!(reconstruct(Some("   ")).is_empty());
    }

    #[test]
    fn test_malformed_history_is_empty() {
        assert!(reconstruct(Some("not json")).is_empty());
        assert!(reconstruct(Some("{\"isUser\": true}")).is_empty());
        assert!(matches!(
            parse_history("{\"isUser\": true}"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_unreadable_records_are_skipped_individually() {
        let parsed = parse_history(
            r#"[
                {"isUser": true, "content": "hi"},
                42,
                {"isUser": null, "content": "null role"},
                {"isUser": "yes", "content": "string role"},
                {"isUser": true, "content": 5},
                "loose text",
                {"isUser": false, "content": "hello"}
            ]"#,
        )
        .unwrap();

        assert_eq!(parsed.dropped_turns, 5);
        assert_eq!(
            parsed.turns,
            vec![
                ConversationTurn {
                    role: Role::User,
                    parts: vec![text("hi")],
                },
                ConversationTurn {
                    role: Role::Model,
                    parts: vec![text("hello")],
                },
            ]
        );
    }

    #[test]
    fn test_reconstruct_keeps_turns_around_bad_record() {
        let turns = reconstruct(Some(
            r#"[{"isUser": true, "content": "hi"}, 42, {"isUser": false, "content": "hello"}]"#,
        ));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Model);
    }

    #[test]
    fn test_roles_and_order_are_preserved() {
        let turns = reconstruct(Some(
            r#"[{"isUser": true, "content": "hi"}, {"isUser": false, "content": "hello"}]"#,
        ));

        assert_eq!(
            turns,
            vec![
                ConversationTurn {
                    role: Role::User,
                    parts: vec![text("hi")],
                },
                ConversationTurn {
                    role: Role::Model,
                    parts: vec![text("hello")],
                },
            ]
        );
    }

    #[test]
    fn test_missing_is_user_means_model_and_extra_fields_are_ignored() {
        let turns = reconstruct(Some(
            r#"[{"content": "answer", "timestamp": "2026-01-01T00:00:00Z"}]"#,
        ));
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Model);
    }

    #[test]
    fn test_image_data_uri_becomes_image_part() {
        let turns = reconstruct(Some(
            r#"[{"isUser": true, "content": "look", "image": "data:image/png;base64,AAEC"}]"#,
        ));

        assert_eq!(
            turns[0].parts,
            vec![
                text("look"),
                ContentPart::Image {
                    bytes: vec![0x00, 0x01, 0x02],
                    mime_type: "image/png".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_malformed_image_keeps_text() {
        let parsed = parse_history(
            r#"[
                {"isUser": true, "content": "no marker", "image": "data:image/png,AAEC"},
                {"isUser": true, "content": "bad payload", "image": "data:image/png;base64,@@@"},
                {"isUser": true, "content": "not an image", "image": "data:text/plain;base64,AAEC"}
            ]"#,
        )
        .unwrap();

        assert_eq!(parsed.skipped_images, 3);
        assert_eq!(parsed.dropped_turns, 0);
        let parts: Vec<_> = parsed.turns.iter().map(|t| t.parts.clone()).collect();
        assert_eq!(
            parts,
            vec![
                vec![text("no marker")],
                vec![text("bad payload")],
                vec![text("not an image")],
            ]
        );
    }

    #[test]
    fn test_turns_without_parts_are_dropped() {
        let parsed = parse_history(
            r#"[
                {"isUser": true, "content": ""},
                {"isUser": false, "content": null},
                {"isUser": true, "image": "garbage"},
                {"isUser": false, "content": "kept"}
            ]"#,
        )
        .unwrap();

        assert_eq!(parsed.dropped_turns, 3);
        assert_eq!(parsed.turns.len(), 1);
        assert_eq!(parsed.turns[0].parts, vec![text("kept")]);
    }

    #[test]
    fn test_decode_data_uri_rejects_empty_payload() {
        assert!(decode_data_uri("data:image/jpeg;base64,").is_err());
        assert!(decode_data_uri("image/jpeg;base64,AAEC").is_err());
    }

    #[test]
    fn test_decode_data_uri_ignores_line_breaks_in_payload() {
        let (bytes, mime) = decode_data_uri("data:image/png;base64,AA\r\nE C\n").unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x02]);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_decode_data_uri_normalizes_type() {
        let (bytes, mime) = decode_data_uri("data:image/JPG;base64,AAEC").unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x02]);
        assert_eq!(mime, "image/jpeg");
    }
}
