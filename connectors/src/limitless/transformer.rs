use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tether::{Error, Result};

use super::api::Lifelog;

/// Normalized Limitless meeting event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LimitlessEvent {
    pub timestamp: DateTime<Utc>,
    pub meeting_id: String,
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// Maps a raw lifelog into an event.
///
/// The transcript is the lifelog's spoken lines, one per line and prefixed
/// with the speaker when known. Lifelogs without spoken lines fall back to
/// their markdown, then their title. `speaker` is the first named speaker.
pub fn lifelog_to_event(record: Value) -> Result<LimitlessEvent> {
    let lifelog: Lifelog = serde_json::from_value(record)
        .map_err(|e| Error::MalformedResponse(format!("Limitless lifelog: {e}")))?;

    let utterances: Vec<String> = lifelog
        .contents
        .iter()
        .filter(|node| node.is_utterance())
        .filter_map(|node| {
            let text = node.content.as_deref()?.trim();
            if text.is_empty() {
                return None;
            }
            Some(match &node.speaker_name {
                Some(speaker) => format!("{speaker}: {text}"),
                None => text.to_string(),
            })
        })
        .collect();

    let transcript = if utterances.is_empty() {
        lifelog
            .markdown
            .or(lifelog.title)
            .unwrap_or_default()
    } else {
        utterances.join("\n")
    };

    let speaker = lifelog
        .contents
        .iter()
        .find_map(|node| node.speaker_name.clone());

    Ok(LimitlessEvent {
        timestamp: lifelog.start_time,
        meeting_id: lifelog.id,
        transcript,
        speaker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifelog_with_utterances() {
        let record = json!({
            "id": "ll_123",
            "title": "Standup",
            "startTime": "2024-03-10T09:00:00Z",
            "endTime": "2024-03-10T09:15:00Z",
            "contents": [
                {"type": "heading1", "content": "Standup"},
                {"type": "blockquote", "content": "Morning all.", "speakerName": "Dana"},
                {"type": "blockquote", "content": "  ", "speakerName": "Sam"},
                {"type": "blockquote", "content": "Shipping today.", "speakerName": "Sam"}
            ]
        });

        let event = lifelog_to_event(record).unwrap();
        assert_eq!(event.meeting_id, "ll_123");
        assert_eq!(event.transcript, "Dana: Morning all.\nSam: Shipping today.");
        assert_eq!(event.speaker.as_deref(), Some("Dana"));
        assert_eq!(event.timestamp.to_rfc3339(), "2024-03-10T09:00:00+00:00");
    }

    #[test]
    fn test_lifelog_falls_back_to_markdown() {
        let record = json!({
            "id": "ll_9",
            "markdown": "# Notes\nBuy milk",
            "startTime": "2024-03-10T18:00:00Z"
        });

        let event = lifelog_to_event(record).unwrap();
        assert_eq!(event.transcript, "# Notes\nBuy milk");
        assert!(event.speaker.is_none());
    }

    #[test]
    fn test_lifelog_without_id_is_malformed() {
        let record = json!({"startTime": "2024-03-10T18:00:00Z"});
        assert!(matches!(
            lifelog_to_event(record),
            Err(Error::MalformedResponse(_))
        ));
    }
}
