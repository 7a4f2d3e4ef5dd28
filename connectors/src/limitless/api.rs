use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Limitless pendant lifelog (one recorded conversation).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifelog {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contents: Vec<ContentNode>,
}

/// One node of a lifelog's content tree.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub speaker_name: Option<String>,
}

impl ContentNode {
    /// Spoken lines carry `blockquote` type.
    pub fn is_utterance(&self) -> bool {
        self.node_type == "blockquote"
    }
}
