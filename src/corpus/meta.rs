//! Per-message metadata artifact

use super::{parse_timestamp, Corpus, Message, MessageId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata kept for every message, keyed by id in [`MetaMap`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub conv_id: String,
    pub title: String,
    pub ts: String,
    pub role: Role,
    pub has_code: bool,
    /// Number of lowercase alphanumeric words
    pub length: usize,
}

impl MessageMeta {
    pub fn from_message(message: &Message) -> Self {
        Self {
            conv_id: message.conv_id.clone(),
            title: message
                .title
                .clone()
                .unwrap_or_else(|| message.conv_id.clone()),
            ts: message.ts.clone(),
            role: message.role,
            has_code: message.has_code,
            length: word_count(&message.text),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.ts)
    }
}

pub type MetaMap = BTreeMap<MessageId, MessageMeta>;

/// Build the metadata mapping for every message of the corpus
pub fn build_meta(corpus: &Corpus) -> MetaMap {
    corpus
        .messages()
        .iter()
        .map(|m| (m.id, MessageMeta::from_message(m)))
        .collect()
}

fn word_count(text: &str) -> usize {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|w| !w.is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: MessageId, title: Option<&str>, text: &str) -> Message {
        Message {
            id,
            conv_id: "conv-a".to_string(),
            title: title.map(str::to_string),
            ts: "2024-01-01T00:00:00Z".to_string(),
            role: Role::User,
            text: text.to_string(),
            has_code: false,
        }
    }

    #[test]
    fn test_meta_fields() {
        let corpus = Corpus::from_messages(vec![
            message(0, Some("Parsing"), "How do I parse JSON, v2?"),
            message(1, None, ""),
        ]);
        let meta = build_meta(&corpus);

        assert_eq!(meta.len(), 2);
        assert_eq!(meta[&0].title, "Parsing");
        assert_eq!(meta[&0].length, 6);
        assert_eq!(meta[&1].title, "conv-a");
        assert_eq!(meta[&1].length, 0);
        assert!(meta[&0].timestamp().is_some());
    }
}
