//! Normalized message corpus
//!
//! The ingestion collaborator hands over one JSON object per line. Rows that
//! cannot be understood are skipped with a warning; the rest of the corpus is
//! still ingested.

mod meta;

pub use meta::{build_meta, MessageMeta, MetaMap};

use crate::error::{LexicaError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Dense 0-based message identifier
pub type MessageId = u32;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LexicaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(LexicaError::InvalidQuery(format!(
                "role must be 'user' or 'assistant', got '{}'",
                other
            ))),
        }
    }
}

/// One immutable chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conv_id: String,
    /// Conversation title, when the ingestion side knows it
    pub title: Option<String>,
    /// Raw ISO-8601 timestamp as supplied
    pub ts: String,
    pub role: Role,
    pub text: String,
    pub has_code: bool,
}

impl Message {
    /// Parsed timestamp, `None` when the raw value is not valid RFC 3339
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.ts)
    }
}

/// Wire shape of a corpus row
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(alias = "msg")]
    id: Option<u64>,
    conv_id: Option<String>,
    #[serde(alias = "conv_title")]
    title: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    role: Option<String>,
    #[serde(default)]
    text: Option<String>,
    has_code: Option<bool>,
}

impl RawRow {
    fn into_message(self, line: usize) -> Result<Message> {
        let malformed = |reason: &str| LexicaError::MalformedRecord {
            line,
            reason: reason.to_string(),
        };

        let id = self.id.ok_or_else(|| malformed("missing message id"))?;
        let id = MessageId::try_from(id).map_err(|_| malformed("message id out of range"))?;
        let conv_id = self
            .conv_id
            .filter(|c| !c.is_empty())
            .ok_or_else(|| malformed("missing conv_id"))?;
        let role = self
            .role
            .as_deref()
            .ok_or_else(|| malformed("missing role"))?
            .parse::<Role>()
            .map_err(|e| malformed(&e.to_string()))?;
        let text = self.text.unwrap_or_default();
        let has_code = self.has_code.unwrap_or_else(|| detect_code(&text));

        Ok(Message {
            id,
            conv_id,
            title: self.title,
            ts: self.ts.unwrap_or_default(),
            role,
            text,
            has_code,
        })
    }
}

/// In-memory corpus, messages sorted by id
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    messages: Vec<Message>,
    /// Rows skipped while reading
    pub skipped: usize,
}

impl Corpus {
    /// Build a corpus from already-normalized messages
    pub fn from_messages(mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.id);
        messages.dedup_by_key(|m| m.id);
        Self {
            messages,
            skipped: 0,
        }
    }

    /// Read a JSON-lines corpus file
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| LexicaError::io(e, format!("Failed to open corpus: {}", path.display())))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Read JSON lines, skipping malformed rows
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut messages = Vec::new();
        let mut skipped = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| {
                LexicaError::io(e, format!("Failed to read corpus line {}", line_no))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<RawRow>(&line)
                .map_err(|e| LexicaError::MalformedRecord {
                    line: line_no,
                    reason: e.to_string(),
                })
                .and_then(|row| row.into_message(line_no));

            match parsed {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!("Skipping corpus row: {}", e);
                    skipped += 1;
                }
            }
        }

        let before = messages.len();
        let mut corpus = Self::from_messages(messages);
        let duplicates = before - corpus.messages.len();
        if duplicates > 0 {
            tracing::warn!("Dropped {} rows with duplicate message ids", duplicates);
        }
        corpus.skipped = skipped + duplicates;

        tracing::debug!(
            "Loaded corpus: {} messages, {} skipped",
            corpus.messages.len(),
            corpus.skipped
        );
        Ok(corpus)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|idx| &self.messages[idx])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages grouped by conversation, each group in timestamp order
    ///
    /// Unparseable timestamps sort first; ties fall back to message id.
    pub fn conversations(&self) -> BTreeMap<&str, Vec<&Message>> {
        let mut groups: BTreeMap<&str, Vec<&Message>> = BTreeMap::new();
        for message in &self.messages {
            groups.entry(message.conv_id.as_str()).or_default().push(message);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|m| (m.timestamp(), m.id));
        }
        groups
    }

    /// Window of a conversation around `center`, ordered by message id
    ///
    /// Without a center the whole conversation is returned. When the center is
    /// not part of the conversation the first `2 * window + 1` messages are.
    pub fn conversation_window(
        &self,
        conv_id: &str,
        center: Option<MessageId>,
        window: usize,
    ) -> Vec<&Message> {
        let messages: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.conv_id == conv_id)
            .collect();

        let Some(center) = center else {
            return messages;
        };

        match messages.iter().position(|m| m.id == center) {
            Some(idx) => {
                let lo = idx.saturating_sub(window);
                let hi = (idx + window + 1).min(messages.len());
                messages[lo..hi].to_vec()
            }
            None => messages.into_iter().take(window * 2 + 1).collect(),
        }
    }
}

/// Parse a `Z`-suffixed (or offset) RFC 3339 timestamp
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parse a filter bound: RFC 3339 or a bare `YYYY-MM-DD` date at midnight UTC
pub fn parse_date_bound(value: &str) -> Result<DateTime<Utc>> {
    if let Some(ts) = parse_timestamp(value) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| LexicaError::InvalidQuery(format!("Unrecognized date: {}", value)))
}

/// Age in fractional days, clamped at zero for future timestamps
pub fn age_days(ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - ts).num_milliseconds() as f64 / 1000.0;
    (secs / 86_400.0).max(0.0)
}

/// Exponential half-life decay, 0 when the timestamp is absent
pub fn decay(ts: Option<DateTime<Utc>>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    match ts {
        Some(ts) => {
            let age = age_days(ts, now);
            (-std::f64::consts::LN_2 * age / half_life_days.max(1e-3)).exp()
        }
        None => 0.0,
    }
}

/// Fenced block or inline code span
pub fn detect_code(text: &str) -> bool {
    static INLINE: OnceLock<Regex> = OnceLock::new();
    if text.contains("```") {
        return true;
    }
    INLINE
        .get_or_init(|| Regex::new(r"`[^`]+`").expect("static regex"))
        .is_match(text)
}
