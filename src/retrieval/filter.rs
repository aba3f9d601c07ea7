//! Metadata filters shared by every search mode

use crate::corpus::{parse_date_bound, MessageMeta, Role};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional restrictions on returned messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub role: Option<Role>,
    pub has_code: Option<bool>,
    /// Inclusive lower timestamp bound
    pub after: Option<DateTime<Utc>>,
    /// Inclusive upper timestamp bound
    pub before: Option<DateTime<Utc>>,
    pub conv_id: Option<String>,
}

impl SearchFilters {
    /// Build filters from textual arguments; dates are RFC 3339 or `YYYY-MM-DD`
    pub fn parse(
        role: Option<&str>,
        has_code: Option<bool>,
        after: Option<&str>,
        before: Option<&str>,
        conv_id: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            role: role.map(str::parse::<Role>).transpose()?,
            has_code,
            after: after.map(parse_date_bound).transpose()?,
            before: before.map(parse_date_bound).transpose()?,
            conv_id: conv_id.map(str::to_string),
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Messages with an unparseable timestamp are never excluded by the range
    pub fn matches(&self, meta: &MessageMeta) -> bool {
        if let Some(conv) = &self.conv_id {
            if &meta.conv_id != conv {
                return false;
            }
        }
        if self.role.is_some_and(|role| role != meta.role) {
            return false;
        }
        if self.has_code.is_some_and(|code| code != meta.has_code) {
            return false;
        }

        match meta.timestamp() {
            Some(ts) => {
                self.after.map_or(true, |after| ts >= after)
                    && self.before.map_or(true, |before| ts <= before)
            }
            None => true,
        }
    }
}
