//! Soft, auto-expiring notices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Informational (e.g. entities added to a case).
    Info,
    /// Operation refused or partially applied.
    Warning,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A transient message shown to the analyst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Unique id, so a stale expiry never clears a newer notice.
    pub id: Uuid,
    /// Severity.
    pub kind: NoticeKind,
    /// Message text.
    pub message: String,
    /// When the notice disappears on its own.
    pub expires_at: DateTime<Utc>,
}

impl Notice {
    /// Notice raised at `now` that lives for `duration`.
    pub fn new(kind: NoticeKind, message: impl Into<String>, now: DateTime<Utc>, duration: Duration) -> Self {
        let ttl = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(4));
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            expires_at: now + ttl,
        }
    }

    /// Whether the notice has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
