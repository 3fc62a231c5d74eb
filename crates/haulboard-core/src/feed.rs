//! Change-feed event types.
//!
//! The remote store pushes row changes in delivery order. Connection state is
//! reported alongside so the UI can offer a reconnect; it never changes how
//! events are applied.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Schedule, ScheduleId};

/// Kind of row change, shared by local writes and remote events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// A change delivered by the remote feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteChange {
    Insert { schedule: Schedule },
    Update { schedule: Schedule },
    Delete { id: ScheduleId },
}

impl RemoteChange {
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert { .. } => ChangeKind::Insert,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub const fn schedule_id(&self) -> &ScheduleId {
        match self {
            Self::Insert { schedule } | Self::Update { schedule } => &schedule.id,
            Self::Delete { id } => id,
        }
    }
}

/// Connection state of the change feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Connecting,
    Subscribed,
    Error,
    TimedOut,
    Closed,
}

impl FeedStatus {
    /// Whether the UI should offer a reconnect.
    pub const fn needs_reconnect(self) -> bool {
        matches!(self, Self::Error | Self::TimedOut | Self::Closed)
    }
}
