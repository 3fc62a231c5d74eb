//! Bounded single-level undo history.
//!
//! Entries are recorded only after the store accepts a move, so a failed
//! commit never touches the history. There is no redo.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Schedule, ScheduleId};

/// Default number of operations kept.
pub const DEFAULT_UNDO_CAPACITY: usize = 10;

/// Unique identifier for a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of edit an operation was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Move,
    Update,
    Create,
    Delete,
}

/// One reversible edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub schedule_id: ScheduleId,
    /// State to restore on undo; `None` for a create
    pub before: Option<Schedule>,
    /// State after the edit; `None` for a delete
    pub after: Option<Schedule>,
    pub timestamp: DateTime<Utc>,
}

/// Most-recent-first history of at most `capacity` operations.
#[derive(Debug, Clone)]
pub struct UndoLedger {
    capacity: usize,
    entries: VecDeque<UndoOperation>,
}

impl Default for UndoLedger {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoLedger {
    /// A ledger keeping `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an operation, evicting the oldest entry when full.
    pub fn record(
        &mut self,
        kind: OperationKind,
        schedule_id: ScheduleId,
        before: Option<Schedule>,
        after: Option<Schedule>,
    ) -> OperationId {
        let operation = UndoOperation {
            id: OperationId::new(),
            kind,
            schedule_id,
            before,
            after,
            timestamp: Utc::now(),
        };
        let id = operation.id;
        self.push(operation);
        id
    }

    /// Put an operation back on top, e.g. after an undo failed to commit.
    pub fn push(&mut self, operation: UndoOperation) {
        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                tracing::debug!("Undo history full, dropping operation {}", evicted.id);
            }
        }
        self.entries.push_front(operation);
    }

    /// Pop the most recent operation.
    pub fn undo(&mut self) -> Option<UndoOperation> {
        self.entries.pop_front()
    }

    /// Remove a specific operation. Returns whether it was present.
    pub fn remove(&mut self, id: OperationId) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        self.entries.remove(index);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn history_size(&self) -> usize {
        self.entries.len()
    }

    pub fn peek(&self) -> Option<&UndoOperation> {
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn schedule(id: &str) -> Schedule {
        let at = |value: &str| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap();
        Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 10:00"))
            .unwrap()
            .with_id(id)
    }

    fn record_move(ledger: &mut UndoLedger, id: &str) -> OperationId {
        ledger.record(
            OperationKind::Move,
            ScheduleId::from(id),
            Some(schedule(id)),
            Some(schedule(id)),
        )
    }

    #[test]
    fn empty_ledger_has_nothing_to_undo() {
        let mut ledger = UndoLedger::default();
        assert!(!ledger.can_undo());
        assert_eq!(ledger.undo(), None);
        assert_eq!(ledger.history_size(), 0);
    }

    #[test]
    fn undo_returns_most_recent_first() {
        let mut ledger = UndoLedger::default();
        record_move(&mut ledger, "a");
        let first = ledger.peek().cloned();
        let second_id = record_move(&mut ledger, "b");
        let second = ledger.peek().cloned();

        assert_eq!(second.as_ref().map(|operation| operation.id), Some(second_id));
        assert_eq!(ledger.undo(), second);
        assert_eq!(ledger.undo(), first);
        assert!(!ledger.can_undo());
    }

    #[test]
    fn eleventh_record_evicts_the_oldest() {
        let mut ledger = UndoLedger::default();
        for index in 0..11 {
            record_move(&mut ledger, &format!("s{index}"));
        }
        assert_eq!(ledger.history_size(), 10);

        let mut popped = Vec::new();
        while let Some(operation) = ledger.undo() {
            popped.push(operation.schedule_id.to_string());
        }
        assert_eq!(popped.first().map(String::as_str), Some("s10"));
        assert_eq!(popped.last().map(String::as_str), Some("s1"));
    }

    #[test]
    fn remove_drops_only_the_named_entry() {
        let mut ledger = UndoLedger::new(3);
        let first = record_move(&mut ledger, "a");
        let second = record_move(&mut ledger, "b");

        assert!(ledger.remove(second));
        assert!(!ledger.remove(second));
        assert_eq!(ledger.history_size(), 1);
        assert_eq!(ledger.peek().unwrap().id, first);
    }

    #[test]
    fn push_restores_a_popped_entry() {
        let mut ledger = UndoLedger::new(2);
        record_move(&mut ledger, "a");
        let popped = ledger.undo().unwrap();
        ledger.push(popped.clone());
        assert_eq!(ledger.peek(), Some(&popped));
    }

    #[test]
    fn zero_capacity_keeps_one_entry() {
        let mut ledger = UndoLedger::new(0);
        record_move(&mut ledger, "a");
        record_move(&mut ledger, "b");
        assert_eq!(ledger.capacity(), 1);
        assert_eq!(ledger.history_size(), 1);
        ledger.clear();
        assert!(!ledger.can_undo());
    }
}
