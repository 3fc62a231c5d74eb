//! Client-local schedule collection with optimistic writes.
//!
//! Local writes land in memory immediately and leave a short-lived marker so
//! the same write echoing back through the change feed is dropped instead of
//! being applied twice. Markers expire lazily: each lookup compares the
//! caller's `now` against the insertion instant, so nothing depends on a
//! timer firing.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feed::{ChangeKind, FeedStatus, RemoteChange};
use crate::models::{Schedule, ScheduleId};

/// Marker for a local write whose echo has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelfOperation {
    pub schedule_id: ScheduleId,
    pub kind: ChangeKind,
    pub recorded_at: Instant,
}

/// Registry of this client's recent writes.
#[derive(Debug, Clone)]
pub struct SelfOperationRegistry {
    window: Duration,
    pending: Vec<PendingSelfOperation>,
}

impl SelfOperationRegistry {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
        }
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Record a local write of `kind` on `schedule_id` made at `now`.
    pub fn mark(&mut self, schedule_id: &ScheduleId, kind: ChangeKind, now: Instant) {
        self.purge(now);
        self.pending.push(PendingSelfOperation {
            schedule_id: schedule_id.clone(),
            kind,
            recorded_at: now,
        });
    }

    /// Consume one live marker matching the event, if there is one.
    pub fn take_echo(&mut self, schedule_id: &ScheduleId, kind: ChangeKind, now: Instant) -> bool {
        self.purge(now);
        let found = self
            .pending
            .iter()
            .position(|op| op.kind == kind && &op.schedule_id == schedule_id);
        found.map(|index| self.pending.remove(index)).is_some()
    }

    /// Drop the newest marker for a write that never reached the store.
    pub fn forget(&mut self, schedule_id: &ScheduleId, kind: ChangeKind) {
        if let Some(index) = self
            .pending
            .iter()
            .rposition(|op| op.kind == kind && &op.schedule_id == schedule_id)
        {
            self.pending.remove(index);
        }
    }

    /// Number of live markers at `now`.
    pub fn pending_len(&mut self, now: Instant) -> usize {
        self.purge(now);
        self.pending.len()
    }

    fn purge(&mut self, now: Instant) {
        let window = self.window;
        self.pending
            .retain(|op| now.saturating_duration_since(op.recorded_at) < window);
    }
}

/// A mutation made by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMutation {
    Insert(Schedule),
    Update(Schedule),
    Delete(ScheduleId),
}

impl LocalMutation {
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete(_) => ChangeKind::Delete,
        }
    }

    pub const fn schedule_id(&self) -> &ScheduleId {
        match self {
            Self::Insert(schedule) | Self::Update(schedule) => &schedule.id,
            Self::Delete(id) => id,
        }
    }
}

/// What is needed to undo one optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollback {
    schedule_id: ScheduleId,
    kind: ChangeKind,
    previous: Option<Schedule>,
    index: usize,
}

impl Rollback {
    pub const fn schedule_id(&self) -> &ScheduleId {
        &self.schedule_id
    }

    pub const fn kind(&self) -> ChangeKind {
        self.kind
    }
}

/// A remote event that referenced state this client does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationAnomaly {
    pub kind: ChangeKind,
    pub schedule_id: ScheduleId,
}

/// Result of applying a remote event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Echo of this client's own write; nothing changed
    Suppressed,
    /// Foreign change applied
    Applied,
    /// Event referenced an unknown id; ignored
    Anomaly(ReconciliationAnomaly),
}

/// Observable events for the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    ChangedByOther {
        kind: ChangeKind,
        schedule_id: ScheduleId,
    },
    FeedStatusChanged {
        status: FeedStatus,
    },
}

/// The schedule list as seen by one client.
#[derive(Debug, Clone)]
pub struct OptimisticStore {
    schedules: Vec<Schedule>,
    registry: SelfOperationRegistry,
    feed_status: FeedStatus,
    events: Vec<StoreEvent>,
}

impl OptimisticStore {
    pub const fn new(echo_window: Duration) -> Self {
        Self {
            schedules: Vec::new(),
            registry: SelfOperationRegistry::new(echo_window),
            feed_status: FeedStatus::Connecting,
            events: Vec::new(),
        }
    }

    /// Replace the whole list, e.g. after the initial fetch.
    pub fn load(&mut self, schedules: Vec<Schedule>) {
        tracing::debug!("Loaded {} schedules into store", schedules.len());
        self.schedules = schedules;
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn get(&self, id: &ScheduleId) -> Option<&Schedule> {
        self.schedules.iter().find(|schedule| &schedule.id == id)
    }

    /// Schedules with a segment on `date`.
    pub fn schedules_on(&self, date: NaiveDate) -> Vec<Schedule> {
        self.schedules
            .iter()
            .filter(|schedule| schedule.occupies(date))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    pub const fn feed_status(&self) -> FeedStatus {
        self.feed_status
    }

    pub const fn registry(&self) -> &SelfOperationRegistry {
        &self.registry
    }

    pub fn pending_self_operations(&mut self, now: Instant) -> usize {
        self.registry.pending_len(now)
    }

    fn position(&self, id: &ScheduleId) -> Option<usize> {
        self.schedules.iter().position(|schedule| &schedule.id == id)
    }

    /// Apply a local mutation immediately and mark it for echo suppression.
    ///
    /// Exactly one marker is recorded per successful call.
    pub fn apply_local(&mut self, mutation: LocalMutation, now: Instant) -> Result<Rollback> {
        let kind = mutation.kind();
        let schedule_id = mutation.schedule_id().clone();

        let rollback = match mutation {
            LocalMutation::Insert(schedule) => {
                if self.position(&schedule.id).is_some() {
                    return Err(Error::InvalidInput(format!(
                        "schedule {} already exists",
                        schedule.id
                    )));
                }
                self.schedules.push(schedule);
                Rollback {
                    schedule_id: schedule_id.clone(),
                    kind,
                    previous: None,
                    index: self.schedules.len() - 1,
                }
            }
            LocalMutation::Update(schedule) => {
                let index = self
                    .position(&schedule.id)
                    .ok_or_else(|| Error::NotFound(schedule.id.to_string()))?;
                let previous = std::mem::replace(&mut self.schedules[index], schedule);
                Rollback {
                    schedule_id: schedule_id.clone(),
                    kind,
                    previous: Some(previous),
                    index,
                }
            }
            LocalMutation::Delete(id) => {
                let index = self
                    .position(&id)
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;
                let previous = self.schedules.remove(index);
                Rollback {
                    schedule_id: schedule_id.clone(),
                    kind,
                    previous: Some(previous),
                    index,
                }
            }
        };

        self.registry.mark(&schedule_id, kind, now);
        tracing::debug!("Applied optimistic {} on schedule {}", kind, schedule_id);
        Ok(rollback)
    }

    /// Replace the optimistic row with the row the store committed.
    pub fn confirm(&mut self, committed: Schedule) {
        match self.position(&committed.id) {
            Some(index) => self.schedules[index] = committed,
            None => tracing::debug!(
                "Committed schedule {} is no longer in the local list",
                committed.id
            ),
        }
    }

    /// Restore the state before an optimistic mutation.
    ///
    /// Changes that arrived from other users since the mutation are kept:
    /// only the rolled-back entity is touched.
    pub fn rollback(&mut self, rollback: Rollback) {
        let Rollback {
            schedule_id,
            kind,
            previous,
            index,
        } = rollback;
        self.registry.forget(&schedule_id, kind);

        match (kind, previous) {
            (ChangeKind::Insert, _) => {
                if let Some(position) = self.position(&schedule_id) {
                    self.schedules.remove(position);
                }
            }
            (ChangeKind::Update, Some(previous)) => match self.position(&schedule_id) {
                Some(position) => self.schedules[position] = previous,
                None => tracing::debug!(
                    "Schedule {} was removed remotely before rollback; keeping removal",
                    schedule_id
                ),
            },
            (ChangeKind::Delete, Some(previous)) => {
                if self.position(&schedule_id).is_none() {
                    let index = index.min(self.schedules.len());
                    self.schedules.insert(index, previous);
                }
            }
            (_, None) => {}
        }

        tracing::warn!("Rolled back optimistic {} on schedule {}", kind, schedule_id);
    }

    /// Apply an event from the change feed.
    pub fn apply_remote(&mut self, change: RemoteChange, now: Instant) -> RemoteOutcome {
        let kind = change.kind();
        let schedule_id = change.schedule_id().clone();

        if self.registry.take_echo(&schedule_id, kind, now) {
            tracing::debug!("Suppressed echo of own {} on schedule {}", kind, schedule_id);
            return RemoteOutcome::Suppressed;
        }

        let applied = match change {
            RemoteChange::Insert { schedule } => {
                match self.position(&schedule.id) {
                    Some(index) => {
                        tracing::debug!("Remote insert for known schedule {}", schedule.id);
                        self.schedules[index] = schedule;
                    }
                    None => self.schedules.push(schedule),
                }
                true
            }
            RemoteChange::Update { schedule } => match self.position(&schedule.id) {
                Some(index) => {
                    self.schedules[index] = schedule;
                    true
                }
                None => false,
            },
            RemoteChange::Delete { id } => match self.position(&id) {
                Some(index) => {
                    self.schedules.remove(index);
                    true
                }
                None => false,
            },
        };

        if !applied {
            tracing::warn!(
                "Ignoring remote {} for unknown schedule {}",
                kind,
                schedule_id
            );
            return RemoteOutcome::Anomaly(ReconciliationAnomaly { kind, schedule_id });
        }

        tracing::info!("Schedule {} changed by another user ({})", schedule_id, kind);
        self.events
            .push(StoreEvent::ChangedByOther { kind, schedule_id });
        RemoteOutcome::Applied
    }

    /// Record a change-feed connection state transition.
    pub fn set_feed_status(&mut self, status: FeedStatus) {
        if self.feed_status == status {
            return;
        }
        if status.needs_reconnect() {
            tracing::warn!("Change feed status: {:?}", status);
        } else {
            tracing::debug!("Change feed status: {:?}", status);
        }
        self.feed_status = status;
        self.events.push(StoreEvent::FeedStatusChanged { status });
    }

    /// Take every observable event raised since the last call.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    const WINDOW: Duration = Duration::from_secs(3);

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    fn schedule(id: &str) -> Schedule {
        Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 11:00"))
            .unwrap()
            .with_id(id)
            .with_driver("D1")
    }

    fn moved(schedule: &Schedule) -> Schedule {
        let mut moved = schedule.clone();
        moved.loading_at = at("2025-01-10 13:00");
        moved.delivery_at = at("2025-01-10 15:00");
        moved
    }

    fn store_with(schedules: Vec<Schedule>) -> OptimisticStore {
        let mut store = OptimisticStore::new(WINDOW);
        store.load(schedules);
        store
    }

    #[test]
    fn registry_markers_expire_lazily() {
        let t0 = Instant::now();
        let mut registry = SelfOperationRegistry::new(WINDOW);
        let id = ScheduleId::from("x");

        registry.mark(&id, ChangeKind::Update, t0);
        assert_eq!(registry.pending_len(t0 + Duration::from_secs(2)), 1);
        assert_eq!(registry.pending_len(t0 + WINDOW), 0);
        assert!(!registry.take_echo(&id, ChangeKind::Update, t0 + WINDOW));
    }

    #[test]
    fn registry_matches_on_id_and_kind() {
        let t0 = Instant::now();
        let mut registry = SelfOperationRegistry::new(WINDOW);
        let id = ScheduleId::from("x");

        registry.mark(&id, ChangeKind::Update, t0);
        assert!(!registry.take_echo(&id, ChangeKind::Delete, t0));
        assert!(!registry.take_echo(&ScheduleId::from("y"), ChangeKind::Update, t0));
        assert!(registry.take_echo(&id, ChangeKind::Update, t0));
        assert!(!registry.take_echo(&id, ChangeKind::Update, t0));
    }

    #[test]
    fn own_echo_within_window_is_suppressed() {
        let t0 = Instant::now();
        let original = schedule("x");
        let mut store = store_with(vec![original.clone()]);

        store
            .apply_local(LocalMutation::Update(moved(&original)), t0)
            .unwrap();
        let snapshot = store.schedules().to_vec();

        // a stale copy arriving as the echo must not clobber local state
        let outcome = store.apply_remote(
            RemoteChange::Update { schedule: original },
            t0 + Duration::from_secs(1),
        );

        assert_eq!(outcome, RemoteOutcome::Suppressed);
        assert_eq!(store.schedules(), snapshot.as_slice());
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn echo_after_expiry_is_applied_as_foreign_change() {
        let t0 = Instant::now();
        let original = schedule("x");
        let mut store = store_with(vec![original.clone()]);

        store
            .apply_local(LocalMutation::Update(moved(&original)), t0)
            .unwrap();
        let outcome = store.apply_remote(
            RemoteChange::Update {
                schedule: original.clone(),
            },
            t0 + Duration::from_millis(3_500),
        );

        assert_eq!(outcome, RemoteOutcome::Applied);
        assert_eq!(store.get(&original.id), Some(&original));
        assert_eq!(
            store.drain_events(),
            vec![StoreEvent::ChangedByOther {
                kind: ChangeKind::Update,
                schedule_id: original.id,
            }]
        );
    }

    #[test]
    fn foreign_change_is_applied_and_reported() {
        let t0 = Instant::now();
        let original = schedule("x");
        let mut store = store_with(vec![original.clone()]);

        let outcome = store.apply_remote(
            RemoteChange::Update {
                schedule: moved(&original),
            },
            t0,
        );
        assert_eq!(outcome, RemoteOutcome::Applied);
        assert_eq!(store.get(&original.id).unwrap().loading_at, at("2025-01-10 13:00"));
        assert_eq!(store.drain_events().len(), 1);
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn delete_after_delete_is_an_anomaly() {
        let t0 = Instant::now();
        let mut store = store_with(vec![schedule("x")]);
        let id = ScheduleId::from("x");

        assert_eq!(
            store.apply_remote(RemoteChange::Delete { id: id.clone() }, t0),
            RemoteOutcome::Applied
        );
        assert_eq!(
            store.apply_remote(RemoteChange::Delete { id: id.clone() }, t0),
            RemoteOutcome::Anomaly(ReconciliationAnomaly {
                kind: ChangeKind::Delete,
                schedule_id: id,
            })
        );
        assert!(store.is_empty());
        assert_eq!(store.drain_events().len(), 1);
    }

    #[test]
    fn remote_insert_appends() {
        let mut store = store_with(vec![]);
        let outcome = store.apply_remote(
            RemoteChange::Insert {
                schedule: schedule("new"),
            },
            Instant::now(),
        );
        assert_eq!(outcome, RemoteOutcome::Applied);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rollback_restores_update_and_drops_marker() {
        let t0 = Instant::now();
        let original = schedule("x");
        let mut store = store_with(vec![original.clone()]);

        let rollback = store
            .apply_local(LocalMutation::Update(moved(&original)), t0)
            .unwrap();
        assert_eq!(store.pending_self_operations(t0), 1);

        store.rollback(rollback);
        assert_eq!(store.get(&original.id), Some(&original));
        assert_eq!(store.pending_self_operations(t0), 0);
    }

    #[test]
    fn rollback_keeps_unrelated_remote_changes() {
        let t0 = Instant::now();
        let x = schedule("x");
        let y = schedule("y");
        let mut store = store_with(vec![x.clone(), y.clone()]);

        let rollback = store.apply_local(LocalMutation::Update(moved(&x)), t0).unwrap();
        store.apply_remote(RemoteChange::Update { schedule: moved(&y) }, t0);
        store.rollback(rollback);

        assert_eq!(store.get(&x.id), Some(&x));
        assert_eq!(store.get(&y.id), Some(&moved(&y)));
    }

    #[test]
    fn rollback_of_delete_reinserts_in_place() {
        let t0 = Instant::now();
        let mut store = store_with(vec![schedule("a"), schedule("b"), schedule("c")]);

        let rollback = store
            .apply_local(LocalMutation::Delete(ScheduleId::from("b")), t0)
            .unwrap();
        assert_eq!(store.len(), 2);
        store.rollback(rollback);

        let ids: Vec<&str> = store.schedules().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn rollback_of_insert_removes_row() {
        let t0 = Instant::now();
        let mut store = store_with(vec![]);
        let rollback = store
            .apply_local(LocalMutation::Insert(schedule("n")), t0)
            .unwrap();
        assert!(store
            .apply_local(LocalMutation::Insert(schedule("n")), t0)
            .is_err());
        store.rollback(rollback);
        assert!(store.is_empty());
    }

    #[test]
    fn local_update_of_unknown_schedule_fails_without_marker() {
        let t0 = Instant::now();
        let mut store = store_with(vec![]);
        let result = store.apply_local(LocalMutation::Update(schedule("ghost")), t0);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.pending_self_operations(t0), 0);
    }

    #[test]
    fn feed_status_changes_are_reported_once() {
        let mut store = store_with(vec![]);
        store.set_feed_status(FeedStatus::Subscribed);
        store.set_feed_status(FeedStatus::Subscribed);
        store.set_feed_status(FeedStatus::TimedOut);
        assert_eq!(store.feed_status(), FeedStatus::TimedOut);
        assert_eq!(
            store.drain_events(),
            vec![
                StoreEvent::FeedStatusChanged {
                    status: FeedStatus::Subscribed
                },
                StoreEvent::FeedStatusChanged {
                    status: FeedStatus::TimedOut
                },
            ]
        );
    }
}
