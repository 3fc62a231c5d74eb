//! Move state machine for drag and keyboard edits.
//!
//! ```text
//! Idle ──pointer/Enter──▶ Dragging | KeyboardMoving
//!   ▲                         │ drop / Enter
//!   │            ┌────────────┴─────────────┐
//!   │     conflicts found             no conflicts
//!   │            ▼                          │
//!   ├── AwaitingConfirmation ──confirm──▶ Committing ──commit()──▶ Idle
//!   └──────── cancel / Escape
//! ```
//!
//! Input handlers are synchronous and never touch persistence. Only
//! [`MoveController::commit`] and [`MoveController::undo`] await the
//! persistence collaborator.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::conflict::{ConflictCheck, ConflictDetector};
use crate::error::{CommitError, Error, Result};
use crate::feed::RemoteChange;
use crate::models::{Placement, ResourceAxis, Schedule, ScheduleId, SchedulePatch};
use crate::persistence::{CommitResult, Persistence};
use crate::store::{LocalMutation, OptimisticStore, RemoteOutcome, Rollback};
use crate::time_math::snap_to_grid;
use crate::undo::{OperationId, OperationKind, UndoLedger, UndoOperation};
use crate::validation::{MoveValidator, ValidationReport};

/// Pointer position in board pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

impl Pointer {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Keys the board reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    Up,
    Down,
    Left,
    Right,
}

/// A pointer press that may turn into a drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub schedule_id: ScheduleId,
    pub origin: Pointer,
    pub original: Placement,
    pub candidate: Placement,
    /// Whether the pointer has travelled past the drag threshold
    pub active: bool,
    pub conflicts: ConflictCheck,
}

/// A keyboard-driven move of the focused schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardSession {
    pub schedule_id: ScheduleId,
    pub original: Placement,
    pub candidate: Placement,
    pub conflicts: ConflictCheck,
}

/// A validated move waiting for confirmation or commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub schedule_id: ScheduleId,
    pub before: Schedule,
    pub after: Schedule,
    pub conflicts: ConflictCheck,
}

/// A move applied optimistically and waiting for the store.
///
/// The undo entry is only recorded once the store accepts the write.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightMove {
    pub pending: PendingMove,
    rollback: Rollback,
}

/// Controller state. Exactly one interaction can be in progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MoveState {
    #[default]
    Idle,
    Dragging(DragSession),
    KeyboardMoving(KeyboardSession),
    AwaitingConfirmation(PendingMove),
    Committing(InFlightMove),
}

impl MoveState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dragging(_) => "dragging",
            Self::KeyboardMoving(_) => "keyboard_moving",
            Self::AwaitingConfirmation(_) => "awaiting_confirmation",
            Self::Committing(_) => "committing",
        }
    }
}

/// What an input did.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveStep {
    /// Input had no meaning in the current state
    Ignored,
    /// A commit is in flight; input dropped
    Busy,
    /// A drag press or keyboard move began
    Started,
    /// Candidate placement changed; highlighted set updated
    Preview(Placement),
    /// Candidate equals the current placement; back to idle
    NoOp,
    /// Candidate broke a rule; back to idle
    Invalid(ValidationReport),
    /// Candidate overlaps other schedules; waiting for `confirm`/`cancel`
    NeedsConfirmation(ConflictCheck),
    /// Optimistic mutation applied; call `commit`
    ReadyToCommit,
    /// Interaction discarded without mutation
    Cancelled,
}

/// Result of a successful commit or undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The move is stored; `undo` identifies its ledger entry
    Committed { undo: OperationId, schedule: Schedule },
    /// The most recent operation was reverted
    Undone(UndoOperation),
    NothingToUndo,
}

/// Ties validation, conflict detection, the optimistic store and the undo
/// ledger together for one board.
#[derive(Debug)]
pub struct MoveController {
    config: CoreConfig,
    validator: MoveValidator,
    detector: ConflictDetector,
    store: OptimisticStore,
    undo: UndoLedger,
    state: MoveState,
    highlighted: HashSet<ScheduleId>,
}

impl MoveController {
    pub fn new(config: CoreConfig, store: OptimisticStore, undo: UndoLedger) -> Result<Self> {
        config.validate()?;
        let validator = MoveValidator::new(&config.validation)?;
        let detector = ConflictDetector::new(config.severity);
        Ok(Self {
            config,
            validator,
            detector,
            store,
            undo,
            state: MoveState::Idle,
            highlighted: HashSet::new(),
        })
    }

    /// A controller with a fresh store and ledger sized from `config`.
    pub fn from_config(config: CoreConfig) -> Result<Self> {
        let store = OptimisticStore::new(config.echo_window());
        let undo = UndoLedger::new(config.undo_capacity);
        Self::new(config, store, undo)
    }

    pub const fn state(&self) -> &MoveState {
        &self.state
    }

    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub const fn store(&self) -> &OptimisticStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut OptimisticStore {
        &mut self.store
    }

    /// Schedules to highlight as conflicting with the current candidate.
    pub const fn highlighted(&self) -> &HashSet<ScheduleId> {
        &self.highlighted
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn undo_history_size(&self) -> usize {
        self.undo.history_size()
    }

    /// Placement to render for the schedule being moved, if any.
    pub fn preview(&self) -> Option<(&ScheduleId, Placement)> {
        match &self.state {
            MoveState::Dragging(session) if session.active => {
                Some((&session.schedule_id, session.candidate))
            }
            MoveState::KeyboardMoving(session) => Some((&session.schedule_id, session.candidate)),
            MoveState::AwaitingConfirmation(pending) => {
                Some((&pending.schedule_id, Placement::of(&pending.after)))
            }
            _ => None,
        }
    }

    /// Feed a change-feed event into the store.
    pub fn handle_remote(&mut self, change: RemoteChange, now: Instant) -> RemoteOutcome {
        self.store.apply_remote(change, now)
    }

    /// Press on a schedule block.
    pub fn pointer_down(&mut self, schedule_id: &ScheduleId, pointer: Pointer) -> MoveStep {
        match self.state {
            MoveState::Idle => {}
            MoveState::Committing(_) => return MoveStep::Busy,
            _ => return MoveStep::Ignored,
        }
        let Some(schedule) = self.store.get(schedule_id) else {
            return MoveStep::Ignored;
        };

        let original = Placement::of(schedule);
        self.state = MoveState::Dragging(DragSession {
            schedule_id: schedule_id.clone(),
            origin: pointer,
            original,
            candidate: original,
            active: false,
            conflicts: ConflictCheck::none(),
        });
        MoveStep::Started
    }

    /// Pointer travel while pressed.
    pub fn pointer_move(&mut self, pointer: Pointer) -> MoveStep {
        let session = match &self.state {
            MoveState::Dragging(session) => session,
            MoveState::Committing(_) => return MoveStep::Busy,
            _ => return MoveStep::Ignored,
        };

        let dx = pointer.x - session.origin.x;
        let dy = pointer.y - session.origin.y;
        if !session.active && dx.hypot(dy) <= self.config.drag_threshold_px {
            return MoveStep::Ignored;
        }

        let (days, minutes) = self.drag_delta(dx, dy);
        let candidate = session.original.shifted_days(days).shifted_minutes(minutes);
        let schedule_id = session.schedule_id.clone();
        let conflicts = self.conflicts_for(&schedule_id, &candidate);
        self.set_highlighted(&conflicts);

        if let MoveState::Dragging(session) = &mut self.state {
            if !session.active {
                tracing::debug!("Drag started on schedule {}", session.schedule_id);
            }
            session.active = true;
            session.candidate = candidate;
            session.conflicts = conflicts;
        }
        MoveStep::Preview(candidate)
    }

    /// Release the pointer.
    pub fn pointer_up(&mut self, now: Instant) -> MoveStep {
        match std::mem::take(&mut self.state) {
            MoveState::Dragging(session) if session.active => {
                self.attempt(&session.schedule_id, session.candidate, now)
            }
            MoveState::Dragging(_) => {
                self.clear_highlight();
                MoveStep::NoOp
            }
            state @ MoveState::Committing(_) => {
                self.state = state;
                MoveStep::Busy
            }
            state => {
                self.state = state;
                MoveStep::Ignored
            }
        }
    }

    /// Keyboard input. `focused` is the block with keyboard focus, if any.
    pub fn key(&mut self, key: Key, focused: Option<&ScheduleId>, now: Instant) -> MoveStep {
        if matches!(self.state, MoveState::Committing(_)) {
            return MoveStep::Busy;
        }
        if key == Key::Escape {
            return self.cancel();
        }

        match (&self.state, key) {
            (MoveState::Idle, Key::Enter) => {
                let Some(schedule) = focused.and_then(|id| self.store.get(id)) else {
                    return MoveStep::Ignored;
                };
                let original = Placement::of(schedule);
                tracing::debug!("Keyboard move started on schedule {}", schedule.id);
                self.state = MoveState::KeyboardMoving(KeyboardSession {
                    schedule_id: schedule.id.clone(),
                    original,
                    candidate: original,
                    conflicts: ConflictCheck::none(),
                });
                MoveStep::Started
            }
            (MoveState::KeyboardMoving(session), Key::Enter) => {
                let schedule_id = session.schedule_id.clone();
                let candidate = session.candidate;
                self.state = MoveState::Idle;
                self.attempt(&schedule_id, candidate, now)
            }
            (MoveState::KeyboardMoving(session), arrow) => {
                let grid = i64::from(self.config.grid_minutes);
                let candidate = match arrow {
                    Key::Up => session.candidate.shifted_minutes(-grid),
                    Key::Down => session.candidate.shifted_minutes(grid),
                    Key::Left => session.candidate.shifted_days(-1),
                    Key::Right => session.candidate.shifted_days(1),
                    Key::Enter | Key::Escape => return MoveStep::Ignored,
                };
                let schedule_id = session.schedule_id.clone();
                let conflicts = self.conflicts_for(&schedule_id, &candidate);
                self.set_highlighted(&conflicts);
                if let MoveState::KeyboardMoving(session) = &mut self.state {
                    session.candidate = candidate;
                    session.conflicts = conflicts;
                }
                MoveStep::Preview(candidate)
            }
            _ => MoveStep::Ignored,
        }
    }

    /// Move a schedule straight to `placement`, e.g. from an edit form.
    pub fn propose(
        &mut self,
        schedule_id: &ScheduleId,
        placement: Placement,
        now: Instant,
    ) -> MoveStep {
        match self.state {
            MoveState::Idle => self.attempt(schedule_id, placement, now),
            MoveState::Committing(_) => MoveStep::Busy,
            _ => MoveStep::Ignored,
        }
    }

    /// Accept the conflict prompt and proceed to commit.
    pub fn confirm(&mut self, now: Instant) -> MoveStep {
        match std::mem::take(&mut self.state) {
            MoveState::AwaitingConfirmation(pending) => {
                tracing::info!(
                    "Committing schedule {} despite {}",
                    pending.schedule_id,
                    pending.conflicts.summary
                );
                self.begin_commit(pending, now)
            }
            state @ MoveState::Committing(_) => {
                self.state = state;
                MoveStep::Busy
            }
            state => {
                self.state = state;
                MoveStep::Ignored
            }
        }
    }

    /// Abandon whatever interaction is in progress before commit.
    pub fn cancel(&mut self) -> MoveStep {
        match &self.state {
            MoveState::Idle => MoveStep::Ignored,
            MoveState::Committing(_) => MoveStep::Busy,
            MoveState::Dragging(_)
            | MoveState::KeyboardMoving(_)
            | MoveState::AwaitingConfirmation(_) => {
                tracing::debug!("Cancelled {}", self.state.name());
                self.state = MoveState::Idle;
                self.clear_highlight();
                MoveStep::Cancelled
            }
        }
    }

    /// Send the in-flight move to the persistence collaborator.
    ///
    /// The undo entry is recorded once the write succeeds. On failure the
    /// optimistic mutation is rolled back and the ledger is left alone.
    pub async fn commit(&mut self, persistence: &impl Persistence) -> Result<CommitOutcome> {
        let MoveState::Committing(in_flight) = &self.state else {
            return Err(Error::InvalidState(format!(
                "no move to commit while {}",
                self.state.name()
            )));
        };

        let patch = SchedulePatch::between(&in_flight.pending.before, &in_flight.pending.after);
        let result = persistence
            .commit_update(&in_flight.pending.schedule_id, &patch)
            .await;

        let MoveState::Committing(in_flight) = std::mem::take(&mut self.state) else {
            return Err(Error::InvalidState("commit lost its in-flight move".to_string()));
        };
        self.clear_highlight();

        match result {
            Ok(stored) => {
                tracing::info!("Moved schedule {}", stored.id);
                self.store.confirm(stored.clone());
                let undo = self.undo.record(
                    OperationKind::Move,
                    in_flight.pending.schedule_id,
                    Some(in_flight.pending.before),
                    Some(stored.clone()),
                );
                Ok(CommitOutcome::Committed {
                    undo,
                    schedule: stored,
                })
            }
            Err(error) => {
                tracing::warn!(
                    "Commit of schedule {} failed: {}",
                    in_flight.pending.schedule_id,
                    error
                );
                self.store.rollback(in_flight.rollback);
                Err(Error::Commit(error))
            }
        }
    }

    /// Revert the most recent operation and commit the restored state.
    ///
    /// If the commit fails the restore is rolled back and the operation goes
    /// back on the ledger so it can be retried.
    pub async fn undo(
        &mut self,
        persistence: &impl Persistence,
        now: Instant,
    ) -> Result<CommitOutcome> {
        if !matches!(self.state, MoveState::Idle) {
            return Err(Error::InvalidState(format!(
                "cannot undo while {}",
                self.state.name()
            )));
        }
        let Some(operation) = self.undo.undo() else {
            return Ok(CommitOutcome::NothingToUndo);
        };

        let mutation = match self.restore_mutation(&operation) {
            Ok(mutation) => mutation,
            Err(error) => {
                tracing::warn!("Dropping undo of schedule {}: {}", operation.schedule_id, error);
                return Err(error);
            }
        };
        let current = self.store.get(&operation.schedule_id).cloned();
        let rollback = self.store.apply_local(mutation.clone(), now)?;

        let result = commit_mutation(persistence, &mutation, current.as_ref()).await;
        match result {
            Ok(stored) => {
                if let Some(stored) = stored {
                    self.store.confirm(stored);
                }
                tracing::info!("Undid {:?} on schedule {}", operation.kind, operation.schedule_id);
                Ok(CommitOutcome::Undone(operation))
            }
            Err(error) => {
                tracing::warn!(
                    "Undo of schedule {} failed: {}",
                    operation.schedule_id,
                    error
                );
                self.store.rollback(rollback);
                self.undo.push(operation);
                Err(Error::Commit(error))
            }
        }
    }

    fn restore_mutation(&self, operation: &UndoOperation) -> Result<LocalMutation> {
        let exists = self.store.get(&operation.schedule_id).is_some();
        match (&operation.before, exists) {
            (Some(before), true) => {
                let mut restored = before.clone();
                restored.touch();
                Ok(LocalMutation::Update(restored))
            }
            (Some(before), false) if operation.kind == OperationKind::Delete => {
                Ok(LocalMutation::Insert(before.clone()))
            }
            (None, true) => Ok(LocalMutation::Delete(operation.schedule_id.clone())),
            _ => Err(Error::NotFound(operation.schedule_id.to_string())),
        }
    }

    fn attempt(&mut self, schedule_id: &ScheduleId, candidate: Placement, now: Instant) -> MoveStep {
        self.state = MoveState::Idle;
        let Some(before) = self.store.get(schedule_id).cloned() else {
            tracing::debug!("Schedule {} vanished before commit", schedule_id);
            self.clear_highlight();
            return MoveStep::Cancelled;
        };

        if Placement::of(&before) == candidate {
            self.clear_highlight();
            return MoveStep::NoOp;
        }

        let report = self.validator.validate_placement(&candidate);
        if !report.valid {
            tracing::debug!(
                "Rejected move of schedule {}: {}",
                schedule_id,
                report.summary()
            );
            self.clear_highlight();
            return MoveStep::Invalid(report);
        }

        let conflicts = self.conflicts_for(schedule_id, &candidate);
        let mut after = candidate.apply_to(&before);
        after.touch();
        let pending = PendingMove {
            schedule_id: schedule_id.clone(),
            before,
            after,
            conflicts,
        };

        if pending.conflicts.has_conflict {
            self.set_highlighted(&pending.conflicts);
            let check = pending.conflicts.clone();
            self.state = MoveState::AwaitingConfirmation(pending);
            return MoveStep::NeedsConfirmation(check);
        }
        self.begin_commit(pending, now)
    }

    fn begin_commit(&mut self, pending: PendingMove, now: Instant) -> MoveStep {
        match self
            .store
            .apply_local(LocalMutation::Update(pending.after.clone()), now)
        {
            Ok(rollback) => {
                self.state = MoveState::Committing(InFlightMove { pending, rollback });
                MoveStep::ReadyToCommit
            }
            Err(error) => {
                tracing::warn!(
                    "Could not apply move of schedule {}: {}",
                    pending.schedule_id,
                    error
                );
                self.state = MoveState::Idle;
                self.clear_highlight();
                MoveStep::Cancelled
            }
        }
    }

    fn conflicts_for(&self, schedule_id: &ScheduleId, candidate: &Placement) -> ConflictCheck {
        self.store.get(schedule_id).map_or_else(ConflictCheck::none, |schedule| {
            self.detector.check_placement(
                schedule,
                candidate,
                self.store.schedules(),
                &ResourceAxis::ALL,
            )
        })
    }

    /// Pointer travel converted to whole days and grid-snapped minutes.
    #[allow(clippy::cast_possible_truncation)]
    fn drag_delta(&self, dx: f64, dy: f64) -> (i64, i64) {
        let days = if self.config.day_width_px > 0.0 {
            (dx / self.config.day_width_px).round() as i64
        } else {
            0
        };
        let minutes = (dy * self.config.minutes_per_px()).round() as i64;
        (days, snap_to_grid(minutes, self.config.grid_minutes))
    }

    fn set_highlighted(&mut self, conflicts: &ConflictCheck) {
        self.highlighted = conflicts.conflicting_ids().cloned().collect();
    }

    fn clear_highlight(&mut self) {
        self.highlighted.clear();
    }
}

async fn commit_mutation(
    persistence: &impl Persistence,
    mutation: &LocalMutation,
    current: Option<&Schedule>,
) -> CommitResult<Option<Schedule>> {
    match mutation {
        LocalMutation::Insert(schedule) => persistence.commit_create(schedule).await.map(Some),
        LocalMutation::Update(schedule) => {
            let current = current.ok_or_else(|| CommitError::NotFound(schedule.id.to_string()))?;
            let patch = SchedulePatch::between(current, schedule);
            persistence.commit_update(&schedule.id, &patch).await.map(Some)
        }
        LocalMutation::Delete(id) => persistence.commit_delete(id).await.map(|()| None),
    }
}
