//! Persistence collaborator boundary.
//!
//! The controller's only I/O goes through [`Persistence`]. Every method is
//! async and reports failures as [`CommitError`] so the caller can roll back
//! its optimistic state.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::CommitError;
use crate::models::{Schedule, ScheduleId, SchedulePatch};

/// Result of a commit against the persistence collaborator
pub type CommitResult<T> = std::result::Result<T, CommitError>;

/// Remote table store for schedules
#[allow(async_fn_in_trait)]
pub trait Persistence {
    /// Insert a new row and return it as stored
    async fn commit_create(&self, schedule: &Schedule) -> CommitResult<Schedule>;

    /// Apply a partial update and return the stored row
    async fn commit_update(&self, id: &ScheduleId, patch: &SchedulePatch)
        -> CommitResult<Schedule>;

    /// Delete a row
    async fn commit_delete(&self, id: &ScheduleId) -> CommitResult<()>;
}

/// In-process store with failure injection.
///
/// Useful as a stand-in for the remote store in tests and offline tools.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    rows: RefCell<HashMap<ScheduleId, Schedule>>,
    fail_next: RefCell<Option<CommitError>>,
    commits: RefCell<usize>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `schedules`.
    pub fn with_schedules(schedules: impl IntoIterator<Item = Schedule>) -> Self {
        let store = Self::new();
        store.rows.borrow_mut().extend(
            schedules
                .into_iter()
                .map(|schedule| (schedule.id.clone(), schedule)),
        );
        store
    }

    /// Make the next commit fail with `error`.
    pub fn fail_next(&self, error: CommitError) {
        *self.fail_next.borrow_mut() = Some(error);
    }

    pub fn get(&self, id: &ScheduleId) -> Option<Schedule> {
        self.rows.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    /// Number of commit attempts, failed ones included
    pub fn commit_count(&self) -> usize {
        *self.commits.borrow()
    }

    fn begin(&self) -> CommitResult<()> {
        *self.commits.borrow_mut() += 1;
        self.fail_next.borrow_mut().take().map_or(Ok(()), Err)
    }
}

impl Persistence for InMemoryPersistence {
    async fn commit_create(&self, schedule: &Schedule) -> CommitResult<Schedule> {
        self.begin()?;
        let mut rows = self.rows.borrow_mut();
        if rows.contains_key(&schedule.id) {
            return Err(CommitError::Constraint(format!(
                "duplicate schedule id {}",
                schedule.id
            )));
        }
        rows.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule.clone())
    }

    async fn commit_update(
        &self,
        id: &ScheduleId,
        patch: &SchedulePatch,
    ) -> CommitResult<Schedule> {
        self.begin()?;
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .get_mut(id)
            .ok_or_else(|| CommitError::NotFound(id.to_string()))?;

        let mut updated = row.clone();
        patch
            .apply(&mut updated)
            .map_err(|error| CommitError::Constraint(error.to_string()))?;
        updated.touch();
        *row = updated.clone();
        Ok(updated)
    }

    async fn commit_delete(&self, id: &ScheduleId) -> CommitResult<()> {
        self.begin()?;
        self.rows
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CommitError::NotFound(id.to_string()))
    }
}
