//! haulboard-core - Core library for Haulboard
//!
//! This crate contains the schedule models and the scheduling core shared by
//! every Haulboard front end: conflict detection, multi-day segmentation,
//! lane layout, move validation, optimistic reconciliation with the change
//! feed, bounded undo, and the move state machine. A `SQLite` adapter for the
//! persistence collaborator lives in [`db`].

pub mod config;
pub mod conflict;
pub mod controller;
pub mod db;
pub mod error;
pub mod export;
pub mod feed;
pub mod layout;
pub mod models;
pub mod persistence;
pub mod segment;
pub mod store;
pub mod time_math;
pub mod undo;
pub mod util;
pub mod validation;

pub use config::CoreConfig;
pub use conflict::{ConflictCheck, ConflictDetail, ConflictDetector, Severity};
pub use controller::{CommitOutcome, Key, MoveController, MoveState, MoveStep, Pointer};
pub use error::{CommitError, Error, Result};
pub use feed::{ChangeKind, FeedStatus, RemoteChange};
pub use models::{Placement, ResourceAxis, Schedule, ScheduleId, SchedulePatch};
pub use persistence::{InMemoryPersistence, Persistence};
pub use segment::ScheduleSegment;
pub use store::{OptimisticStore, RemoteOutcome, StoreEvent};
pub use undo::{UndoLedger, UndoOperation};
pub use validation::{MoveValidator, ValidationReport};
