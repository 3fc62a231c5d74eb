//! Data models for Haulboard

mod placement;
mod schedule;

pub use placement::{shift_date, Placement, ResourceAxis};
pub use schedule::{Schedule, ScheduleId, SchedulePatch};
