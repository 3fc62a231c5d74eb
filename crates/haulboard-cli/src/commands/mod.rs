pub mod add;
pub mod changes;
pub mod common;
pub mod conflicts;
pub mod delete;
pub mod export;
pub mod layout;
pub mod list;
pub mod move_schedule;
pub mod show;
