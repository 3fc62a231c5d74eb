//! Database layer for Haulboard

mod connection;
mod migrations;
mod persistence;
mod repository;

pub use connection::Database;
pub use persistence::{SqliteChangeFeed, SqlitePersistence};
pub use repository::{ChangeRecord, ScheduleRepository, SqliteScheduleRepository};
