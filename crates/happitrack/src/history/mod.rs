//! Per-user score history: persistence, aggregates, and CSV export.

pub mod domain;
pub mod export;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod summary;

pub use domain::{LogEntry, NewUser, Role, User, UserId};
pub use export::{export_csv, write_csv, ExportError, EXPORT_FILE_NAME};
pub use memory::MemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;
pub use store::{HistoryStore, LogStore, StoreError, UserDirectory};
pub use summary::{average_score, HistorySummary};
