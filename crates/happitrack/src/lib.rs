//! Daily mood check-ins: weighted happiness scoring, canned tips, and a
//! per-user score history with CSV export.

pub mod config;
pub mod error;
pub mod history;
pub mod mood;
pub mod notify;
pub mod router;
pub mod service;
pub mod telemetry;

pub use router::mood_router;
pub use service::{CheckInOutcome, HistoryView, MoodService, ServiceError};
