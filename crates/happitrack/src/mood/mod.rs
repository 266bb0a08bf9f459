//! Check-in scoring: answer validation, weighted score, and tip selection.

pub mod answers;
pub mod scorer;
pub mod tips;

pub use answers::{AnswerSet, FieldRule, MoodField, FIELD_RULES};
pub use scorer::{score, score_form, Score};
pub use tips::{tip, tip_with, TipBucket, DEFAULT_TIP};
