use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::answers::{AnswerSet, FIELD_RULES};

/// Happiness score in `[0, 100]`, rounded to one decimal place.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    pub const MIN: Score = Score(0.0);
    pub const MAX: Score = Score(100.0);

    /// Clamps into range and rounds to one decimal. Non-finite input maps to 0.
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self::MIN;
        }
        Score(round_one_decimal(value.clamp(0.0, 100.0)))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Weighted sum of the normalized answers, scaled to 100.
pub fn score(answers: &AnswerSet) -> Score {
    let total: f64 = FIELD_RULES
        .iter()
        .map(|rule| {
            let normalized = (answers.get(rule.field) / rule.max).clamp(0.0, 1.0);
            rule.weight * normalized
        })
        .sum();

    Score::new(total * 100.0)
}

/// Scores raw form input; invalid fields count as their default.
pub fn score_form(form: &HashMap<String, String>) -> Score {
    score(&AnswerSet::from_form(form))
}
