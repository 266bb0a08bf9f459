use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The five questions asked at every check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodField {
    Sleep,
    Exercise,
    Connections,
    Gratitude,
    Overall,
}

impl MoodField {
    pub const ALL: [MoodField; 5] = [
        MoodField::Sleep,
        MoodField::Exercise,
        MoodField::Connections,
        MoodField::Gratitude,
        MoodField::Overall,
    ];

    /// Form key used by the check-in endpoint.
    pub fn key(self) -> &'static str {
        match self {
            MoodField::Sleep => "sleep",
            MoodField::Exercise => "exercise",
            MoodField::Connections => "connections",
            MoodField::Gratitude => "gratitude",
            MoodField::Overall => "overall",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            MoodField::Sleep => "How well did you sleep? (0-10)",
            MoodField::Exercise => "How much did you move today? (0-5)",
            MoodField::Connections => "Connected with friends or family? (0-5)",
            MoodField::Gratitude => "Practiced gratitude? (0-5)",
            MoodField::Overall => "Overall day rating? (0-10)",
        }
    }

    pub fn rule(self) -> &'static FieldRule {
        // FIELD_RULES is indexed in `ALL` order.
        &FIELD_RULES[self as usize]
    }
}

/// Accepted range and fallback for one answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub field: MoodField,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub weight: f64,
}

/// Validation and weighting table for the check-in form. Weights sum to 1.0.
pub const FIELD_RULES: [FieldRule; 5] = [
    FieldRule {
        field: MoodField::Sleep,
        min: 0.0,
        max: 10.0,
        default: 0.0,
        weight: 0.20,
    },
    FieldRule {
        field: MoodField::Exercise,
        min: 0.0,
        max: 5.0,
        default: 0.0,
        weight: 0.25,
    },
    FieldRule {
        field: MoodField::Connections,
        min: 0.0,
        max: 5.0,
        default: 0.0,
        weight: 0.30,
    },
    FieldRule {
        field: MoodField::Gratitude,
        min: 0.0,
        max: 5.0,
        default: 0.0,
        weight: 0.15,
    },
    FieldRule {
        field: MoodField::Overall,
        min: 0.0,
        max: 10.0,
        default: 0.0,
        weight: 0.10,
    },
];

impl FieldRule {
    /// Missing, non-numeric and non-finite input fall back to the default;
    /// everything else is clamped into range.
    pub fn accept(&self, raw: Option<&str>) -> f64 {
        match raw.and_then(|value| value.trim().parse::<f64>().ok()) {
            Some(value) => self.clamp(value),
            None => self.default,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

/// Five validated answers, each inside its field's declared range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnswerSet {
    pub sleep: f64,
    pub exercise: f64,
    pub connections: f64,
    pub gratitude: f64,
    pub overall: f64,
}

impl AnswerSet {
    /// Builds an answer set from raw numbers, clamping each into range.
    pub fn new(sleep: f64, exercise: f64, connections: f64, gratitude: f64, overall: f64) -> Self {
        Self {
            sleep: MoodField::Sleep.rule().clamp(sleep),
            exercise: MoodField::Exercise.rule().clamp(exercise),
            connections: MoodField::Connections.rule().clamp(connections),
            gratitude: MoodField::Gratitude.rule().clamp(gratitude),
            overall: MoodField::Overall.rule().clamp(overall),
        }
    }

    pub fn from_form(form: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| form.get(key).map(String::as_str))
    }

    pub fn from_lookup<'a, F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let read = |field: MoodField| field.rule().accept(lookup(field.key()));
        Self {
            sleep: read(MoodField::Sleep),
            exercise: read(MoodField::Exercise),
            connections: read(MoodField::Connections),
            gratitude: read(MoodField::Gratitude),
            overall: read(MoodField::Overall),
        }
    }

    pub fn get(&self, field: MoodField) -> f64 {
        match field {
            MoodField::Sleep => self.sleep,
            MoodField::Exercise => self.exercise,
            MoodField::Connections => self.connections,
            MoodField::Gratitude => self.gratitude,
            MoodField::Overall => self.overall,
        }
    }
}

impl Default for AnswerSet {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
