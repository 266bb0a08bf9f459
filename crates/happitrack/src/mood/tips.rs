use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::scorer::Score;

/// Fallback message for scores that land in no bucket.
pub const DEFAULT_TIP: &str = "Keep going, you've got this!";

/// Score range mapped to a tip category. Upper bounds are inclusive, so the
/// buckets cover `[0, 100]` without gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TipBucket {
    Low,
    Mid,
    High,
}

impl TipBucket {
    pub fn for_score(score: f64) -> Option<Self> {
        if !(0.0..=100.0).contains(&score) {
            None
        } else if score <= 40.0 {
            Some(TipBucket::Low)
        } else if score <= 70.0 {
            Some(TipBucket::Mid)
        } else {
            Some(TipBucket::High)
        }
    }

    pub fn tips(self) -> &'static [&'static str] {
        match self {
            TipBucket::Low => &[
                "Rough day? Start small: list 3 things you're grateful for.",
                "Feeling low? A deep breath and one kind act can shift things.",
            ],
            TipBucket::Mid => &[
                "Room to grow! Try a 10-min walk or call a buddy.",
                "Solid base. Add a gratitude journal for that extra boost.",
            ],
            TipBucket::High => &[
                "You're glowing! Keep nurturing those connections.",
                "High vibes! Share your win with someone to amplify it.",
            ],
        }
    }
}

/// Picks a tip for `score` using the thread-local RNG.
pub fn tip(score: Score) -> &'static str {
    tip_with(score.value(), &mut rand::thread_rng())
}

pub fn tip_with<R: Rng + ?Sized>(score: f64, rng: &mut R) -> &'static str {
    TipBucket::for_score(score)
        .and_then(|bucket| bucket.tips().choose(rng).copied())
        .unwrap_or(DEFAULT_TIP)
}
