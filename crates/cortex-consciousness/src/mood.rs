//! Emotional/attention state
//!
//! Three bounded scalars nudged once per turn. Every field moves toward a
//! target derived from the reply, by at most `rate` per turn.

use serde::{Deserialize, Serialize};

const POSITIVE: &[&str] = &[
    "good", "great", "excellent", "amazing", "awesome", "happy", "glad", "thanks", "thank", "love", "nice",
    "perfect", "wonderful", "helpful", "success", "successfully", "interesting", "cool", "fantastic", "yes",
];

const NEGATIVE: &[&str] = &[
    "bad", "terrible", "awful", "sad", "angry", "hate", "wrong", "error", "failed", "failure", "fail", "problem",
    "sorry", "unfortunately", "cannot", "can't", "broken", "issue", "unable", "no",
];

/// Positive lexicon hits minus negative ones.
pub fn sentiment(text: &str) -> i32 {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| {
            let w = w.to_lowercase();
            if POSITIVE.contains(&w.as_str()) {
                1
            } else if NEGATIVE.contains(&w.as_str()) {
                -1
            } else {
                0
            }
        })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodLabel {
    Neutral,
    Curious,
    Enthusiastic,
    Thoughtful,
    Helpful,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub valence: f64,
    pub arousal: f64,
    pub focus: f64,
}

impl Default for Mood {
    fn default() -> Self {
        Self { valence: 0.5, arousal: 0.3, focus: 0.5 }
    }
}

/// What a turn's outcome feeds into the mood.
#[derive(Debug, Clone, Copy)]
pub struct MoodSignal<'a> {
    pub text: &'a str,
    /// One agent answered on its own.
    pub single_agent: bool,
}

impl Mood {
    pub fn update(&mut self, signal: MoodSignal<'_>, rate: f64, arousal_length_scale: f64) {
        let valence_target = 0.5 + 0.5 * (sentiment(signal.text) as f64).tanh();
        let arousal_target = (signal.text.chars().count() as f64 / arousal_length_scale).min(1.0);
        let focus_target = if signal.single_agent { 1.0 } else { 0.5 };

        self.valence = step(self.valence, valence_target, rate);
        self.arousal = step(self.arousal, arousal_target, rate);
        self.focus = step(self.focus, focus_target, rate);
    }

    pub fn label(&self) -> MoodLabel {
        match (self.valence, self.arousal, self.focus) {
            (v, a, _) if v >= 0.7 && a >= 0.6 => MoodLabel::Enthusiastic,
            (_, a, f) if f >= 0.8 && a >= 0.4 => MoodLabel::Focused,
            (v, _, _) if v >= 0.65 => MoodLabel::Helpful,
            (_, a, f) if a >= 0.6 && f < 0.6 => MoodLabel::Curious,
            (v, a, _) if v < 0.4 || (a < 0.2 && v < 0.55) => MoodLabel::Thoughtful,
            _ => MoodLabel::Neutral,
        }
    }

    pub fn snapshot(&self) -> MoodSnapshot {
        MoodSnapshot { valence: self.valence, arousal: self.arousal, focus: self.focus, label: self.label() }
    }
}

/// Move `current` toward `target` by at most `rate`, staying in `[0, 1]`.
fn step(current: f64, target: f64, rate: f64) -> f64 {
    let rate = rate.abs();
    let next = if (target - current).abs() <= rate {
        target
    } else {
        current + rate.copysign(target - current)
    };
    next.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodSnapshot {
    pub valence: f64,
    pub arousal: f64,
    pub focus: f64,
    pub label: MoodLabel,
}
