//! src/triage/tone.rs

use clinicbot_common::models::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolarityBucket {
    Negative,
    Neutral,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrgencyBucket {
    Low,
    Medium,
    High,
}

impl PolarityBucket {
    fn of(polarity: f64) -> Self {
        if polarity < -0.1 {
            PolarityBucket::Negative
        } else if polarity > 0.1 {
            PolarityBucket::Positive
        } else {
            PolarityBucket::Neutral
        }
    }
}

impl UrgencyBucket {
    fn of(urgency: f64) -> Self {
        if urgency >= 0.7 {
            UrgencyBucket::High
        } else if urgency >= 0.4 {
            UrgencyBucket::Medium
        } else {
            UrgencyBucket::Low
        }
    }
}

/// Rows: polarity bucket. Columns: urgency bucket.
const TONE_TABLE: [[Tone; 3]; 3] = [
    // Negative
    [Tone::EmpatheticSupportive, Tone::EmpatheticUrgent, Tone::EmpatheticUrgent],
    // Neutral
    [Tone::NeutralInformative, Tone::EmpatheticSupportive, Tone::EmpatheticUrgent],
    // Positive
    [Tone::EncouragingInformative, Tone::NeutralInformative, Tone::EmpatheticUrgent],
];

pub fn suggest_tone(polarity: f64, urgency: f64) -> Tone {
    let row = match PolarityBucket::of(polarity) {
        PolarityBucket::Negative => 0,
        PolarityBucket::Neutral => 1,
        PolarityBucket::Positive => 2,
    };
    let col = match UrgencyBucket::of(urgency) {
        UrgencyBucket::Low => 0,
        UrgencyBucket::Medium => 1,
        UrgencyBucket::High => 2,
    };
    TONE_TABLE[row][col]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_urgency_is_always_urgent() {
        for polarity in [-1.0, 0.0, 1.0] {
            assert_eq!(suggest_tone(polarity, 1.0), Tone::EmpatheticUrgent);
        }
    }

    #[test]
    fn calm_questions_get_informative_tone() {
        assert_eq!(suggest_tone(0.0, 0.0), Tone::NeutralInformative);
        assert_eq!(suggest_tone(0.6, 0.1), Tone::EncouragingInformative);
    }

    #[test]
    fn negative_low_urgency_is_supportive() {
        assert_eq!(suggest_tone(-0.5, 0.2), Tone::EmpatheticSupportive);
    }
}
