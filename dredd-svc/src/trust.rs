//! Trust score arithmetic
//!
//! Pure update rules for the per-agent trust score. Scores live in [0,1] and
//! are clamped after every operation. Wrong decisions degrade trust at twice
//! the rate correct ones build it.

/// Returns the trust score increment for a given severity.
pub fn signal_weight(severity: &str) -> f64 {
    match severity {
        "routine" => 0.01,
        "significant" => 0.03,
        "critical" => 0.05,
        _ => 0.01,
    }
}

/// Returns the scaling factor for the owner's sentiment state at signal time.
/// flow=1.0, stressed=0.7, frustrated=0.5, unknown/empty=1.0.
pub fn sentiment_modifier(sentiment: &str) -> f64 {
    match sentiment {
        "flow" => 1.0,
        "stressed" => 0.7,
        "frustrated" => 0.5,
        _ => 1.0,
    }
}

/// Calculates the new trust score after a signal.
///
/// new_score = old_score + (signal_weight x sentiment_modifier x direction),
/// where direction is +1 for correct and -2 for wrong.
pub fn update_score(current: f64, severity: &str, correct: bool, sentiment: &str) -> f64 {
    let weight = signal_weight(severity) * sentiment_modifier(sentiment);
    if correct {
        clamp(current + weight)
    } else {
        clamp(current - weight * 2.0)
    }
}

/// Applies the cliff drop for a critical failure.
pub fn critical_failure_drop(current: f64) -> f64 {
    (current - 0.3).max(0.0)
}

/// Applies daily decay for stale trust scores. `decay_rate` is typically
/// 0.01; `days` is the number of days since the last signal.
pub fn decay_score(current: f64, decay_rate: f64, days: u32) -> f64 {
    let mut score = current;
    for _ in 0..days {
        score *= 1.0 - decay_rate;
    }
    clamp(score)
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn routine_correct_gains_one_weight() {
        let s = update_score(0.5, "routine", true, "flow");
        assert!((s - 0.51).abs() < EPS);
    }

    #[test]
    fn routine_wrong_loses_two_weights() {
        let s = update_score(0.5, "routine", false, "flow");
        assert!((s - 0.48).abs() < EPS);
    }

    #[test]
    fn stressed_significant_scales_weight() {
        // weight 0.03 * modifier 0.7 = 0.021
        let s = update_score(0.5, "significant", true, "stressed");
        assert!((s - 0.521).abs() < EPS);
    }

    #[test]
    fn one_wrong_undoes_two_corrects() {
        let mut s = 0.5;
        s = update_score(s, "routine", true, "flow");
        s = update_score(s, "routine", true, "flow");
        s = update_score(s, "routine", false, "flow");
        assert!((s - 0.5).abs() < 1e-3);

        // One correct then one wrong nets out to a single weight lost.
        let mut t = 0.5;
        t = update_score(t, "routine", true, "flow");
        t = update_score(t, "routine", false, "flow");
        assert!((t - 0.49).abs() < 1e-3);
    }

    #[test]
    fn gain_is_exactly_half_of_loss() {
        for &sev in &["routine", "significant", "critical", "unheard-of"] {
            for &sent in &["flow", "stressed", "frustrated", ""] {
                let s = 0.5;
                let gain = update_score(s, sev, true, sent) - s;
                let loss = s - update_score(s, sev, false, sent);
                assert!((2.0 * gain - loss).abs() < EPS, "sev={sev} sent={sent}");
            }
        }
    }

    #[test]
    fn score_stays_in_unit_interval() {
        assert_eq!(update_score(1.0, "critical", true, "flow"), 1.0);
        assert_eq!(update_score(0.0, "critical", false, "flow"), 0.0);
        assert_eq!(update_score(0.05, "critical", false, "flow"), 0.0);
    }

    #[test]
    fn unknown_severity_defaults_to_routine_weight() {
        assert_eq!(signal_weight("weird"), 0.01);
        assert_eq!(sentiment_modifier("weird"), 1.0);
        assert_eq!(sentiment_modifier(""), 1.0);
    }

    #[test]
    fn critical_cliff() {
        assert_eq!(critical_failure_drop(0.2), 0.0);
        assert!((critical_failure_drop(0.8) - 0.5).abs() < EPS);
    }

    #[test]
    fn decay_over_a_week() {
        let s = decay_score(1.0, 0.01, 7);
        assert!((s - 0.9321).abs() < 1e-4);
    }

    #[test]
    fn decay_zero_days_is_identity() {
        assert_eq!(decay_score(0.75, 0.01, 0), 0.75);
    }
}
