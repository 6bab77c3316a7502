//! Exponential temporal decay: down-weight older results, grounded on
//! `original_source/.../graph/search/hybrid_search.py`'s
//! `apply_temporal_decay` call (spec.md §4.5 step "Temporal decay").

use chrono::{DateTime, Utc};

/// Decay `score` by the age of `created_at` relative to `now`, using an
/// exponential half-life: after `half_life_days`, the score is halved;
/// after two half-lives, quartered, and so on.
pub fn apply_temporal_decay(
    score: f64,
    created_at: DateTime<Utc>,
    half_life_days: f64,
    now: DateTime<Utc>,
) -> f64 {
    if half_life_days <= 0.0 {
        return score;
    }
    let age_days = (now - created_at).num_seconds() as f64 / 86_400.0;
    if age_days <= 0.0 {
        return score;
    }
    let decay = 0.5_f64.powf(age_days / half_life_days);
    score * decay
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn no_decay_for_brand_new_result() {
        let now = Utc::now();
        let decayed = apply_temporal_decay(1.0, now, 30.0, now);
        assert!((decayed - 1.0).abs() < 1e-9);
    }

    #[test]
    fn score_halves_after_one_half_life() {
        let now = Utc::now();
        let created_at = now - Duration::days(30);
        let decayed = apply_temporal_decay(1.0, created_at, 30.0, now);
        assert!((decayed - 0.5).abs() < 1e-6);
    }

    #[test]
    fn score_quarters_after_two_half_lives() {
        let now = Utc::now();
        let created_at = now - Duration::days(60);
        let decayed = apply_temporal_decay(1.0, created_at, 30.0, now);
        assert!((decayed - 0.25).abs() < 1e-6);
    }
}
