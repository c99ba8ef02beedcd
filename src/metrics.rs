/// Bounds of a single sub-score.
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 10.0;
/// Reported totals within this distance of the computed ones are accepted silently.
pub const TOTAL_TOLERANCE: f64 = 0.05;

/// Sum of the sub-scores (0-50 for five in-scale values).
pub fn total(scores: &[f64]) -> f64 {
    scores.iter().sum()
}

/// Mean of the sub-scores, `None` when there are none.
pub fn average(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(total(scores) / scores.len() as f64)
}

/// Ensure `value` is a finite number on the 0-10 scale.
pub fn check_scale(label: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{label} score is not a number"));
    }
    if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
        return Err(format!(
            "{label} score {value} is outside {SCORE_MIN}-{SCORE_MAX}"
        ));
    }
    Ok(())
}

pub fn agrees(reported: f64, computed: f64) -> bool {
    (reported - computed).abs() <= TOTAL_TOLERANCE
}
