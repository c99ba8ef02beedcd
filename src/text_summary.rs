//! Text summary builder for CLI output.

use crate::model::{RunReport, SubScores};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn format_size(bytes: u64) -> String {
    let mib = bytes as f64 / (1024.0 * 1024.0);
    if mib >= 1.0 {
        format!("{mib:.1} MiB")
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

/// Build a text summary from a completed run report.
pub(crate) fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::new();
    let s = &report.student;
    lines.push(format!(
        "Student: {} ({} No. {}, id {})",
        s.full_name, s.grade_class, s.number, s.student_id
    ));
    lines.push(format!(
        "Sport: {} / {}",
        report.config.sport.display_name(),
        report.config.test_phase.display_name()
    ));
    lines.push(format!(
        "Video: {} ({}, {})",
        report.media.file_name,
        format_size(report.media.size),
        report.media.mime_type
    ));

    let scores = &report.scores;
    for (label, value) in SubScores::LABELS.iter().zip(scores.sub_scores.as_array()) {
        lines.push(format!("  {label:<12} {value:>4.1} / 10"));
    }
    lines.push(format!(
        "Total: {:.1} / 50   Average: {:.2}",
        scores.total_score, scores.average_score
    ));

    for (label, text) in [
        ("Strengths", &scores.strengths),
        ("Weaknesses", &scores.weaknesses),
        ("Suggestions", &scores.suggestions),
    ] {
        if !text.trim().is_empty() {
            lines.push(format!("{label}: {}", text.trim()));
        }
    }

    lines.push(format!(
        "Stored video: {}",
        report.stored_video_reference.as_deref().unwrap_or("-")
    ));
    TextSummary { lines }
}
