use crate::metrics::SCORE_MAX;
use crate::model::{ScoreRecord, SubScores};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge, Paragraph},
    Frame,
};

const BAR_COLORS: [Color; 5] = [
    Color::Green,
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::LightBlue,
];

/// Bars are drawn in tenths so half points stay visible.
fn bar_value(score: f64) -> u64 {
    (score.clamp(0.0, SCORE_MAX) * 10.0).round() as u64
}

/// Fraction of the estimate still remaining, for the countdown gauge.
pub fn countdown_ratio(remaining: u32, estimate: u32) -> f64 {
    if estimate == 0 {
        return 0.0;
    }
    (f64::from(remaining) / f64::from(estimate)).clamp(0.0, 1.0)
}

pub fn render_score_chart(f: &mut Frame, area: Rect, scores: Option<&ScoreRecord>) {
    let Some(scores) = scores else {
        let empty = Paragraph::new("No scores yet").block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sub-scores"),
        );
        f.render_widget(empty, area);
        return;
    };

    let bars: Vec<Bar> = SubScores::LABELS
        .iter()
        .zip(scores.sub_scores.as_array())
        .enumerate()
        .map(|(i, (label, value))| {
            Bar::default()
                .value(bar_value(value))
                .text_value(format!("{value:.1}"))
                .label(Line::from(*label))
                .style(Style::default().fg(BAR_COLORS[i]))
        })
        .collect();

    // Five bars share the inner width with a one-column gap.
    let inner_width = area.width.saturating_sub(2);
    let bar_width = (inner_width.saturating_sub(4) / 5).clamp(3, 14);

    let title = format!(
        "Sub-scores (total {:.1}/50, avg {:.2})",
        scores.total_score, scores.average_score
    );
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1)
        .value_style(Style::default().add_modifier(Modifier::BOLD))
        .max(bar_value(SCORE_MAX));
    f.render_widget(chart, area);
}

pub fn render_countdown(f: &mut Frame, area: Rect, remaining: u32, estimate: u32, status: &str) {
    let label = if remaining == 0 {
        "finishing up…".to_string()
    } else {
        format!("~{remaining}s")
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(status.to_string()))
        .gauge_style(Style::default().fg(Color::Yellow))
        .ratio(countdown_ratio(remaining, estimate))
        .label(label);
    f.render_widget(gauge, area);
}
