use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("While typing:"),
        key_line("Enter", 7, "Search student / load video"),
        key_line("Tab", 9, "Switch between student id and video path"),
        key_line("Esc", 9, "Stop typing, enable shortcuts"),
        Line::from(""),
        Line::from("Shortcuts:"),
        key_line("i", 11, "Edit student id"),
        key_line("v", 11, "Edit video path"),
        key_line("s", 11, "Next sport"),
        key_line("p", 11, "Toggle pre-test / post-test"),
        key_line("a / F5", 6, "Start analysis"),
        key_line("r", 11, "Reset session"),
        key_line("e", 11, "Export last report as JSON"),
        key_line("y", 11, "Copy stored video URL to clipboard"),
        key_line("?", 11, "Show this help"),
        key_line("q / Ctrl-C", 2, "Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to close",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
