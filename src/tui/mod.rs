mod charts;
mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::model::{ClientConfig, NoticeLevel, RunReport, WorkflowEvent, WorkflowState};
use crate::orchestrator::{self, AnalysisController, UiCommand, WorkflowSettings};
use crate::ports::Ports;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::{Field, KeyOutcome, UiState};
use std::path::PathBuf;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

pub async fn run(args: Cli, cfg: ClientConfig, log_path: Option<PathBuf>) -> Result<()> {
    let ports = Ports::from_config(&cfg).context("failed to initialise remote clients")?;

    // Unbounded channels avoid backpressure between the UI thread and the runtime.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = AnalysisController::new(ports, WorkflowSettings::from(&cfg), Some(event_tx));

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let estimate = cfg.estimate_secs;
    let export_json = args.export_json.clone();
    let ui_handle = std::thread::spawn(move || {
        run_threaded(UiState::new(estimate, export_json, log_path), event_rx, cmd_tx)
    });

    let res = orchestrator::run_controller(controller, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<WorkflowEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                WorkflowEvent::RunCompleted { report } => {
                    handle_run_completed(&mut state, *report);
                }
                other => state.apply_event(other),
            }
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match state.handle_key(k) {
                    KeyOutcome::Continue => {}
                    KeyOutcome::Command(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyOutcome::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    KeyOutcome::CopyUrl => copy_stored_url(&mut state),
                    KeyOutcome::ExportReport => export_last_report(&mut state),
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn handle_run_completed(state: &mut UiState, report: RunReport) {
    let processed = orchestrator::process_run_completion(state.export_json.as_deref(), &report);
    if let Some(path) = processed.exported_path.as_ref() {
        state.last_exported_path = Some(path.display().to_string());
    }
    state.apply_event(WorkflowEvent::RunCompleted {
        report: Box::new(report),
    });
    if !processed.export_messages.is_empty() {
        state.info = processed.export_messages.join("; ");
    }
}

fn copy_stored_url(state: &mut UiState) {
    let Some(url) = state.copyable_url().map(str::to_string) else {
        state.info = "No stored video URL to copy yet".into();
        state.info_level = Some(NoticeLevel::Warning);
        return;
    };
    match export::copy_to_clipboard(&url) {
        Ok(()) => {
            state.info = format!("✓ Copied to clipboard: {}", export::ellipsize(&url, 60));
            state.info_level = Some(NoticeLevel::Success);
        }
        Err(e) => {
            state.info = format!("Clipboard copy failed: {e:#}");
            state.info_level = Some(NoticeLevel::Error);
        }
    }
}

fn export_last_report(state: &mut UiState) {
    let Some(report) = state.last_report.as_ref() else {
        state.info = "No completed run to export yet".into();
        state.info_level = Some(NoticeLevel::Warning);
        return;
    };
    match export::export_report_to_cwd(report) {
        Ok(p) => {
            state.info = format!("Exported JSON: {}", p.display());
            state.info_level = Some(NoticeLevel::Success);
            state.last_exported_path = Some(p.display().to_string());
        }
        Err(e) => {
            state.info = format!("JSON export failed: {e:#}");
            state.info_level = Some(NoticeLevel::Error);
        }
    }
}

fn level_color(level: Option<NoticeLevel>) -> Color {
    match level {
        Some(NoticeLevel::Success) => Color::Green,
        Some(NoticeLevel::Warning) => Color::Yellow,
        Some(NoticeLevel::Error) => Color::Red,
        None => Color::Gray,
    }
}

fn state_color(s: WorkflowState) -> Color {
    match s {
        WorkflowState::Idle => Color::Gray,
        WorkflowState::Searching | WorkflowState::Analyzing(_) => Color::Yellow,
        WorkflowState::Ready | WorkflowState::Completed => Color::Green,
        WorkflowState::Failed(_) => Color::Red,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Header
                Constraint::Length(3), // Inputs
                Constraint::Min(10),   // Session + scores
                Constraint::Length(3), // Status / countdown
                Constraint::Length(3), // Info line
            ]
            .as_ref(),
        )
        .split(area);

    draw_header(chunks[0], f, state);
    draw_inputs(chunks[1], f, state);
    draw_body(chunks[2], f, state);
    draw_status(chunks[3], f, state);

    let info = Paragraph::new(Line::from(vec![
        Span::styled(state.info.clone(), Style::default().fg(level_color(state.info_level))),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("? help  q quit"),
    );
    f.render_widget(info, chunks[4]);

    if state.show_help {
        help::draw_help(centered(area, 60, 22), f);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn draw_header(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let snap = &state.snapshot;
    let line = Line::from(vec![
        Span::styled(
            snap.state.label(),
            Style::default()
                .fg(state_color(snap.state))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   Sport: "),
        Span::styled(
            format!(
                "{} ({})",
                snap.config.sport.display_name(),
                snap.config.sport.thai_label()
            ),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("   Phase: "),
        Span::styled(
            format!(
                "{} ({})",
                snap.config.test_phase.display_name(),
                snap.config.test_phase.thai_label()
            ),
            Style::default().fg(Color::Cyan),
        ),
    ]);
    let header =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("skill-analyzer"));
    f.render_widget(header, area);
}

fn draw_inputs(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)].as_ref())
        .split(area);

    let field = |title: &'static str, value: &str, which: Field| {
        let active = state.editing == Some(which);
        let style = if active {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let cursor = if active { "▏" } else { "" };
        Paragraph::new(format!("{value}{cursor}")).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style)
                .title(title),
        )
    };
    f.render_widget(
        field("Student id (i)", &state.student_input, Field::StudentId),
        cols[0],
    );
    f.render_widget(
        field("Video path (v)", &state.video_input, Field::VideoPath),
        cols[1],
    );
}

fn draw_body(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(area);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let snap = &state.snapshot;
    match snap.student.as_ref() {
        Some(s) => {
            push_wrapped_status_kv(&mut lines, "Name", &s.full_name, cols[0].width);
            push_wrapped_status_kv(&mut lines, "Class", &s.grade_class, cols[0].width);
            push_wrapped_status_kv(&mut lines, "No.", &s.number, cols[0].width);
            push_wrapped_status_kv(&mut lines, "Id", &s.student_id, cols[0].width);
        }
        None => lines.push(Line::from(Span::styled(
            "No student selected",
            Style::default().fg(Color::Gray),
        ))),
    }
    lines.push(Line::from(""));
    match snap.media.as_ref() {
        Some(m) => {
            push_wrapped_status_kv(&mut lines, "Video", &m.file_name, cols[0].width);
            push_wrapped_status_kv(
                &mut lines,
                "Size",
                &crate::text_summary::format_size(m.size),
                cols[0].width,
            );
            push_wrapped_status_kv(&mut lines, "Type", &m.mime_type, cols[0].width);
            push_wrapped_status_kv(&mut lines, "Preview", &m.preview_uri, cols[0].width);
        }
        None => lines.push(Line::from(Span::styled(
            "No video selected",
            Style::default().fg(Color::Gray),
        ))),
    }
    if let Some(url) = state.copyable_url() {
        lines.push(Line::from(""));
        push_wrapped_status_kv(&mut lines, "Stored video", url, cols[0].width);
    }
    if let Some(path) = state.last_exported_path.as_deref() {
        push_wrapped_status_kv(&mut lines, "Exported", path, cols[0].width);
    }
    if let Some(path) = state.log_path.as_ref() {
        lines.push(Line::from(""));
        push_wrapped_status_kv(&mut lines, "Log", &path.display().to_string(), cols[0].width);
    }
    let session = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(session, cols[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(cols[1]);
    charts::render_score_chart(f, right[0], state.last_scores.as_ref());

    let mut notes: Vec<Line<'static>> = Vec::new();
    if let Some(scores) = state.last_scores.as_ref() {
        for (label, text) in [
            ("Strengths", &scores.strengths),
            ("Weaknesses", &scores.weaknesses),
            ("Suggestions", &scores.suggestions),
        ] {
            if !text.trim().is_empty() {
                notes.push(Line::from(vec![
                    Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
                    Span::raw(text.trim().to_string()),
                ]));
            }
        }
    }
    if let Some(failure) = state.last_failure.as_ref() {
        notes.push(Line::from(Span::styled(
            format!("Last run failed: {}", failure.message),
            Style::default().fg(Color::Red),
        )));
    }
    let feedback = Paragraph::new(notes)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Feedback"));
    f.render_widget(feedback, right[1]);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let snap = &state.snapshot;
    if let (true, Some(remaining)) = (snap.state.is_analyzing(), state.countdown) {
        charts::render_countdown(f, area, remaining, state.estimate, &snap.status);
        return;
    }
    let status = Paragraph::new(Span::styled(
        snap.status.clone(),
        Style::default().fg(state_color(snap.state)),
    ))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, area);
}
