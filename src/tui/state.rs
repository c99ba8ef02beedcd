use crate::model::{
    NoticeLevel, RunFailure, RunReport, ScoreRecord, SessionSnapshot, WorkflowEvent,
    WorkflowState,
};
use crate::orchestrator::UiCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    StudentId,
    VideoPath,
}

/// What the render loop should do after a key press.
#[derive(Debug)]
pub enum KeyOutcome {
    Continue,
    Command(UiCommand),
    CopyUrl,
    ExportReport,
    Quit,
}

pub struct UiState {
    pub snapshot: SessionSnapshot,
    pub countdown: Option<u32>,
    pub estimate: u32,
    pub student_input: String,
    pub video_input: String,
    // Field receiving keystrokes; `None` means shortcut keys are active.
    pub editing: Option<Field>,
    pub show_help: bool,
    pub info: String,
    pub info_level: Option<NoticeLevel>,
    // Scores from the last completed or failed run; outlives the session reset.
    pub last_scores: Option<ScoreRecord>,
    pub last_report: Option<RunReport>,
    pub last_failure: Option<RunFailure>,
    pub last_exported_path: Option<String>,
    pub export_json: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl UiState {
    pub fn new(estimate: u32, export_json: Option<PathBuf>, log_path: Option<PathBuf>) -> Self {
        Self {
            snapshot: SessionSnapshot::default(),
            countdown: None,
            estimate,
            student_input: String::new(),
            video_input: String::new(),
            editing: Some(Field::StudentId),
            show_help: false,
            info: "Type a student id and press Enter".into(),
            info_level: None,
            last_scores: None,
            last_report: None,
            last_failure: None,
            last_exported_path: None,
            export_json,
            log_path,
        }
    }

    pub fn apply_event(&mut self, ev: WorkflowEvent) {
        match ev {
            WorkflowEvent::StateChanged { snapshot } => {
                if snapshot.state == WorkflowState::Analyzing(crate::model::AnalyzingPhase::Scoring)
                    && !self.snapshot.state.is_analyzing()
                {
                    self.last_scores = None;
                    self.last_failure = None;
                }
                if let Some(scores) = snapshot.scores.as_ref() {
                    self.last_scores = Some(scores.clone());
                }
                self.countdown = snapshot.countdown;
                self.snapshot = *snapshot;
            }
            WorkflowEvent::Countdown { remaining } => {
                if self.snapshot.state.is_analyzing() {
                    self.countdown = Some(remaining);
                }
            }
            WorkflowEvent::Notice(notice) => {
                self.info = notice.to_message();
                self.info_level = Some(notice.level);
            }
            WorkflowEvent::RunCompleted { report } => {
                self.last_report = Some(*report);
            }
            WorkflowEvent::RunFailed { failure } => {
                self.last_failure = Some(failure);
            }
        }
    }

    /// Stored video URL of the last completed run.
    pub fn copyable_url(&self) -> Option<&str> {
        self.last_report
            .as_ref()
            .and_then(|r| r.stored_video_reference.as_deref())
    }

    fn input_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::StudentId => &mut self.student_input,
            Field::VideoPath => &mut self.video_input,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyOutcome::Quit;
        }
        if self.show_help {
            // Any key closes help.
            self.show_help = false;
            return KeyOutcome::Continue;
        }
        match self.editing {
            Some(field) => self.handle_edit_key(field, key),
            None => self.handle_shortcut(key),
        }
    }

    fn handle_edit_key(&mut self, field: Field, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Esc => {
                self.editing = None;
                KeyOutcome::Continue
            }
            KeyCode::Tab => {
                self.editing = Some(match field {
                    Field::StudentId => Field::VideoPath,
                    Field::VideoPath => Field::StudentId,
                });
                KeyOutcome::Continue
            }
            KeyCode::Backspace => {
                self.input_mut(field).pop();
                KeyOutcome::Continue
            }
            KeyCode::Char(c) => {
                self.input_mut(field).push(c);
                KeyOutcome::Continue
            }
            KeyCode::Enter => match field {
                Field::StudentId => {
                    if self.student_input.trim().is_empty() {
                        return KeyOutcome::Continue;
                    }
                    // Next step is normally picking the video.
                    self.editing = Some(Field::VideoPath);
                    KeyOutcome::Command(UiCommand::Search(self.student_input.trim().to_string()))
                }
                Field::VideoPath => {
                    let path = self.video_input.trim();
                    if path.is_empty() {
                        return KeyOutcome::Continue;
                    }
                    let path = PathBuf::from(path);
                    self.editing = None;
                    KeyOutcome::Command(UiCommand::SelectMedia(path))
                }
            },
            _ => KeyOutcome::Continue,
        }
    }

    fn handle_shortcut(&mut self, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Char('q') => KeyOutcome::Quit,
            KeyCode::Char('i') | KeyCode::Char('/') => {
                self.editing = Some(Field::StudentId);
                KeyOutcome::Continue
            }
            KeyCode::Char('v') => {
                self.editing = Some(Field::VideoPath);
                KeyOutcome::Continue
            }
            KeyCode::Char('s') => KeyOutcome::Command(UiCommand::SetSport(
                self.snapshot.config.sport.next(),
            )),
            KeyCode::Char('p') => KeyOutcome::Command(UiCommand::SetTestPhase(
                self.snapshot.config.test_phase.toggled(),
            )),
            KeyCode::Char('a') | KeyCode::F(5) => {
                if self.snapshot.state == WorkflowState::Ready {
                    KeyOutcome::Command(UiCommand::StartAnalysis)
                } else {
                    self.info = "Find a student and select a video first".into();
                    self.info_level = Some(NoticeLevel::Warning);
                    KeyOutcome::Continue
                }
            }
            KeyCode::Char('r') => {
                self.student_input.clear();
                self.video_input.clear();
                self.editing = Some(Field::StudentId);
                KeyOutcome::Command(UiCommand::Reset)
            }
            KeyCode::Char('y') => KeyOutcome::CopyUrl,
            KeyCode::Char('e') => KeyOutcome::ExportReport,
            KeyCode::Char('?') => {
                self.show_help = true;
                KeyOutcome::Continue
            }
            _ => KeyOutcome::Continue,
        }
    }
}
