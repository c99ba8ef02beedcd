//! Analysis workflow state machine.
//!
//! `Workflow` owns every piece of session state and only changes it through
//! the transition methods below. Port calls happen outside: a transition that
//! needs one hands back a ticket, and the caller feeds the result into the
//! matching `*_finished` transition.

use super::countdown::Countdown;
use crate::error::{FailureKind, PortError, WorkflowError};
use crate::media::{self, PreviewRegistry};
use crate::model::{
    AnalyzingPhase, ClientConfig, CompositeRecord, EncodedMedia, MediaCandidate, MediaSelection,
    Notice, NoticeLevel, PersistenceOutcome, RunFailure, RunReport, ScoreRecord, SessionConfig,
    SessionSnapshot, Sport, StudentRecord, TestPhase, WorkflowEvent, WorkflowState,
    DEFAULT_ESTIMATE_SECS, MAX_MEDIA_BYTES, VIDEO_LINK_PLACEHOLDER,
};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub default_config: SessionConfig,
    pub estimate_secs: u32,
    pub tick: Duration,
    pub upload_video: bool,
    pub max_media_bytes: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_config: SessionConfig::default(),
            estimate_secs: DEFAULT_ESTIMATE_SECS,
            tick: Duration::from_secs(1),
            upload_video: true,
            max_media_bytes: MAX_MEDIA_BYTES,
        }
    }
}

impl From<&ClientConfig> for WorkflowSettings {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            default_config: cfg.default_session,
            estimate_secs: cfg.estimate_secs,
            upload_video: cfg.upload_video,
            ..Default::default()
        }
    }
}

/// Work order for the encode + score step.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub path: PathBuf,
    pub mime_type: String,
    pub config: SessionConfig,
    pub student_name: String,
    pub max_bytes: u64,
}

/// Work order for the persistence step.
#[derive(Debug, Clone)]
pub struct PersistTicket {
    pub record: CompositeRecord,
    pub video: Option<EncodedMedia>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    Failed(RunFailure),
}

pub struct Workflow {
    state: WorkflowState,
    student: Option<StudentRecord>,
    config: SessionConfig,
    media: Option<MediaSelection>,
    scores: Option<ScoreRecord>,
    outcome: Option<PersistenceOutcome>,
    last_failure: Option<RunFailure>,
    previews: PreviewRegistry,
    countdown: Countdown,
    settings: WorkflowSettings,
    event_tx: Option<UnboundedSender<WorkflowEvent>>,
}

impl Workflow {
    pub fn new(settings: WorkflowSettings, event_tx: Option<UnboundedSender<WorkflowEvent>>) -> Self {
        Self {
            state: WorkflowState::Idle,
            student: None,
            config: settings.default_config,
            media: None,
            scores: None,
            outcome: None,
            last_failure: None,
            previews: PreviewRegistry::new(),
            countdown: Countdown::new(settings.tick, event_tx.clone()),
            settings,
            event_tx,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn student(&self) -> Option<&StudentRecord> {
        self.student.as_ref()
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn media(&self) -> Option<&MediaSelection> {
        self.media.as_ref()
    }

    pub fn scores(&self) -> Option<&ScoreRecord> {
        self.scores.as_ref()
    }

    pub fn outcome(&self) -> Option<&PersistenceOutcome> {
        self.outcome.as_ref()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn countdown_active(&self) -> bool {
        self.countdown.is_active()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            student: self.student.clone(),
            config: self.config,
            media: self.media.as_ref().map(MediaSelection::summary),
            scores: self.scores.clone(),
            outcome: self.outcome.clone(),
            countdown: self
                .countdown
                .is_active()
                .then(|| self.countdown.remaining()),
            status: self.status_text(),
            last_failure: self.last_failure.clone(),
        }
    }

    fn status_text(&self) -> String {
        match self.state {
            WorkflowState::Idle if self.student.is_none() => "Enter a student id to begin".into(),
            WorkflowState::Idle => "Select a video to analyze".into(),
            WorkflowState::Searching => "Searching for student…".into(),
            WorkflowState::Ready => "Ready to analyze".into(),
            WorkflowState::Analyzing(phase) => phase.status_message().into(),
            WorkflowState::Completed => "Analysis complete".into(),
            WorkflowState::Failed(_) => self
                .last_failure
                .as_ref()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "Analysis failed".into()),
        }
    }

    /// Resting state implied by what the session holds.
    fn settled_state(&self) -> WorkflowState {
        if self.student.is_some() && self.media.is_some() {
            WorkflowState::Ready
        } else {
            WorkflowState::Idle
        }
    }

    fn busy(&self) -> bool {
        self.state.is_analyzing() || self.state == WorkflowState::Searching
    }

    // ---- search ----------------------------------------------------------

    /// Returns the trimmed identifier to look up, or `None` when the search
    /// is a no-op (blank input, or another operation is outstanding).
    pub fn begin_search(&mut self, identifier: &str) -> Option<String> {
        let id = identifier.trim();
        if id.is_empty() {
            tracing::debug!("blank student id ignored");
            return None;
        }
        if self.busy() {
            tracing::debug!(state = ?self.state, "search ignored while busy");
            return None;
        }
        self.state = WorkflowState::Searching;
        self.emit_state();
        Some(id.to_string())
    }

    pub fn finish_search(
        &mut self,
        identifier: &str,
        result: Result<Option<StudentRecord>, PortError>,
    ) -> Result<StudentRecord, WorkflowError> {
        match result {
            Ok(Some(student)) => {
                tracing::info!(student_id = %student.student_id, "student resolved");
                // A new student starts a fresh session.
                self.release_media();
                self.scores = None;
                self.outcome = None;
                self.last_failure = None;
                self.student = Some(student.clone());
                self.state = self.settled_state();
                self.notify(
                    NoticeLevel::Success,
                    "Student found",
                    format!(
                        "{} ({} No. {}, id {})",
                        student.full_name, student.grade_class, student.number, student.student_id
                    ),
                );
                self.emit_state();
                Ok(student)
            }
            Ok(None) => {
                tracing::info!(student_id = identifier, "student not found");
                self.state = self.settled_state();
                self.notify(
                    NoticeLevel::Error,
                    "Student not found",
                    "Check the student id and try again",
                );
                self.emit_state();
                Err(WorkflowError::StudentNotFound(identifier.to_string()))
            }
            Err(e) => {
                tracing::warn!(student_id = identifier, error = %e, "student lookup failed");
                self.state = self.settled_state();
                self.notify(NoticeLevel::Error, "Lookup failed", e.to_string());
                self.emit_state();
                Err(WorkflowError::Lookup(e))
            }
        }
    }

    // ---- media -----------------------------------------------------------

    /// Inspect `path` and install it as the selection.
    pub fn select_path(&mut self, path: &Path) -> Result<(), WorkflowError> {
        if self.state.is_analyzing() {
            return Err(WorkflowError::Busy);
        }
        self.select_inspected(media::inspect(path))
    }

    /// Install the result of a `media::inspect` that ran elsewhere.
    pub fn select_inspected(
        &mut self,
        inspected: Result<MediaCandidate, WorkflowError>,
    ) -> Result<(), WorkflowError> {
        if self.state.is_analyzing() {
            return Err(WorkflowError::Busy);
        }
        match inspected {
            Ok(candidate) => self.select_media(candidate),
            Err(e) => {
                self.discard_selection(&e);
                Err(e)
            }
        }
    }

    pub fn select_media(&mut self, candidate: MediaCandidate) -> Result<(), WorkflowError> {
        if self.state.is_analyzing() {
            return Err(WorkflowError::Busy);
        }
        if candidate.size > self.settings.max_media_bytes {
            let err = WorkflowError::MediaTooLarge {
                size: candidate.size,
                limit: self.settings.max_media_bytes,
            };
            self.discard_selection(&err);
            return Err(err);
        }

        // Release before install so at most one handle is live.
        self.release_media();
        let preview = self.previews.create(&candidate.path);
        tracing::info!(
            path = %candidate.path.display(),
            size = candidate.size,
            mime = %candidate.mime_type,
            "media selected"
        );
        self.media = Some(MediaSelection {
            path: candidate.path,
            size: candidate.size,
            mime_type: candidate.mime_type,
            preview,
        });
        self.scores = None;
        self.outcome = None;
        self.last_failure = None;
        if !self.busy() {
            self.state = self.settled_state();
        }
        self.emit_state();
        Ok(())
    }

    fn discard_selection(&mut self, err: &WorkflowError) {
        tracing::warn!(error = %err, "media rejected");
        self.release_media();
        self.scores = None;
        self.outcome = None;
        if !self.busy() {
            self.state = self.settled_state();
        }
        self.notify(NoticeLevel::Warning, "Video not accepted", err.to_string());
        self.emit_state();
    }

    fn release_media(&mut self) {
        if let Some(selection) = self.media.take() {
            self.previews.release(selection.preview);
        }
    }

    // ---- configuration ---------------------------------------------------

    pub fn set_sport(&mut self, sport: Sport) -> bool {
        if self.state.is_analyzing() {
            return false;
        }
        self.config.sport = sport;
        self.emit_state();
        true
    }

    pub fn set_test_phase(&mut self, phase: TestPhase) -> bool {
        if self.state.is_analyzing() {
            return false;
        }
        self.config.test_phase = phase;
        self.emit_state();
        true
    }

    // ---- analysis --------------------------------------------------------

    /// Enter Analyzing/Scoring. `None` unless the session is Ready.
    pub fn begin_analysis(&mut self) -> Option<AnalysisTicket> {
        if self.state != WorkflowState::Ready {
            tracing::debug!(state = ?self.state, "start ignored");
            return None;
        }
        let (Some(student), Some(media)) = (self.student.as_ref(), self.media.as_ref()) else {
            return None;
        };
        let ticket = AnalysisTicket {
            path: media.path.clone(),
            mime_type: media.mime_type.clone(),
            config: self.config,
            student_name: student.full_name.clone(),
            max_bytes: self.settings.max_media_bytes,
        };

        tracing::info!(
            student_id = %student.student_id,
            sport = self.config.sport.display_name(),
            phase = self.config.test_phase.display_name(),
            "analysis started"
        );
        self.scores = None;
        self.outcome = None;
        self.last_failure = None;
        self.state = WorkflowState::Analyzing(AnalyzingPhase::Scoring);
        self.countdown.start(self.settings.estimate_secs);
        self.emit_state();
        Some(ticket)
    }

    /// Feed back the encode + score step. On success returns the persistence
    /// work order; on failure the run has already ended.
    pub fn scoring_finished(
        &mut self,
        result: Result<(EncodedMedia, ScoreRecord), WorkflowError>,
    ) -> Result<PersistTicket, RunFailure> {
        if self.state != WorkflowState::Analyzing(AnalyzingPhase::Scoring) {
            tracing::warn!(state = ?self.state, "scoring result arrived out of order");
            return Err(RunFailure {
                kind: FailureKind::Runtime,
                message: "scoring result arrived out of order".into(),
            });
        }

        let (encoded, scores) = match result {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        let Some(student) = self.student.clone() else {
            return Err(self.fail(WorkflowError::Runtime("student vanished mid-run".into())));
        };

        let record = CompositeRecord {
            student,
            scores: scores.clone(),
            sport: self.config.sport.thai_label().to_string(),
            test_type: self.config.test_phase.thai_label().to_string(),
            timestamp: thai_timestamp(local_now()),
            video_link: VIDEO_LINK_PLACEHOLDER.to_string(),
        };
        self.scores = Some(scores);
        self.state = WorkflowState::Analyzing(AnalyzingPhase::Persisting);
        self.emit_state();

        Ok(PersistTicket {
            record,
            video: self.settings.upload_video.then_some(encoded),
        })
    }

    /// Feed back the persistence step and end the run.
    pub fn persistence_finished(
        &mut self,
        result: Result<PersistenceOutcome, PortError>,
    ) -> RunOutcome {
        if self.state != WorkflowState::Analyzing(AnalyzingPhase::Persisting) {
            tracing::warn!(state = ?self.state, "persistence result arrived out of order");
            return RunOutcome::Failed(RunFailure {
                kind: FailureKind::Runtime,
                message: "persistence result arrived out of order".into(),
            });
        }

        let outcome = match result {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let detail = outcome
                    .detail
                    .clone()
                    .unwrap_or_else(|| "backend reported failure".into());
                self.outcome = Some(outcome);
                return RunOutcome::Failed(self.fail(WorkflowError::Persistence(detail)));
            }
            Err(e) => {
                self.outcome = Some(PersistenceOutcome {
                    success: false,
                    stored_video_reference: None,
                    detail: Some(e.to_string()),
                });
                return RunOutcome::Failed(self.fail(WorkflowError::Persistence(e.to_string())));
            }
        };

        self.countdown.stop();
        self.outcome = Some(outcome.clone());
        self.state = WorkflowState::Completed;

        let report = match (&self.student, &self.media, &self.scores) {
            (Some(student), Some(media), Some(scores)) => Some(RunReport {
                timestamp_utc: OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_else(|_| "now".into()),
                student: student.clone(),
                config: self.config,
                media: media.summary(),
                scores: scores.clone(),
                stored_video_reference: outcome.stored_video_reference.clone(),
            }),
            _ => None,
        };
        let Some(report) = report else {
            return RunOutcome::Failed(
                self.fail(WorkflowError::Runtime("session incomplete at completion".into())),
            );
        };

        tracing::info!(
            student_id = %report.student.student_id,
            total = report.scores.total_score,
            video = report.stored_video_reference.as_deref().unwrap_or("-"),
            "analysis saved"
        );
        self.emit(WorkflowEvent::RunCompleted {
            report: Box::new(report.clone()),
        });
        self.notify(
            NoticeLevel::Success,
            "Analysis saved",
            "Results were recorded successfully",
        );
        self.emit_state();

        // Walk-up workflow: the next student starts from a clean slate.
        self.clear_session();
        RunOutcome::Completed(Box::new(report))
    }

    /// End an outstanding operation after its task died.
    pub fn abort(&mut self, message: String) -> Option<RunFailure> {
        match self.state {
            WorkflowState::Analyzing(_) => Some(self.fail(WorkflowError::Runtime(message))),
            WorkflowState::Searching => {
                self.state = self.settled_state();
                self.notify(NoticeLevel::Error, "Lookup failed", message);
                self.emit_state();
                None
            }
            _ => None,
        }
    }

    fn fail(&mut self, err: WorkflowError) -> RunFailure {
        self.countdown.stop();
        let kind = err.kind();
        let failure = RunFailure {
            kind,
            message: err.to_string(),
        };
        tracing::warn!(kind = ?kind, error = %err, "analysis run failed");

        match kind {
            // Hard read failure: drop the selection and go back to Idle.
            FailureKind::Decode => {
                self.release_media();
                self.scores = None;
            }
            // Scores stay visible but are known to be unsaved.
            FailureKind::Persistence => {}
            _ => self.scores = None,
        }

        self.state = WorkflowState::Failed(kind);
        self.last_failure = Some(failure.clone());
        self.emit(WorkflowEvent::RunFailed {
            failure: failure.clone(),
        });
        self.notify(NoticeLevel::Error, "Analysis failed", failure.message.clone());
        self.emit_state();

        self.state = self.settled_state();
        self.emit_state();
        failure
    }

    // ---- reset -----------------------------------------------------------

    /// Clear the session. Refused while a search or run is outstanding.
    pub fn reset(&mut self) -> bool {
        if self.busy() {
            return false;
        }
        self.clear_session();
        true
    }

    fn clear_session(&mut self) {
        self.countdown.stop();
        self.release_media();
        self.student = None;
        self.config = self.settings.default_config;
        self.scores = None;
        self.outcome = None;
        self.last_failure = None;
        self.state = WorkflowState::Idle;
        self.emit_state();
    }

    // ---- events ----------------------------------------------------------

    fn emit(&self, ev: WorkflowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    pub fn emit_state(&self) {
        self.emit(WorkflowEvent::StateChanged {
            snapshot: Box::new(self.snapshot()),
        });
    }

    fn notify(&self, level: NoticeLevel, title: &str, message: impl Into<String>) {
        self.emit(WorkflowEvent::Notice(Notice::new(level, title, message)));
    }
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Thai-locale date/time (`d/M/yyyy HH:mm:ss`, Buddhist era year).
pub fn thai_timestamp(at: OffsetDateTime) -> String {
    format!(
        "{}/{}/{} {:02}:{:02}:{:02}",
        at.day(),
        u8::from(at.month()),
        at.year() + 543,
        at.hour(),
        at.minute(),
        at.second()
    )
}
