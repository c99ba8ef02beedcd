use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest video accepted for analysis (30 MiB).
pub const MAX_MEDIA_BYTES: u64 = 30 * 1024 * 1024;
/// Initial value of the analysis countdown, in ticks.
pub const DEFAULT_ESTIMATE_SECS: u32 = 45;
/// Sent as `videoLink` before the backend assigns a real reference.
pub const VIDEO_LINK_PLACEHOLDER: &str = "Uploaded Video File";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub script_url: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    #[serde(skip_serializing, default)]
    pub gemini_api_keys: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
    pub upload_video: bool,
    pub estimate_secs: u32,
    pub default_session: SessionConfig,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Sport {
    #[default]
    Volleyball,
    Futsal,
    Takraw,
    Badminton,
    Athletics,
    TableTennis,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::Volleyball,
        Sport::Futsal,
        Sport::Takraw,
        Sport::Badminton,
        Sport::Athletics,
        Sport::TableTennis,
    ];

    /// Label used in prompts and spreadsheet rows.
    pub fn thai_label(self) -> &'static str {
        match self {
            Sport::Volleyball => "วอลเลย์บอล",
            Sport::Futsal => "ฟุตซอล",
            Sport::Takraw => "ตะกร้อ",
            Sport::Badminton => "แบดมินตัน",
            Sport::Athletics => "กรีฑา",
            Sport::TableTennis => "เทเบิลเทนนิส",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Sport::Volleyball => "Volleyball",
            Sport::Futsal => "Futsal",
            Sport::Takraw => "Sepak takraw",
            Sport::Badminton => "Badminton",
            Sport::Athletics => "Athletics",
            Sport::TableTennis => "Table tennis",
        }
    }

    pub fn next(self) -> Sport {
        let idx = Sport::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Sport::ALL[(idx + 1) % Sport::ALL.len()]
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum TestPhase {
    #[default]
    PreTest,
    PostTest,
}

impl TestPhase {
    pub fn thai_label(self) -> &'static str {
        match self {
            TestPhase::PreTest => "ก่อนเรียน",
            TestPhase::PostTest => "หลังเรียน",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TestPhase::PreTest => "Pre-test",
            TestPhase::PostTest => "Post-test",
        }
    }

    pub fn toggled(self) -> TestPhase {
        match self {
            TestPhase::PreTest => TestPhase::PostTest,
            TestPhase::PostTest => TestPhase::PreTest,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub sport: Sport,
    pub test_phase: TestPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_id: String,
    pub full_name: String,
    pub grade_class: String,
    pub number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub posture: f64,
    pub technique: f64,
    pub agility: f64,
    pub consistency: f64,
    pub efficiency: f64,
}

impl SubScores {
    pub const LABELS: [&'static str; 5] =
        ["Posture", "Technique", "Agility", "Consistency", "Efficiency"];

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.posture,
            self.technique,
            self.agility,
            self.consistency,
            self.efficiency,
        ]
    }
}

/// A complete, validated score sheet. Only built through [`ScoreRecord::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    #[serde(flatten)]
    pub sub_scores: SubScores,
    pub total_score: f64,
    pub average_score: f64,
    pub strengths: String,
    pub weaknesses: String,
    pub suggestions: String,
}

impl ScoreRecord {
    /// Validate the sub-scores and derive total and average from them.
    pub fn new(
        sub_scores: SubScores,
        strengths: String,
        weaknesses: String,
        suggestions: String,
    ) -> Result<Self, String> {
        let values = sub_scores.as_array();
        for (label, value) in SubScores::LABELS.iter().zip(values) {
            crate::metrics::check_scale(label, value)?;
        }
        let total_score = crate::metrics::total(&values);
        let average_score =
            crate::metrics::average(&values).ok_or_else(|| "no sub-scores".to_string())?;
        Ok(Self {
            sub_scores,
            total_score,
            average_score,
            strengths,
            weaknesses,
            suggestions,
        })
    }
}

/// What the user picked before it is accepted into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
}

/// Previewable reference to selected content. Not `Clone`: it must be handed
/// back to the registry that issued it.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    pub(crate) id: u64,
    pub uri: String,
}

#[derive(Debug)]
pub struct MediaSelection {
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    pub preview: PreviewHandle,
}

impl MediaSelection {
    pub fn summary(&self) -> MediaSummary {
        MediaSummary {
            file_name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
            size: self.size,
            mime_type: self.mime_type.clone(),
            preview_uri: self.preview.uri.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSummary {
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub preview_uri: String,
}

/// Base64 form of the selected video, ready to send.
#[derive(Debug, Clone)]
pub struct EncodedMedia {
    pub base64: String,
    pub mime_type: String,
    pub byte_len: usize,
}

/// Row written to the spreadsheet backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRecord {
    #[serde(flatten)]
    pub student: StudentRecord,
    #[serde(flatten)]
    pub scores: ScoreRecord,
    pub sport: String,
    pub test_type: String,
    pub timestamp: String,
    pub video_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceOutcome {
    pub success: bool,
    #[serde(default)]
    pub stored_video_reference: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyzingPhase {
    Scoring,
    Persisting,
}

impl AnalyzingPhase {
    pub fn status_message(self) -> &'static str {
        match self {
            AnalyzingPhase::Scoring => "Analyzing video with AI…",
            AnalyzingPhase::Persisting => "Saving results to the spreadsheet…",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowState {
    #[default]
    Idle,
    Searching,
    Ready,
    Analyzing(AnalyzingPhase),
    Completed,
    Failed(FailureKind),
}

impl WorkflowState {
    pub fn is_analyzing(self) -> bool {
        matches!(self, WorkflowState::Analyzing(_))
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkflowState::Idle => "Idle",
            WorkflowState::Searching => "Searching",
            WorkflowState::Ready => "Ready",
            WorkflowState::Analyzing(AnalyzingPhase::Scoring) => "Analyzing (scoring)",
            WorkflowState::Analyzing(AnalyzingPhase::Persisting) => "Analyzing (saving)",
            WorkflowState::Completed => "Completed",
            WorkflowState::Failed(_) => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Everything the presentation layer may read about the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: WorkflowState,
    pub student: Option<StudentRecord>,
    pub config: SessionConfig,
    pub media: Option<MediaSummary>,
    pub scores: Option<ScoreRecord>,
    pub outcome: Option<PersistenceOutcome>,
    /// Remaining countdown while the indicator is running.
    pub countdown: Option<u32>,
    pub status: String,
    pub last_failure: Option<RunFailure>,
}

/// Result of a completed run, captured before the session resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub timestamp_utc: String,
    pub student: StudentRecord,
    pub config: SessionConfig,
    pub media: MediaSummary,
    pub scores: ScoreRecord,
    pub stored_video_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// User-facing alert raised by a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Render a single-line message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        if self.message.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, self.message)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
    StateChanged {
        // Boxed to keep the enum small; snapshots carry several strings.
        snapshot: Box<SessionSnapshot>,
    },
    Countdown {
        remaining: u32,
    },
    Notice(Notice),
    RunCompleted {
        report: Box<RunReport>,
    },
    RunFailed {
        failure: RunFailure,
    },
}
