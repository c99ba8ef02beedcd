//! In-memory port doubles and fixtures shared by the orchestrator tests.

use crate::error::PortError;
use crate::model::{
    CompositeRecord, EncodedMedia, MediaCandidate, PersistenceOutcome, ScoreRecord,
    StudentRecord, SubScores,
};
use crate::ports::{PersistencePort, Ports, ScoringPort, ScoringRequest, StudentDirectory};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub(crate) fn sample_student() -> StudentRecord {
    StudentRecord {
        student_id: "12345".into(),
        full_name: "Somchai Jaidee".into(),
        grade_class: "M.4/2".into(),
        number: "7".into(),
    }
}

pub(crate) fn sample_scores() -> ScoreRecord {
    ScoreRecord::new(
        SubScores {
            posture: 8.0,
            technique: 7.0,
            agility: 9.0,
            consistency: 6.0,
            efficiency: 8.0,
        },
        "Good footwork".into(),
        "Late follow-through".into(),
        "Drill the serve".into(),
    )
    .unwrap()
}

pub(crate) fn candidate(name: &str, size: u64) -> MediaCandidate {
    MediaCandidate {
        path: PathBuf::from(name),
        size,
        mime_type: "video/mp4".into(),
    }
}

/// Write a `len`-byte `clip.mp4` that starts with an mp4 `ftyp` box.
pub(crate) fn video_file(len: usize) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypisom");
    data.resize(len.max(24), 0);
    std::fs::write(&path, data).unwrap();
    (dir, path)
}

#[derive(Default)]
pub(crate) struct FakeDirectory {
    students: HashMap<String, StudentRecord>,
    offline: bool,
    pub calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with(student: StudentRecord) -> Self {
        let mut students = HashMap::new();
        students.insert(student.student_id.clone(), student);
        Self {
            students,
            ..Default::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl StudentDirectory for FakeDirectory {
    async fn lookup(&self, identifier: &str) -> Result<Option<StudentRecord>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(PortError::Transport("connection refused".into()));
        }
        Ok(self.students.get(identifier).cloned())
    }
}

pub(crate) struct FakeScorer {
    result: Mutex<Result<ScoreRecord, String>>,
    delay: Duration,
    panics: bool,
    pub calls: AtomicUsize,
    pub last_video_len: Mutex<Option<usize>>,
}

impl FakeScorer {
    pub fn returning(scores: ScoreRecord) -> Self {
        Self {
            result: Mutex::new(Ok(scores)),
            delay: Duration::ZERO,
            panics: false,
            calls: AtomicUsize::new(0),
            last_video_len: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Mutex::new(Err(message.to_string())),
            ..Self::returning(sample_scores())
        }
    }

    /// Panics inside `score`, killing whatever task runs it.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::returning(sample_scores())
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl ScoringPort for FakeScorer {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<ScoreRecord, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_video_len.lock().unwrap() = Some(request.video.byte_len);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("scorer blew up");
        }
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(PortError::Malformed)
    }
}

pub(crate) struct FakeStore {
    outcome: Mutex<Result<PersistenceOutcome, String>>,
    pub calls: AtomicUsize,
    pub last_record: Mutex<Option<CompositeRecord>>,
    pub last_had_video: Mutex<Option<bool>>,
}

impl FakeStore {
    pub fn succeeding(url: Option<&str>) -> Self {
        Self::with_outcome(Ok(PersistenceOutcome {
            success: true,
            stored_video_reference: url.map(str::to_string),
            detail: None,
        }))
    }

    pub fn rejecting(detail: &str) -> Self {
        Self::with_outcome(Ok(PersistenceOutcome {
            success: false,
            stored_video_reference: None,
            detail: Some(detail.to_string()),
        }))
    }

    pub fn unreachable() -> Self {
        Self::with_outcome(Err("timed out".into()))
    }

    /// Make every later `persist` call succeed.
    pub fn recover(&self, url: Option<&str>) {
        *self.outcome.lock().unwrap() = Ok(PersistenceOutcome {
            success: true,
            stored_video_reference: url.map(str::to_string),
            detail: None,
        });
    }

    fn with_outcome(outcome: Result<PersistenceOutcome, String>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
            last_record: Mutex::new(None),
            last_had_video: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl PersistencePort for FakeStore {
    async fn persist(
        &self,
        record: &CompositeRecord,
        video: Option<&EncodedMedia>,
    ) -> Result<PersistenceOutcome, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_record.lock().unwrap() = Some(record.clone());
        *self.last_had_video.lock().unwrap() = Some(video.is_some());
        self.outcome
            .lock()
            .unwrap()
            .clone()
            .map_err(PortError::Transport)
    }
}

/// Fakes plus the `Ports` bundle built from them.
pub(crate) struct Harness {
    pub directory: Arc<FakeDirectory>,
    pub scorer: Arc<FakeScorer>,
    pub store: Arc<FakeStore>,
}

impl Harness {
    pub fn new(directory: FakeDirectory, scorer: FakeScorer, store: FakeStore) -> Self {
        Self {
            directory: Arc::new(directory),
            scorer: Arc::new(scorer),
            store: Arc::new(store),
        }
    }

    pub fn happy() -> Self {
        Self::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::returning(sample_scores()),
            FakeStore::succeeding(Some("https://example/video123")),
        )
    }

    pub fn ports(&self) -> Ports {
        Ports {
            directory: self.directory.clone(),
            scorer: self.scorer.clone(),
            store: self.store.clone(),
        }
    }
}
