//! Analysis workflow controller.
//!
//! `AnalysisController` runs port calls inline and is what headless mode
//! uses. `run_controller` drives the same workflow from UI commands, running
//! each port step as its own task so the command loop stays responsive.

use super::session::{AnalysisTicket, PersistTicket, RunOutcome, Workflow, WorkflowSettings};
use crate::error::{PortError, WorkflowError};
use crate::media;
use crate::model::{
    EncodedMedia, MediaCandidate, PersistenceOutcome, ScoreRecord, SessionSnapshot, Sport,
    StudentRecord, TestPhase, WorkflowEvent,
};
use crate::ports::{PersistencePort, Ports, ScoringPort, ScoringRequest};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Search(String),
    SelectMedia(PathBuf),
    SetSport(Sport),
    SetTestPhase(TestPhase),
    StartAnalysis,
    Reset,
    Quit,
}

pub struct AnalysisController {
    workflow: Workflow,
    ports: Ports,
}

impl AnalysisController {
    pub fn new(
        ports: Ports,
        settings: WorkflowSettings,
        event_tx: Option<UnboundedSender<WorkflowEvent>>,
    ) -> Self {
        Self {
            workflow: Workflow::new(settings, event_tx),
            ports,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.workflow.snapshot()
    }

    /// `Ok(None)` when the search was a no-op.
    pub async fn search(&mut self, identifier: &str) -> Result<Option<StudentRecord>, WorkflowError> {
        let Some(id) = self.workflow.begin_search(identifier) else {
            return Ok(None);
        };
        let result = self.ports.directory.lookup(&id).await;
        self.workflow.finish_search(&id, result).map(Some)
    }

    pub fn select_media(&mut self, path: &Path) -> Result<(), WorkflowError> {
        self.workflow.select_path(path)
    }

    pub fn set_sport(&mut self, sport: Sport) -> bool {
        self.workflow.set_sport(sport)
    }

    pub fn set_test_phase(&mut self, phase: TestPhase) -> bool {
        self.workflow.set_test_phase(phase)
    }

    /// Run encode, score and persist to completion. `None` when not Ready.
    pub async fn start_analysis(&mut self) -> Option<RunOutcome> {
        let ticket = self.workflow.begin_analysis()?;
        let scored = score_step(self.ports.scorer.clone(), ticket).await;
        let persist = match self.workflow.scoring_finished(scored) {
            Ok(ticket) => ticket,
            Err(failure) => return Some(RunOutcome::Failed(failure)),
        };
        let saved = persist_step(self.ports.store.clone(), persist).await;
        Some(self.workflow.persistence_finished(saved))
    }

    pub fn reset(&mut self) -> bool {
        self.workflow.reset()
    }
}

async fn score_step(
    scorer: Arc<dyn ScoringPort>,
    ticket: AnalysisTicket,
) -> Result<(EncodedMedia, ScoreRecord), WorkflowError> {
    let encoded = media::encode(&ticket.path, &ticket.mime_type, ticket.max_bytes)
        .await
        .map_err(WorkflowError::Decode)?;
    let scores = scorer
        .score(ScoringRequest {
            video: &encoded,
            config: ticket.config,
            student_name: &ticket.student_name,
        })
        .await
        .map_err(WorkflowError::Scoring)?;
    Ok((encoded, scores))
}

async fn persist_step(
    store: Arc<dyn PersistencePort>,
    ticket: PersistTicket,
) -> Result<PersistenceOutcome, PortError> {
    store.persist(&ticket.record, ticket.video.as_ref()).await
}

/// `media::inspect` touches the filesystem, so keep it on the blocking pool.
async fn inspect_off_runtime(path: PathBuf) -> Result<MediaCandidate, WorkflowError> {
    tokio::task::spawn_blocking(move || media::inspect(&path))
        .await
        .unwrap_or_else(|e| Err(WorkflowError::MediaUnavailable(std::io::Error::other(e))))
}

/// Output of a background step, fed back into the workflow on the loop.
enum Step {
    Lookup {
        identifier: String,
        result: Result<Option<StudentRecord>, PortError>,
    },
    Scored(Result<(EncodedMedia, ScoreRecord), WorkflowError>),
    Persisted(Result<PersistenceOutcome, PortError>),
}

type StepHandle = tokio::task::JoinHandle<Step>;

fn spawn_lookup(ports: &Ports, identifier: String) -> StepHandle {
    let directory = ports.directory.clone();
    tokio::spawn(async move {
        let result = directory.lookup(&identifier).await;
        Step::Lookup { identifier, result }
    })
}

fn spawn_scoring(ports: &Ports, ticket: AnalysisTicket) -> StepHandle {
    let scorer = ports.scorer.clone();
    tokio::spawn(async move { Step::Scored(score_step(scorer, ticket).await) })
}

fn spawn_persist(ports: &Ports, ticket: PersistTicket) -> StepHandle {
    let store = ports.store.clone();
    tokio::spawn(async move { Step::Persisted(persist_step(store, ticket).await) })
}

/// Drive the workflow from UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    mut controller: AnalysisController,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut in_flight: Option<StepHandle> = None;
    controller.workflow.emit_state();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let wf = &mut controller.workflow;
                match cmd {
                    Some(UiCommand::Search(identifier)) => {
                        if in_flight.is_none() {
                            if let Some(id) = wf.begin_search(&identifier) {
                                in_flight = Some(spawn_lookup(&controller.ports, id));
                            }
                        }
                    }
                    Some(UiCommand::SelectMedia(path)) => {
                        if wf.state().is_analyzing() {
                            tracing::debug!("media selection ignored while analyzing");
                            continue;
                        }
                        let inspected = inspect_off_runtime(path).await;
                        // Rejections surface as notices.
                        let _ = controller.workflow.select_inspected(inspected);
                    }
                    Some(UiCommand::SetSport(sport)) => {
                        wf.set_sport(sport);
                    }
                    Some(UiCommand::SetTestPhase(phase)) => {
                        wf.set_test_phase(phase);
                    }
                    Some(UiCommand::StartAnalysis) => {
                        if in_flight.is_none() {
                            if let Some(ticket) = wf.begin_analysis() {
                                in_flight = Some(spawn_scoring(&controller.ports, ticket));
                            }
                        }
                    }
                    Some(UiCommand::Reset) => {
                        if !wf.reset() {
                            tracing::debug!("reset ignored while busy");
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        if let Some(handle) = in_flight.take() {
                            tracing::warn!("quitting with a request in flight; abandoning it");
                            handle.abort();
                        }
                        break Ok(());
                    }
                }
            }
            // Keep the JoinHandle in place until this branch wins so it is
            // never dropped by a losing branch.
            maybe_done = async {
                if let Some(h) = in_flight.as_mut() {
                    return Some(h.await);
                }
                futures::future::pending().await
            } => {
                let Some(join_res) = maybe_done else { continue };
                in_flight = None;
                let wf = &mut controller.workflow;
                match join_res {
                    Ok(Step::Lookup { identifier, result }) => {
                        let _ = wf.finish_search(&identifier, result);
                    }
                    Ok(Step::Scored(result)) => {
                        if let Ok(ticket) = wf.scoring_finished(result) {
                            in_flight = Some(spawn_persist(&controller.ports, ticket));
                        }
                    }
                    Ok(Step::Persisted(result)) => {
                        wf.persistence_finished(result);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "workflow task failed");
                        wf.abort(format!("background task failed: {e}"));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::model::{
        AnalyzingPhase, NoticeLevel, WorkflowState, MAX_MEDIA_BYTES, VIDEO_LINK_PLACEHOLDER,
    };
    use crate::orchestrator::testing::{
        candidate, sample_student, video_file, FakeDirectory, FakeScorer, FakeStore, Harness,
    };
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;
    use tokio::time::Duration;

    fn controller(h: &Harness) -> (AnalysisController, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            AnalysisController::new(h.ports(), WorkflowSettings::default(), Some(tx)),
            rx,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn states(events: &[WorkflowEvent]) -> Vec<WorkflowState> {
        events
            .iter()
            .filter_map(|ev| match ev {
                WorkflowEvent::StateChanged { snapshot } => Some(snapshot.state),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn oversized_media_is_rejected_with_warning() {
        let h = Harness::happy();
        let (mut c, mut rx) = controller(&h);
        let err = c
            .workflow
            .select_media(candidate("huge.mp4", MAX_MEDIA_BYTES + 1))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MediaTooLarge { .. }));
        assert!(c.snapshot().media.is_none());
        assert!(drain(&mut rx).iter().any(|ev| matches!(
            ev,
            WorkflowEvent::Notice(n) if n.level == NoticeLevel::Warning
        )));
    }

    #[tokio::test]
    async fn at_most_one_preview_handle_is_live() {
        let h = Harness::happy();
        let (mut c, _rx) = controller(&h);
        let (_dir, path) = video_file(128);
        for n in 1..=4u64 {
            c.select_media(&path).unwrap();
            let previews = c.workflow().previews();
            assert_eq!(previews.live_count(), 1);
            assert_eq!(previews.created_count(), n);
            assert_eq!(previews.released_count(), n - 1);
        }
        assert!(c.reset());
        let previews = c.workflow().previews();
        assert_eq!(previews.live_count(), 0);
        assert_eq!(previews.released_count(), 4);
    }

    #[tokio::test]
    async fn start_is_noop_unless_ready() {
        let h = Harness::happy();
        let (mut c, _rx) = controller(&h);
        assert!(c.start_analysis().await.is_none());

        c.search("12345").await.unwrap();
        assert_eq!(c.snapshot().state, WorkflowState::Idle);
        assert!(c.start_analysis().await.is_none());
        assert_eq!(h.scorer.calls.load(Ordering::SeqCst), 0);

        let (_dir, path) = video_file(64);
        let mut media_only = controller(&h).0;
        media_only.select_media(&path).unwrap();
        assert!(media_only.start_analysis().await.is_none());
        assert_eq!(h.scorer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_run_resets_to_idle() {
        let h = Harness::happy();
        let (mut c, _rx) = controller(&h);
        c.set_sport(Sport::Futsal);
        c.search("12345").await.unwrap();
        let (_dir, path) = video_file(256);
        c.select_media(&path).unwrap();

        let outcome = c.start_analysis().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));

        let snap = c.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert!(snap.student.is_none());
        assert!(snap.media.is_none());
        assert!(snap.scores.is_none());
        assert!(snap.outcome.is_none());
        assert_eq!(snap.config.sport, Sport::Volleyball);
        assert!(snap.countdown.is_none());
        assert!(!c.workflow().countdown_active());
        assert_eq!(c.workflow().previews().live_count(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_scores_and_settles_ready() {
        let h = Harness::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::returning(crate::orchestrator::testing::sample_scores()),
            FakeStore::rejecting("quota exceeded"),
        );
        let (mut c, mut rx) = controller(&h);
        c.search("12345").await.unwrap();
        let (_dir, path) = video_file(256);
        c.select_media(&path).unwrap();
        drain(&mut rx);

        let outcome = c.start_analysis().await.unwrap();
        let RunOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, FailureKind::Persistence);
        assert!(failure.message.contains("quota exceeded"));

        let snap = c.snapshot();
        assert_eq!(snap.state, WorkflowState::Ready);
        assert_eq!(snap.scores.as_ref().unwrap().total_score, 38.0);
        assert!(!snap.outcome.as_ref().unwrap().success);
        assert!(snap.media.is_some());
        assert!(!c.workflow().countdown_active());

        let seen = states(&drain(&mut rx));
        assert_eq!(
            seen,
            vec![
                WorkflowState::Analyzing(AnalyzingPhase::Scoring),
                WorkflowState::Analyzing(AnalyzingPhase::Persisting),
                WorkflowState::Failed(FailureKind::Persistence),
                WorkflowState::Ready,
            ]
        );

        // Retrying repeats the whole run, scoring included.
        h.store.recover(Some("https://example/video123"));
        let Some(RunOutcome::Completed(report)) = c.start_analysis().await else {
            panic!("expected completion on retry");
        };
        assert_eq!(report.scores.total_score, 38.0);
        assert_eq!(h.scorer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(c.snapshot().state, WorkflowState::Idle);
        assert!(c.snapshot().scores.is_none());
    }

    #[tokio::test]
    async fn persistence_transport_error_is_a_persistence_failure() {
        let h = Harness::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::returning(crate::orchestrator::testing::sample_scores()),
            FakeStore::unreachable(),
        );
        let (mut c, _rx) = controller(&h);
        c.search("12345").await.unwrap();
        let (_dir, path) = video_file(32);
        c.select_media(&path).unwrap();
        let Some(RunOutcome::Failed(f)) = c.start_analysis().await else {
            panic!("expected failure");
        };
        assert_eq!(f.kind, FailureKind::Persistence);
        assert!(c.snapshot().scores.is_some());
    }

    #[tokio::test]
    async fn scoring_failure_discards_scores() {
        let h = Harness::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::failing("missing efficiency"),
            FakeStore::succeeding(None),
        );
        let (mut c, _rx) = controller(&h);
        c.search("12345").await.unwrap();
        let (_dir, path) = video_file(32);
        c.select_media(&path).unwrap();
        let Some(RunOutcome::Failed(f)) = c.start_analysis().await else {
            panic!("expected failure");
        };
        assert_eq!(f.kind, FailureKind::Scoring);
        assert!(c.snapshot().scores.is_none());
        assert_eq!(c.snapshot().state, WorkflowState::Ready);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 0);
        assert!(!c.workflow().countdown_active());
    }

    #[tokio::test]
    async fn reset_without_selection_makes_no_release_calls() {
        let h = Harness::happy();
        let (mut c, _rx) = controller(&h);
        c.search("12345").await.unwrap();
        assert!(c.reset());
        assert_eq!(c.workflow().previews().released_count(), 0);
        assert_eq!(c.snapshot().state, WorkflowState::Idle);
        assert!(c.snapshot().student.is_none());
    }

    #[tokio::test]
    async fn end_to_end_completed_state_is_observable() {
        let h = Harness::happy();
        let (mut c, mut rx) = controller(&h);

        let student = c.search("12345").await.unwrap().unwrap();
        assert_eq!(student.full_name, "Somchai Jaidee");
        let (_dir, path) = video_file(2 * 1024 * 1024);
        c.select_media(&path).unwrap();
        assert_eq!(c.snapshot().state, WorkflowState::Ready);
        drain(&mut rx);

        let Some(RunOutcome::Completed(report)) = c.start_analysis().await else {
            panic!("expected completion");
        };
        assert_eq!(report.scores.total_score, 38.0);
        assert!((report.scores.average_score - 7.6).abs() < 1e-9);
        assert_eq!(
            report.stored_video_reference.as_deref(),
            Some("https://example/video123")
        );
        assert_eq!(
            *h.scorer.last_video_len.lock().unwrap(),
            Some(2 * 1024 * 1024)
        );

        let record = h.store.last_record.lock().unwrap().clone().unwrap();
        assert_eq!(record.student.student_id, "12345");
        assert_eq!(record.video_link, VIDEO_LINK_PLACEHOLDER);
        assert_eq!(record.sport, Sport::Volleyball.thai_label());
        assert_eq!(*h.store.last_had_video.lock().unwrap(), Some(true));

        let events = drain(&mut rx);
        let completed = events
            .iter()
            .find_map(|ev| match ev {
                WorkflowEvent::StateChanged { snapshot }
                    if snapshot.state == WorkflowState::Completed =>
                {
                    Some(snapshot.clone())
                }
                _ => None,
            })
            .expect("completed snapshot emitted");
        let scores = completed.scores.as_ref().unwrap();
        assert_eq!(scores.total_score, 38.0);
        assert!((scores.average_score - 7.6).abs() < 1e-9);
        assert_eq!(
            completed
                .outcome
                .as_ref()
                .and_then(|o| o.stored_video_reference.as_deref()),
            Some("https://example/video123")
        );
        assert!(completed.media.is_some());
        assert_eq!(states(&events).last(), Some(&WorkflowState::Idle));
    }

    #[tokio::test]
    async fn blank_search_never_calls_lookup() {
        let h = Harness::happy();
        let (mut c, mut rx) = controller(&h);
        for blank in ["", "   ", "\t\n"] {
            assert!(c.search(blank).await.unwrap().is_none());
        }
        assert_eq!(c.snapshot().state, WorkflowState::Idle);
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 0);
        assert!(states(&drain(&mut rx)).is_empty());
    }

    #[tokio::test]
    async fn lookup_errors_are_distinct_from_not_found() {
        let h = Harness::new(
            FakeDirectory::offline(),
            FakeScorer::returning(crate::orchestrator::testing::sample_scores()),
            FakeStore::succeeding(None),
        );
        let (mut c, _rx) = controller(&h);
        assert!(matches!(
            c.search("12345").await,
            Err(WorkflowError::Lookup(PortError::Transport(_)))
        ));

        let h = Harness::happy();
        let (mut c, _rx) = controller(&h);
        assert!(matches!(
            c.search("00000").await,
            Err(WorkflowError::StudentNotFound(_))
        ));
        assert_eq!(c.snapshot().state, WorkflowState::Idle);
    }

    #[tokio::test]
    async fn decode_failure_drops_media_and_returns_idle() {
        let h = Harness::happy();
        let (mut c, _rx) = controller(&h);
        c.search("12345").await.unwrap();
        let (dir, path) = video_file(32);
        c.select_media(&path).unwrap();
        drop(dir);

        let Some(RunOutcome::Failed(f)) = c.start_analysis().await else {
            panic!("expected failure");
        };
        assert_eq!(f.kind, FailureKind::Decode);
        assert_eq!(c.snapshot().state, WorkflowState::Idle);
        assert!(c.snapshot().media.is_none());
        assert_eq!(h.scorer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(c.workflow().previews().live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_runs_a_full_session_from_commands() {
        let h = Harness::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::returning(crate::orchestrator::testing::sample_scores())
                .delayed(Duration::from_secs(5)),
            FakeStore::succeeding(Some("https://example/video123")),
        );
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let c = AnalysisController::new(h.ports(), WorkflowSettings::default(), Some(event_tx));
        let driver = tokio::spawn(run_controller(c, cmd_rx));

        cmd_tx.send(UiCommand::Search("12345".into())).unwrap();
        // A resolved student starts a fresh session, so pick media afterwards.
        loop {
            match event_rx.recv().await.unwrap() {
                WorkflowEvent::StateChanged { snapshot } if snapshot.student.is_some() => break,
                _ => {}
            }
        }
        let (_dir, path) = video_file(64);
        cmd_tx.send(UiCommand::SelectMedia(path)).unwrap();
        cmd_tx.send(UiCommand::SetTestPhase(TestPhase::PostTest)).unwrap();
        cmd_tx.send(UiCommand::StartAnalysis).unwrap();
        // Second start while analyzing is ignored.
        cmd_tx.send(UiCommand::StartAnalysis).unwrap();

        let mut ticks = 0;
        let report = loop {
            match event_rx.recv().await.unwrap() {
                WorkflowEvent::Countdown { .. } => ticks += 1,
                WorkflowEvent::RunCompleted { report } => break report,
                _ => {}
            }
        };
        assert!(ticks >= 4);
        assert_eq!(report.config.test_phase, TestPhase::PostTest);
        assert_eq!(h.scorer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.store.calls.load(Ordering::SeqCst), 1);

        cmd_tx.send(UiCommand::Quit).unwrap();
        driver.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_step_fails_the_run_and_stops_the_countdown() {
        let h = Harness::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::panicking().delayed(Duration::from_secs(2)),
            FakeStore::succeeding(None),
        );
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let c = AnalysisController::new(h.ports(), WorkflowSettings::default(), Some(event_tx));
        let driver = tokio::spawn(run_controller(c, cmd_rx));

        cmd_tx.send(UiCommand::Search("12345".into())).unwrap();
        loop {
            match event_rx.recv().await.unwrap() {
                WorkflowEvent::StateChanged { snapshot } if snapshot.student.is_some() => break,
                _ => {}
            }
        }
        let (_dir, path) = video_file(64);
        cmd_tx.send(UiCommand::SelectMedia(path)).unwrap();
        cmd_tx.send(UiCommand::StartAnalysis).unwrap();

        let failure = loop {
            match event_rx.recv().await.unwrap() {
                WorkflowEvent::RunFailed { failure } => break failure,
                _ => {}
            }
        };
        assert_eq!(failure.kind, FailureKind::Runtime);
        assert!(failure.message.contains("background task failed"));

        // Let well past the 45s estimate elapse.
        tokio::time::sleep(Duration::from_secs(60)).await;
        let after = drain(&mut event_rx);
        let failed = after
            .iter()
            .find_map(|ev| match ev {
                WorkflowEvent::StateChanged { snapshot }
                    if snapshot.state == WorkflowState::Failed(FailureKind::Runtime) =>
                {
                    Some(snapshot.clone())
                }
                _ => None,
            })
            .expect("failed snapshot emitted");
        assert!(failed.countdown.is_none());
        assert!(failed.scores.is_none());
        assert_eq!(
            states(&after),
            vec![WorkflowState::Failed(FailureKind::Runtime), WorkflowState::Ready]
        );
        assert!(!after
            .iter()
            .any(|ev| matches!(ev, WorkflowEvent::Countdown { .. })));

        cmd_tx.send(UiCommand::Quit).unwrap();
        driver.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_holds_at_zero_when_scoring_overruns() {
        let h = Harness::new(
            FakeDirectory::with(sample_student()),
            FakeScorer::returning(crate::orchestrator::testing::sample_scores())
                .delayed(Duration::from_secs(20)),
            FakeStore::succeeding(None),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let settings = WorkflowSettings {
            estimate_secs: 3,
            ..Default::default()
        };
        let mut c = AnalysisController::new(h.ports(), settings, Some(tx));
        c.search("12345").await.unwrap();
        let (_dir, path) = video_file(64);
        c.select_media(&path).unwrap();
        drain(&mut rx);

        let outcome = c.start_analysis().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert!(!c.workflow().countdown_active());

        let events = drain(&mut rx);
        let ticks: Vec<u32> = events
            .iter()
            .filter_map(|ev| match ev {
                WorkflowEvent::Countdown { remaining } => Some(*remaining),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![2, 1, 0]);

        // Still counting as active, pinned at zero, once scoring returns.
        let persisting = events
            .iter()
            .find_map(|ev| match ev {
                WorkflowEvent::StateChanged { snapshot }
                    if snapshot.state == WorkflowState::Analyzing(AnalyzingPhase::Persisting) =>
                {
                    Some(snapshot.countdown)
                }
                _ => None,
            })
            .expect("persisting snapshot emitted");
        assert_eq!(persisting, Some(0));
        assert_eq!(states(&events).last(), Some(&WorkflowState::Idle));
    }
}
