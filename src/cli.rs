use crate::logging::{self, LogTarget};
use crate::model::{ClientConfig, RunReport, Sport, TestPhase, WorkflowEvent, WorkflowState};
use crate::orchestrator::{process_run_completion, AnalysisController, RunOutcome, WorkflowSettings};
use crate::ports::Ports;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "skill-analyzer",
    version,
    about = "AI-assisted sports skill assessment with optional TUI"
)]
pub struct Cli {
    /// Spreadsheet web-app script URL (student roster and result rows)
    #[arg(long, env = "SKILL_SCRIPT_URL")]
    pub script_url: Option<String>,

    /// Gemini API keys, comma separated; one is picked per scoring call
    #[arg(
        long = "gemini-api-keys",
        env = "SKILL_GEMINI_API_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub gemini_api_keys: Vec<String>,

    /// Gemini model used for scoring
    #[arg(long, env = "SKILL_GEMINI_MODEL", default_value = "gemini-3-flash-preview")]
    pub gemini_model: String,

    /// Base URL for the Gemini API
    #[arg(
        long,
        env = "SKILL_GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_base_url: String,

    /// Timeout applied to every remote call
    #[arg(long, default_value = "300s")]
    pub request_timeout: humantime::Duration,

    /// Sport a new session starts with
    #[arg(long, value_enum, default_value_t = Sport::Volleyball)]
    pub sport: Sport,

    /// Test phase a new session starts with
    #[arg(long, value_enum, default_value_t = TestPhase::PreTest)]
    pub phase: TestPhase,

    /// Use --upload-video true or --upload-video false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub upload_video: bool,

    /// Countdown estimate shown while an analysis runs, in seconds
    #[arg(long, default_value_t = crate::model::DEFAULT_ESTIMATE_SECS)]
    pub estimate: u32,

    /// Student id to analyze (no TUI)
    #[arg(long)]
    pub student: Option<String>,

    /// Video file to analyze (no TUI)
    #[arg(long)]
    pub video: Option<PathBuf>,

    /// Print JSON report and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors
    #[arg(long)]
    pub silent: bool,

    /// Export the completed run report as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// True when the run should skip the TUI.
    pub fn is_headless(&self) -> bool {
        self.json
            || self.text
            || self.silent
            || self.student.is_some()
            || self.video.is_some()
            || cfg!(not(feature = "tui"))
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    if !args.is_headless() {
        #[cfg(feature = "tui")]
        {
            let log_path = logging::init(args.verbose, false, LogTarget::DataDirFile)?;
            let cfg = build_config(&args)?;
            return crate::tui::run(args, cfg, log_path).await;
        }
    }

    logging::init(args.verbose, args.silent, LogTarget::Stderr)?;
    let cfg = build_config(&args)?;
    run_headless(args, cfg).await
}

/// Build a `ClientConfig` from CLI arguments and the environment.
pub fn build_config(args: &Cli) -> Result<ClientConfig> {
    let script_url = args
        .script_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .context("missing script URL: set SKILL_SCRIPT_URL or pass --script-url")?
        .to_string();
    let gemini_api_keys: Vec<String> = args
        .gemini_api_keys
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if gemini_api_keys.is_empty() {
        anyhow::bail!("missing Gemini API key: set SKILL_GEMINI_API_KEYS or pass --gemini-api-keys");
    }

    Ok(ClientConfig {
        script_url,
        gemini_base_url: args.gemini_base_url.clone(),
        gemini_model: args.gemini_model.clone(),
        gemini_api_keys,
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("skill-analyzer/{}", env!("CARGO_PKG_VERSION")),
        upload_video: args.upload_video,
        estimate_secs: args.estimate,
        default_session: crate::model::SessionConfig {
            sport: args.sport,
            test_phase: args.phase,
        },
    })
}

/// One-line progress text for a workflow event in text mode.
fn progress_line(ev: &WorkflowEvent) -> Option<String> {
    match ev {
        WorkflowEvent::StateChanged { snapshot } => match snapshot.state {
            WorkflowState::Searching | WorkflowState::Analyzing(_) => {
                Some(format!("== {} ==", snapshot.status))
            }
            _ => None,
        },
        WorkflowEvent::Countdown { remaining } if remaining % 10 == 0 => {
            Some(format!("About {remaining}s remaining…"))
        }
        WorkflowEvent::Countdown { .. } => None,
        WorkflowEvent::Notice(notice) => Some(notice.to_message()),
        WorkflowEvent::RunCompleted { .. } | WorkflowEvent::RunFailed { .. } => None,
    }
}

/// Search, select and analyze in one pass, then print the report.
async fn run_headless(args: Cli, cfg: ClientConfig) -> Result<()> {
    let student = args
        .student
        .clone()
        .context("headless mode needs --student ID")?;
    let video = args
        .video
        .clone()
        .context("headless mode needs --video PATH")?;
    let ports = Ports::from_config(&cfg).context("failed to initialise remote clients")?;

    let (out_tx, out_handle) = if args.silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    // Progress goes to stderr in text mode; JSON and silent modes only drain.
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let progress_tx = out_tx.clone().filter(|_| !args.json);
    let printer = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            if let (Some(tx), Some(line)) = (progress_tx.as_ref(), progress_line(&ev)) {
                let _ = tx.send(OutputLine::Stderr(line));
            }
        }
    });

    let outcome = {
        let mut controller =
            AnalysisController::new(ports, WorkflowSettings::from(&cfg), Some(evt_tx));
        analyze(&mut controller, &student, video).await
    };
    // The controller (and its event sender) is gone; let the printer drain.
    let _ = printer.await;
    let report = outcome?;

    let processed = process_run_completion(args.export_json.as_deref(), &report);
    if args.export_json.is_some() && processed.exported_path.is_none() {
        anyhow::bail!(processed.export_messages.join("; "));
    }

    if let Some(tx) = out_tx.as_ref() {
        for msg in processed.export_messages {
            let _ = tx.send(OutputLine::Stderr(msg));
        }
        if args.json {
            let out = serde_json::to_string_pretty(&report)?;
            let _ = tx.send(OutputLine::Stdout(out));
        } else {
            for line in crate::text_summary::build_text_summary(&report).lines {
                let _ = tx.send(OutputLine::Stdout(line));
            }
        }
    }

    drop(out_tx);
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }
    Ok(())
}

async fn analyze(
    controller: &mut AnalysisController,
    student: &str,
    video: PathBuf,
) -> Result<RunReport> {
    controller
        .search(student)
        .await
        .with_context(|| format!("could not resolve student {student:?}"))?
        .context("student id is blank")?;
    controller
        .select_media(&video)
        .with_context(|| format!("video {} was not accepted", video.display()))?;

    match controller
        .start_analysis()
        .await
        .context("session was not ready to analyze")?
    {
        RunOutcome::Completed(report) => Ok(*report),
        RunOutcome::Failed(failure) => Err(anyhow::anyhow!(
            "analysis failed ({:?}): {}",
            failure.kind,
            failure.message
        )),
    }
}
