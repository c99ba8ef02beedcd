//! tracing subscriber setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub enum LogTarget {
    Stderr,
    /// `<data dir>/skill-analyzer/skill-analyzer.log`, keeps the terminal clean for the TUI.
    #[cfg_attr(not(feature = "tui"), allow(dead_code))]
    DataDirFile,
}

fn filter(verbose: bool, silent: bool) -> EnvFilter {
    if silent {
        return EnvFilter::new("error");
    }
    let default = if verbose {
        "skill_analyzer=debug"
    } else {
        "skill_analyzer=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn log_file_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("skill-analyzer").join("skill-analyzer.log"))
}

/// Install the global subscriber. Returns the log file path when logging to disk.
pub fn init(verbose: bool, silent: bool, target: LogTarget) -> Result<Option<PathBuf>> {
    let env_filter = filter(verbose, silent);
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init()
                .context("failed to install log subscriber")?;
            Ok(None)
        }
        LogTarget::DataDirFile => {
            let Some(path) = log_file_path() else {
                // No data dir on this platform; run without logs.
                return Ok(None);
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .try_init()
                .context("failed to install log subscriber")?;
            Ok(Some(path))
        }
    }
}
