//! Outbound ports used by the analysis workflow, and their HTTP adapters.

mod gemini;
mod sheet;

pub use gemini::GeminiScorer;
pub use sheet::SheetClient;

use crate::error::PortError;
use crate::model::{
    ClientConfig, CompositeRecord, EncodedMedia, PersistenceOutcome, ScoreRecord, SessionConfig,
    StudentRecord,
};
use std::sync::Arc;

/// Inputs to a scoring call.
pub struct ScoringRequest<'a> {
    pub video: &'a EncodedMedia,
    pub config: SessionConfig,
    pub student_name: &'a str,
}

/// Resolves a student id. `Ok(None)` means "not found"; `Err` is a transport
/// or protocol failure.
#[async_trait::async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn lookup(&self, identifier: &str) -> Result<Option<StudentRecord>, PortError>;
}

/// Turns video content plus labels into a complete [`ScoreRecord`].
#[async_trait::async_trait]
pub trait ScoringPort: Send + Sync {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<ScoreRecord, PortError>;
}

/// Stores a composite record, optionally with the video itself.
#[async_trait::async_trait]
pub trait PersistencePort: Send + Sync {
    async fn persist(
        &self,
        record: &CompositeRecord,
        video: Option<&EncodedMedia>,
    ) -> Result<PersistenceOutcome, PortError>;
}

#[derive(Clone)]
pub struct Ports {
    pub directory: Arc<dyn StudentDirectory>,
    pub scorer: Arc<dyn ScoringPort>,
    pub store: Arc<dyn PersistencePort>,
}

impl Ports {
    /// Wire the HTTP adapters from configuration.
    pub fn from_config(cfg: &ClientConfig) -> Result<Self, PortError> {
        let sheet = Arc::new(SheetClient::new(cfg)?);
        let scorer = Arc::new(GeminiScorer::new(cfg)?);
        Ok(Self {
            directory: sheet.clone(),
            scorer,
            store: sheet,
        })
    }
}
