//! Local media handling: inspecting a picked file, issuing preview handles,
//! and transcoding content to base64 for the remote calls.

use crate::error::WorkflowError;
use crate::model::{EncodedMedia, MediaCandidate, PreviewHandle};
use base64::Engine as _;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Used when neither sniffing nor the extension gives a video type.
const FALLBACK_MIME: &str = "video/mp4";

/// Stat a picked file and work out its MIME type. Size limits are enforced
/// later by the workflow so oversized picks still clear the old selection.
pub fn inspect(path: &Path) -> Result<MediaCandidate, WorkflowError> {
    let meta = std::fs::metadata(path).map_err(WorkflowError::MediaUnavailable)?;
    if !meta.is_file() {
        return Err(WorkflowError::MediaUnavailable(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }

    let mime_type = detect_mime(path)?;
    Ok(MediaCandidate {
        path: path.to_path_buf(),
        size: meta.len(),
        mime_type,
    })
}

fn detect_mime(path: &Path) -> Result<String, WorkflowError> {
    // Magic bytes win over the extension; a renamed PNG is still a PNG.
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        if kind.matcher_type() == infer::MatcherType::Video {
            return Ok(kind.mime_type().to_string());
        }
        return Err(WorkflowError::UnsupportedMedia(kind.mime_type().to_string()));
    }
    Ok(mime_from_extension(path)
        .unwrap_or(FALLBACK_MIME)
        .to_string())
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "3gp" => "video/3gpp",
        "mpeg" | "mpg" => "video/mpeg",
        _ => return None,
    };
    Some(mime)
}

/// Issues preview handles and tracks which are still live.
///
/// Every handle returned by [`PreviewRegistry::create`] must come back through
/// [`PreviewRegistry::release`]; the counters make leaks observable.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: u64,
    live: HashMap<u64, PathBuf>,
    created: u64,
    released: u64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, path: &Path) -> PreviewHandle {
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.next_id += 1;
        self.created += 1;
        let id = self.next_id;
        let uri = format!("file://{}#preview-{id}", absolute.display());
        self.live.insert(id, absolute);
        tracing::debug!(id, uri = %uri, "preview handle created");
        PreviewHandle { id, uri }
    }

    pub fn release(&mut self, handle: PreviewHandle) {
        if self.live.remove(&handle.id).is_some() {
            self.released += 1;
            tracing::debug!(id = handle.id, "preview handle released");
        } else {
            tracing::warn!(id = handle.id, "release of unknown preview handle");
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.created
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }
}

/// Read the whole file and base64 it. `limit` re-checks the size in case the
/// file grew after it was selected.
pub async fn encode(path: &Path, mime_type: &str, limit: u64) -> io::Result<EncodedMedia> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} bytes exceeds limit of {limit}", bytes.len()),
        ));
    }
    let base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(EncodedMedia {
        base64,
        mime_type: mime_type.to_string(),
        byte_len: bytes.len(),
    })
}
