use thiserror::Error;

/// Failure taxonomy for the extraction pipeline.
///
/// `Fetch` is fatal for the resource being processed: extraction aborts and
/// nothing is persisted. Every other variant is transient — the component
/// that observes it logs and degrades to its "no result" value, so nothing
/// here is ever fatal to the batch.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("resource fetch failed: {0}")]
    Fetch(#[source] reqwest::Error),

    #[error("audio download failed: {0}")]
    Download(String),

    #[error("transcription backend: {0}")]
    Transcription(String),

    #[error("classification backend: {0}")]
    Classification(String),

    #[error("browser session: {0}")]
    Browser(String),

    #[error("pdf extraction: {0}")]
    Pdf(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
