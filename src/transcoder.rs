use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("transcode failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TranscodedMedia {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

/// Optional collaborator that re-encodes image assets before upload.
///
/// Only invoked for image media. On failure the caller uses the original
/// bytes, type and filename unchanged; a failing transcoder can never fail
/// an import.
#[async_trait::async_trait]
pub trait MediaTranscoder: Send + Sync {
    async fn optimize(
        &self,
        data: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<TranscodedMedia, TranscodeError>;
}
