// Bounded-batch media upload. A fixed-size window of uploads runs
// concurrently; the whole window completes (successes and failures both)
// before the next one starts, so batch progress stays monotonic. A failed
// asset is skipped and counted, never fatal to the run.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::apkg::media::MediaAsset;
use crate::models::{content_type, MimeCategory};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::transcoder::MediaTranscoder;

#[derive(Debug, Default)]
pub struct MediaUploadOutcome {
    /// Resolved filename -> public URL, for rewriting note references.
    pub urls: HashMap<String, String>,
    pub uploaded: usize,
    pub failed: usize,
}

pub struct MediaUploadPipeline {
    object_store: Arc<dyn ObjectStore>,
    transcoder: Option<Arc<dyn MediaTranscoder>>,
}

impl MediaUploadPipeline {
    pub fn new(object_store: Arc<dyn ObjectStore>, transcoder: Option<Arc<dyn MediaTranscoder>>) -> Self {
        MediaUploadPipeline {
            object_store,
            transcoder,
        }
    }

    pub async fn upload_all(
        &self,
        assets: &[MediaAsset],
        folder: &str,
        batch_size: usize,
        mut on_batch: impl FnMut(usize, usize),
    ) -> MediaUploadOutcome {
        let total = assets.len();
        let mut outcome = MediaUploadOutcome::default();
        let mut completed = 0usize;

        for window in assets.chunks(batch_size.max(1)) {
            let uploads = window.iter().map(|asset| self.upload_one(asset, folder));
            for (asset, result) in window.iter().zip(join_all(uploads).await) {
                completed += 1;
                match result {
                    Ok(url) => {
                        outcome.urls.insert(asset.resolved_filename.clone(), url);
                        outcome.uploaded += 1;
                    }
                    Err(e) => {
                        warn!("media upload failed for {}, skipping: {}", asset.resolved_filename, e);
                        outcome.failed += 1;
                    }
                }
            }
            on_batch(completed, total);
        }

        debug!("uploaded {}/{} media assets", outcome.uploaded, total);
        outcome
    }

    async fn upload_one(&self, asset: &MediaAsset, folder: &str) -> Result<String, ObjectStoreError> {
        let mime = content_type(&asset.resolved_filename).to_string();

        let (data, mime, filename) = match (&self.transcoder, asset.mime_category) {
            (Some(transcoder), MimeCategory::Image) => {
                match transcoder.optimize(&asset.bytes, &mime, &asset.resolved_filename).await {
                    Ok(optimized) => (optimized.data, optimized.mime_type, optimized.filename),
                    Err(e) => {
                        debug!(
                            "transcoder failed for {}, uploading original: {}",
                            asset.resolved_filename, e
                        );
                        (asset.bytes.clone(), mime, asset.resolved_filename.clone())
                    }
                }
            }
            _ => (asset.bytes.clone(), mime, asset.resolved_filename.clone()),
        };

        self.object_store.upload(&data, &filename, &mime, folder).await
    }
}
