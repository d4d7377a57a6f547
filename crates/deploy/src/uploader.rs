//! Batched image upload.

use anyhow::Result;
use futures::future::try_join_all;

use crate::{MarketplaceApi, RetryPolicy, UploadedFile, retry::retry};

/// Default number of concurrent uploads per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Uploads images in fixed-size batches.
///
/// Uploads inside a batch run concurrently, batches run one after another.
/// Each upload is retried under the configured policy. Files that already
/// carry an `uploaded_url` are skipped, so a failed run can be resumed with
/// the same slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataUploader {
    batch_size: usize,
    retry: RetryPolicy,
}

impl Default for MetadataUploader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, RetryPolicy::default())
    }
}

impl MetadataUploader {
    pub fn new(batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upload every file without a URL, returning how many were uploaded.
    ///
    /// The first failing upload aborts its batch and the run. Files of
    /// earlier batches keep their URL.
    pub async fn upload_all<M: MarketplaceApi>(
        &self,
        api: &M,
        token: &str,
        files: &mut [UploadedFile],
    ) -> Result<usize> {
        let pending: Vec<usize> = files
            .iter()
            .enumerate()
            .filter(|(_, file)| !file.is_uploaded())
            .map(|(index, _)| index)
            .collect();

        if pending.is_empty() {
            tracing::debug!("All images already uploaded");
            return Ok(0);
        }

        tracing::info!(
            pending = pending.len(),
            total = files.len(),
            batch_size = self.batch_size,
            "Uploading images"
        );

        for (batch_number, batch) in pending.chunks(self.batch_size).enumerate() {
            let uploads = batch.iter().map(|&index| {
                let file = &files[index];
                async move {
                    let operation = format!("Upload of {}", file.filename);
                    let url = retry(&self.retry, &operation, || {
                        api.upload_image(token, &file.filename, &file.bytes)
                    })
                    .await?;
                    Ok::<_, anyhow::Error>((index, url))
                }
            });

            let uploaded = try_join_all(uploads).await?;
            for (index, url) in uploaded {
                tracing::debug!(file = %files[index].filename, %url, "Image uploaded");
                files[index].uploaded_url = Some(url);
            }
            tracing::debug!(batch = batch_number + 1, "Upload batch complete");
        }

        Ok(pending.len())
    }
}
