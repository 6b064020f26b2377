//! Dependency-ordered batch uploads
//!
//! Paths are grouped into levels by depth; levels run one after another and
//! the files of a level run concurrently, at most `concurrency` at a time. A
//! failing file is reported on the `error` channel and never stops the rest of
//! the batch. Two items naming the same path after sanitizing are a conflict:
//! the first one uploads, later ones fail with a validation error.

use crate::{
    events::{EventEmitter, EventKind, ListenerId, UploadEvent},
    object_store::ObjectStore,
    types::{DirEntry, FileUploadResult, PushItem, UploadItem, UploadSummary},
    ClientError, Result,
};
use bytes::Bytes;
use fula_core::{sanitize_path, segments, BucketMetadata, FileMetadata, MetadataStore, PathOrderer};
use fula_replica::Replica;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A running batch upload
pub struct UploadHandle {
    emitter: Arc<EventEmitter>,
    cancel: CancellationToken,
    task: JoinHandle<UploadSummary>,
}

impl fmt::Debug for UploadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl UploadHandle {
    /// Listen to every event of `kind`, including ones already emitted
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&UploadEvent) + Send + Sync + 'static,
    {
        self.emitter.on(kind, callback)
    }

    /// Listen to the first event of `kind`
    pub fn once<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&UploadEvent) + Send + Sync + 'static,
    {
        self.emitter.once(kind, callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    /// Report every file that has not started yet as cancelled
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the `done` summary
    pub async fn wait(self) -> Result<UploadSummary> {
        self.task
            .await
            .map_err(|e| ClientError::RemoteOperationFailure(format!("upload task failed: {}", e)))
    }
}

/// Uploads a batch of files into one bucket.
///
/// `concurrency` caps how many files of one level are in flight together;
/// results still come back in level order.
pub struct UploadPipeline<R: Replica, O: ObjectStore> {
    store: Arc<MetadataStore<R>>,
    objects: Arc<O>,
    bucket: BucketMetadata,
    concurrency: usize,
}

impl<R, O> UploadPipeline<R, O>
where
    R: Replica + 'static,
    O: ObjectStore + 'static,
{
    pub fn new(
        store: Arc<MetadataStore<R>>,
        objects: Arc<O>,
        bucket: BucketMetadata,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            objects,
            bucket,
            concurrency: concurrency.max(1),
        }
    }

    /// Spawn the upload and return its handle
    pub fn start(self, items: Vec<UploadItem>, cancel: CancellationToken) -> UploadHandle {
        let emitter = Arc::new(EventEmitter::new());
        let task = tokio::spawn(self.run(items, Arc::clone(&emitter), cancel.clone()));
        UploadHandle {
            emitter,
            cancel,
            task,
        }
    }

    /// Upload every item, emitting one `data` or `error` per file and a final `done`
    #[instrument(skip_all, fields(bucket = %self.bucket.slug, files = items.len()))]
    pub async fn run(
        self,
        items: Vec<UploadItem>,
        emitter: Arc<EventEmitter>,
        cancel: CancellationToken,
    ) -> UploadSummary {
        let mut results = Vec::with_capacity(items.len());
        let mut seen = HashSet::new();
        let (items, duplicates): (Vec<_>, Vec<_>) = items.into_iter().partition(|item| {
            segments(&item.path).next().is_none() || seen.insert(sanitize_path(&item.path))
        });
        let mut orderer = PathOrderer::new(items, |item| item.path.as_str());

        for item in orderer.take_rootless() {
            let result = FileUploadResult::failure(
                item.path,
                ClientError::Validation("path has no segments".to_string()),
            );
            emitter.emit(UploadEvent::Error(result.clone()));
            results.push(result);
        }

        for item in duplicates {
            let path = sanitize_path(&item.path);
            warn!(path = %path, "duplicate path in batch");
            let result = FileUploadResult::failure(
                path,
                ClientError::Validation("duplicate path in batch".to_string()),
            );
            emitter.emit(UploadEvent::Error(result.clone()));
            results.push(result);
        }

        for (depth, level) in orderer.into_levels().into_iter().enumerate() {
            debug!(level = depth + 1, files = level.len(), "uploading level");
            let uploads: Vec<_> = level
                .into_iter()
                .map(|item| self.upload_one(item, &cancel, &emitter))
                .collect();
            let level_results: Vec<FileUploadResult> = stream::iter(uploads)
                .buffered(self.concurrency)
                .collect()
                .await;
            results.extend(level_results);
        }

        let summary = UploadSummary {
            bucket: self.bucket.slug.clone(),
            results,
        };
        info!(
            succeeded = summary.succeeded().count(),
            failed = summary.failed().count(),
            "batch upload finished"
        );
        emitter.emit(UploadEvent::Done(summary.clone()));
        summary
    }

    async fn upload_one(
        &self,
        item: UploadItem,
        cancel: &CancellationToken,
        emitter: &EventEmitter,
    ) -> FileUploadResult {
        let path = sanitize_path(&item.path);
        let outcome = if cancel.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            self.store_file(&path, item).await
        };

        match outcome {
            Ok((entry, metadata)) => {
                let result = FileUploadResult::success(path, entry, metadata);
                emitter.emit(UploadEvent::Data(result.clone()));
                result
            }
            Err(e) => {
                warn!(path = %path, error = %e, "file upload failed");
                let result = FileUploadResult::failure(path, e);
                emitter.emit(UploadEvent::Error(result.clone()));
                result
            }
        }
    }

    async fn store_file(&self, path: &str, item: UploadItem) -> Result<(DirEntry, FileMetadata)> {
        let sealed = self.bucket.encryption_key.encrypt(&item.data)?;
        self.objects
            .push_path(
                &self.bucket.bucket_key,
                &self.bucket.slug,
                PushItem {
                    path: path.to_string(),
                    content: Bytes::from(sealed),
                },
            )
            .await?;
        let listing = self.objects.list_path(&self.bucket.bucket_key, path).await?;

        let existing = self
            .store
            .find_file_metadata(&self.bucket.slug, &self.bucket.db_id, path)
            .await?;
        let uuid = existing
            .and_then(|m| m.uuid)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mime_type = item.mime_type.or_else(|| {
            mime_guess::from_path(path)
                .first()
                .map(|m| m.essence_str().to_string())
        });

        let mut update = FileMetadata::new(&self.bucket.slug, &self.bucket.db_id, path).with_uuid(uuid);
        update.mime_type = mime_type;
        let metadata = self.store.upsert_file_metadata(update).await?;
        Ok((listing.entry, metadata))
    }
}
