//! Upload service: validate, name, store, and hand back a public URL.
//!
//! ```text
//! UploadFile ──► policy check ──► key ──► BlobStore::upload ──► public URL
//!                 (type, size)     │
//!                                  └─ [folder/]{millis}-{token}.{ext}
//! ```
//!
//! Policy violations are reported as [`ContentError::Validation`] before the
//! blob store is contacted. Each accepted file costs exactly one write; there
//! is no retry and no existence check (see [`crate::naming`] for the key
//! layout and its collision behaviour).
//!
//! ## Progress
//!
//! The blob store gives no byte-level progress, so progress is simulated on
//! an optional channel while the single write is in flight:
//!
//! | Event | When |
//! |---|---|
//! | `Percent(0)` | before validation |
//! | `Percent(n)` | every 100 ms, +10, capped at 90 |
//! | `Percent(100)` / `Failed` | write finished / anything failed |
//! | `Reset` | 500 ms after the outcome, from a detached task |

use crate::error::{ContentError, ContentResult};
use crate::imaging::{ImageBackend, PrepareConfig, prepare_image};
use crate::naming::{TOKEN_LEN, file_extension, key_from_public_url, random_token, storage_key};
use crate::store::BlobStore;
use crate::types::UploadFile;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, interval_at};

pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

const PROGRESS_TICK: Duration = Duration::from_millis(100);
const PROGRESS_STEP: u8 = 10;
const PROGRESS_CEILING: u8 = 90;
const RESET_DELAY: Duration = Duration::from_millis(500);

/// What the bucket accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub allowed_types: Vec<String>,
    pub max_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn check(&self, file: &UploadFile) -> ContentResult<()> {
        if !self.allowed_types.iter().any(|t| t == &file.mime) {
            return Err(ContentError::validation(format!(
                "File type not allowed for {}: {} (accepted: {})",
                file.name,
                file.mime,
                self.allowed_types.join(", ")
            )));
        }
        if file.size() > self.max_bytes {
            return Err(ContentError::validation(format!(
                "File too large: {} is {}, maximum is {}",
                file.name,
                human_size(file.size()),
                human_size(self.max_bytes)
            )));
        }
        Ok(())
    }
}

/// Render a byte count the way the operator reads it (`5 MB`, `812 KB`).
pub fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        let mb = b / MB;
        if mb.fract() == 0.0 {
            format!("{mb:.0} MB")
        } else {
            format!("{mb:.1} MB")
        }
    } else if b >= KB {
        format!("{:.0} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProgress {
    Percent(u8),
    Failed,
    Reset,
}

fn emit(progress: Option<&UnboundedSender<UploadProgress>>, event: UploadProgress) {
    if let Some(tx) = progress {
        // A dropped receiver just means nobody is watching.
        let _ = tx.send(event);
    }
}

fn schedule_reset(progress: Option<&UnboundedSender<UploadProgress>>) {
    if let Some(tx) = progress {
        let tx = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RESET_DELAY).await;
            let _ = tx.send(UploadProgress::Reset);
        });
    }
}

/// Uploads into one bucket under one policy.
pub struct UploadService<B: BlobStore + ?Sized> {
    store: Arc<B>,
    bucket: String,
    policy: UploadPolicy,
    prepare: PrepareConfig,
}

impl<B: BlobStore + ?Sized> UploadService<B> {
    pub fn new(store: Arc<B>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            policy: UploadPolicy::default(),
            prepare: PrepareConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prepare_config(mut self, prepare: PrepareConfig) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn validate(&self, file: &UploadFile) -> ContentResult<()> {
        self.policy.check(file)
    }

    fn new_key(&self, file: &UploadFile, folder: Option<&str>) -> String {
        let token = random_token(&mut rand::thread_rng(), TOKEN_LEN);
        storage_key(
            folder,
            Utc::now().timestamp_millis(),
            &token,
            &file_extension(file),
        )
    }

    pub async fn upload(&self, file: &UploadFile, folder: Option<&str>) -> ContentResult<String> {
        self.upload_with_progress(file, folder, None).await
    }

    /// Upload one file, reporting simulated progress on `progress`.
    pub async fn upload_with_progress(
        &self,
        file: &UploadFile,
        folder: Option<&str>,
        progress: Option<&UnboundedSender<UploadProgress>>,
    ) -> ContentResult<String> {
        emit(progress, UploadProgress::Percent(0));
        let result = self.write_with_ticks(file, folder, progress).await;
        emit(
            progress,
            match result {
                Ok(_) => UploadProgress::Percent(100),
                Err(_) => UploadProgress::Failed,
            },
        );
        schedule_reset(progress);
        result
    }

    async fn write_with_ticks(
        &self,
        file: &UploadFile,
        folder: Option<&str>,
        progress: Option<&UnboundedSender<UploadProgress>>,
    ) -> ContentResult<String> {
        if let Err(e) = self.validate(file) {
            tracing::warn!(file = %file.name, error = %e, "upload rejected");
            return Err(e);
        }

        let key = self.new_key(file, folder);
        let write = self
            .store
            .upload(&self.bucket, &key, file.bytes.clone(), &file.mime);
        tokio::pin!(write);

        let mut ticker = interval_at(Instant::now() + PROGRESS_TICK, PROGRESS_TICK);
        let mut percent = 0u8;
        let outcome = loop {
            tokio::select! {
                res = &mut write => break res,
                _ = ticker.tick() => {
                    let next = (percent + PROGRESS_STEP).min(PROGRESS_CEILING);
                    if next != percent {
                        percent = next;
                        emit(progress, UploadProgress::Percent(percent));
                    }
                }
            }
        };

        match outcome {
            Ok(stored_key) => {
                let url = self.store.public_url(&self.bucket, &stored_key);
                tracing::info!(bucket = %self.bucket, key = %stored_key, bytes = file.size(), "uploaded");
                Ok(url)
            }
            Err(e) => {
                tracing::error!(bucket = %self.bucket, key = %key, error = %e, "upload failed");
                Err(ContentError::Upload(e))
            }
        }
    }

    /// Upload several files one after another.
    ///
    /// Every file is checked against the policy first, so a bad file late in
    /// the batch doesn't leave earlier ones orphaned in the bucket. After
    /// that, the first failed write aborts the batch and nothing is returned
    /// for the files already written.
    pub async fn upload_many(
        &self,
        files: &[UploadFile],
        folder: Option<&str>,
    ) -> ContentResult<Vec<String>> {
        for file in files {
            self.validate(file)?;
        }
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            urls.push(self.upload(file, folder).await?);
        }
        Ok(urls)
    }

    /// Shrink/recompress an image, then upload it.
    pub async fn prepare_and_upload(
        &self,
        backend: &impl ImageBackend,
        file: UploadFile,
        folder: Option<&str>,
    ) -> ContentResult<String> {
        let prepared = prepare_image(backend, file, &self.prepare)?;
        self.upload(&prepared, folder).await
    }

    pub async fn prepare_and_upload_many(
        &self,
        backend: &impl ImageBackend,
        files: Vec<UploadFile>,
        folder: Option<&str>,
    ) -> ContentResult<Vec<String>> {
        let prepared = files
            .into_iter()
            .map(|f| prepare_image(backend, f, &self.prepare))
            .collect::<Result<Vec<_>, _>>()?;
        self.upload_many(&prepared, folder).await
    }

    /// Delete an object given its public URL or its key.
    pub async fn remove(&self, url_or_key: &str) -> ContentResult<()> {
        let key = key_from_public_url(url_or_key, &self.bucket).to_string();
        self.store
            .remove(&self.bucket, std::slice::from_ref(&key))
            .await
            .map_err(|e| {
                tracing::error!(bucket = %self.bucket, key = %key, error = %e, "delete failed");
                ContentError::Upload(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::store::memory::{MemoryStore, OpKind, StoreCall};
    use crate::test_helpers::{jpeg_bytes, padded_jpeg};
    use tokio::sync::mpsc;

    fn service(store: &Arc<MemoryStore>) -> UploadService<MemoryStore> {
        UploadService::new(store.clone(), "galeria")
    }

    fn photo(name: &str, size: usize) -> UploadFile {
        UploadFile::new(name, "image/jpeg", vec![0xAB; size])
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UploadProgress>) -> Vec<UploadProgress> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    #[test]
    fn human_size_formats() {
        assert_eq!(human_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(human_size(6 * 1024 * 1024 + 512 * 1024), "6.5 MB");
        assert_eq!(human_size(2048), "2 KB");
        assert_eq!(human_size(12), "12 B");
    }

    #[tokio::test]
    async fn rejects_disallowed_type_without_touching_store() {
        let store = Arc::new(MemoryStore::new());
        let file = UploadFile::new("anim.gif", "image/gif", vec![1; 10]);

        let err = service(&store).upload(&file, None).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(ref m) if m.contains("image/gif")));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn rejects_oversized_file_without_touching_store() {
        let store = Arc::new(MemoryStore::new());
        let file = photo("grande.jpg", DEFAULT_MAX_BYTES + 1);

        let err = service(&store).upload(&file, None).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(ref m) if m.contains("too large")));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn exactly_max_size_is_accepted() {
        let store = Arc::new(MemoryStore::new());
        let file = photo("limite.jpg", DEFAULT_MAX_BYTES);
        assert!(service(&store).upload(&file, None).await.is_ok());
    }

    #[tokio::test]
    async fn upload_returns_public_url_under_folder() {
        let store = Arc::new(MemoryStore::new());
        let url = service(&store)
            .upload(&photo("por-do-sol.jpg", 10), Some("momentos"))
            .await
            .unwrap();

        let prefix = "https://memory.local/storage/v1/object/public/galeria/momentos/";
        assert!(url.starts_with(prefix), "{url}");
        assert!(url.ends_with(".jpg"));
        let key = url.trim_start_matches("https://memory.local/storage/v1/object/public/galeria/");
        assert_eq!(store.object("galeria", key), Some(vec![0xAB; 10]));
    }

    #[tokio::test]
    async fn repeated_uploads_get_distinct_urls() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let file = photo("mesma.jpg", 4);

        let a = svc.upload(&file, None).await.unwrap();
        let b = svc.upload(&file, None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.object_count("galeria"), 2);
    }

    #[tokio::test]
    async fn store_failure_is_upload_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(OpKind::Upload);

        let err = service(&store).upload(&photo("a.jpg", 4), None).await.unwrap_err();
        assert!(matches!(err, ContentError::Upload(_)));
    }

    #[tokio::test]
    async fn many_returns_urls_in_input_order() {
        let store = Arc::new(MemoryStore::new());
        let files = vec![photo("1.jpg", 1), photo("2.jpg", 2), photo("3.jpg", 3)];

        let urls = service(&store).upload_many(&files, None).await.unwrap();
        assert_eq!(urls.len(), 3);
        for (url, file) in urls.iter().zip(&files) {
            let key = key_from_public_url(url, "galeria");
            assert_eq!(store.object("galeria", key), Some(file.bytes.clone()));
        }
    }

    #[tokio::test]
    async fn many_aborts_on_first_failed_write() {
        let store = Arc::new(MemoryStore::new());
        store.fail_nth(OpKind::Upload, 1);
        let files = vec![photo("1.jpg", 1), photo("2.jpg", 2), photo("3.jpg", 3)];

        let err = service(&store).upload_many(&files, None).await.unwrap_err();
        assert!(matches!(err, ContentError::Upload(_)));
        // Third file never attempted.
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn many_validates_whole_batch_first() {
        let store = Arc::new(MemoryStore::new());
        let files = vec![
            photo("1.jpg", 1),
            UploadFile::new("x.gif", "image/gif", vec![1]),
        ];

        assert!(service(&store).upload_many(&files, None).await.is_err());
        assert!(store.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_ticks_then_completes_then_resets() {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(350)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service(&store)
            .upload_with_progress(&photo("a.jpg", 4), None, Some(&tx))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                UploadProgress::Percent(0),
                UploadProgress::Percent(10),
                UploadProgress::Percent(20),
                UploadProgress::Percent(30),
                UploadProgress::Percent(100),
            ]
        );
        assert_eq!(rx.recv().await, Some(UploadProgress::Reset));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_caps_at_ninety() {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(1550)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service(&store)
            .upload_with_progress(&photo("a.jpg", 4), None, Some(&tx))
            .await
            .unwrap();

        let events = drain(&mut rx);
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                UploadProgress::Percent(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_upload_reports_failed_then_reset() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let file = UploadFile::new("a.gif", "image/gif", vec![1]);

        assert!(
            service(&store)
                .upload_with_progress(&file, None, Some(&tx))
                .await
                .is_err()
        );
        assert_eq!(
            drain(&mut rx),
            vec![UploadProgress::Percent(0), UploadProgress::Failed]
        );
        assert_eq!(rx.recv().await, Some(UploadProgress::Reset));
    }

    #[tokio::test]
    async fn oversized_jpeg_uploads_after_preparation() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let big = UploadFile::new(
            "trilha.jpg",
            "image/jpeg",
            padded_jpeg(2400, 1200, 6 * 1024 * 1024),
        );

        assert!(matches!(
            svc.upload(&big, None).await,
            Err(ContentError::Validation(_))
        ));

        let url = svc
            .prepare_and_upload(&RustBackend::new(), big, Some("momentos"))
            .await
            .unwrap();
        assert!(url.starts_with("https://memory.local/storage/v1/object/public/galeria/momentos/"));
        assert_eq!(store.object_count("galeria"), 1);
    }

    #[tokio::test]
    async fn prepare_failure_skips_upload() {
        let store = Arc::new(MemoryStore::new());
        let broken = UploadFile::new("quebrada.jpg", "image/jpeg", b"nope".to_vec());

        let err = service(&store)
            .prepare_and_upload(&RustBackend::new(), broken, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Decode(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn prepare_many_uploads_each_prepared_file() {
        let store = Arc::new(MemoryStore::new());
        let files = vec![
            UploadFile::new("a.jpg", "image/jpeg", jpeg_bytes(64, 48)),
            UploadFile::new("b.jpg", "image/jpeg", jpeg_bytes(32, 32)),
        ];
        let urls = service(&store)
            .prepare_and_upload_many(&RustBackend::new(), files, None)
            .await
            .unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn remove_accepts_url_or_key() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let url = svc.upload(&photo("a.jpg", 1), Some("momentos")).await.unwrap();

        svc.remove(&url).await.unwrap();
        assert_eq!(store.object_count("galeria"), 0);

        svc.remove("momentos/ja-removido.jpg").await.unwrap();
        let removed: Vec<_> = store
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Remove { keys, .. } => Some(keys),
                _ => None,
            })
            .collect();
        assert!(removed[0][0].starts_with("momentos/"));
        assert_eq!(removed[1], vec!["momentos/ja-removido.jpg".to_string()]);
    }
}
