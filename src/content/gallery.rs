//! Gallery photos (`galeria_momentos`).
//!
//! Photos arrive in batches. A batch is appended after the highest existing
//! `ordem`: with `max` the largest cached `ordem` (0 for an empty gallery),
//! the i-th new photo gets `max + i + 1`. New photos start active with an
//! empty caption. Equal `ordem` values show newest first.

use super::{Entity, Flag, Repository, is_blank, null_as_default};
use crate::error::{ContentError, ContentResult};
use crate::imaging::ImageBackend;
use crate::ordering::Orderable;
use crate::store::{BlobStore, ContentStore, StoreError};
use crate::types::{RecordId, UploadFile};
use crate::upload::UploadService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Folder inside the gallery bucket that batch uploads go to.
pub const GALLERY_FOLDER: &str = "momentos";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryPhoto {
    pub id: RecordId,
    #[serde(rename = "imagem_url")]
    pub image_url: String,
    #[serde(rename = "legenda", default)]
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ordem: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ativo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoDraft {
    #[serde(rename = "imagem_url")]
    pub image_url: String,
    #[serde(rename = "legenda")]
    pub caption: String,
    pub ativo: bool,
    pub ordem: i32,
}

impl PhotoDraft {
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            caption: String::new(),
            ativo: true,
            ordem: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhotoPatch {
    #[serde(rename = "legenda", skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(rename = "imagem_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

fn next_ordem(existing: &[GalleryPhoto]) -> i32 {
    existing.iter().map(|p| p.ordem).max().unwrap_or(0) + 1
}

impl Orderable for GalleryPhoto {
    fn ordem(&self) -> i32 {
        self.ordem
    }

    fn is_active(&self) -> bool {
        self.ativo
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        other.created_at.cmp(&self.created_at)
    }
}

impl Entity for GalleryPhoto {
    const TABLE: &'static str = "galeria_momentos";
    const SECONDARY_ORDER: (&'static str, bool) = ("created_at", false);

    type Draft = PhotoDraft;
    type Patch = PhotoPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_ordem(&mut self, ordem: i32) {
        self.ordem = ordem;
    }

    fn prepare_draft(mut draft: PhotoDraft, existing: &[Self]) -> ContentResult<PhotoDraft> {
        if is_blank(&draft.image_url) {
            return Err(ContentError::validation("Photo needs an image URL"));
        }
        draft.image_url = draft.image_url.trim().to_string();
        draft.ordem = next_ordem(existing);
        Ok(draft)
    }

    fn validate(&self) -> ContentResult<()> {
        if is_blank(&self.image_url) {
            return Err(ContentError::validation("Photo needs an image URL"));
        }
        Ok(())
    }

    fn flag(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::Ativo => Some(self.ativo),
            Flag::Destaque => None,
        }
    }

    fn set_flag(&mut self, flag: Flag, value: bool) {
        if flag == Flag::Ativo {
            self.ativo = value;
        }
    }
}

impl<S: ContentStore + ?Sized> Repository<GalleryPhoto, S> {
    /// Insert one photo per URL in a single request, appended after the
    /// current highest `ordem`.
    pub async fn add_photos(&mut self, urls: &[String]) -> ContentResult<Vec<GalleryPhoto>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        if urls.iter().any(|u| is_blank(u)) {
            return Err(ContentError::validation("Photo needs an image URL"));
        }

        let base = next_ordem(&self.cache);
        let rows = urls
            .iter()
            .enumerate()
            .map(|(i, url)| PhotoDraft {
                ordem: base + i as i32,
                ..PhotoDraft::new(url.trim())
            })
            .map(|draft| serde_json::to_value(&draft))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ContentError::persistence(GalleryPhoto::TABLE, e))?;

        let stored = self
            .store
            .insert(GalleryPhoto::TABLE, rows)
            .await
            .and_then(|rows| {
                rows.into_iter()
                    .map(|r| serde_json::from_value::<GalleryPhoto>(r).map_err(StoreError::from))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|e| {
                tracing::error!(count = urls.len(), error = %e, "adding photos failed");
                ContentError::persistence(GalleryPhoto::TABLE, e)
            })?;

        tracing::info!(count = stored.len(), first_ordem = base, "photos added");
        self.cache.extend(stored.iter().cloned());
        Ok(stored)
    }

    /// Prepare, upload and register a batch of image files.
    ///
    /// Uploads go to the `momentos` folder of the service's bucket. If the
    /// rows can't be inserted, the objects just uploaded are removed again
    /// (best effort) before the error is returned.
    pub async fn upload_photos<B: BlobStore + ?Sized>(
        &mut self,
        uploads: &UploadService<B>,
        backend: &impl ImageBackend,
        files: Vec<UploadFile>,
    ) -> ContentResult<Vec<GalleryPhoto>> {
        let urls = uploads
            .prepare_and_upload_many(backend, files, Some(GALLERY_FOLDER))
            .await?;

        match self.add_photos(&urls).await {
            Ok(photos) => Ok(photos),
            Err(e) => {
                for url in &urls {
                    if let Err(cleanup) = uploads.remove(url).await {
                        tracing::warn!(url = %url, error = %cleanup, "orphaned upload left in bucket");
                    }
                }
                Err(e)
            }
        }
    }

    pub async fn set_caption(&mut self, id: &str, caption: &str) -> ContentResult<GalleryPhoto> {
        let patch = PhotoPatch {
            caption: Some(caption.trim().to_string()),
            ..Default::default()
        };
        self.update(id, patch).await
    }
}
