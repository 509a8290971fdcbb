//! # Trilhos Admin
//!
//! Content pipeline behind an adventure-tourism site: trips, a homepage photo
//! gallery, FAQ entries and site-wide settings, kept in a hosted record store
//! with images in a blob store.
//!
//! # Architecture: Two Collaborators, One Pipeline
//!
//! Everything persistent lives behind two async traits:
//!
//! ```text
//! ContentStore   tables: viagens, galeria_momentos, faq, configuracoes
//! BlobStore      buckets: viagens, galeria  →  public URLs
//! ```
//!
//! Images flow one way, and only the URL is ever stored in a record:
//!
//! ```text
//! file ──► imaging::prepare_image ──► UploadService ──► BlobStore ──► URL ──► Repository
//!          (≤ 1920 px wide, re-encoded) (type/size policy,  (one write,
//!                                        unique key)         no retry)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | `ContentStore`/`BlobStore` traits, REST adapter, in-memory store for tests |
//! | [`imaging`] | Pure-Rust resize and re-encode before upload |
//! | [`upload`] | Upload policy, key naming, simulated progress |
//! | [`content`] | Typed repositories for trips, gallery photos, FAQ, and settings |
//! | [`ordering`] | `ordem`/`ativo` display rules shared by every list |
//! | [`homepage`] | Concurrent load of every public homepage section |
//! | [`cache`] | TTL file cache for site settings |
//! | [`config`] | `config.toml` + environment loading and validation |
//! | [`naming`] | Slugs and storage keys |
//! | [`types`] | [`UploadFile`](types::UploadFile) and record ids |
//! | [`error`] | The domain error taxonomy |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Outcomes, No Silent Fallbacks
//!
//! Every repository operation returns a typed result. Optimistic toggles
//! report [`Outcome::RolledBack`](content::Outcome::RolledBack) with the
//! reason instead of logging and moving on, and a reorder that lost a race
//! reports [`ContentError::Superseded`](error::ContentError::Superseded).
//! Logging still happens at each boundary via `tracing`.
//!
//! ## Caches Are Owned, Not Global
//!
//! Each [`Repository`](content::Repository) owns the records it last saw,
//! and the settings cache is an explicit value handed to
//! [`SettingsRepository`](content::SettingsRepository). Nothing is shared
//! implicitly between callers except the reorder generation counter.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate only, behind the
//! [`ImageBackend`](imaging::ImageBackend) trait so tests can record calls
//! without encoding pixels.

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod homepage;
pub mod imaging;
pub mod naming;
pub mod ordering;
pub mod output;
pub mod store;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
