//! Typed repositories over the content store.
//!
//! One generic [`Repository`] serves trips, gallery photos and FAQ entries.
//! Each keeps a local cache of the records it last saw and reconciles it
//! after every mutation:
//!
//! | Operation | Cache on success | Cache on failure |
//! |---|---|---|
//! | `list` | replaced by the fetched rows | unchanged |
//! | `create` | record appended | unchanged |
//! | `update` | record replaced by the stored row | unchanged |
//! | `delete` | record removed (after the store confirms) | unchanged |
//! | `reorder` | reordered immediately | stays reordered (see below) |
//! | `toggle_flag` | flipped immediately | flipped back |
//!
//! ## Reorder
//!
//! Reordering is optimistic: [`Repository::plan_reorder`] rewrites the cache
//! right away and returns a [`ReorderPlan`] that performs the writes. When
//! the store can upsert many rows atomically the plan is a single request.
//! Otherwise it writes one row at a time and checks a shared generation
//! counter before each write, so an older plan that is still running stops
//! as soon as a newer one has been planned and reports
//! [`ContentError::Superseded`]. A write failure part-way leaves the store
//! with a mix of old and new `ordem` values while the cache shows the new
//! order; listing again shows the truth.
//!
//! Writes are last-write-wins: there is no version column.

pub mod faq;
pub mod gallery;
pub mod settings;
pub mod trip;

pub use faq::{Direction, FaqDraft, FaqEntry, FaqPatch};
pub use gallery::{GalleryPhoto, PhotoDraft, PhotoPatch};
pub use settings::{SettingsRepository, SiteSettings};
pub use trip::{Dashboard, Difficulty, Trip, TripDraft, TripPatch};

use crate::error::{ContentError, ContentResult};
use crate::ordering::{Orderable, View, positions, sort_for_display};
use crate::store::{ContentStore, Query, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Boolean columns that can be flipped in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Ativo,
    Destaque,
}

impl Flag {
    pub fn column(self) -> &'static str {
        match self {
            Flag::Ativo => "ativo",
            Flag::Destaque => "destaque",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A record type stored in one table.
pub trait Entity: Orderable + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Tie-break column for equal `ordem`, and whether it sorts ascending.
    const SECONDARY_ORDER: (&'static str, bool);
    /// Column whose value must not repeat across records.
    const UNIQUE_COLUMN: Option<&'static str> = None;

    type Draft: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    fn id(&self) -> &str;
    fn set_ordem(&mut self, ordem: i32);

    /// Normalise a new record and check its required fields. `existing` is
    /// the repository's current cache.
    fn prepare_draft(draft: Self::Draft, existing: &[Self]) -> ContentResult<Self::Draft>;

    /// Normalise a partial update before it is merged and validated.
    fn normalize_patch(patch: Self::Patch) -> Self::Patch {
        patch
    }

    /// Check a complete record, e.g. the result of applying a patch.
    fn validate(&self) -> ContentResult<()> {
        Ok(())
    }

    /// Current value of a flag, or `None` if this record type lacks it.
    fn flag(&self, flag: Flag) -> Option<bool>;
    fn set_flag(&mut self, flag: Flag, value: bool);
}

/// Result of an optimistic change that may have been undone.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The store accepted the change; carries the stored record.
    Committed(T),
    /// The store refused; the cache was restored to its previous state.
    RolledBack(ContentError),
}

impl<T> Outcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn into_result(self) -> ContentResult<T> {
        match self {
            Outcome::Committed(value) => Ok(value),
            Outcome::RolledBack(err) => Err(err),
        }
    }
}

/// Accept `null` wherever the column has a sensible empty value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Trim every entry and drop the blank ones.
pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn merge_json(base: &mut Value, patch: Value) {
    if let (Value::Object(base), Value::Object(patch)) = (base, patch) {
        base.extend(patch);
    }
}

pub struct Repository<E: Entity, S: ContentStore + ?Sized> {
    store: Arc<S>,
    cache: Vec<E>,
    generation: Arc<AtomicU64>,
}

impl<E: Entity, S: ContentStore + ?Sized> Repository<E, S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: Vec::new(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Records as of the last successful list or mutation.
    pub fn cached(&self) -> &[E] {
        &self.cache
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.cache.iter().find(|e| e.id() == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.cache.iter().position(|e| e.id() == id)
    }

    pub(crate) fn display_query(view: View) -> Query {
        let query = match view {
            View::Public => Query::new().eq("ativo", true),
            View::Admin => Query::new(),
        };
        let (column, ascending) = E::SECONDARY_ORDER;
        query.order_by("ordem", true).order_by(column, ascending)
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<E>, StoreError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    fn first_row(rows: Vec<Value>) -> Result<Option<E>, StoreError> {
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    /// Run an arbitrary query against this table without touching the cache.
    pub async fn fetch(&self, query: &Query) -> ContentResult<Vec<E>> {
        let rows = self
            .store
            .select(E::TABLE, query)
            .await
            .map_err(|e| ContentError::fetch(E::TABLE, e))?;
        Self::parse_rows(rows).map_err(|e| ContentError::fetch(E::TABLE, e))
    }

    /// Fetch the records the view admits, in display order, and cache them.
    pub async fn list(&mut self, view: View) -> ContentResult<Vec<E>> {
        let mut records = match self.fetch(&Self::display_query(view)).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(table = E::TABLE, error = %e, "list failed, keeping cached records");
                return Err(e);
            }
        };
        sort_for_display(&mut records);
        tracing::debug!(table = E::TABLE, count = records.len(), ?view, "listed");
        self.cache = records.clone();
        Ok(records)
    }

    async fn ensure_unique(&self, record: &Value, except_id: Option<&str>) -> ContentResult<()> {
        let Some(column) = E::UNIQUE_COLUMN else {
            return Ok(());
        };
        let Some(value) = record.get(column).and_then(Value::as_str) else {
            return Ok(());
        };
        let clashes = self
            .store
            .select(E::TABLE, &Query::new().eq(column, value))
            .await
            .map_err(|e| ContentError::persistence(E::TABLE, e))?;
        let taken = clashes
            .iter()
            .any(|row| row.get("id").and_then(Value::as_str) != except_id);
        if taken {
            return Err(ContentError::validation(format!(
                "{column} '{value}' is already used by another {} record",
                E::TABLE
            )));
        }
        Ok(())
    }

    /// Validate and insert a new record.
    pub async fn create(&mut self, draft: E::Draft) -> ContentResult<E> {
        let draft = E::prepare_draft(draft, &self.cache).inspect_err(|e| {
            tracing::warn!(table = E::TABLE, error = %e, "create rejected");
        })?;
        let row = serde_json::to_value(&draft).map_err(|e| ContentError::persistence(E::TABLE, e))?;
        self.ensure_unique(&row, None).await?;

        let stored = self
            .store
            .insert(E::TABLE, vec![row])
            .await
            .and_then(Self::first_row)
            .map_err(|e| {
                tracing::error!(table = E::TABLE, error = %e, "create failed");
                ContentError::persistence(E::TABLE, e)
            })?
            .ok_or_else(|| {
                ContentError::persistence(
                    E::TABLE,
                    StoreError::Unavailable("insert returned no rows".into()),
                )
            })?;

        tracing::info!(table = E::TABLE, id = stored.id(), "created");
        self.cache.push(stored.clone());
        Ok(stored)
    }

    /// The cached record, or a fresh read by id when it isn't cached.
    async fn current(&self, id: &str) -> ContentResult<E> {
        if let Some(record) = self.get(id) {
            return Ok(record.clone());
        }
        self.fetch(&Query::new().eq("id", id).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ContentError::not_found(E::TABLE, id))
    }

    /// Apply a partial update.
    ///
    /// The patch is merged onto the current record and the result validated
    /// as a whole before anything is sent.
    pub async fn update(&mut self, id: &str, patch: E::Patch) -> ContentResult<E> {
        let current = self.current(id).await?;
        let patch = E::normalize_patch(patch);
        let patch_value =
            serde_json::to_value(&patch).map_err(|e| ContentError::persistence(E::TABLE, e))?;

        let mut merged =
            serde_json::to_value(&current).map_err(|e| ContentError::persistence(E::TABLE, e))?;
        merge_json(&mut merged, patch_value.clone());
        let candidate: E = serde_json::from_value(merged.clone())
            .map_err(|e| ContentError::validation(format!("Invalid {} update: {e}", E::TABLE)))?;
        candidate.validate()?;
        self.ensure_unique(&patch_value, Some(id)).await?;

        let stored = self
            .store
            .update(E::TABLE, id, patch_value)
            .await
            .and_then(Self::first_row)
            .map_err(|e| {
                tracing::error!(table = E::TABLE, id, error = %e, "update failed");
                ContentError::persistence(E::TABLE, e)
            })?
            .ok_or_else(|| ContentError::not_found(E::TABLE, id))?;

        match self.position(id) {
            Some(pos) => self.cache[pos] = stored.clone(),
            None => self.cache.push(stored.clone()),
        }
        tracing::info!(table = E::TABLE, id, "updated");
        Ok(stored)
    }

    pub async fn delete(&mut self, id: &str) -> ContentResult<()> {
        let removed = self.store.delete(E::TABLE, id).await.map_err(|e| {
            tracing::error!(table = E::TABLE, id, error = %e, "delete failed");
            ContentError::persistence(E::TABLE, e)
        })?;
        if removed == 0 {
            return Err(ContentError::not_found(E::TABLE, id));
        }
        self.cache.retain(|e| e.id() != id);
        tracing::info!(table = E::TABLE, id, "deleted");
        Ok(())
    }

    /// Reorder the cache now and return the writes that persist it.
    ///
    /// `ids` lists records in their new order; each gets `ordem = index`.
    /// Unknown or repeated ids are rejected before anything changes.
    pub fn plan_reorder(&mut self, ids: &[String]) -> ContentResult<ReorderPlan<S>> {
        let mut seen = HashSet::new();
        for id in ids {
            if self.position(id).is_none() {
                return Err(ContentError::not_found(E::TABLE, id.clone()));
            }
            if !seen.insert(id.as_str()) {
                return Err(ContentError::validation(format!(
                    "id {id} appears more than once in the new order"
                )));
            }
        }

        let updates: Vec<(String, i32)> = positions(ids)
            .into_iter()
            .map(|(id, ordem)| (id.to_string(), ordem))
            .collect();
        for (id, ordem) in &updates {
            if let Some(pos) = self.position(id) {
                self.cache[pos].set_ordem(*ordem);
            }
        }
        sort_for_display(&mut self.cache);

        let rows = updates
            .iter()
            .filter_map(|(id, _)| self.get(id))
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ContentError::persistence(E::TABLE, e))?;

        let generation = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        Ok(ReorderPlan {
            store: self.store.clone(),
            table: E::TABLE,
            updates,
            rows,
            generation,
            latest: self.generation.clone(),
        })
    }

    pub async fn reorder(&mut self, ids: &[String]) -> ContentResult<()> {
        self.plan_reorder(ids)?.execute().await
    }

    /// Flip a boolean column, optimistically.
    pub async fn toggle_flag(&mut self, id: &str, flag: Flag) -> ContentResult<Outcome<E>> {
        let pos = self
            .position(id)
            .ok_or_else(|| ContentError::not_found(E::TABLE, id))?;
        let Some(previous) = self.cache[pos].flag(flag) else {
            return Err(ContentError::validation(format!(
                "{} records have no {flag} flag",
                E::TABLE
            )));
        };

        let next = !previous;
        self.cache[pos].set_flag(flag, next);

        let result = self
            .store
            .update(E::TABLE, id, json!({ flag.column(): next }))
            .await
            .and_then(Self::first_row);

        match result {
            Ok(Some(stored)) => {
                tracing::info!(table = E::TABLE, id, %flag, value = next, "toggled");
                self.cache[pos] = stored.clone();
                Ok(Outcome::Committed(stored))
            }
            Ok(None) => {
                self.cache[pos].set_flag(flag, previous);
                Ok(Outcome::RolledBack(ContentError::not_found(E::TABLE, id)))
            }
            Err(e) => {
                tracing::warn!(table = E::TABLE, id, %flag, error = %e, "toggle failed, reverted");
                self.cache[pos].set_flag(flag, previous);
                Ok(Outcome::RolledBack(ContentError::persistence(E::TABLE, e)))
            }
        }
    }
}

/// Pending writes for one reorder.
pub struct ReorderPlan<S: ContentStore + ?Sized> {
    store: Arc<S>,
    table: &'static str,
    updates: Vec<(String, i32)>,
    rows: Vec<Value>,
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl<S: ContentStore + ?Sized> ReorderPlan<S> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    fn is_current(&self) -> bool {
        self.latest.load(AtomicOrdering::SeqCst) == self.generation
    }

    pub async fn execute(self) -> ContentResult<()> {
        let total = self.updates.len();
        if total == 0 {
            return Ok(());
        }

        if self.store.supports_bulk_upsert() {
            self.store
                .upsert(self.table, self.rows, "id")
                .await
                .map_err(|e| {
                    tracing::error!(table = self.table, error = %e, "reorder failed");
                    ContentError::persistence(self.table, e)
                })?;
            tracing::info!(table = self.table, total, "reordered");
            return Ok(());
        }

        for (written, (id, ordem)) in self.updates.iter().enumerate() {
            if !self.is_current() {
                tracing::info!(table = self.table, written, total, "reorder superseded");
                return Err(ContentError::Superseded { written, total });
            }
            self.store
                .update(self.table, id, json!({ "ordem": ordem }))
                .await
                .map_err(|e| {
                    tracing::error!(table = self.table, id = %id, written, total, error = %e, "reorder failed part-way");
                    ContentError::persistence(self.table, e)
                })?;
        }
        tracing::info!(table = self.table, total, "reordered");
        Ok(())
    }
}
