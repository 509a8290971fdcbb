//! In-process implementation of both store traits.
//!
//! Tables are vectors of JSON rows; objects are byte blobs keyed by
//! `(bucket, key)`. Behaviour mirrors the hosted backend where the
//! repositories depend on it:
//!
//! - inserted rows get a UUID `id` and an RFC 3339 `created_at` unless given
//! - `update`/`delete` by id report zero rows for unknown ids instead of failing
//! - `upsert` merges on the conflict column, inserting rows that don't match
//! - object uploads never overwrite
//!
//! Failures can be scheduled per operation kind with [`MemoryStore::fail_next`]
//! and [`MemoryStore::fail_nth`], and every call is recorded so tests can
//! assert on exactly what reached the store.

use super::query::Query;
use super::{BlobStore, ContentStore, StoreError, public_object_url};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Store operation, for failure scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
    Upload,
    Remove,
}

/// A call that reached the store (including ones that then failed).
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Select { table: String },
    Insert { table: String, rows: usize },
    Update { table: String, id: String },
    Delete { table: String, id: String },
    Upsert { table: String, rows: usize },
    Upload { bucket: String, key: String },
    Remove { bucket: String, keys: Vec<String> },
}

#[derive(Debug)]
struct ScheduledFailure {
    kind: OpKind,
    /// Matching calls still to let through before failing.
    skip: usize,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), (Vec<u8>, String)>,
    failures: Vec<ScheduledFailure>,
    calls: Vec<StoreCall>,
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    base_url: String,
    latency: Option<Duration>,
    bulk_upsert: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            base_url: "https://memory.local".to_string(),
            latency: None,
            bulk_upsert: true,
        }
    }

    /// Delay every async call by `latency` before it touches any state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Advertise (or not) atomic multi-row upserts.
    pub fn with_bulk_upsert(mut self, enabled: bool) -> Self {
        self.bulk_upsert = enabled;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make the next call of this kind fail.
    pub fn fail_next(&self, kind: OpKind) {
        self.fail_nth(kind, 0);
    }

    /// Let `skip` calls of this kind succeed, then fail the one after.
    pub fn fail_nth(&self, kind: OpKind, skip: usize) {
        self.lock().failures.push(ScheduledFailure { kind, skip });
    }

    /// Insert rows directly, bypassing failure injection and the call log.
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Vec<Value> {
        let mut inner = self.lock();
        let stored: Vec<Value> = rows.into_iter().map(stamp_new_row).collect();
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        stored
    }

    /// Current contents of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record the call, then apply any failure scheduled for it.
    fn begin(&self, kind: OpKind, call: StoreCall) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(call);

        let mut triggered = false;
        inner.failures.retain_mut(|f| {
            if f.kind != kind {
                return true;
            }
            if f.skip == 0 {
                triggered = true;
                false
            } else {
                f.skip -= 1;
                true
            }
        });

        if triggered {
            return Err(StoreError::Unavailable(format!(
                "injected {kind:?} failure"
            )));
        }
        Ok(inner)
    }
}

fn as_object(row: Value) -> Map<String, Value> {
    match row {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Fill in the columns the backend assigns on insert.
fn stamp_new_row(row: Value) -> Value {
    let mut map = as_object(row);
    if !map.get("id").is_some_and(|v| !v.is_null()) {
        map.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    if !map.get("created_at").is_some_and(|v| !v.is_null()) {
        map.insert(
            "created_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
    Value::Object(map)
}

fn merge_into(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

fn has_id(row: &Value, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.simulate_latency().await;
        let inner = self.begin(
            OpKind::Select,
            StoreCall::Select {
                table: table.to_string(),
            },
        )?;
        let rows = inner.tables.get(table).cloned().unwrap_or_default();
        Ok(query.apply(rows))
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        self.simulate_latency().await;
        let mut inner = self.begin(
            OpKind::Insert,
            StoreCall::Insert {
                table: table.to_string(),
                rows: rows.len(),
            },
        )?;
        let stored: Vec<Value> = rows.into_iter().map(stamp_new_row).collect();
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Vec<Value>, StoreError> {
        self.simulate_latency().await;
        let mut inner = self.begin(
            OpKind::Update,
            StoreCall::Update {
                table: table.to_string(),
                id: id.to_string(),
            },
        )?;
        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| has_id(r, id)) {
                merge_into(row, &patch);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<usize, StoreError> {
        self.simulate_latency().await;
        let mut inner = self.begin(
            OpKind::Delete,
            StoreCall::Delete {
                table: table.to_string(),
                id: id.to_string(),
            },
        )?;
        let Some(rows) = inner.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !has_id(r, id));
        Ok(before - rows.len())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.simulate_latency().await;
        let mut inner = self.begin(
            OpKind::Upsert,
            StoreCall::Upsert {
                table: table.to_string(),
                rows: rows.len(),
            },
        )?;
        let existing = inner.tables.entry(table.to_string()).or_default();
        let mut stored = Vec::with_capacity(rows.len());

        for row in rows {
            let position = row
                .get(on_conflict)
                .filter(|v| !v.is_null())
                .and_then(|key| existing.iter().position(|r| r.get(on_conflict) == Some(key)));
            match position {
                Some(pos) => {
                    merge_into(&mut existing[pos], &row);
                    stored.push(existing[pos].clone());
                }
                None => {
                    let row = stamp_new_row(row);
                    existing.push(row.clone());
                    stored.push(row);
                }
            }
        }
        Ok(stored)
    }

    fn supports_bulk_upsert(&self) -> bool {
        self.bulk_upsert
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        self.simulate_latency().await;
        let mut inner = self.begin(
            OpKind::Upload,
            StoreCall::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
        )?;
        let slot = (bucket.to_string(), key.to_string());
        if inner.objects.contains_key(&slot) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        inner
            .objects
            .insert(slot, (bytes, content_type.to_string()));
        Ok(key.to_string())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.base_url, bucket, key)
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut inner = self.begin(
            OpKind::Remove,
            StoreCall::Remove {
                bucket: bucket.to_string(),
                keys: keys.to_vec(),
            },
        )?;
        for key in keys {
            inner.objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }
}
