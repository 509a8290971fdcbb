//! FAQ entries (`faq`).
//!
//! New entries go to the end of the list (`ordem` = number of entries
//! currently cached). Besides the generic reorder, entries can be nudged one
//! place up or down with [`Repository::move_entry`], which swaps `ordem` with
//! the neighbour and persists both rows in a single upsert.

use super::{Entity, Flag, Repository, is_blank, null_as_default};
use crate::error::{ContentError, ContentResult};
use crate::ordering::{Orderable, sort_for_display};
use crate::store::ContentStore;
use crate::types::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: RecordId,
    #[serde(rename = "pergunta", deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(rename = "resposta", deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ordem: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ativo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqDraft {
    #[serde(rename = "pergunta")]
    pub question: String,
    #[serde(rename = "resposta")]
    pub answer: String,
    pub ativo: bool,
    /// Overwritten on create with the end-of-list position.
    pub ordem: i32,
}

impl FaqDraft {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            ativo: true,
            ordem: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaqPatch {
    #[serde(rename = "pergunta", skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(rename = "resposta", skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

fn check_text(question: &str, answer: &str) -> ContentResult<()> {
    if is_blank(question) || is_blank(answer) {
        return Err(ContentError::validation(
            "Both question and answer are required",
        ));
    }
    Ok(())
}

impl Orderable for FaqEntry {
    fn ordem(&self) -> i32 {
        self.ordem
    }

    fn is_active(&self) -> bool {
        self.ativo
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.created_at.cmp(&other.created_at)
    }
}

impl Entity for FaqEntry {
    const TABLE: &'static str = "faq";
    const SECONDARY_ORDER: (&'static str, bool) = ("created_at", true);

    type Draft = FaqDraft;
    type Patch = FaqPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_ordem(&mut self, ordem: i32) {
        self.ordem = ordem;
    }

    fn prepare_draft(mut draft: FaqDraft, existing: &[Self]) -> ContentResult<FaqDraft> {
        check_text(&draft.question, &draft.answer)?;
        draft.question = draft.question.trim().to_string();
        draft.answer = draft.answer.trim().to_string();
        draft.ordem = existing.len() as i32;
        Ok(draft)
    }

    fn normalize_patch(mut patch: FaqPatch) -> FaqPatch {
        patch.question = patch.question.map(|q| q.trim().to_string());
        patch.answer = patch.answer.map(|a| a.trim().to_string());
        patch
    }

    fn validate(&self) -> ContentResult<()> {
        check_text(&self.question, &self.answer)
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl<S: ContentStore + ?Sized> Repository<FaqEntry, S> {
    /// Swap the entry at `index` (in cached display order) with its
    /// neighbour. Moving past either end does nothing.
    ///
    /// Both entries take their new positions as `ordem` and are written in
    /// one upsert. If that fails the local swap is undone.
    pub async fn move_entry(&mut self, index: usize, direction: Direction) -> ContentResult<()> {
        let len = self.cache.len();
        if index >= len {
            return Err(ContentError::validation(format!(
                "No FAQ entry at position {index} (have {len})"
            )));
        }
        let other = match direction {
            Direction::Up if index == 0 => return Ok(()),
            Direction::Down if index + 1 == len => return Ok(()),
            Direction::Up => index - 1,
            Direction::Down => index + 1,
        };

        let previous = (self.cache[index].ordem, self.cache[other].ordem);
        self.cache.swap(index, other);
        self.cache[index].ordem = index as i32;
        self.cache[other].ordem = other as i32;

        let rows = vec![
            json!({ "id": self.cache[other].id, "ordem": other }),
            json!({ "id": self.cache[index].id, "ordem": index }),
        ];
        if let Err(e) = self.store.upsert(FaqEntry::TABLE, rows, "id").await {
            tracing::error!(error = %e, index, ?direction, "FAQ move failed, reverting");
            self.cache.swap(index, other);
            self.cache[index].ordem = previous.0;
            self.cache[other].ordem = previous.1;
            return Err(ContentError::persistence(FaqEntry::TABLE, e));
        }
        sort_for_display(&mut self.cache);
        Ok(())
    }
}
