//! Ordering and visibility rules shared by every listable entity.
//!
//! Each entity carries an `ordem` key and an `ativo` flag. `ordem` is a
//! plain integer chosen by the operator: it need not be unique or
//! contiguous. Display order is ascending `ordem`, ties broken by an
//! entity-specific key ([`Orderable::tie_break`]), and the sort is stable so
//! anything still tied keeps its incoming order.
//!
//! | View | Filter |
//! |---|---|
//! | [`View::Public`] | `ativo = true` |
//! | [`View::Admin`] | none |

use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Ordering;

/// Who is looking at a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Public,
    Admin,
}

impl View {
    pub fn admits(self, item: &impl Orderable) -> bool {
        match self {
            View::Public => item.is_active(),
            View::Admin => true,
        }
    }
}

pub trait Orderable {
    fn ordem(&self) -> i32;
    fn is_active(&self) -> bool;
    /// Secondary comparison for equal `ordem`.
    fn tie_break(&self, other: &Self) -> Ordering;
}

/// Stable sort by `ordem`, then the entity's tie-break.
pub fn sort_for_display<T: Orderable>(items: &mut [T]) {
    items.sort_by(|a, b| a.ordem().cmp(&b.ordem()).then_with(|| a.tie_break(b)));
}

/// Items the view admits, in display order.
pub fn visible<T: Orderable + Clone>(items: &[T], view: View) -> Vec<T> {
    let mut out: Vec<T> = items.iter().filter(|i| view.admits(*i)).cloned().collect();
    sort_for_display(&mut out);
    out
}

/// Pick up to `limit` items matching `featured`, falling back to any
/// active items when none match. Inactive items never appear.
pub fn featured_with_fallback<T, F>(items: &[T], limit: usize, featured: F) -> Vec<T>
where
    T: Orderable + Clone,
    F: Fn(&T) -> bool,
{
    let active = visible(items, View::Public);
    let picked: Vec<T> = active.iter().filter(|i| featured(*i)).take(limit).cloned().collect();
    if !picked.is_empty() {
        return picked;
    }
    active.into_iter().take(limit).collect()
}

/// Random subset of up to `n` items, in random order.
pub fn sample<T: Clone>(items: &[T], n: usize, rng: &mut impl Rng) -> Vec<T> {
    items.choose_multiple(rng, n).cloned().collect()
}

/// Positions `0..len` become each id's new `ordem`.
///
/// ```
/// # use trilhos_admin::ordering::positions;
/// let ids = vec!["c".to_string(), "a".to_string()];
/// assert_eq!(positions(&ids), vec![("c", 0), ("a", 1)]);
/// ```
pub fn positions(ids: &[String]) -> Vec<(&str, i32)> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i as i32))
        .collect()
}
