//! Insert-or-replace reconciliation of dividend batches

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::models::{Dividend, DividendId};

/// Reconcile `incoming` onto `existing`, keyed by id.
///
/// Records whose id is already present are replaced in place; unseen ids are
/// appended in incoming order. Existing order is otherwise preserved, so
/// applying the same batch twice yields the same result as applying it once.
#[must_use]
pub fn merge(existing: Vec<Dividend>, incoming: &[Dividend]) -> Vec<Dividend> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut positions = HashMap::with_capacity(merged.capacity());

    for record in existing {
        upsert_into(&mut merged, &mut positions, record);
    }
    for record in incoming {
        upsert_into(&mut merged, &mut positions, record.clone());
    }

    merged
}

fn upsert_into(
    merged: &mut Vec<Dividend>,
    positions: &mut HashMap<DividendId, usize>,
    record: Dividend,
) {
    match positions.entry(record.id) {
        Entry::Occupied(slot) => merged[*slot.get()] = record,
        Entry::Vacant(slot) => {
            slot.insert(merged.len());
            merged.push(record);
        }
    }
}

/// Drop the records owned by `user_id` whose id is in `ids`.
///
/// Returns the remaining records and how many were removed. Records owned by
/// other users are never removed, even when their id matches.
#[must_use]
pub fn remove_ids(
    records: Vec<Dividend>,
    user_id: &str,
    ids: &[DividendId],
) -> (Vec<Dividend>, usize) {
    let targets: HashSet<DividendId> = ids.iter().copied().collect();
    let before = records.len();
    let remaining: Vec<Dividend> = records
        .into_iter()
        .filter(|record| !(record.belongs_to(user_id) && targets.contains(&record.id)))
        .collect();
    let removed = before - remaining.len();
    (remaining, removed)
}

/// Order records the way every store lists them: newest date first, then
/// highest id.
pub fn sort_for_listing(records: &mut [Dividend]) {
    records.sort_by_key(|record| (Reverse(record.date), Reverse(record.id)));
}
