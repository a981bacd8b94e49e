//! Single-batch merge and duplicate detection
//!
//! Used for inputs that all describe the same period, e.g. one file per
//! regional team for one month. Recency plays no role here: each member gets
//! one merged row whose fields come from the first snapshot that has them,
//! and members with more than one valued snapshot are reported as duplicates.

use std::collections::HashMap;

use crate::domain::{
    is_paid, BatchOutcome, CanonicalField, DuplicateRow, MemberAttributes, MemberKey, MergedRow, Snapshot,
};

const ATTRIBUTE_FIELDS: [CanonicalField; 7] = [
    CanonicalField::Region,
    CanonicalField::Team,
    CanonicalField::Zone,
    CanonicalField::Department,
    CanonicalField::NameLocal,
    CanonicalField::NameLatin,
    CanonicalField::Attendance,
];

/// Snapshots of members that carry a numeric amount in two or more rows.
///
/// One row per valued snapshot, in input order. Rows without an amount are
/// never reported.
pub fn detect_duplicates(snapshots: &[Snapshot]) -> Vec<DuplicateRow> {
    let mut valued: HashMap<&MemberKey, usize> = HashMap::new();
    for snapshot in snapshots.iter().filter(|s| s.payment.has_amount()) {
        *valued.entry(&snapshot.key).or_default() += 1;
    }

    snapshots
        .iter()
        .filter(|s| s.payment.has_amount() && valued.get(&s.key).copied().unwrap_or(0) >= 2)
        .map(|s| DuplicateRow {
            member_id: s.key.as_str().to_string(),
            region: s.attributes.region.clone(),
            name: s.attributes.display_name().map(str::to_string),
            source: s.source.clone(),
            row: s.row,
            raw: s.payment.raw.clone(),
            amount: s.payment.amount,
            memo: s.payment.memo.clone(),
        })
        .collect()
}

/// Merges one batch of same-period snapshots
pub struct BatchMerge;

impl BatchMerge {
    /// Merged view plus duplicate report
    pub fn run(snapshots: &[Snapshot]) -> BatchOutcome {
        BatchOutcome {
            merged: merged_view(snapshots),
            duplicates: detect_duplicates(snapshots),
        }
    }
}

/// One row per member in first-seen order, every field taking the first
/// non-empty value among that member's snapshots
fn merged_view(snapshots: &[Snapshot]) -> Vec<MergedRow> {
    let mut order: Vec<&MemberKey> = Vec::new();
    let mut groups: HashMap<&MemberKey, Vec<&Snapshot>> = HashMap::new();
    for snapshot in snapshots {
        groups
            .entry(&snapshot.key)
            .or_insert_with(|| {
                order.push(&snapshot.key);
                Vec::new()
            })
            .push(snapshot);
    }

    order
        .into_iter()
        .filter_map(|key| groups.get(key).map(|group| merge_group(key, group)))
        .collect()
}

fn merge_group(key: &MemberKey, group: &[&Snapshot]) -> MergedRow {
    let mut attributes = MemberAttributes::default();
    for field in ATTRIBUTE_FIELDS {
        let value = group.iter().find_map(|s| s.attributes.get(field));
        attributes.set(field, value.map(str::to_string));
    }

    let payment = group.iter().find(|s| s.payment.raw.is_some()).map(|s| &s.payment);
    let raw = payment.and_then(|p| p.raw.clone());
    let amount = payment.and_then(|p| p.amount);
    let memo = group.iter().find_map(|s| s.payment.memo.clone());

    let mut sources: Vec<String> = Vec::new();
    for snapshot in group {
        if !sources.contains(&snapshot.source) {
            sources.push(snapshot.source.clone());
        }
    }

    MergedRow {
        key: key.clone(),
        canonical_id: key.has_canonical_format(),
        attributes,
        paid: is_paid(raw.as_deref(), amount),
        raw,
        amount,
        memo,
        sources,
    }
}
