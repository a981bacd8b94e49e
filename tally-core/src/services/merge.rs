//! Temporal merge engine
//!
//! Folds dated snapshots into one canonical profile per member plus a
//! per-period ledger. Recency wins: a snapshot from a period at least as new
//! as the profile's replaces every attribute, blanks included. The ledger
//! keeps one entry per (member, period), the last one processed.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::result::Error;
use crate::domain::{CanonicalProfile, Ledger, LedgerEntry, MemberKey, Period, Snapshot};
use crate::services::ingest::IngestedSource;

/// Default attendance markers that exclude a member from statistics
pub const DEFAULT_EXEMPT_MARKERS: &[&str] = &["출결제외"];

/// Result of a temporal merge
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub profiles: BTreeMap<MemberKey, CanonicalProfile>,
    pub ledger: Ledger,
    /// Periods of every dated source that was folded in
    pub periods: BTreeSet<Period>,
    /// Sources left out because no period could be derived for them
    pub undated: Vec<String>,
}

impl MergeOutcome {
    /// Distinct years among the folded sources
    pub fn years(&self) -> BTreeSet<i32> {
        self.periods.iter().map(|p| p.year).collect()
    }

    pub fn profile(&self, key: &MemberKey) -> Option<&CanonicalProfile> {
        self.profiles.get(key)
    }

    /// One error per undated source
    pub fn undated_errors(&self) -> impl Iterator<Item = Error> + '_ {
        self.undated.iter().cloned().map(Error::PeriodUnrecoverable)
    }
}

/// Incremental recency-wins merge
#[derive(Debug, Clone)]
pub struct TemporalMerge {
    profiles: BTreeMap<MemberKey, CanonicalProfile>,
    ledger: Ledger,
    periods: BTreeSet<Period>,
    exempt_markers: Vec<String>,
}

impl Default for TemporalMerge {
    fn default() -> Self {
        Self::new(DEFAULT_EXEMPT_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl TemporalMerge {
    pub fn new(exempt_markers: Vec<String>) -> Self {
        Self {
            profiles: BTreeMap::new(),
            ledger: Ledger::new(),
            periods: BTreeSet::new(),
            exempt_markers,
        }
    }

    /// Fold one snapshot in.
    ///
    /// The profile's `last_period` never moves backwards: an older snapshot
    /// only contributes its ledger entry.
    pub fn observe(&mut self, period: Period, snapshot: &Snapshot) {
        self.periods.insert(period);
        self.ledger.record(LedgerEntry::from_snapshot(period, snapshot));

        let exempt = snapshot.attributes.is_attendance_exempt(&self.exempt_markers);
        match self.profiles.get_mut(&snapshot.key) {
            Some(profile) if period >= profile.last_period => {
                profile.attributes = snapshot.attributes.clone();
                profile.attendance_exempt = exempt;
                profile.last_period = period;
                profile.source = snapshot.source.clone();
            }
            Some(_) => {}
            None => {
                self.profiles.insert(
                    snapshot.key.clone(),
                    CanonicalProfile {
                        key: snapshot.key.clone(),
                        attributes: snapshot.attributes.clone(),
                        attendance_exempt: exempt,
                        last_period: period,
                        source: snapshot.source.clone(),
                    },
                );
            }
        }
    }

    /// Mark a period as seen even when its source had no rows
    pub fn note_period(&mut self, period: Period) {
        self.periods.insert(period);
    }

    pub fn finish(self) -> MergeOutcome {
        MergeOutcome {
            profiles: self.profiles,
            ledger: self.ledger,
            periods: self.periods,
            undated: Vec::new(),
        }
    }

    /// Merge dated snapshots in chronological order.
    ///
    /// The sort is stable, so snapshots of the same period keep their
    /// arrival order and the later one wins.
    pub fn merge(self, mut items: Vec<(Period, Snapshot)>) -> MergeOutcome {
        items.sort_by_key(|(period, _)| *period);
        let mut merge = self;
        for (period, snapshot) in &items {
            merge.observe(*period, snapshot);
        }
        merge.finish()
    }

    /// Merge ingested sources; sources without a period are listed, not folded
    pub fn merge_sources(self, sources: &[IngestedSource]) -> MergeOutcome {
        let mut undated = Vec::new();
        let mut items = Vec::new();
        let mut merge = self;
        for source in sources {
            match source.period {
                Some(period) => {
                    merge.note_period(period);
                    items.extend(source.snapshots.iter().cloned().map(|s| (period, s)));
                }
                None => undated.push(source.label.clone()),
            }
        }
        let mut outcome = merge.merge(items);
        outcome.undated = undated;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemberAttributes, PaymentValue};

    fn snap(id: &str, region: Option<&str>, raw: &str, source: &str) -> Snapshot {
        Snapshot {
            key: MemberKey::ByUniqueCode(id.into()),
            attributes: MemberAttributes {
                region: region.map(str::to_string),
                ..Default::default()
            },
            payment: PaymentValue::from_raw(Some(raw.into()), None),
            source: source.into(),
            row: 1,
        }
    }

    fn p(month: u32) -> Period {
        Period::new(2024, month).unwrap()
    }

    #[test]
    fn test_latest_period_wins_regardless_of_arrival() {
        let items = vec![
            (p(1), snap("A", Some("r1"), "1", "jan")),
            (p(3), snap("A", Some("r3"), "3", "mar")),
            (p(2), snap("A", Some("r2"), "2", "feb")),
        ];
        let outcome = TemporalMerge::default().merge(items);
        let profile = outcome.profile(&MemberKey::ByUniqueCode("A".into())).unwrap();
        assert_eq!(profile.attributes.region.as_deref(), Some("r3"));
        assert_eq!(profile.last_period, p(3));
        assert_eq!(profile.source, "mar");
        assert_eq!(outcome.ledger.len(), 3);
    }

    #[test]
    fn test_observe_never_moves_backwards() {
        let mut merge = TemporalMerge::default();
        merge.observe(p(3), &snap("A", Some("r3"), "3", "mar"));
        merge.observe(p(1), &snap("A", Some("r1"), "1", "jan"));
        let outcome = merge.finish();
        let profile = outcome.profile(&MemberKey::ByUniqueCode("A".into())).unwrap();
        assert_eq!(profile.last_period, p(3));
        assert_eq!(profile.attributes.region.as_deref(), Some("r3"));
        assert!(outcome.ledger.get(&profile.key, p(1)).is_some());
    }

    #[test]
    fn test_newer_blank_overwrites() {
        let items = vec![
            (p(1), snap("A", Some("North"), "1", "jan")),
            (p(2), snap("A", None, "1", "feb")),
        ];
        let outcome = TemporalMerge::default().merge(items);
        let profile = outcome.profile(&MemberKey::ByUniqueCode("A".into())).unwrap();
        assert_eq!(profile.attributes.region, None);
    }

    #[test]
    fn test_same_period_later_arrival_wins() {
        let items = vec![
            (p(2), snap("A", Some("first"), "100", "a.csv")),
            (p(2), snap("A", Some("second"), "200", "b.csv")),
        ];
        let outcome = TemporalMerge::default().merge(items);
        let key = MemberKey::ByUniqueCode("A".into());
        assert_eq!(outcome.profile(&key).unwrap().attributes.region.as_deref(), Some("second"));
        let entry = outcome.ledger.get(&key, p(2)).unwrap();
        assert_eq!(entry.raw.as_deref(), Some("200"));
        assert_eq!(outcome.ledger.len(), 1);
    }

    #[test]
    fn test_attendance_exemption_follows_latest_profile() {
        let mut exempt = snap("A", Some("North"), "1", "feb");
        exempt.attributes.attendance = Some("출결제외".into());
        let items = vec![(p(1), snap("A", Some("North"), "1", "jan")), (p(2), exempt)];
        let outcome = TemporalMerge::default().merge(items);
        assert!(outcome.profile(&MemberKey::ByUniqueCode("A".into())).unwrap().attendance_exempt);
    }

    #[test]
    fn test_merge_sources_lists_undated() {
        let dated = IngestedSource {
            label: "2024.01/a.csv".into(),
            period: Some(p(1)),
            snapshots: vec![snap("A", None, "1", "2024.01/a.csv")],
            skipped_rows: 0,
        };
        let undated = IngestedSource {
            label: "notes.csv".into(),
            period: None,
            snapshots: vec![snap("B", None, "1", "notes.csv")],
            skipped_rows: 0,
        };
        let outcome = TemporalMerge::default().merge_sources(&[dated, undated]);
        assert_eq!(outcome.undated, vec!["notes.csv"]);
        assert_eq!(outcome.profiles.len(), 1);
        assert_eq!(outcome.years().into_iter().collect::<Vec<_>>(), vec![2024]);

        let errors: Vec<String> = outcome.undated_errors().map(|e| e.to_string()).collect();
        assert_eq!(errors, vec!["notes.csv: no period in folder or file name; left out of the ledger"]);
    }
}
