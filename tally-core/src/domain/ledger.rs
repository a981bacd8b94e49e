//! Per-period payment ledger

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::member::{MemberKey, Snapshot};
use super::period::Period;

/// Payment fact of one member in one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: MemberKey,
    pub period: Period,
    pub raw: Option<String>,
    pub amount: Option<Decimal>,
    pub paid: bool,
    pub memo: Option<String>,
    pub source: String,
    /// Region as written in that period's source
    pub region: Option<String>,
    /// Department as written in that period's source
    pub department: Option<String>,
}

impl LedgerEntry {
    pub fn from_snapshot(period: Period, snapshot: &Snapshot) -> Self {
        Self {
            key: snapshot.key.clone(),
            period,
            raw: snapshot.payment.raw.clone(),
            amount: snapshot.payment.amount,
            paid: snapshot.payment.paid,
            memo: snapshot.payment.memo.clone(),
            source: snapshot.source.clone(),
            region: snapshot.attributes.region.clone(),
            department: snapshot.attributes.department.clone(),
        }
    }
}

/// At most one entry per (member, period); a later record replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<(MemberKey, Period), LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, returning the one it replaced
    pub fn record(&mut self, entry: LedgerEntry) -> Option<LedgerEntry> {
        self.entries
            .insert((entry.key.clone(), entry.period), entry)
    }

    pub fn get(&self, key: &MemberKey, period: Period) -> Option<&LedgerEntry> {
        self.entries.get(&(key.clone(), period))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Entries of one calendar year, ordered by member then month
    pub fn in_year(&self, year: i32) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values().filter(move |e| e.period.year == year)
    }

    pub fn in_period(&self, period: Period) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values().filter(move |e| e.period == period)
    }

    /// Distinct periods present
    pub fn periods(&self) -> BTreeSet<Period> {
        self.entries.values().map(|e| e.period).collect()
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a LedgerEntry;
    type IntoIter = btree_map::Values<'a, (MemberKey, Period), LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
