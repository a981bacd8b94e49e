//! Aggregate statistics - payment ratios by group and month
//!
//! Only ledger entries count: a member missing from a period's source is not
//! in that period's denominator. Members whose canonical profile is
//! attendance-exempt are left out entirely. Grouping uses the region or
//! department written in each period's source, not the latest profile.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::domain::{
    AggregateRow, AggregateTable, AnnualReport, CanonicalProfile, DetailRow, GroupBy, Ledger, LedgerEntry,
    MemberKey, MonthCell, Period, PeriodSummary, PeriodSummaryRow,
};
use crate::services::merge::MergeOutcome;

/// Round to one decimal place.
///
/// Exact halves round away from zero, not to even: 1 paid of 400 is 0.25%
/// and reports as 0.3, where round-half-to-even would give 0.2.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage of paid entries, rounded; 0 when there are none
pub fn ratio(paid: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(paid as f64 / total as f64 * 100.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round1(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn group_value(entry: &LedgerEntry, group_by: GroupBy) -> Option<&str> {
    let value = match group_by {
        GroupBy::Region => entry.region.as_deref(),
        GroupBy::Department => entry.department.as_deref(),
    };
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_counted(profiles: &BTreeMap<MemberKey, CanonicalProfile>, key: &MemberKey) -> bool {
    profiles.get(key).map_or(true, |p| !p.attendance_exempt)
}

#[derive(Default, Clone, Copy)]
struct Tally {
    total: usize,
    paid: usize,
}

/// Monthly ratio table for one year.
///
/// Each row's average covers only months that had entries. The summary row
/// takes the plain mean of the displayed month ratios of all rows (zeros
/// included) and the mean of the row averages.
pub fn annual_table(
    ledger: &Ledger,
    profiles: &BTreeMap<MemberKey, CanonicalProfile>,
    year: i32,
    group_by: GroupBy,
) -> AggregateTable {
    let mut tallies: BTreeMap<String, [Tally; 12]> = BTreeMap::new();
    for entry in ledger.in_year(year) {
        if !is_counted(profiles, &entry.key) {
            continue;
        }
        let Some(label) = group_value(entry, group_by) else {
            continue;
        };
        let month = tallies.entry(label.to_string()).or_default();
        let cell = &mut month[(entry.period.month - 1) as usize];
        cell.total += 1;
        if entry.paid {
            cell.paid += 1;
        }
    }

    let rows: Vec<AggregateRow> = tallies
        .into_iter()
        .map(|(label, months)| {
            let ratios = months.map(|t| ratio(t.paid, t.total));
            let observed: Vec<f64> = months
                .iter()
                .zip(ratios.iter())
                .filter(|(t, _)| t.total > 0)
                .map(|(_, r)| *r)
                .collect();
            AggregateRow {
                label,
                months: ratios,
                average: mean(&observed),
            }
        })
        .collect();

    if rows.is_empty() {
        return AggregateTable::empty(group_by);
    }

    let mut summary_months = [0.0; 12];
    for (m, slot) in summary_months.iter_mut().enumerate() {
        let column: Vec<f64> = rows.iter().map(|r| r.months[m]).collect();
        *slot = mean(&column);
    }
    let averages: Vec<f64> = rows.iter().map(|r| r.average).collect();
    let summary = AggregateRow {
        label: "Total".to_string(),
        months: summary_months,
        average: mean(&averages),
    };

    AggregateTable {
        group_by,
        rows,
        summary: Some(summary),
    }
}

/// Annual table guarded by the single-year rule.
///
/// When the merged sources span several years the table is empty and the
/// conflicting years are reported instead.
pub fn annual_report(outcome: &MergeOutcome, group_by: GroupBy) -> AnnualReport {
    let years_seen = outcome.years();
    let target_year = (years_seen.len() == 1)
        .then(|| years_seen.iter().next().copied())
        .flatten();

    let table = match target_year {
        Some(year) => annual_table(&outcome.ledger, &outcome.profiles, year, group_by),
        None => AggregateTable::empty(group_by),
    };

    AnnualReport {
        target_year,
        years_seen,
        table,
    }
}

/// Per-member detail for one year: latest profile plus twelve (raw, memo) cells
pub fn annual_detail(outcome: &MergeOutcome, year: i32) -> Vec<DetailRow> {
    let mut rows: BTreeMap<&MemberKey, DetailRow> = BTreeMap::new();
    for entry in outcome.ledger.in_year(year) {
        let row = rows.entry(&entry.key).or_insert_with(|| DetailRow {
            key: entry.key.clone(),
            attributes: outcome
                .profiles
                .get(&entry.key)
                .map(|p| p.attributes.clone())
                .unwrap_or_default(),
            months: Default::default(),
        });
        row.months[(entry.period.month - 1) as usize] = MonthCell {
            raw: entry.raw.clone(),
            memo: entry.memo.clone(),
        };
    }
    rows.into_values().collect()
}

/// Single-month summary per group with a totals row.
///
/// The totals row ratio is recomputed from the summed counts rather than
/// averaged over groups.
pub fn period_summary(
    ledger: &Ledger,
    profiles: &BTreeMap<MemberKey, CanonicalProfile>,
    period: Period,
    group_by: GroupBy,
) -> PeriodSummary {
    let mut groups: HashMap<String, (Tally, Decimal)> = HashMap::new();
    for entry in ledger.in_period(period) {
        if !is_counted(profiles, &entry.key) {
            continue;
        }
        let Some(label) = group_value(entry, group_by) else {
            continue;
        };
        let (tally, sum) = groups.entry(label.to_string()).or_default();
        tally.total += 1;
        if entry.paid {
            tally.paid += 1;
            if let Some(amount) = entry.amount.filter(|a| *a > Decimal::ZERO) {
                *sum += amount;
            }
        }
    }

    let mut rows: Vec<PeriodSummaryRow> = groups
        .into_iter()
        .map(|(label, (tally, sum))| summary_row(label, tally, sum))
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));

    let totals = rows.iter().fold(
        (Tally::default(), Decimal::ZERO),
        |(mut tally, sum), row| {
            tally.total += row.total;
            tally.paid += row.paid;
            (tally, sum + row.paid_sum)
        },
    );

    PeriodSummary {
        period,
        group_by,
        rows,
        totals: summary_row("Total".to_string(), totals.0, totals.1),
    }
}

fn summary_row(label: String, tally: Tally, paid_sum: Decimal) -> PeriodSummaryRow {
    PeriodSummaryRow {
        label,
        total: tally.total,
        paid: tally.paid,
        unpaid: tally.total - tally.paid,
        ratio: ratio(tally.paid, tally.total),
        paid_sum,
    }
}
