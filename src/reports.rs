use crate::aggregate::{aggregate, Dimension, Mode, Pivot, RowOrder};
use crate::config::{Config, Role};
use crate::types::{
    BranchTargetRow, ControlRecord, ControlTable, DistributorStatsRow, MonthlyBucketRow, Outcome, RawTable,
    ReconciledRecord, SummaryStats, TargetRatio, NOT_OK_LABEL,
};
use crate::util::format_number;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Controls per distinct capture day; `None` when no record has a date.
pub fn avg_controls_per_day(records: &[ControlRecord]) -> Option<f64> {
    let days: HashSet<NaiveDate> = records.iter().filter_map(|r| r.captured_at.map(|t| t.date())).collect();
    if days.is_empty() {
        None
    } else {
        Some(records.len() as f64 / days.len() as f64)
    }
}

pub fn distributor_stats(records: &[ControlRecord]) -> Vec<DistributorStatsRow> {
    #[derive(Default)]
    struct Acc {
        days: HashSet<NaiveDate>,
        controls: usize,
    }
    let mut map: BTreeMap<String, Acc> = BTreeMap::new();
    for r in records {
        let Some(name) = r.distributor.clone() else { continue };
        let e = map.entry(name).or_default();
        if let Some(t) = r.captured_at {
            e.days.insert(t.date());
        }
        if r.outcome.is_some() {
            e.controls += 1;
        }
    }
    map.into_iter()
        .map(|(name, acc)| {
            let avg = if acc.days.is_empty() { None } else { Some(acc.controls as f64 / acc.days.len() as f64) };
            let shown = avg.map(|a| format!("{:.0}", a)).unwrap_or_else(|| "N/A".to_string());
            DistributorStatsRow {
                label: format!("{} - {}", name, shown),
                distributor: name,
                days: acc.days.len(),
                controls: acc.controls,
                avg_per_day: avg.map(|a| format_number(a, 2)).unwrap_or_else(|| "N/A".to_string()),
            }
        })
        .collect()
}

/// OK / NICHT_OK counts per distributor, labelled with the daily average
/// and sorted by NICHT_OK descending.
pub fn distributor_chart(records: &[ControlRecord]) -> Pivot {
    let mut pivot = aggregate(records, Dimension::Distributor, Mode::Count, RowOrder::Default);
    let labels: HashMap<String, String> =
        distributor_stats(records).into_iter().map(|s| (s.distributor, s.label)).collect();
    if let Some(col) = pivot.category_index(NOT_OK_LABEL) {
        pivot
            .rows
            .sort_by(|a, b| b.values[col].total_cmp(&a.values[col]).then_with(|| a.key.cmp(&b.key)));
    }
    for row in &mut pivot.rows {
        if let Some(label) = labels.get(&row.key) {
            row.key = label.clone();
        }
    }
    pivot
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCounts {
    pub date: Option<NaiveDate>,
    pub ok: usize,
    pub not_ok: usize,
    pub perf_not_ok: usize,
    pub other: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributorDetail {
    pub distributor: String,
    pub total: usize,
    pub ok: usize,
    pub not_ok: usize,
    pub days: Vec<DailyCounts>,
}

/// Per-day outcome counts for one distributor. Records without a date are
/// collected under `date: None` at the end.
pub fn distributor_detail(records: &[ControlRecord], distributor: &str) -> DistributorDetail {
    let mut per_day: BTreeMap<Option<NaiveDate>, DailyCounts> = BTreeMap::new();
    let mut detail = DistributorDetail { distributor: distributor.to_string(), ..Default::default() };
    for r in records.iter().filter(|r| r.distributor.as_deref() == Some(distributor)) {
        detail.total += 1;
        let date = r.captured_at.map(|t| t.date());
        let day = per_day.entry(date).or_insert_with(|| DailyCounts { date, ..Default::default() });
        match &r.outcome {
            Some(Outcome::Ok) => {
                detail.ok += 1;
                day.ok += 1;
            }
            Some(Outcome::NotOk) => {
                detail.not_ok += 1;
                day.not_ok += 1;
            }
            Some(Outcome::PerfNotOk) => day.perf_not_ok += 1,
            _ => day.other += 1,
        }
    }
    let (mut dated, undated): (Vec<_>, Vec<_>) = per_day.into_values().partition(|d| d.date.is_some());
    dated.extend(undated);
    detail.days = dated;
    detail
}

/// Reconciled rows of recorders holding `role`.
pub fn filter_by_role<'a>(records: &'a [ReconciledRecord], role: Role, config: &Config) -> Vec<&'a ReconciledRecord> {
    let names = config.roles.names(role);
    records
        .iter()
        .filter(|r| r.name.as_deref().is_some_and(|n| names.iter().any(|x| x == n)))
        .collect()
}

/// IST/SOLL totals per branch, best percent-of-target first; branches with
/// an undefined ratio go last.
pub fn branch_target_summary(records: &[ReconciledRecord], config: &Config) -> Vec<BranchTargetRow> {
    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for r in records {
        let key = r.branch.clone().unwrap_or_else(|| "ohne Filiale".to_string());
        let e = totals.entry(key).or_insert((0.0, 0.0));
        e.0 += r.actual;
        e.1 += r.target;
    }
    let mut rows: Vec<(TargetRatio, BranchTargetRow)> = totals
        .into_iter()
        .map(|(branch, (actual, target))| {
            let ratio = TargetRatio::compute(actual, target);
            let row = BranchTargetRow {
                branch,
                actual: format_number(actual, 0),
                target: format_number(target, 0),
                percent_of_target: ratio.display(config.zero_target_policy),
                difference: format_number(actual - target, 0),
            };
            (ratio, row)
        })
        .collect();
    rows.sort_by(|a, b| match (a.0.percent(), b.0.percent()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows.into_iter().map(|(_, row)| row).collect()
}

pub fn monthly_summary(monthly: &BTreeMap<String, Vec<RawTable>>) -> Vec<MonthlyBucketRow> {
    monthly
        .iter()
        .map(|(kind, tables)| MonthlyBucketRow {
            kind: kind.clone(),
            tables: tables.len(),
            rows: tables.iter().map(RawTable::len).sum(),
        })
        .collect()
}

pub fn generate_summary(regular: Option<&ControlTable>, reconciled: &[ReconciledRecord], special_tables: usize) -> SummaryStats {
    let records: &[ControlRecord] = regular.map(|t| t.records.as_slice()).unwrap_or(&[]);
    SummaryStats {
        total_controls: records.len(),
        avg_controls_per_day: avg_controls_per_day(records),
        fault_controls: records.iter().filter(|r| r.outcome == Some(Outcome::PerfNotOk)).count(),
        special_tables,
        reconciled_rows: reconciled.len(),
        total_actual: reconciled.iter().map(|r| r.actual).sum(),
        total_target: reconciled.iter().map(|r| r.target).sum(),
    }
}
