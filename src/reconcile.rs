//! SOLL/IST reconciliation against the fixed staff roster.
//!
//! Each uploaded target sheet is reconciled on its own and the results are
//! concatenated. Roster entries missing from a sheet are synthesized with
//! the person's default target and an actual of 0.
use crate::columns;
use crate::config::Config;
use crate::types::{RawTable, ReconciledRecord, ReconciledRow, TargetRatio, TargetRow, REFERENCE_PERCENT};
use crate::util::{format_number, non_blank, parse_f64_safe};

pub fn target_rows_from_raw(raw: &RawTable) -> Vec<TargetRow> {
    (0..raw.len())
        .map(|i| TargetRow {
            branch: non_blank(raw.value(i, columns::BRANCH)),
            name: non_blank(raw.value(i, columns::RECORDER)),
            actual: parse_f64_safe(raw.value(i, columns::ACTUAL)),
            target: parse_f64_safe(raw.value(i, columns::TARGET)),
            synthesized: false,
        })
        .collect()
}

/// Steps 1-4: drop excluded names, default targets, align with the roster,
/// default actuals. The result still carries `Option`s for branch and name.
pub fn align_with_roster(rows: Vec<TargetRow>, config: &Config) -> Vec<TargetRow> {
    let mut rows: Vec<TargetRow> = rows
        .into_iter()
        .filter(|r| !r.name.as_deref().is_some_and(|n| config.is_excluded_recorder(n)))
        .collect();

    for r in &mut rows {
        r.target.get_or_insert(0.0);
    }

    for staff in &config.branch_staff {
        for name in &staff.names {
            let branch = staff.branch.as_str();
            let matching: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, r)| r.name.as_deref() == Some(name.as_str()))
                .map(|(i, _)| i)
                .collect();

            let synthesize = match matching.as_slice() {
                [] => true,
                [only] => rows[*only].branch.as_deref() != Some(branch),
                many => {
                    // Same person under several branches: keep the target
                    // only on the row of this roster branch.
                    for &i in many {
                        if rows[i].branch.as_deref() != Some(branch) {
                            rows[i].target = Some(0.0);
                        }
                    }
                    false
                }
            };

            if synthesize {
                tracing::debug!(branch, name = %name, "synthesizing missing roster row");
                rows.push(TargetRow {
                    branch: Some(branch.to_string()),
                    name: Some(name.clone()),
                    actual: None,
                    target: Some(config.default_target(name) as f64),
                    synthesized: true,
                });
            }
        }
    }

    for r in &mut rows {
        r.actual.get_or_insert(0.0);
    }
    rows
}

/// Step 5: derived metrics.
pub fn derive_metrics(row: &TargetRow, working_days: f64) -> ReconciledRecord {
    let actual = row.actual.unwrap_or(0.0);
    let target = row.target.unwrap_or(0.0);
    ReconciledRecord {
        branch: row.branch.clone(),
        name: row.name.clone(),
        actual,
        target,
        ratio: TargetRatio::compute(actual, target),
        daily_average: actual / working_days,
        difference: actual - target,
        synthesized: row.synthesized,
    }
}

pub fn reconcile_table(raw: &RawTable, config: &Config) -> Vec<ReconciledRecord> {
    let input = target_rows_from_raw(raw);
    let before = input.len();
    let aligned = align_with_roster(input, config);
    let synthesized = aligned.iter().filter(|r| r.synthesized).count();
    tracing::info!(source = %raw.source, rows = before, synthesized, "reconciled target sheet");
    aligned.iter().map(|r| derive_metrics(r, config.working_days)).collect()
}

/// Reconcile every target sheet independently and concatenate the results.
pub fn reconcile_all(tables: &[RawTable], config: &Config) -> Vec<ReconciledRecord> {
    tables.iter().flat_map(|t| reconcile_table(t, config)).collect()
}

pub fn to_rows(records: &[ReconciledRecord], config: &Config) -> Vec<ReconciledRow> {
    records
        .iter()
        .map(|r| ReconciledRow {
            branch: r.branch.clone().unwrap_or_default(),
            name: r.name.clone().unwrap_or_default(),
            actual: format_number(r.actual, 0),
            target: format_number(r.target, 0),
            percent_of_target: r.ratio.display(config.zero_target_policy),
            reference: REFERENCE_PERCENT.to_string(),
            daily_average: format_number(r.daily_average, 2),
            difference: format_number(r.difference, 0),
        })
        .collect()
}
