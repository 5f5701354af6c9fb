//! Outcome pivots per branch, recorder or distributor.
use std::collections::{BTreeMap, HashMap};

use crate::filter::RecordFilter;
use crate::types::{ControlRecord, NOT_OK_LABEL, PERF_NOT_OK_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Branch,
    Recorder,
    Distributor,
    /// `"<recorder> (<branch>)"`
    RecorderWithBranch,
    /// `"<distributor> (<branch>)"`
    DistributorWithBranch,
}

impl Dimension {
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Branch => crate::columns::BRANCH,
            Dimension::Recorder | Dimension::RecorderWithBranch => crate::columns::RECORDER,
            Dimension::Distributor | Dimension::DistributorWithBranch => crate::columns::DISTRIBUTOR,
        }
    }

    pub fn key(self, r: &ControlRecord) -> Option<String> {
        let with_branch = |name: &Option<String>| {
            let name = name.as_deref()?;
            Some(match r.branch.as_deref() {
                Some(b) => format!("{} ({})", name, b),
                None => name.to_string(),
            })
        };
        match self {
            Dimension::Branch => r.branch.clone(),
            Dimension::Recorder => r.recorder.clone(),
            Dimension::Distributor => r.distributor.clone(),
            Dimension::RecorderWithBranch => with_branch(&r.recorder),
            Dimension::DistributorWithBranch => with_branch(&r.distributor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Count,
    Percentage,
}

/// Row ordering of a pivot. `Performance` applies when the view is filtered
/// to distributor-fault results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    Performance,
    Default,
}

impl RowOrder {
    pub fn for_filter(filter: &RecordFilter) -> Self {
        if filter.is_performance_view() {
            RowOrder::Performance
        } else {
            RowOrder::Default
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub key: String,
    pub values: Vec<f64>,
    /// Count total before any percentage scaling.
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub dimension: Dimension,
    pub mode: Mode,
    pub categories: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl Pivot {
    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn value(&self, key: &str, category: &str) -> Option<f64> {
        let col = self.category_index(category)?;
        self.rows.iter().find(|r| r.key == key).map(|r| r.values[col])
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.dimension.label().to_string())
            .chain(self.categories.iter().cloned())
            .collect()
    }

    pub fn string_rows(&self) -> Vec<Vec<String>> {
        let decimals = match self.mode {
            Mode::Count => 0,
            Mode::Percentage => 2,
        };
        self.rows
            .iter()
            .map(|r| {
                std::iter::once(r.key.clone())
                    .chain(r.values.iter().map(|v| crate::util::format_number(*v, decimals)))
                    .collect()
            })
            .collect()
    }
}

/// Group by (`dimension`, outcome), count, and pivot outcomes into columns.
///
/// Records without a group key or outcome are left out. The
/// `PERF. NICHT_OK` column comes first, the rest follow in order of first
/// appearance.
pub fn aggregate(records: &[ControlRecord], dimension: Dimension, mode: Mode, order: RowOrder) -> Pivot {
    let mut categories: Vec<String> = Vec::new();
    let mut counts: BTreeMap<String, HashMap<String, usize>> = BTreeMap::new();
    for r in records {
        let (Some(key), Some(outcome)) = (dimension.key(r), r.outcome.as_ref()) else {
            continue;
        };
        let outcome = outcome.to_string();
        if !categories.contains(&outcome) {
            categories.push(outcome.clone());
        }
        *counts.entry(key).or_default().entry(outcome).or_default() += 1;
    }
    if let Some(pos) = categories.iter().position(|c| c == PERF_NOT_OK_LABEL) {
        let fault = categories.remove(pos);
        categories.insert(0, fault);
    }

    let mut rows: Vec<PivotRow> = counts
        .into_iter()
        .map(|(key, per_outcome)| {
            let mut values: Vec<f64> = categories
                .iter()
                .map(|c| per_outcome.get(c).copied().unwrap_or(0) as f64)
                .collect();
            let total: f64 = values.iter().sum();
            if mode == Mode::Percentage && total > 0.0 {
                for v in &mut values {
                    *v = *v / total * 100.0;
                }
            }
            PivotRow { key, values, total }
        })
        .collect();

    let fault_col = categories.iter().position(|c| c == PERF_NOT_OK_LABEL);
    let second_col = match order {
        RowOrder::Performance => fault_col.map(|f| f + 1).filter(|i| *i < categories.len()),
        RowOrder::Default => categories.iter().position(|c| c == NOT_OK_LABEL),
    };
    let at = |row: &PivotRow, col: Option<usize>| col.map(|i| row.values[i]).unwrap_or(0.0);
    rows.sort_by(|a, b| {
        at(a, fault_col)
            .total_cmp(&at(b, fault_col))
            .then_with(|| at(a, second_col).total_cmp(&at(b, second_col)))
    });

    Pivot { dimension, mode, categories, rows }
}

/// Frequencies of one field, most frequent first.
pub fn value_counts<F>(records: &[ControlRecord], field: F) -> Vec<(String, usize)>
where
    F: Fn(&ControlRecord) -> Option<String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for r in records {
        if let Some(v) = field(r) {
            *counts.entry(v).or_default() += 1;
        }
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;

    fn rec(branch: &str, outcome: &str) -> ControlRecord {
        ControlRecord {
            branch: Some(branch.to_string()),
            recorder: Some(format!("R-{}", branch)),
            outcome: Some(Outcome::parse(outcome)),
            ..Default::default()
        }
    }

    fn sample() -> Vec<ControlRecord> {
        vec![
            rec("Fil02", "OK"),
            rec("Fil02", "NICHT_OK"),
            rec("Fil02", "PERF. NICHT_OK"),
            rec("Fil01", "OK"),
            rec("Fil01", "OK"),
            rec("Fil03", "PERF. NICHT_OK"),
            rec("Fil03", "PERF. NICHT_OK"),
            rec("Fil04", "NICHT_OK"),
        ]
    }

    #[test]
    fn fault_column_comes_first() {
        let p = aggregate(&sample(), Dimension::Branch, Mode::Count, RowOrder::Default);
        assert_eq!(p.categories, vec!["PERF. NICHT_OK", "OK", "NICHT_OK"]);
        assert_eq!(p.value("Fil03", "PERF. NICHT_OK"), Some(2.0));
        assert_eq!(p.value("Fil01", "NICHT_OK"), Some(0.0));
        assert_eq!(p.header()[0], "FILIALE");
    }

    #[test]
    fn default_order_sorts_by_fault_then_not_ok() {
        let p = aggregate(&sample(), Dimension::Branch, Mode::Count, RowOrder::Default);
        let keys: Vec<&str> = p.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Fil01", "Fil04", "Fil02", "Fil03"]);
    }

    #[test]
    fn performance_order_breaks_ties_on_next_column() {
        let p = aggregate(&sample(), Dimension::Branch, Mode::Count, RowOrder::Performance);
        // fault = 0 for Fil01 and Fil04; next column is OK (2 vs 0)
        let keys: Vec<&str> = p.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Fil04", "Fil01", "Fil02", "Fil03"]);
    }

    #[test]
    fn percentage_rows_sum_to_hundred() {
        let p = aggregate(&sample(), Dimension::RecorderWithBranch, Mode::Percentage, RowOrder::Default);
        for row in &p.rows {
            let sum: f64 = row.values.iter().sum();
            assert!((sum - 100.0).abs() < 1e-9, "{} sums to {}", row.key, sum);
        }
        assert_eq!(p.value("R-Fil02 (Fil02)", "OK").map(|v| v.round()), Some(33.0));
    }

    #[test]
    fn records_without_key_or_outcome_are_skipped() {
        let mut records = sample();
        records.push(ControlRecord { outcome: Some(Outcome::Ok), ..Default::default() });
        records.push(ControlRecord { branch: Some("Fil09".into()), ..Default::default() });
        let p = aggregate(&records, Dimension::Branch, Mode::Count, RowOrder::Default);
        assert_eq!(p.rows.len(), 4);
        assert!(aggregate(&[], Dimension::Branch, Mode::Percentage, RowOrder::Default).rows.is_empty());
    }

    #[test]
    fn row_order_follows_status_filter() {
        let perf = RecordFilter { outcomes: vec![Outcome::PerfNotOk], ..Default::default() };
        assert_eq!(RowOrder::for_filter(&perf), RowOrder::Performance);
        assert_eq!(RowOrder::for_filter(&RecordFilter::default()), RowOrder::Default);
    }

    #[test]
    fn counts_values() {
        let counts = value_counts(&sample(), |r| r.outcome.as_ref().map(|o| o.to_string()));
        assert_eq!(counts[0], ("OK".to_string(), 3));
        assert_eq!(counts.len(), 3);
    }
}
