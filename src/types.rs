use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tabled::Tabled;

use crate::config::ZeroTargetPolicy;

pub type Cell = Option<String>;

/// One uploaded sheet as read: header row plus untyped cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, headers: Vec<String>) -> Self {
        Self { source: source.into(), headers, rows: Vec::new() }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell text of `row` in `column`; `None` when the column is absent,
    /// the row is short or the cell is empty.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub const OK_LABEL: &str = "OK";
pub const NOT_OK_LABEL: &str = "NICHT_OK";
pub const PERF_NOT_OK_LABEL: &str = "PERF. NICHT_OK";

/// Result of one field control (`KONTROLLE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Ok,
    NotOk,
    /// Reclassified `NICHT_OK`: the distributor is at fault.
    PerfNotOk,
    Other(String),
}

impl Outcome {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            OK_LABEL => Outcome::Ok,
            NOT_OK_LABEL => Outcome::NotOk,
            PERF_NOT_OK_LABEL => Outcome::PerfNotOk,
            other => Outcome::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Ok => OK_LABEL,
            Outcome::NotOk => NOT_OK_LABEL,
            Outcome::PerfNotOk => PERF_NOT_OK_LABEL,
            Outcome::Other(s) => s,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlRecord {
    pub branch: Option<String>,
    pub recorder: Option<String>,
    pub distributor: Option<String>,
    pub area: Option<String>,
    pub postal_prefix: Option<String>,
    pub outcome: Option<Outcome>,
    pub tags: Option<String>,
    pub captured_at: Option<NaiveDateTime>,
    pub record_type: Option<String>,
    pub source: String,
}

/// Regular control records plus the set of source columns they came with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlTable {
    pub records: Vec<ControlRecord>,
    pub columns: BTreeSet<String>,
}

impl ControlTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append another table; the column set becomes the union.
    pub fn append(&mut self, other: ControlTable) {
        self.columns.extend(other.columns);
        self.records.extend(other.records);
    }

    /// Copy with only the records matching `keep`.
    pub fn filtered(&self, keep: impl Fn(&ControlRecord) -> bool) -> ControlTable {
        ControlTable {
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
            columns: self.columns.clone(),
        }
    }
}

/// Outcome of a column-dependent derivation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    Applied { rows: usize },
    ColumnAbsent(&'static str),
}

impl Derivation {
    pub fn was_applied(&self) -> bool {
        matches!(self, Derivation::Applied { .. })
    }
}

/// One row of a SOLL/IST sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetRow {
    pub branch: Option<String>,
    pub name: Option<String>,
    pub actual: Option<f64>,
    pub target: Option<f64>,
    pub synthesized: bool,
}

/// Actual divided by target, kept apart from a zero target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetRatio {
    Percent(f64),
    UndefinedTarget,
}

impl TargetRatio {
    pub fn compute(actual: f64, target: f64) -> Self {
        if target == 0.0 {
            TargetRatio::UndefinedTarget
        } else {
            TargetRatio::Percent(actual / target * 100.0)
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            TargetRatio::Percent(p) => Some(*p),
            TargetRatio::UndefinedTarget => None,
        }
    }

    pub fn display(&self, policy: ZeroTargetPolicy) -> String {
        match self {
            TargetRatio::Percent(p) => format!("{:.1}%", p),
            TargetRatio::UndefinedTarget => policy.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub branch: Option<String>,
    pub name: Option<String>,
    pub actual: f64,
    pub target: f64,
    pub ratio: TargetRatio,
    pub daily_average: f64,
    pub difference: f64,
    pub synthesized: bool,
}

pub const REFERENCE_PERCENT: &str = "100%";

#[derive(Debug, Serialize, Deserialize, Tabled, Clone, PartialEq)]
pub struct ReconciledRow {
    #[serde(rename = "FILIALE")]
    #[tabled(rename = "FILIALE")]
    pub branch: String,
    #[serde(rename = "ERFASSER")]
    #[tabled(rename = "ERFASSER")]
    pub name: String,
    #[serde(rename = "IST")]
    #[tabled(rename = "IST")]
    pub actual: String,
    #[serde(rename = "SOLL")]
    #[tabled(rename = "SOLL")]
    pub target: String,
    #[serde(rename = "IST in %")]
    #[tabled(rename = "IST in %")]
    pub percent_of_target: String,
    #[serde(rename = "SOLL in %")]
    #[tabled(rename = "SOLL in %")]
    pub reference: String,
    #[serde(rename = "Schnitt pro Tag")]
    #[tabled(rename = "Schnitt pro Tag")]
    pub daily_average: String,
    #[serde(rename = "Differenz")]
    #[tabled(rename = "Differenz")]
    pub difference: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TagCountRow {
    #[serde(rename = "ZUSATZINFO")]
    #[tabled(rename = "ZUSATZINFO")]
    pub tag: String,
    #[serde(rename = "Anzahl")]
    #[tabled(rename = "Anzahl")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DistributorStatsRow {
    #[serde(rename = "NAME/VT/ABNEHMER")]
    #[tabled(rename = "NAME/VT/ABNEHMER")]
    pub distributor: String,
    #[serde(rename = "Tage")]
    #[tabled(rename = "Tage")]
    pub days: usize,
    #[serde(rename = "Kontrollen")]
    #[tabled(rename = "Kontrollen")]
    pub controls: usize,
    #[serde(rename = "AVG_KONTROLLEN_PRO_TAG")]
    #[tabled(rename = "AVG_KONTROLLEN_PRO_TAG")]
    pub avg_per_day: String,
    #[serde(rename = "VERTEILER_WERT")]
    #[tabled(rename = "VERTEILER_WERT")]
    pub label: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct BranchTargetRow {
    #[serde(rename = "FILIALE")]
    #[tabled(rename = "FILIALE")]
    pub branch: String,
    #[serde(rename = "IST")]
    #[tabled(rename = "IST")]
    pub actual: String,
    #[serde(rename = "SOLL")]
    #[tabled(rename = "SOLL")]
    pub target: String,
    #[serde(rename = "IST in %")]
    #[tabled(rename = "IST in %")]
    pub percent_of_target: String,
    #[serde(rename = "Differenz")]
    #[tabled(rename = "Differenz")]
    pub difference: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct MonthlyBucketRow {
    #[serde(rename = "Bericht")]
    #[tabled(rename = "Bericht")]
    pub kind: String,
    #[serde(rename = "Dateien")]
    #[tabled(rename = "Dateien")]
    pub tables: usize,
    #[serde(rename = "Zeilen")]
    #[tabled(rename = "Zeilen")]
    pub rows: usize,
}

/// Flat export form of a [`ControlRecord`].
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RecordRow {
    #[serde(rename = "FILIALE")]
    pub branch: String,
    #[serde(rename = "ERFASSER")]
    pub recorder: String,
    #[serde(rename = "NAME/VT/ABNEHMER")]
    pub distributor: String,
    #[serde(rename = "GEBIET")]
    pub area: String,
    #[serde(rename = "PLZ")]
    pub postal_prefix: String,
    #[serde(rename = "TYPE")]
    pub record_type: String,
    #[serde(rename = "KONTROLLE")]
    pub outcome: String,
    #[serde(rename = "ZUSATZINFO")]
    pub tags: String,
    #[serde(rename = "ERFASST")]
    pub captured_at: String,
}

impl From<&ControlRecord> for RecordRow {
    fn from(r: &ControlRecord) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        RecordRow {
            branch: text(&r.branch),
            recorder: text(&r.recorder),
            distributor: text(&r.distributor),
            area: text(&r.area),
            postal_prefix: text(&r.postal_prefix),
            record_type: text(&r.record_type),
            outcome: r.outcome.as_ref().map(|o| o.to_string()).unwrap_or_default(),
            tags: text(&r.tags),
            captured_at: r
                .captured_at
                .map(|t| t.format(crate::columns::CAPTURED_AT_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SummaryStats {
    pub total_controls: usize,
    pub avg_controls_per_day: Option<f64>,
    pub fault_controls: usize,
    pub special_tables: usize,
    pub reconciled_rows: usize,
    pub total_actual: f64,
    pub total_target: f64,
}
