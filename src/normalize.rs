//! Cleaning of regular control records.
//!
//! Each table-level step reports whether it ran or was skipped because its
//! source column is missing from the upload.
use crate::columns;
use crate::config::Config;
use crate::types::{ControlRecord, ControlTable, Derivation, Outcome, RawTable};
use crate::util::{non_blank, parse_datetime_safe};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeReport {
    pub timestamps: Derivation,
    pub unparsable_timestamps: usize,
    pub postal_prefix: Derivation,
    /// Rows removed because they belong to the excluded branch.
    pub excluded_branch: Derivation,
    pub tags_stripped: Derivation,
    pub distributor_default: Derivation,
    /// Rows whose outcome changed to `PERF. NICHT_OK`.
    pub reclassified: Derivation,
}

/// First four characters of the area code. Shorter codes are returned whole.
pub fn postal_prefix(area: &str) -> String {
    area.chars().take(4).collect()
}

pub fn default_distributor(name: Option<&str>, unknown_label: &str) -> String {
    non_blank(name).unwrap_or_else(|| unknown_label.to_string())
}

/// Drop every whitespace token that appears in `excluded`, rejoining with
/// single spaces.
pub fn strip_excluded_tags(text: &str, excluded: &[String]) -> String {
    text.split_whitespace()
        .filter(|tag| !excluded.iter().any(|e| e == tag))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome after applying the distributor-fault rule: any fault tag turns
/// the record into `PERF. NICHT_OK`, otherwise the outcome is unchanged.
pub fn reclassify_outcome(record: &ControlRecord, config: &Config) -> Option<Outcome> {
    let Some(tags) = record.tags.as_deref() else {
        return record.outcome.clone();
    };
    if tags.split_whitespace().any(|t| config.is_fault_tag(t)) {
        Some(Outcome::PerfNotOk)
    } else {
        record.outcome.clone()
    }
}

/// Map a raw sheet onto typed records, parsing `ERFASST` on the way.
/// Returns the table and the number of timestamps that failed to parse.
pub fn control_table_from_raw(raw: &RawTable) -> (ControlTable, usize) {
    let mut unparsable = 0usize;
    let records = (0..raw.len())
        .map(|i| {
            let text = |col: &str| non_blank(raw.value(i, col));
            let captured_text = raw.value(i, columns::CAPTURED_AT);
            let captured_at = parse_datetime_safe(captured_text);
            if captured_at.is_none() && captured_text.is_some_and(|s| !s.trim().is_empty()) {
                unparsable += 1;
            }
            ControlRecord {
                branch: text(columns::BRANCH),
                recorder: text(columns::RECORDER),
                distributor: text(columns::DISTRIBUTOR),
                area: text(columns::AREA),
                postal_prefix: text(columns::POSTAL_PREFIX),
                outcome: text(columns::OUTCOME).map(|s| Outcome::parse(&s)),
                tags: text(columns::TAGS),
                captured_at,
                record_type: text(columns::RECORD_TYPE),
                source: raw.source.clone(),
            }
        })
        .collect();
    let table = ControlTable { records, columns: raw.headers.iter().cloned().collect() };
    (table, unparsable)
}

pub fn derive_postal_prefix(table: &mut ControlTable) -> Derivation {
    if !table.has_column(columns::AREA) {
        return Derivation::ColumnAbsent(columns::AREA);
    }
    let mut rows = 0;
    for r in &mut table.records {
        r.postal_prefix = r.area.as_deref().map(postal_prefix);
        rows += 1;
    }
    table.columns.insert(columns::POSTAL_PREFIX.to_string());
    Derivation::Applied { rows }
}

pub fn drop_excluded_branch(table: &mut ControlTable, excluded: &str) -> Derivation {
    if !table.has_column(columns::BRANCH) {
        return Derivation::ColumnAbsent(columns::BRANCH);
    }
    let before = table.records.len();
    table.records.retain(|r| r.branch.as_deref() != Some(excluded));
    Derivation::Applied { rows: before - table.records.len() }
}

pub fn strip_tags(table: &mut ControlTable, config: &Config) -> Derivation {
    if !table.has_column(columns::TAGS) {
        return Derivation::ColumnAbsent(columns::TAGS);
    }
    let mut rows = 0;
    for r in &mut table.records {
        if let Some(text) = r.tags.as_deref() {
            let stripped = strip_excluded_tags(text, &config.excluded_tags);
            if stripped != text {
                rows += 1;
            }
            r.tags = if stripped.is_empty() { None } else { Some(stripped) };
        }
    }
    Derivation::Applied { rows }
}

pub fn fill_unknown_distributor(table: &mut ControlTable, config: &Config) -> Derivation {
    if !table.has_column(columns::DISTRIBUTOR) {
        return Derivation::ColumnAbsent(columns::DISTRIBUTOR);
    }
    let mut rows = 0;
    for r in &mut table.records {
        if r.distributor.is_none() {
            rows += 1;
        }
        r.distributor = Some(default_distributor(r.distributor.as_deref(), &config.unknown_distributor));
    }
    Derivation::Applied { rows }
}

pub fn apply_reclassification(table: &mut ControlTable, config: &Config) -> Derivation {
    if !table.has_column(columns::TAGS) {
        return Derivation::ColumnAbsent(columns::TAGS);
    }
    let mut rows = 0;
    for r in &mut table.records {
        let outcome = reclassify_outcome(r, config);
        if outcome != r.outcome {
            r.outcome = outcome;
            rows += 1;
        }
    }
    Derivation::Applied { rows }
}

/// Full cleaning of one regular sheet.
pub fn normalize_regular(raw: &RawTable, config: &Config) -> (ControlTable, NormalizeReport) {
    let (mut table, unparsable_timestamps) = control_table_from_raw(raw);
    let timestamps = if raw.has_column(columns::CAPTURED_AT) {
        Derivation::Applied { rows: table.len() }
    } else {
        Derivation::ColumnAbsent(columns::CAPTURED_AT)
    };
    let postal_prefix = derive_postal_prefix(&mut table);
    let excluded_branch = drop_excluded_branch(&mut table, &config.excluded_branch);
    let tags_stripped = strip_tags(&mut table, config);
    let distributor_default = fill_unknown_distributor(&mut table, config);
    let reclassified = apply_reclassification(&mut table, config);

    let report = NormalizeReport {
        timestamps,
        unparsable_timestamps,
        postal_prefix,
        excluded_branch,
        tags_stripped,
        distributor_default,
        reclassified,
    };
    tracing::debug!(source = %raw.source, rows = table.len(), ?report, "normalized regular table");
    (table, report)
}
