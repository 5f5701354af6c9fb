//! Re-deriving `FILIALE` from static tables.
//!
//! The two rules serve different report views and are never chained.
use crate::columns;
use crate::config::Config;
use crate::types::{ControlTable, Derivation};
use crate::util::parse_u32_safe;

/// Overwrite each record's branch from its postal prefix.
///
/// Areas are applied in configuration order, so a prefix covered by two
/// areas ends up with the later one. Records whose prefix is missing or not
/// numeric keep their branch.
pub fn reassign_by_area(table: &ControlTable, config: &Config) -> (ControlTable, Derivation) {
    let mut out = table.clone();
    if !out.has_column(columns::POSTAL_PREFIX) {
        return (out, Derivation::ColumnAbsent(columns::POSTAL_PREFIX));
    }
    let prefixes: Vec<Option<u32>> = out
        .records
        .iter()
        .map(|r| parse_u32_safe(r.postal_prefix.as_deref()))
        .collect();
    let mut assigned = vec![false; out.records.len()];
    for area in &config.branch_areas {
        for (i, r) in out.records.iter_mut().enumerate() {
            if let Some(prefix) = prefixes[i] {
                if area.covers(prefix) {
                    r.branch = Some(area.branch.clone());
                    assigned[i] = true;
                }
            }
        }
    }
    let rows = assigned.iter().filter(|a| **a).count();
    tracing::debug!(rows, total = out.records.len(), "branches reassigned by postal prefix");
    (out, Derivation::Applied { rows })
}

/// Replace each record's branch with the recorder's home branch.
/// Unknown recorders end up without a branch.
pub fn reassign_by_recorder(table: &ControlTable, config: &Config) -> (ControlTable, Derivation) {
    let mut out = table.clone();
    if !out.has_column(columns::RECORDER) {
        return (out, Derivation::ColumnAbsent(columns::RECORDER));
    }
    let index = config.person_index();
    let mut rows = 0;
    for r in &mut out.records {
        r.branch = r
            .recorder
            .as_deref()
            .and_then(|name| index.get(name))
            .map(|b| b.to_string());
        if r.branch.is_some() {
            rows += 1;
        }
    }
    out.columns.insert(columns::BRANCH.to_string());
    tracing::debug!(rows, total = out.records.len(), "branches reassigned by recorder");
    (out, Derivation::Applied { rows })
}
