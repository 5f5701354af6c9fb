//! Multi-select filtering of control records.
//!
//! An empty selection means "no restriction" for that field.
use crate::types::{ControlRecord, ControlTable, Outcome};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub branches: Vec<String>,
    pub record_types: Vec<String>,
    pub postal_prefixes: Vec<String>,
    pub outcomes: Vec<Outcome>,
    pub distributors: Vec<String>,
    /// Matches when any selected tag occurs in the tag text.
    pub tags: Vec<String>,
}

fn selected(choices: &[String], value: Option<&str>) -> bool {
    choices.is_empty() || value.is_some_and(|v| choices.iter().any(|c| c == v))
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        *self == RecordFilter::default()
    }

    /// True when the filter is narrowed to distributor-fault results only.
    pub fn is_performance_view(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| *o == Outcome::PerfNotOk)
    }

    pub fn matches(&self, r: &ControlRecord) -> bool {
        selected(&self.branches, r.branch.as_deref())
            && selected(&self.record_types, r.record_type.as_deref())
            && selected(&self.postal_prefixes, r.postal_prefix.as_deref())
            && selected(&self.distributors, r.distributor.as_deref())
            && (self.outcomes.is_empty() || r.outcome.as_ref().is_some_and(|o| self.outcomes.contains(o)))
            && (self.tags.is_empty()
                || r.tags.as_deref().is_some_and(|text| self.tags.iter().any(|t| text.contains(t.as_str()))))
    }

    pub fn apply(&self, table: &ControlTable) -> ControlTable {
        table.filtered(|r| self.matches(r))
    }
}

/// Sorted distinct values of one field, for filter option lists.
pub fn distinct_values<F>(records: &[ControlRecord], field: F) -> Vec<String>
where
    F: Fn(&ControlRecord) -> Option<String>,
{
    let mut out: Vec<String> = records.iter().filter_map(field).collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(branch: &str, outcome: Outcome, tags: Option<&str>) -> ControlRecord {
        ControlRecord {
            branch: Some(branch.to_string()),
            outcome: Some(outcome),
            tags: tags.map(str::to_string),
            record_type: Some("FLUGBLATT".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let f = RecordFilter::default();
        assert!(f.is_empty());
        assert!(f.matches(&ControlRecord::default()));
    }

    #[test]
    fn combines_selections() {
        let f = RecordFilter {
            branches: vec!["Fil01".into()],
            tags: vec!["SACK".into()],
            ..Default::default()
        };
        assert!(f.matches(&rec("Fil01", Outcome::Ok, Some("SACKGASSE"))));
        assert!(!f.matches(&rec("Fil02", Outcome::Ok, Some("SACKGASSE"))));
        assert!(!f.matches(&rec("Fil01", Outcome::Ok, None)));
    }

    #[test]
    fn performance_view_detection() {
        let f = RecordFilter { outcomes: vec![Outcome::PerfNotOk], ..Default::default() };
        assert!(f.is_performance_view());
        assert!(f.matches(&rec("Fil01", Outcome::PerfNotOk, None)));
        assert!(!f.matches(&rec("Fil01", Outcome::NotOk, None)));
        let mixed = RecordFilter { outcomes: vec![Outcome::PerfNotOk, Outcome::Ok], ..Default::default() };
        assert!(!mixed.is_performance_view());
    }

    #[test]
    fn distinct_values_are_sorted() {
        let records = vec![
            rec("Fil02", Outcome::Ok, None),
            rec("Fil01", Outcome::Ok, None),
            rec("Fil02", Outcome::Ok, None),
        ];
        assert_eq!(distinct_values(&records, |r| r.branch.clone()), vec!["Fil01", "Fil02"]);
    }
}
