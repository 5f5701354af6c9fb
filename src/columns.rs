//! Column names of the uploaded exports. Matching is exact and case-sensitive.

pub const BRANCH: &str = "FILIALE";
pub const RECORDER: &str = "ERFASSER";
pub const DISTRIBUTOR: &str = "NAME/VT/ABNEHMER";
pub const AREA: &str = "GEBIET";
pub const POSTAL_PREFIX: &str = "PLZ";
pub const TAGS: &str = "ZUSATZINFO";
pub const OUTCOME: &str = "KONTROLLE";
pub const RECORD_TYPE: &str = "TYPE";
pub const CAPTURED_AT: &str = "ERFASST";
pub const ACTUAL: &str = "IST";
pub const TARGET: &str = "SOLL";

/// Timestamp layout of the `ERFASST` column.
pub const CAPTURED_AT_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
