use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::aggregate::Pivot;
use crate::error::Result;
use crate::types::{ControlTable, RecordRow};
use crate::util::previous_month_stamp;

pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn write_pivot_csv(path: impl AsRef<Path>, pivot: &Pivot) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(pivot.header())?;
    for row in pivot.string_rows() {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(keine Zeilen)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn render_pivot(pivot: &Pivot, max_rows: usize) -> String {
    if pivot.rows.is_empty() {
        return "(keine Zeilen)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(pivot.header());
    for row in pivot.string_rows().into_iter().take(max_rows) {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

pub fn preview_pivot(pivot: &Pivot, max_rows: usize) {
    println!("{}\n", render_pivot(pivot, max_rows));
}

/// Files produced by [`export_monthly`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFiles {
    pub raw: PathBuf,
    pub summary: PathBuf,
}

/// `Kontrollen_MMYYYY`, naming the month before `today`.
pub fn export_stem(today: NaiveDate) -> String {
    format!("Kontrollen_{}", previous_month_stamp(today))
}

/// Write the raw records and the summary pivot side by side in `dir`.
pub fn export_monthly(dir: impl AsRef<Path>, today: NaiveDate, table: &ControlTable, pivot: &Pivot) -> Result<ExportFiles> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let stem = export_stem(today);
    let files = ExportFiles {
        raw: dir.join(format!("{}_Rohdaten.csv", stem)),
        summary: dir.join(format!("{}_Auswertung.csv", stem)),
    };
    let rows: Vec<RecordRow> = table.records.iter().map(RecordRow::from).collect();
    write_csv(&files.raw, &rows)?;
    write_pivot_csv(&files.summary, pivot)?;
    tracing::info!(raw = %files.raw.display(), summary = %files.summary.display(), "monthly export written");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Dimension, Mode, RowOrder};
    use crate::types::{ControlRecord, Outcome};

    fn table() -> ControlTable {
        ControlTable {
            records: vec![
                ControlRecord {
                    branch: Some("Fil01".into()),
                    outcome: Some(Outcome::Ok),
                    ..Default::default()
                },
                ControlRecord {
                    branch: Some("Fil01".into()),
                    outcome: Some(Outcome::PerfNotOk),
                    tags: Some("TEILZUSTELLUNG".into()),
                    ..Default::default()
                },
            ],
            columns: Default::default(),
        }
    }

    #[test]
    fn pivot_renders_as_markdown() {
        let pivot = aggregate(&table().records, Dimension::Branch, Mode::Count, RowOrder::Default);
        let text = render_pivot(&pivot, 10);
        assert!(text.contains("FILIALE"));
        assert!(text.contains("PERF. NICHT_OK"));
        assert!(text.contains("Fil01"));
    }

    #[test]
    fn export_writes_both_files() {
        let dir = std::env::temp_dir().join(format!("feibra-export-{}", std::process::id()));
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let t = table();
        let pivot = aggregate(&t.records, Dimension::Branch, Mode::Count, RowOrder::Default);
        let files = export_monthly(&dir, today, &t, &pivot).unwrap();
        assert!(files.raw.ends_with("Kontrollen_092026_Rohdaten.csv"));
        let summary = std::fs::read_to_string(&files.summary).unwrap();
        assert!(summary.starts_with("FILIALE,PERF. NICHT_OK,OK"));
        let raw = std::fs::read_to_string(&files.raw).unwrap();
        assert_eq!(raw.lines().count(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }
}
