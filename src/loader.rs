use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use crate::columns::CAPTURED_AT_FORMAT;
use crate::config::{Config, PipelineMode};
use crate::error::{DashboardError, Result};
use crate::normalize::normalize_regular;
use crate::types::{Cell, ControlTable, Derivation, RawTable};

/// An uploaded file: its name (for the extension check) and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Which stream a sheet belongs to, decided by its marker columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKind {
    Regular,
    Special,
    /// Every monthly marker found in the header, in configuration order.
    Monthly(Vec<String>),
}

pub fn classify_table(table: &RawTable, config: &Config) -> TableKind {
    if table.has_column(&config.special_marker) {
        return TableKind::Special;
    }
    let kinds: Vec<String> = config
        .monthly_markers
        .iter()
        .filter(|m| table.has_column(m))
        .cloned()
        .collect();
    if kinds.is_empty() {
        TableKind::Regular
    } else {
        TableKind::Monthly(kinds)
    }
}

#[derive(Debug)]
pub struct FileError {
    pub file: String,
    pub error: DashboardError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files_read: usize,
    pub files_failed: usize,
    pub files_ignored: usize,
    pub regular_rows: usize,
    pub special_tables: usize,
    pub monthly_tables: usize,
    pub dropped_excluded_branch: usize,
    pub unparsable_timestamps: usize,
    pub reclassified: usize,
}

#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub regular: Option<ControlTable>,
    pub special: Vec<RawTable>,
    pub monthly: BTreeMap<String, Vec<RawTable>>,
    pub errors: Vec<FileError>,
    pub report: LoadReport,
}

fn data_to_cell(d: &Data) -> Cell {
    match d {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        // Decimal comma, so `1.234` is never mistaken for a grouped thousand.
        Data::Float(f) => Some(f.to_string().replace('.', ",")),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt.as_datetime().map(|t| t.format(CAPTURED_AT_FORMAT).to_string()),
        Data::DateTimeIso(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn read_xlsx_table(name: &str, bytes: &[u8]) -> Result<RawTable> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DashboardError::EmptyWorkbook(name.to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| DashboardError::MissingHeader(name.to_string()))?;
    let headers: Vec<String> = header.iter().map(|d| data_to_cell(d).unwrap_or_default()).collect();
    let mut table = RawTable::new(name, headers);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        table.rows.push(cells);
    }
    Ok(table)
}

pub fn read_csv_table(name: &str, bytes: &[u8]) -> Result<RawTable> {
    // German exports are usually `;`-separated.
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = if first_line.contains(&b';') { b';' } else { b',' };
    let mut rdr = ReaderBuilder::new().flexible(true).delimiter(delimiter).from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DashboardError::MissingHeader(name.to_string()));
    }
    let mut table = RawTable::new(name, headers);
    for result in rdr.records() {
        let record = result?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|c| if c.trim().is_empty() { None } else { Some(c.to_string()) })
            .collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        table.rows.push(cells);
    }
    Ok(table)
}

/// Read one upload as a table, rejecting extensions that are not accepted.
pub fn read_table(file: &UploadedFile, config: &Config) -> Result<RawTable> {
    let ext = file.extension().unwrap_or_default();
    if !config.accepted_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        return Err(DashboardError::UnsupportedExtension(
            file.name.clone(),
            config.accepted_extensions.join(", "),
        ));
    }
    match ext.as_str() {
        "csv" => read_csv_table(&file.name, &file.bytes),
        _ => read_xlsx_table(&file.name, &file.bytes),
    }
}

fn add_regular(batch: &mut LoadedBatch, raw: &RawTable, config: &Config) {
    let (table, report) = normalize_regular(raw, config);
    batch.report.unparsable_timestamps += report.unparsable_timestamps;
    if let Derivation::Applied { rows } = report.excluded_branch {
        batch.report.dropped_excluded_branch += rows;
    }
    if let Derivation::Applied { rows } = report.reclassified {
        batch.report.reclassified += rows;
    }
    batch.report.regular_rows += table.len();
    match batch.regular.as_mut() {
        Some(acc) => acc.append(table),
        None => batch.regular = Some(table),
    }
}

/// Read and route every upload. A file that cannot be read is recorded in
/// `errors` and the remaining files are still processed. In single-file mode
/// the first readable upload is used and everything after it is ignored.
pub fn load_batch(files: &[UploadedFile], config: &Config) -> LoadedBatch {
    let mut batch = LoadedBatch::default();

    for (i, file) in files.iter().enumerate() {
        let raw = match read_table(file, config) {
            Ok(t) => t,
            Err(error) => {
                tracing::warn!(file = %file.name, %error, "skipping upload");
                batch.report.files_failed += 1;
                batch.errors.push(FileError { file: file.name.clone(), error });
                continue;
            }
        };
        batch.report.files_read += 1;

        let kind = match config.mode {
            PipelineMode::SingleFile => TableKind::Regular,
            PipelineMode::MultiFile => classify_table(&raw, config),
        };
        tracing::debug!(file = %file.name, rows = raw.len(), ?kind, "classified upload");
        match kind {
            TableKind::Special => {
                batch.report.special_tables += 1;
                batch.special.push(raw);
            }
            TableKind::Monthly(kinds) => {
                batch.report.monthly_tables += 1;
                for k in kinds {
                    batch.monthly.entry(k).or_default().push(raw.clone());
                }
            }
            TableKind::Regular => add_regular(&mut batch, &raw, config),
        }

        if config.mode == PipelineMode::SingleFile {
            let ignored = files.len() - i - 1;
            if ignored > 0 {
                tracing::warn!(ignored, used = %file.name, "single-file mode: remaining uploads ignored");
                batch.report.files_ignored = ignored;
            }
            break;
        }
    }

    tracing::info!(
        read = batch.report.files_read,
        failed = batch.report.files_failed,
        regular_rows = batch.report.regular_rows,
        special = batch.report.special_tables,
        monthly = batch.report.monthly_tables,
        "upload batch loaded"
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(name: &str, content: &str) -> UploadedFile {
        UploadedFile::new(name, content.as_bytes().to_vec())
    }

    fn headers(cols: &[&str]) -> RawTable {
        RawTable::new("t", cols.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn classification_priority() {
        let cfg = Config::default();
        assert_eq!(classify_table(&headers(&["FILIALE", "SOLL", "ZUSTELLQUOTE"]), &cfg), TableKind::Special);
        assert_eq!(
            classify_table(&headers(&["KONTROLLQUOTE", "ZUSTELLQUOTE"]), &cfg),
            TableKind::Monthly(vec!["ZUSTELLQUOTE".into(), "KONTROLLQUOTE".into()])
        );
        assert_eq!(classify_table(&headers(&["FILIALE", "KONTROLLE"]), &cfg), TableKind::Regular);
    }

    #[test]
    fn reads_semicolon_csv() {
        let t = read_csv_table("a.csv", "FILIALE;GEBIET\nFil01;1070WIEN\n;\nFil02;\n".as_bytes()).unwrap();
        assert_eq!(t.headers, vec!["FILIALE", "GEBIET"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(1, "GEBIET"), None);
    }

    #[test]
    fn bad_files_do_not_stop_the_batch() {
        let cfg = Config::default();
        let files = vec![
            csv_file("notes.txt", "whatever"),
            UploadedFile::new("broken.xlsx", b"not a zip".to_vec()),
            csv_file("ok.csv", "FILIALE,KONTROLLE\nFil01,OK\nFil12,OK\n"),
        ];
        let batch = load_batch(&files, &cfg);
        assert_eq!(batch.errors.len(), 2);
        assert!(matches!(batch.errors[0].error, DashboardError::UnsupportedExtension(..)));
        assert_eq!(batch.report.files_read, 1);
        assert_eq!(batch.report.dropped_excluded_branch, 1);
        assert_eq!(batch.regular.map(|t| t.len()), Some(1));
    }

    #[test]
    fn routes_streams() {
        let cfg = Config::default();
        let files = vec![
            csv_file("soll.csv", "FILIALE,ERFASSER,IST,SOLL\nFil01,Gruber Thomas,10,100\n"),
            csv_file("monat.csv", "FILIALE,ZUSTELLQUOTE,KONTROLLQUOTE\nFil01,98,12\n"),
            csv_file("a.csv", "FILIALE,KONTROLLE\nFil01,OK\n"),
            csv_file("b.csv", "FILIALE,TYPE\nFil02,FLUGBLATT\n"),
        ];
        let batch = load_batch(&files, &cfg);
        assert_eq!(batch.special.len(), 1);
        assert_eq!(batch.monthly.get("ZUSTELLQUOTE").map(Vec::len), Some(1));
        assert_eq!(batch.monthly.get("KONTROLLQUOTE").map(Vec::len), Some(1));
        let regular = batch.regular.unwrap();
        assert_eq!(regular.len(), 2);
        assert!(regular.has_column("KONTROLLE") && regular.has_column("TYPE"));
    }

    #[test]
    fn single_file_mode_skips_classification() {
        let cfg = Config { mode: PipelineMode::SingleFile, ..Config::default() };
        let files = vec![
            csv_file("soll.csv", "FILIALE,ERFASSER,IST,SOLL\nFil01,Gruber Thomas,10,100\n"),
            csv_file("a.csv", "FILIALE,KONTROLLE\nFil01,OK\n"),
        ];
        let batch = load_batch(&files, &cfg);
        assert!(batch.special.is_empty());
        assert_eq!(batch.report.files_ignored, 1);
        assert_eq!(batch.regular.map(|t| t.len()), Some(1));
    }

    #[test]
    fn single_file_mode_uses_first_readable_upload() {
        let cfg = Config { mode: PipelineMode::SingleFile, ..Config::default() };
        let files = vec![
            csv_file("notes.txt", "whatever"),
            csv_file("a.csv", "FILIALE,KONTROLLE\nFil01,OK\n"),
            csv_file("b.csv", "FILIALE,KONTROLLE\nFil02,OK\n"),
        ];
        let batch = load_batch(&files, &cfg);
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.report.files_read, 1);
        assert_eq!(batch.report.files_ignored, 1);
        let regular = batch.regular.unwrap();
        assert_eq!(regular.len(), 1);
        assert_eq!(regular.records[0].branch.as_deref(), Some("Fil01"));
    }

    fn control_workbook() -> Vec<u8> {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in ["FILIALE", "GEBIET", "ZUSATZINFO", "KONTROLLE", "ERFASST", "IST"].iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        let stamp = Format::new().set_num_format("dd.mm.yyyy hh:mm:ss");
        let captured = ExcelDateTime::from_ymd(2026, 9, 1).unwrap().and_hms(8, 0, 0).unwrap();
        sheet.write_string(1, 0, "Fil01").unwrap();
        sheet.write_number(1, 1, 1070.0).unwrap();
        sheet.write_string(1, 2, "SACKGASSE FALSCHE_ABGABESTELLE").unwrap();
        sheet.write_string(1, 3, "NICHT_OK").unwrap();
        sheet.write_datetime_with_format(1, 4, &captured, &stamp).unwrap();
        sheet.write_number(1, 5, 12.5).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_numeric_and_date_cells_from_xlsx() {
        let t = read_xlsx_table("kontrollen.xlsx", &control_workbook()).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.value(0, "GEBIET"), Some("1070"));
        assert_eq!(t.value(0, "ERFASST"), Some("01.09.2026 08:00:00"));
        assert_eq!(t.value(0, "IST"), Some("12,5"));
        assert_eq!(crate::util::parse_f64_safe(t.value(0, "IST")), Some(12.5));
    }

    #[test]
    fn xlsx_upload_is_normalized() {
        let cfg = Config::default();
        let files = vec![UploadedFile::new("kontrollen.xlsx", control_workbook())];
        let batch = load_batch(&files, &cfg);
        assert!(batch.errors.is_empty());
        let regular = batch.regular.unwrap();
        let r = &regular.records[0];
        assert_eq!(r.postal_prefix.as_deref(), Some("1070"));
        let expected = chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        assert_eq!(r.captured_at, Some(expected));
        assert_eq!(r.outcome, Some(crate::types::Outcome::PerfNotOk));
        assert_eq!(batch.report.reclassified, 1);
    }
}
