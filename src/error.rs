use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file type: {0} (expected one of: {1})")]
    UnsupportedExtension(String, String),

    #[error("Workbook has no sheets: {0}")]
    EmptyWorkbook(String),

    #[error("Missing header row: {0}")]
    MissingHeader(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
