use std::path::PathBuf;

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Value error: {0}")]
    Value(String),
    #[error("Render error: {0}")]
    Render(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ReportError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ReportError::Render(err.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        if !err.is_io_error() {
            return ReportError::Parse(err.to_string());
        }
        match err.into_kind() {
            csv::ErrorKind::Io(err) => ReportError::Io(err),
            kind => ReportError::Parse(format!("{kind:?}")),
        }
    }
}
