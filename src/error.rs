use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of the KPI pipeline that callers can match on.
///
/// Anything else (I/O while writing reports, workbook save failures) is
/// wrapped in `anyhow` at the call site.
#[derive(Debug, Error)]
pub enum KpiError {
    #[error("cannot open workbook {}: {source}", path.display())]
    OpenWorkbook {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("sheet {sheet:?} not found in {}: {source}", path.display())]
    MissingSheet {
        sheet: String,
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("column {header:?} not found in {}", path.display())]
    MissingColumn { header: String, path: PathBuf },

    #[error("sheet {sheet:?} not found in tracking workbook {}", path.display())]
    MissingTrackingSheet { sheet: String, path: PathBuf },

    #[error("working-day count must be at least 1")]
    ZeroHorizon,
}
