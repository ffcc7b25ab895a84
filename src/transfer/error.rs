use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedExportFormat(String),

    #[error("File contains no header row")]
    EmptyFile,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Failed to write spreadsheet: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Problems with the caller's input rather than with the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TransferError::UnsupportedFormat(_)
                | TransferError::UnsupportedExportFormat(_)
                | TransferError::EmptyFile
                | TransferError::InvalidHeader(_)
                | TransferError::Spreadsheet(_)
                | TransferError::Csv(_)
        )
    }
}
