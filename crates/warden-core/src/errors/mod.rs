//! Error taxonomy for the Warden report-storage engine.
//!
//! Every variant corresponds to one of the error kinds named in the
//! service's error handling design: `DATABASE`, `IOERROR`, `SOURCE_FILE`,
//! `REPORT_FORMAT`, `AUTH_DENIED`, `UNAUTHORIZED`, `API_MISMATCH`, `GENERAL`.

pub mod error_code;

pub use error_code::WardenErrorCode;

/// Errors that can surface from any Warden core operation.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("malformed in-source review comment in {file}: {reason}")]
    SourceFile { file: String, reason: String },

    #[error("malformed report record: {reason}")]
    ReportFormat { reason: String },

    #[error("content hash mismatch for {hash}")]
    InvalidContent { hash: String },

    #[error("bundle references file content {hash} that was neither shipped inline nor already stored")]
    MissingFile { hash: String },

    #[error("review status changes are disabled for product {product_id}")]
    Disabled { product_id: i64 },

    #[error("authentication required")]
    AuthDenied,

    #[error("permission denied: {scope} on product {product_id:?}")]
    Unauthorized {
        scope: String,
        product_id: Option<i64>,
    },

    #[error("API version mismatch: client {client}, server {server}")]
    ApiMismatch { client: String, server: String },

    #[error("already running: {product_id}/{run_name}")]
    AlreadyRunning { product_id: i64, run_name: String },

    #[error("task queue full")]
    QueueFull,

    #[error("{message}")]
    General { message: String },
}

impl WardenErrorCode for WardenError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database { .. } => error_code::DATABASE,
            Self::Io { .. } => error_code::IOERROR,
            Self::SourceFile { .. } => error_code::SOURCE_FILE,
            Self::ReportFormat { .. } => error_code::REPORT_FORMAT,
            Self::InvalidContent { .. } => error_code::INVALID_CONTENT,
            Self::MissingFile { .. } => error_code::MISSING_FILE,
            Self::Disabled { .. } => error_code::DISABLED,
            Self::AuthDenied => error_code::AUTH_DENIED,
            Self::Unauthorized { .. } => error_code::UNAUTHORIZED,
            Self::ApiMismatch { .. } => error_code::API_MISMATCH,
            Self::AlreadyRunning { .. } => error_code::ALREADY_RUNNING,
            Self::QueueFull => error_code::QUEUE_FULL,
            Self::General { .. } => error_code::GENERAL,
        }
    }
}

impl WardenError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn report_format(reason: impl Into<String>) -> Self {
        Self::ReportFormat {
            reason: reason.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    pub fn invalid_content(hash: impl Into<String>) -> Self {
        Self::InvalidContent { hash: hash.into() }
    }

    pub fn missing_file(hash: impl Into<String>) -> Self {
        Self::MissingFile { hash: hash.into() }
    }

    pub fn source_file(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceFile {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn already_running(product_id: i64, run_name: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            product_id,
            run_name: run_name.into(),
        }
    }

    pub fn disabled(product_id: i64) -> Self {
        Self::Disabled { product_id }
    }
}
