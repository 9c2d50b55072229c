use crate::html;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("background task failed: {0}")]
    Blocking(String),
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PortalError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        PortalError::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Last line of the message, which is what users see when a database
    /// write fails.
    pub fn last_line(&self) -> String {
        let text = self.to_string();
        text.lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

impl From<actix_web::error::BlockingError> for PortalError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        PortalError::Blocking(e.to_string())
    }
}

impl ResponseError for PortalError {
    fn status_code(&self) -> StatusCode {
        match self {
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(html::error_page(status, &self.to_string()))
    }
}
