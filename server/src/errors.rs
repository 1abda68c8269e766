//! Gateway error taxonomy.
//!
//! Every failure a handler can produce becomes a [`GatewayError`]: a tagged
//! [`ErrorKind`] plus the underlying message joined with the [`Stage`] that
//! failed (`"File not found: /x, Delete file error"`). The kind is fixed
//! where the error is built and is never recovered from the text.

use axum::http::StatusCode;
use rest2sftp_core::errors::{FileError, SessionError};
use serde::{Deserialize, Serialize};

/// Failure classes reported to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The remote session could not be opened or checked out.
    Session,
    PathNotFound,
    PermissionDenied,
    AlreadyExists,
    /// Generic remote or local I/O failure.
    Io,
    /// The remote transport or file protocol broke down mid-operation.
    Protocol,
    /// The HTTP request itself is unusable (bad path, bad multipart body).
    MalformedRequest,
}

impl ErrorKind {
    /// HTTP status in typed error mode.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Session => StatusCode::BAD_GATEWAY,
            ErrorKind::PathNotFound => StatusCode::NOT_FOUND,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::Io | ErrorKind::Protocol => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::MalformedRequest => StatusCode::BAD_REQUEST,
        }
    }

    /// Numeric `statusCode` carried in the JSON envelope in typed error mode.
    pub fn code(self) -> u64 {
        match self {
            ErrorKind::Session => 2,
            ErrorKind::PathNotFound => 3,
            ErrorKind::PermissionDenied => 4,
            ErrorKind::AlreadyExists => 5,
            ErrorKind::Io => 6,
            ErrorKind::Protocol => 7,
            ErrorKind::MalformedRequest => 8,
        }
    }
}

impl From<&FileError> for ErrorKind {
    fn from(err: &FileError) -> Self {
        match err {
            FileError::NotFound(_) => ErrorKind::PathNotFound,
            FileError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            FileError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FileError::IsDirectory(_) => ErrorKind::MalformedRequest,
            FileError::Protocol(_) => ErrorKind::Protocol,
            FileError::OperationFailed(_) | FileError::Io(_) => ErrorKind::Io,
        }
    }
}

/// The step of an operation that failed. Its description is appended to
/// the underlying error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    ResolvePath,
    ReadDirectory,
    CreateDirectory,
    DeleteDirectory,
    GetFile,
    PostFile,
    CreateFile,
    CopyFile,
    DeleteFile,
}

impl Stage {
    pub fn description(self) -> &'static str {
        match self {
            Stage::Connect => "connect sftp server failed",
            Stage::ResolvePath => "Resolve path error",
            Stage::ReadDirectory => "read directory error",
            Stage::CreateDirectory => "Create directory error",
            Stage::DeleteDirectory => "Delete directory error",
            Stage::GetFile => "Get file error",
            Stage::PostFile => "Post file error",
            Stage::CreateFile => "create file error",
            Stage::CopyFile => "Copy file error",
            Stage::DeleteFile => "Delete file error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A classified, client-presentable failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GatewayError {
    /// Wrap an underlying failure with the stage it happened in.
    pub fn wrap(kind: ErrorKind, cause: impl std::fmt::Display, stage: Stage) -> Self {
        Self {
            kind,
            message: format!("{cause}, {stage}"),
        }
    }

    pub fn file(err: &FileError, stage: Stage) -> Self {
        Self::wrap(ErrorKind::from(err), err, stage)
    }

    pub fn session(err: &SessionError) -> Self {
        Self::wrap(ErrorKind::Session, err, Stage::Connect)
    }

    pub fn malformed(cause: impl std::fmt::Display, stage: Stage) -> Self {
        Self::wrap(ErrorKind::MalformedRequest, cause, stage)
    }
}
