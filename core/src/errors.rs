//! Error types for the rest2sftp core crate.
//!
//! [`SessionError`] covers establishing (or checking out) a remote session;
//! [`FileError`] covers the individual file primitives run on a session.
//! The HTTP layer maps both onto its own response taxonomy.

use thiserror::Error;

/// Errors raised while opening, authenticating or pooling a remote session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The remote connection configuration is invalid.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The TCP connection to the remote host could not be established.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The SSH handshake failed.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The remote host rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The SFTP subsystem could not be started on the channel.
    #[error("SFTP subsystem failed: {0}")]
    SubsystemFailed(String),

    /// The session pool was shut down while a request waited on it.
    #[error("Session pool closed")]
    PoolClosed,

    /// A low-level I/O error during session setup.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by remote file primitives.
#[derive(Error, Debug)]
pub enum FileError {
    /// The requested file or directory was not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Permission was denied for the requested operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The target already exists (or a non-directory blocks a mkdir).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A file operation was attempted on a directory.
    #[error("Is a directory: {0}")]
    IsDirectory(String),

    /// The transport or the SFTP protocol itself broke down. The session
    /// that produced this error should not be reused.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote side reported a generic failure.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A low-level I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileError {
    /// Classify an I/O error raised while working on `path`.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => FileError::NotFound(path.to_string()),
            ErrorKind::PermissionDenied => FileError::PermissionDenied(path.to_string()),
            ErrorKind::AlreadyExists => FileError::AlreadyExists(path.to_string()),
            ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof => FileError::Protocol(format!("{path}: {err}")),
            _ => FileError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn session_error_display() {
        let err = SessionError::AuthFailed("bad password".into());
        assert_eq!(err.to_string(), "Authentication failed: bad password");

        let err = SessionError::PoolClosed;
        assert_eq!(err.to_string(), "Session pool closed");
    }

    #[test]
    fn file_error_display() {
        let err = FileError::NotFound("/tmp/missing".into());
        assert_eq!(err.to_string(), "File not found: /tmp/missing");

        let err = FileError::PermissionDenied("/root".into());
        assert_eq!(err.to_string(), "Permission denied: /root");

        let err = FileError::IsDirectory("/srv".into());
        assert_eq!(err.to_string(), "Is a directory: /srv");
    }

    #[test]
    fn from_io_classifies_by_kind() {
        let err = FileError::from_io(io::Error::new(io::ErrorKind::NotFound, "gone"), "/a");
        assert!(matches!(err, FileError::NotFound(ref p) if p == "/a"));

        let err = FileError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
            "/b",
        );
        assert!(matches!(err, FileError::PermissionDenied(_)));

        let err = FileError::from_io(io::Error::new(io::ErrorKind::AlreadyExists, "dup"), "/c");
        assert!(matches!(err, FileError::AlreadyExists(_)));

        let err = FileError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "eof"), "/d");
        assert!(matches!(err, FileError::Protocol(_)));

        let err = FileError::from_io(io::Error::other("weird"), "/e");
        assert!(matches!(err, FileError::Io(_)));
    }

    #[test]
    fn session_error_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: SessionError = io_err.into();
        assert_eq!(err.to_string(), "I/O error: refused");
    }
}
