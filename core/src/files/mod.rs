//! Remote file primitives.
//!
//! [`RemoteFs`] is the client half of a session: the handful of blocking
//! calls the gateway issues against the remote store. The SFTP backend
//! lives in [`crate::backends::ssh`]; [`local::LocalFs`] serves a plain
//! directory with the same semantics.
//!
//! All methods block. Async callers must run them on the blocking pool.

pub mod local;

use std::io::{Read, Seek, Write};

use serde::{Deserialize, Serialize};

use crate::errors::FileError;

/// Metadata for a single remote entry, as reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStat {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    /// Modification time in seconds since the Unix epoch, when known.
    pub modified: Option<u64>,
}

/// A readable, seekable remote file handle.
pub trait RemoteRead: Read + Seek {}

impl<T: Read + Seek> RemoteRead for T {}

/// Blocking file primitives bound to one authenticated session.
///
/// Implementations must be `Send` so a session can be moved onto the
/// blocking pool. File handles borrow the session and never leave the
/// thread that opened them.
pub trait RemoteFs: Send {
    /// List a directory in the order the remote side returns it,
    /// without `.` and `..`.
    fn read_dir(&self, path: &str) -> Result<Vec<RemoteStat>, FileError>;

    /// Metadata for a single path, following symlinks.
    fn stat(&self, path: &str) -> Result<RemoteStat, FileError>;

    /// Open an existing file for reading.
    fn open<'a>(&'a self, path: &str) -> Result<Box<dyn RemoteRead + 'a>, FileError>;

    /// Create (or truncate) a file for writing.
    fn create<'a>(&'a self, path: &str) -> Result<Box<dyn Write + 'a>, FileError>;

    /// Remove a file.
    fn remove(&self, path: &str) -> Result<(), FileError>;

    /// Create a directory and any missing ancestors. Succeeds when the
    /// directory already exists.
    fn mkdir_all(&self, path: &str) -> Result<(), FileError>;

    /// Remove a directory. Whether it must be empty is up to the remote side.
    fn remove_dir(&self, path: &str) -> Result<(), FileError>;

    /// Cheap round trip telling whether the session still answers.
    fn is_alive(&self) -> bool {
        true
    }

    /// Tear the session down. Dropping the value closes it too; this
    /// variant lets backends say goodbye to the remote side first.
    fn close(self: Box<Self>) {}
}

/// Final path segment, ignoring a trailing separator.
///
/// `"/a/b.txt"` gives `"b.txt"`, `"/a/dir/"` gives `"dir"`, `"/"` gives `""`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
