//! SFTP-backed [`RemoteFs`].
//!
//! Wraps one authenticated `ssh2::Session` in blocking mode together with
//! the SFTP channel opened on it. Every method is a blocking network round
//! trip; callers offload them to `tokio::task::spawn_blocking`.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::config::RemoteConfig;
use crate::errors::{FileError, SessionError};
use crate::files::{base_name, RemoteFs, RemoteRead, RemoteStat};

use super::auth::connect_and_authenticate;

// SFTP status codes (draft-ietf-secsh-filexfer-02 and later).
const SSH_FX_NO_SUCH_FILE: i32 = 2;
const SSH_FX_PERMISSION_DENIED: i32 = 3;
const SSH_FX_BAD_MESSAGE: i32 = 5;
const SSH_FX_NO_CONNECTION: i32 = 6;
const SSH_FX_CONNECTION_LOST: i32 = 7;
const SSH_FX_OP_UNSUPPORTED: i32 = 8;
const SSH_FX_FILE_ALREADY_EXISTS: i32 = 11;

const DIR_MODE: i32 = 0o755;

/// An SFTP channel and the SSH session carrying it.
///
/// Field order matters: the SFTP channel is dropped before the session.
pub struct SftpFs {
    sftp: ssh2::Sftp,
    session: ssh2::Session,
}

impl SftpFs {
    /// Open a new session and start the SFTP subsystem on it.
    pub fn connect(config: &RemoteConfig) -> Result<Self, SessionError> {
        let session = connect_and_authenticate(config)?;
        let sftp = session
            .sftp()
            .map_err(|e| SessionError::SubsystemFailed(e.to_string()))?;

        Ok(Self { sftp, session })
    }
}

fn to_stat(name: String, stat: &ssh2::FileStat) -> RemoteStat {
    RemoteStat {
        name,
        is_directory: stat.is_dir(),
        size: stat.size.unwrap_or(0),
        modified: stat.mtime,
    }
}

impl RemoteFs for SftpFs {
    fn read_dir(&self, path: &str) -> Result<Vec<RemoteStat>, FileError> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;

        let mut result = Vec::with_capacity(entries.len());
        for (pathbuf, stat) in entries {
            let name = pathbuf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if name.is_empty() || name == "." || name == ".." {
                continue;
            }

            result.push(to_stat(name, &stat));
        }

        Ok(result)
    }

    fn stat(&self, path: &str) -> Result<RemoteStat, FileError> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        Ok(to_stat(base_name(path).to_string(), &stat))
    }

    fn open<'a>(&'a self, path: &str) -> Result<Box<dyn RemoteRead + 'a>, FileError> {
        let file = self
            .sftp
            .open(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        Ok(Box::new(file))
    }

    fn create<'a>(&'a self, path: &str) -> Result<Box<dyn Write + 'a>, FileError> {
        let file = self
            .sftp
            .create(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        Ok(Box::new(file))
    }

    fn remove(&self, path: &str) -> Result<(), FileError> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))
    }

    fn mkdir_all(&self, path: &str) -> Result<(), FileError> {
        for dir in dir_chain(path) {
            match self.sftp.stat(Path::new(&dir)) {
                Ok(stat) if stat.is_dir() => continue,
                Ok(_) => return Err(FileError::AlreadyExists(dir)),
                Err(e) if sftp_code(&e) == Some(SSH_FX_NO_SUCH_FILE) => {}
                Err(e) => return Err(map_ssh_error(e, &dir)),
            }

            if let Err(e) = self.sftp.mkdir(Path::new(&dir), DIR_MODE) {
                // Lost a race with another creator: fine as long as it is a directory now.
                match self.sftp.stat(Path::new(&dir)) {
                    Ok(stat) if stat.is_dir() => continue,
                    _ => return Err(map_ssh_error(e, &dir)),
                }
            }
            debug!(dir = %dir, "created remote directory");
        }
        Ok(())
    }

    fn remove_dir(&self, path: &str) -> Result<(), FileError> {
        self.sftp
            .rmdir(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))
    }

    fn is_alive(&self) -> bool {
        match self.sftp.stat(Path::new(".")) {
            Ok(_) => true,
            Err(e) => {
                debug!("SFTP liveness check failed: {e}");
                false
            }
        }
    }

    fn close(self: Box<Self>) {
        let SftpFs { sftp, session } = *self;
        drop(sftp);
        if let Err(e) = session.disconnect(None, "rest2sftp session closed", None) {
            debug!("SSH disconnect failed: {e}");
        }
    }
}

/// Every directory from the top of `path` down to `path` itself.
///
/// `"/a/b/c/"` gives `["/a", "/a/b", "/a/b/c"]`; relative paths stay relative.
fn dir_chain(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut chain = Vec::new();

    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        chain.push(current.clone());
    }

    chain
}

fn sftp_code(e: &ssh2::Error) -> Option<i32> {
    match e.code() {
        ssh2::ErrorCode::SFTP(code) => Some(code),
        ssh2::ErrorCode::Session(_) => None,
    }
}

/// Map ssh2 errors to FileError.
fn map_ssh_error(e: ssh2::Error, path: &str) -> FileError {
    let msg = e.message();
    match e.code() {
        ssh2::ErrorCode::SFTP(SSH_FX_NO_SUCH_FILE) => FileError::NotFound(path.to_string()),
        ssh2::ErrorCode::SFTP(SSH_FX_PERMISSION_DENIED) => {
            FileError::PermissionDenied(path.to_string())
        }
        ssh2::ErrorCode::SFTP(SSH_FX_FILE_ALREADY_EXISTS) => {
            FileError::AlreadyExists(path.to_string())
        }
        ssh2::ErrorCode::SFTP(
            SSH_FX_BAD_MESSAGE
            | SSH_FX_NO_CONNECTION
            | SSH_FX_CONNECTION_LOST
            | SSH_FX_OP_UNSUPPORTED,
        ) => FileError::Protocol(format!("{path}: {msg}")),
        ssh2::ErrorCode::Session(_) => FileError::Protocol(format!("{path}: {msg}")),
        ssh2::ErrorCode::SFTP(_) => FileError::OperationFailed(format!("{path}: {msg}")),
    }
}
