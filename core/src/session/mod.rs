//! Remote session acquisition and release.
//!
//! A [`Connector`] knows how to open one session (a transport plus the file
//! client bound to it). A [`SessionProvider`] decides the lifecycle:
//!
//! - [`PerRequestSessions`] opens a fresh session for every acquisition and
//!   closes it when the [`SessionHandle`] drops.
//! - [`SessionPool`] hands out exclusively checked-out sessions from a
//!   bounded pool and takes them back on drop.
//!
//! Either way the handle owns the session until it is dropped, on every
//! exit path. Dropping may do blocking network I/O (an SSH disconnect), so
//! handles should be dropped on the blocking pool.

mod pool;

use std::mem::ManuallyDrop;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use crate::errors::SessionError;
use crate::files::local::LocalFs;
use crate::files::RemoteFs;

pub use self::pool::SessionPool;

/// Opens one remote session. Blocking.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, SessionError>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// Connects to an SFTP server over SSH.
#[cfg(feature = "ssh")]
pub struct SftpConnector {
    config: crate::config::RemoteConfig,
}

#[cfg(feature = "ssh")]
impl SftpConnector {
    pub fn new(config: crate::config::RemoteConfig) -> Result<Self, SessionError> {
        crate::config::validate_remote_config(&config)?;
        Ok(Self {
            config: config.expand(),
        })
    }
}

#[cfg(feature = "ssh")]
impl Connector for SftpConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, SessionError> {
        let fs = crate::backends::ssh::SftpFs::connect(&self.config)?;
        Ok(Box::new(fs))
    }

    fn describe(&self) -> String {
        format!("sftp://{}@{}", self.config.username, self.config.address())
    }
}

/// Serves a local directory; every "session" is a cheap [`LocalFs`].
pub struct LocalConnector {
    root: PathBuf,
}

impl LocalConnector {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SessionError::InvalidConfig(format!(
                "Local root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }
}

impl Connector for LocalConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFs>, SessionError> {
        Ok(Box::new(LocalFs::new(self.root.clone())))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

/// Source of sessions for request handlers.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Obtain a session. The returned handle releases it on drop.
    async fn acquire(&self) -> Result<SessionHandle, SessionError>;

    /// Short name of the lifecycle strategy, for logs.
    fn mode(&self) -> &'static str;
}

/// Run a blocking connect on the blocking pool.
async fn connect_blocking(
    connector: Arc<dyn Connector>,
) -> Result<Box<dyn RemoteFs>, SessionError> {
    tokio::task::spawn_blocking(move || connector.connect())
        .await
        .map_err(|e| SessionError::ConnectFailed(format!("Task join failed: {e}")))?
}

/// One fresh session per acquisition, torn down on release.
pub struct PerRequestSessions {
    connector: Arc<dyn Connector>,
}

impl PerRequestSessions {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }
}

#[async_trait::async_trait]
impl SessionProvider for PerRequestSessions {
    async fn acquire(&self) -> Result<SessionHandle, SessionError> {
        let fs = connect_blocking(self.connector.clone()).await?;
        debug!(target_host = %self.connector.describe(), "opened per-request session");
        Ok(SessionHandle::owned(fs))
    }

    fn mode(&self) -> &'static str {
        "per-request"
    }
}

/// Where a session goes when its handle drops.
enum Release {
    Close,
    Pool {
        pool: Arc<pool::PoolShared>,
        _permit: OwnedSemaphorePermit,
    },
}

/// Exclusive use of one remote session.
pub struct SessionHandle {
    // Only taken in `Drop`.
    fs: ManuallyDrop<Box<dyn RemoteFs>>,
    release: Release,
    broken: bool,
}

impl SessionHandle {
    fn owned(fs: Box<dyn RemoteFs>) -> Self {
        Self {
            fs: ManuallyDrop::new(fs),
            release: Release::Close,
            broken: false,
        }
    }

    fn pooled(
        fs: Box<dyn RemoteFs>,
        pool: Arc<pool::PoolShared>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            fs: ManuallyDrop::new(fs),
            release: Release::Pool {
                pool,
                _permit: permit,
            },
            broken: false,
        }
    }

    pub fn fs(&self) -> &dyn RemoteFs {
        &**self.fs
    }

    /// Do not return this session to a pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // SAFETY: `self.fs` is never accessed again once the handle drops.
        let fs = unsafe { ManuallyDrop::take(&mut self.fs) };

        // The pool permit is released after this, when `release` drops.
        match &self.release {
            Release::Pool { pool, .. } if !self.broken => pool.checkin(fs),
            _ => fs.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::FileError;
    use crate::files::{RemoteRead, RemoteStat};

    #[test]
    fn local_connector_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(LocalConnector::new(dir.path()).is_ok());
        assert!(matches!(
            LocalConnector::new(&file),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn per_request_sessions_hand_out_working_clients() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let provider =
            PerRequestSessions::new(Arc::new(LocalConnector::new(dir.path()).unwrap()));

        let handle = provider.acquire().await.unwrap();
        let entries = handle.fs().read_dir("/").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(provider.mode(), "per-request");
    }

    #[tokio::test]
    async fn broken_flag_is_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            PerRequestSessions::new(Arc::new(LocalConnector::new(dir.path()).unwrap()));
        let mut handle = provider.acquire().await.unwrap();

        assert!(!handle.is_broken());
        handle.mark_broken();
        handle.mark_broken();
        assert!(handle.is_broken());
    }

    /// Local session that records when it is closed.
    struct TrackedFs {
        inner: LocalFs,
        closed: Arc<AtomicUsize>,
    }

    impl RemoteFs for TrackedFs {
        fn read_dir(&self, path: &str) -> Result<Vec<RemoteStat>, FileError> {
            self.inner.read_dir(path)
        }

        fn stat(&self, path: &str) -> Result<RemoteStat, FileError> {
            self.inner.stat(path)
        }

        fn open<'a>(&'a self, path: &str) -> Result<Box<dyn RemoteRead + 'a>, FileError> {
            self.inner.open(path)
        }

        fn create<'a>(&'a self, path: &str) -> Result<Box<dyn Write + 'a>, FileError> {
            self.inner.create(path)
        }

        fn remove(&self, path: &str) -> Result<(), FileError> {
            self.inner.remove(path)
        }

        fn mkdir_all(&self, path: &str) -> Result<(), FileError> {
            self.inner.mkdir_all(path)
        }

        fn remove_dir(&self, path: &str) -> Result<(), FileError> {
            self.inner.remove_dir(path)
        }

        fn close(self: Box<Self>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TrackedConnector {
        root: PathBuf,
        closed: Arc<AtomicUsize>,
    }

    impl Connector for TrackedConnector {
        fn connect(&self) -> Result<Box<dyn RemoteFs>, SessionError> {
            Ok(Box::new(TrackedFs {
                inner: LocalFs::new(self.root.clone()),
                closed: self.closed.clone(),
            }))
        }

        fn describe(&self) -> String {
            "tracked".to_string()
        }
    }

    fn tracked(dir: &tempfile::TempDir) -> (Arc<TrackedConnector>, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let connector = Arc::new(TrackedConnector {
            root: dir.path().to_path_buf(),
            closed: closed.clone(),
        });
        (connector, closed)
    }

    #[tokio::test]
    async fn dropping_an_owned_handle_closes_the_session_once() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, closed) = tracked(&dir);
        let provider = PerRequestSessions::new(connector);

        let handle = provider.acquire().await.unwrap();
        assert!(handle.fs().read_dir("/").unwrap().is_empty());
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pooled_handles_park_healthy_sessions_and_close_broken_ones() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, closed) = tracked(&dir);
        let pool = SessionPool::new(connector, 1);

        drop(pool.acquire().await.unwrap());
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert_eq!(pool.idle_count(), 1);

        let mut handle = pool.acquire().await.unwrap();
        handle.mark_broken();
        drop(handle);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[cfg(feature = "ssh")]
    #[test]
    fn sftp_connector_validates_config() {
        let config = crate::config::RemoteConfig::default();
        assert!(matches!(
            SftpConnector::new(config),
            Err(SessionError::InvalidConfig(_))
        ));
    }
}
