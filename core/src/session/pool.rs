use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tracing::debug;

use super::{connect_blocking, Connector, SessionHandle, SessionProvider};
use crate::errors::SessionError;
use crate::files::RemoteFs;

/// Idle sessions waiting for the next checkout.
pub(super) struct PoolShared {
    idle: Mutex<Vec<Box<dyn RemoteFs>>>,
    closed: AtomicBool,
}

impl PoolShared {
    fn idle(&self) -> MutexGuard<'_, Vec<Box<dyn RemoteFs>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checkout(&self) -> Option<Box<dyn RemoteFs>> {
        self.idle().pop()
    }

    /// Return a session. Closed pools close it instead of keeping it.
    pub(super) fn checkin(&self, fs: Box<dyn RemoteFs>) {
        if self.closed.load(Ordering::Acquire) {
            fs.close();
            return;
        }
        self.idle().push(fs);
    }

    fn drain(&self) -> Vec<Box<dyn RemoteFs>> {
        std::mem::take(&mut *self.idle())
    }
}

/// Check an idle session on the blocking pool; a dead one is closed.
async fn revalidate(fs: Box<dyn RemoteFs>) -> Option<Box<dyn RemoteFs>> {
    tokio::task::spawn_blocking(move || {
        if fs.is_alive() {
            Some(fs)
        } else {
            fs.close();
            None
        }
    })
    .await
    .ok()
    .flatten()
}

/// A bounded pool of remote sessions.
///
/// At most `capacity` sessions exist at once and each one is checked out by
/// a single request at a time; the SFTP client is never used concurrently.
/// Sessions are opened lazily and returned to the pool when their handle
/// drops, unless the handle was marked broken. Idle sessions are checked
/// for liveness before they are handed out again.
pub struct SessionPool {
    connector: Arc<dyn Connector>,
    permits: Arc<Semaphore>,
    shared: Arc<PoolShared>,
    capacity: usize,
}

impl SessionPool {
    pub fn new(connector: Arc<dyn Connector>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            connector,
            permits: Arc::new(Semaphore::new(capacity)),
            shared: Arc::new(PoolShared {
                idle: Mutex::new(Vec::with_capacity(capacity)),
                closed: AtomicBool::new(false),
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sessions currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.shared.idle().len()
    }

    /// Stop handing out sessions and close the idle ones.
    ///
    /// Checked-out sessions are closed when their handles drop. Blocking.
    pub fn close(&self) {
        self.permits.close();
        self.shared.closed.store(true, Ordering::Release);
        let idle = self.shared.drain();
        debug!(count = idle.len(), "closing idle pooled sessions");
        for fs in idle {
            fs.close();
        }
    }
}

#[async_trait::async_trait]
impl SessionProvider for SessionPool {
    async fn acquire(&self) -> Result<SessionHandle, SessionError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SessionError::PoolClosed)?;

        while let Some(fs) = self.shared.checkout() {
            match revalidate(fs).await {
                Some(fs) => return Ok(SessionHandle::pooled(fs, self.shared.clone(), permit)),
                None => debug!("discarded stale pooled session"),
            }
        }

        let fs = connect_blocking(self.connector.clone()).await?;
        debug!(target_host = %self.connector.describe(), "opened pooled session");
        Ok(SessionHandle::pooled(fs, self.shared.clone(), permit))
    }

    fn mode(&self) -> &'static str {
        "pooled"
    }
}
