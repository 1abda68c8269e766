//! The gateway's single HTTP entry point.
//!
//! Every request goes through [`serve`]: method check, path resolution,
//! operation dispatch, then one of the directory or file operations.
//! Remote work runs on the blocking pool via [`run_blocking`], which owns
//! the session handle so that releasing it (an SSH disconnect, or a pool
//! check-in) also happens off the async workers.

pub mod directory;
pub mod file;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use rest2sftp_core::files::RemoteFs;
use rest2sftp_core::session::SessionHandle;
use tracing::{debug, warn};

use crate::errors::{ErrorKind, GatewayError, Stage};
use crate::response::{respond_error, respond_method_not_allowed};
use crate::routing::{Operation, PathKind, Verb};
use crate::Gateway;

/// Fallback handler serving every path.
pub async fn serve(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    let method = request.method().clone();
    let Some(verb) = Verb::from_method(&method) else {
        debug!(%method, "rejecting unsupported method");
        return respond_method_not_allowed(&method, gateway.error_mode);
    };

    let path = match gateway.resolver.resolve(request.uri().path()) {
        Ok(path) => path,
        Err(e) => return fail(&gateway, &e),
    };

    let operation = Operation::select(verb, PathKind::of(&path));
    debug!(op = operation.name(), path = %path, "dispatching");

    let result = match operation {
        Operation::ListDirectory => directory::list(&gateway, path).await,
        Operation::CreateDirectory => directory::create(&gateway, path).await,
        Operation::RemoveDirectory => directory::remove(&gateway, path).await,
        Operation::DownloadFile => file::download(&gateway, path).await,
        Operation::UploadFile => file::upload(&gateway, path, request).await,
        Operation::RemoveFile => file::remove(&gateway, path).await,
    };

    result.unwrap_or_else(|e| fail(&gateway, &e))
}

fn fail(gateway: &Gateway, err: &GatewayError) -> Response {
    warn!(kind = ?err.kind, "{}", err.message);
    respond_error(err, gateway.error_mode)
}

/// Check a session out of the gateway's provider.
pub(crate) async fn acquire(gateway: &Gateway) -> Result<SessionHandle, GatewayError> {
    gateway
        .sessions
        .acquire()
        .await
        .map_err(|e| GatewayError::session(&e))
}

/// Run `op` on the blocking pool against the session in `handle`.
///
/// The handle is dropped on the blocking thread once `op` returns. A
/// protocol failure marks the session broken so a pool discards it.
pub(crate) async fn run_blocking<T, F>(
    handle: SessionHandle,
    stage: Stage,
    op: F,
) -> Result<T, GatewayError>
where
    T: Send + 'static,
    F: FnOnce(&dyn RemoteFs) -> Result<T, GatewayError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut handle = handle;
        let result = op(handle.fs());
        if matches!(&result, Err(e) if e.kind == ErrorKind::Protocol) {
            handle.mark_broken();
        }
        result
    })
    .await
    .map_err(|e| GatewayError::wrap(ErrorKind::Io, format!("Task join failed: {e}"), stage))?
}
