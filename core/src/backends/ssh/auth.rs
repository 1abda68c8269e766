//! SSH connection and authentication.
//!
//! Provides [`connect_and_authenticate()`] for establishing an authenticated
//! `ssh2::Session` from a [`RemoteConfig`].

use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use tracing::debug;

use crate::config::{AuthMethod, RemoteConfig};
use crate::errors::SessionError;

/// Dial the remote host, honouring the configured connect timeout.
fn dial(config: &RemoteConfig) -> Result<TcpStream, SessionError> {
    let addr = config.address();
    let Some(timeout) = config.connect_timeout() else {
        return TcpStream::connect(&addr)
            .map_err(|e| SessionError::ConnectFailed(format!("{addr}: {e}")));
    };

    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| SessionError::ConnectFailed(format!("{addr}: {e}")))?;

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(SessionError::ConnectFailed(match last_err {
        Some(e) => format!("{addr}: {e}"),
        None => format!("{addr}: no addresses resolved"),
    }))
}

/// Connect to an SSH server, perform handshake, and authenticate.
///
/// Returns an authenticated `Session` in blocking mode. When an operation
/// timeout is configured it applies to every subsequent blocking call.
pub fn connect_and_authenticate(config: &RemoteConfig) -> Result<ssh2::Session, SessionError> {
    let tcp = dial(config)?;

    let mut session =
        ssh2::Session::new().map_err(|e| SessionError::HandshakeFailed(e.to_string()))?;

    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?;

    match config.auth_method {
        AuthMethod::Agent => {
            session
                .userauth_agent(&config.username)
                .map_err(|e| SessionError::AuthFailed(format!("agent: {e}")))?;
        }
        AuthMethod::Key => {
            let key_path = config
                .key_path
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("~/.ssh/id_rsa");
            let expanded = shellexpand::tilde(key_path);
            let passphrase = config.password.as_deref();
            session
                .userauth_pubkey_file(
                    &config.username,
                    None,
                    Path::new(expanded.as_ref()),
                    passphrase,
                )
                .map_err(|e| SessionError::AuthFailed(format!("key: {e}")))?;
        }
        AuthMethod::Password => {
            let password = config.password.as_deref().unwrap_or("");
            session
                .userauth_password(&config.username, password)
                .map_err(|e| SessionError::AuthFailed(format!("password: {e}")))?;
        }
    }

    if !session.authenticated() {
        return Err(SessionError::AuthFailed(format!(
            "server did not accept credentials for {}",
            config.username
        )));
    }

    session.set_blocking(true);
    if let Some(timeout) = config.operation_timeout() {
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    }

    debug!(address = %config.address(), user = %config.username, "SSH session authenticated");
    Ok(session)
}
