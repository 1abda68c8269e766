//! Command-line and environment configuration.
//!
//! Every flag has an environment fallback; the SFTP and REST variables keep
//! the names existing deployments already set.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use rest2sftp_core::config::{AuthMethod, RemoteConfig};
use rest2sftp_core::errors::SessionError;
use rest2sftp_core::session::{
    Connector, LocalConnector, PerRequestSessions, SessionPool, SessionProvider, SftpConnector,
};

use crate::handler::directory::Timestamps;
use crate::response::ErrorMode;
use crate::routing::PrefixMatch;

/// Session lifecycle strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SessionMode {
    /// Open a fresh SSH session for every request.
    #[default]
    PerRequest,
    /// Reuse sessions from a bounded pool.
    Pooled,
}

/// Immutable server settings, read once at startup.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rest2sftp",
    version,
    about = "HTTP gateway translating REST verbs into SFTP file operations"
)]
pub struct ServerConfig {
    #[arg(long, env = "SFTP_SERVER_ADDRESS", help = "SFTP server host")]
    pub remote_host: Option<String>,
    #[arg(
        long,
        env = "SFTP_SERVER_PORT",
        default_value_t = 22,
        help = "SFTP server port"
    )]
    pub remote_port: u16,
    #[arg(long, env = "SFTP_USER_NAME", help = "SSH username")]
    pub remote_user: Option<String>,
    #[arg(
        long,
        env = "SFTP_USER_PASSWORD",
        hide_env_values = true,
        help = "SSH password, or the key passphrase with --auth-method key"
    )]
    pub remote_password: Option<String>,
    #[arg(
        long,
        env = "SFTP_AUTH_METHOD",
        default_value = "password",
        help = "SSH authentication: password, key or agent"
    )]
    pub auth_method: AuthMethod,
    #[arg(long, env = "SFTP_KEY_PATH", help = "Private key for key authentication")]
    pub key_path: Option<String>,
    #[arg(
        long,
        env = "REST_BASE_PATH",
        default_value = "",
        help = "URL prefix stripped from request paths"
    )]
    pub base_path: String,
    #[arg(
        long,
        env = "REST_BIND",
        default_value = "0.0.0.0",
        help = "HTTP bind address"
    )]
    pub bind: String,
    #[arg(long, env = "REST_PORT", default_value_t = 8080, help = "HTTP port")]
    pub port: u16,
    #[arg(
        long,
        env = "REST2SFTP_SESSION_MODE",
        value_enum,
        default_value_t = SessionMode::PerRequest,
        help = "Session lifecycle"
    )]
    pub session_mode: SessionMode,
    #[arg(
        long,
        env = "REST2SFTP_POOL_SIZE",
        default_value_t = 8,
        help = "Maximum pooled sessions"
    )]
    pub pool_size: usize,
    #[arg(
        long,
        env = "REST2SFTP_CONNECT_TIMEOUT_SECS",
        default_value_t = 60,
        help = "SSH dial timeout in seconds (0 to disable)"
    )]
    pub connect_timeout_secs: u64,
    #[arg(
        long,
        env = "REST2SFTP_OPERATION_TIMEOUT_SECS",
        default_value_t = 0,
        help = "Timeout for each SSH call in seconds (0 to disable)"
    )]
    pub operation_timeout_secs: u64,
    #[arg(
        long,
        env = "REST2SFTP_PREFIX_MATCH",
        value_enum,
        default_value_t = PrefixMatch::Anchored,
        help = "How the base path is removed from request paths"
    )]
    pub prefix_match: PrefixMatch,
    #[arg(
        long,
        env = "REST2SFTP_ERROR_MODE",
        value_enum,
        default_value_t = ErrorMode::Typed,
        help = "Error response style"
    )]
    pub error_mode: ErrorMode,
    #[arg(
        long,
        env = "REST2SFTP_MAX_UPLOAD_BYTES",
        default_value_t = 0,
        help = "Upload body limit in bytes (0 to disable)"
    )]
    pub max_upload_bytes: u64,
    #[arg(
        long,
        env = "REST2SFTP_UTC",
        help = "Format listing timestamps in UTC instead of local time"
    )]
    pub utc: bool,
    #[arg(
        long,
        env = "REST2SFTP_LOCAL_ROOT",
        help = "Serve this local directory instead of an SFTP server"
    )]
    pub local_root: Option<PathBuf>,
    #[arg(
        long,
        env = "REST2SFTP_SKIP_STARTUP_CHECK",
        help = "Start without first connecting to the remote side"
    )]
    pub skip_startup_check: bool,
}

impl ServerConfig {
    /// `bind:port` for the HTTP listener.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            host: self.remote_host.clone().unwrap_or_default(),
            port: self.remote_port,
            username: self.remote_user.clone().unwrap_or_default(),
            auth_method: self.auth_method,
            password: self.remote_password.clone(),
            key_path: self.key_path.clone(),
            connect_timeout_secs: self.connect_timeout_secs,
            operation_timeout_secs: self.operation_timeout_secs,
        }
    }

    pub fn timestamps(&self) -> Timestamps {
        if self.utc {
            Timestamps::Utc
        } else {
            Timestamps::Local
        }
    }

    /// The session opener: a local directory when `--local-root` is set,
    /// otherwise the SFTP server.
    pub fn connector(&self) -> Result<Arc<dyn Connector>, SessionError> {
        match &self.local_root {
            Some(root) => Ok(Arc::new(LocalConnector::new(root)?)),
            None => Ok(Arc::new(SftpConnector::new(self.remote_config())?)),
        }
    }

    /// Wrap `connector` in the configured session lifecycle.
    ///
    /// The pool is also returned on its own so it can be closed on shutdown.
    pub fn session_provider(
        &self,
        connector: Arc<dyn Connector>,
    ) -> (Arc<dyn SessionProvider>, Option<Arc<SessionPool>>) {
        match self.session_mode {
            SessionMode::PerRequest => (Arc::new(PerRequestSessions::new(connector)), None),
            SessionMode::Pooled => {
                let pool = Arc::new(SessionPool::new(connector, self.pool_size));
                (pool.clone(), Some(pool))
            }
        }
    }
}
