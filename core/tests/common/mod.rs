//! Shared helpers for rest2sftp-core integration tests.
//!
//! The SFTP tests run against the container from
//! `tests/docker/docker-compose.yml` and skip when it is not running.

// Each integration test is its own crate; not all of them use every helper.
#![allow(dead_code)]

use std::net::TcpStream;
use std::time::Duration;

use rest2sftp_core::config::{AuthMethod, RemoteConfig};

/// Password-auth SFTP container.
pub const PORT_SFTP: u16 = 2222;

/// Writable directory inside the container, relative to the login directory.
pub const UPLOAD_DIR: &str = "upload";

/// True when a TCP connection to `host:port` succeeds within 2 seconds.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    if let Ok(addr) = addr.parse() {
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok()
    } else {
        false
    }
}

/// Return early from the current test when the container is not reachable.
macro_rules! require_docker {
    ($port:expr) => {
        if !common::is_port_reachable("127.0.0.1", $port) {
            eprintln!(
                "SKIPPED: SFTP container not reachable on port {} \
                 (start with: cd tests/docker && docker compose up -d)",
                $port
            );
            return;
        }
    };
}
pub(crate) use require_docker;

/// Remote config for the password-auth container.
pub fn sftp_password_config(port: u16) -> RemoteConfig {
    RemoteConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: "testuser".to_string(),
        auth_method: AuthMethod::Password,
        password: Some("testpass".to_string()),
        connect_timeout_secs: 10,
        ..Default::default()
    }
}

/// A path under [`UPLOAD_DIR`] unique to this test run.
pub fn scratch_path(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{UPLOAD_DIR}/{name}-{}-{nanos}", std::process::id())
}
