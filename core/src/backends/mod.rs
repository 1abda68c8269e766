//! Concrete [`RemoteFs`](crate::files::RemoteFs) implementations that talk
//! to a remote host.
//!
//! These backends depend on native libraries (`libssh2`, OpenSSL) and are
//! gated behind cargo features so consumers that only need the local
//! backend can avoid the dependency.

#[cfg(feature = "ssh")]
pub mod ssh;
