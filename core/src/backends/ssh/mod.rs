//! SSH transport and the SFTP file client running on it.
//!
//! [`auth`] turns a [`RemoteConfig`](crate::config::RemoteConfig) into an
//! authenticated blocking `ssh2::Session`; [`SftpFs`] opens the SFTP
//! subsystem on it and implements [`RemoteFs`](crate::files::RemoteFs).

pub mod auth;
mod sftp;

pub use self::sftp::SftpFs;
