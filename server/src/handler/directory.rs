//! Directory operations: list, recursive create, remove.

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Local};
use rest2sftp_core::files::RemoteStat;
use serde::{Deserialize, Serialize};

use super::{acquire, run_blocking};
use crate::errors::{GatewayError, Stage};
use crate::response::{respond_no_content, respond_with_json};
use crate::Gateway;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Rendered when the remote side reports no modification time.
const ZERO_TIMESTAMP: &str = "0001-01-01 00:00:00";

/// Zone used to render listing timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timestamps {
    Utc,
    #[default]
    Local,
}

impl Timestamps {
    pub fn format(self, modified: Option<u64>) -> String {
        let Some(utc) = modified
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        else {
            return ZERO_TIMESTAMP.to_string();
        };

        match self {
            Timestamps::Utc => utc.format(TIMESTAMP_FORMAT).to_string(),
            Timestamps::Local => utc
                .with_timezone(&Local)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }
}

/// One entry of a directory listing, as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    #[serde(rename = "isDirectory")]
    pub is_directory: bool,
}

impl RemoteEntry {
    pub fn from_stat(stat: RemoteStat, timestamps: Timestamps) -> Self {
        Self {
            last_modified: timestamps.format(stat.modified),
            name: stat.name,
            size: stat.size,
            is_directory: stat.is_directory,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub files: Vec<RemoteEntry>,
}

impl DirectoryListing {
    pub fn new(entries: Vec<RemoteStat>, timestamps: Timestamps) -> Self {
        Self {
            files: entries
                .into_iter()
                .map(|stat| RemoteEntry::from_stat(stat, timestamps))
                .collect(),
        }
    }
}

pub async fn list(gateway: &Gateway, path: String) -> Result<Response, GatewayError> {
    let handle = acquire(gateway).await?;
    let entries = run_blocking(handle, Stage::ReadDirectory, move |fs| {
        fs.read_dir(&path)
            .map_err(|e| GatewayError::file(&e, Stage::ReadDirectory))
    })
    .await?;

    let listing = DirectoryListing::new(entries, gateway.timestamps);
    Ok(respond_with_json(StatusCode::OK, &listing))
}

pub async fn create(gateway: &Gateway, path: String) -> Result<Response, GatewayError> {
    let handle = acquire(gateway).await?;
    run_blocking(handle, Stage::CreateDirectory, move |fs| {
        fs.mkdir_all(&path)
            .map_err(|e| GatewayError::file(&e, Stage::CreateDirectory))
    })
    .await?;
    Ok(respond_no_content(StatusCode::OK))
}

pub async fn remove(gateway: &Gateway, path: String) -> Result<Response, GatewayError> {
    let handle = acquire(gateway).await?;
    run_blocking(handle, Stage::DeleteDirectory, move |fs| {
        fs.remove_dir(&path)
            .map_err(|e| GatewayError::file(&e, Stage::DeleteDirectory))
    })
    .await?;
    Ok(respond_no_content(StatusCode::OK))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-01-01 00:00:00 UTC
    const NEW_YEAR_2023: u64 = 1_672_531_200;

    #[test]
    fn utc_timestamps() {
        assert_eq!(
            Timestamps::Utc.format(Some(NEW_YEAR_2023)),
            "2023-01-01 00:00:00"
        );
        assert_eq!(Timestamps::Utc.format(Some(0)), "1970-01-01 00:00:00");
    }

    #[test]
    fn local_timestamps_are_the_default() {
        let expected = DateTime::from_timestamp(NEW_YEAR_2023 as i64, 0)
            .unwrap()
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string();
        assert_eq!(Timestamps::default(), Timestamps::Local);
        assert_eq!(Timestamps::default().format(Some(NEW_YEAR_2023)), expected);
    }

    #[test]
    fn missing_or_out_of_range_time_is_zero() {
        assert_eq!(Timestamps::Utc.format(None), ZERO_TIMESTAMP);
        assert_eq!(Timestamps::Local.format(None), ZERO_TIMESTAMP);
        assert_eq!(Timestamps::Utc.format(Some(u64::MAX)), ZERO_TIMESTAMP);
    }

    #[test]
    fn entries_serialize_with_wire_names() {
        let listing = DirectoryListing::new(
            vec![RemoteStat {
                name: "a.txt".to_string(),
                is_directory: false,
                size: 10,
                modified: Some(NEW_YEAR_2023),
            }],
            Timestamps::Utc,
        );
        let json = serde_json::to_string(&listing).unwrap();
        assert_eq!(
            json,
            r#"{"files":[{"Name":"a.txt","Size":10,"lastModified":"2023-01-01 00:00:00","isDirectory":false}]}"#
        );
    }

    #[test]
    fn empty_listing_is_an_empty_array() {
        let listing = DirectoryListing::new(Vec::new(), Timestamps::Utc);
        assert_eq!(serde_json::to_string(&listing).unwrap(), r#"{"files":[]}"#);
    }
}
