//! File operations: streamed download, multipart upload, delete.
//!
//! Remote file handles never leave the blocking thread that opened them.
//! Bytes cross between that thread and the async handler through bounded
//! channels, so a slow peer on either side applies backpressure to the
//! other.
//!
//! Downloads commit to a status and `Content-Length` before the body is
//! sent. A remote failure after that point can only cut the body short:
//! the client sees a truncated response or an aborted connection, never an
//! error envelope.

use std::io::{self, Read, Seek, Write};

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rest2sftp_core::errors::FileError;
use rest2sftp_core::files::{base_name, RemoteFs, RemoteRead};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{acquire, run_blocking};
use crate::errors::{ErrorKind, GatewayError, Stage};
use crate::response::respond_no_content;
use crate::sniff::{detect_content_type, SNIFF_LEN};
use crate::Gateway;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

const CHUNK_SIZE: usize = 32 * 1024;
const CHANNEL_DEPTH: usize = 8;

/// RFC 5987 `attr-char` complement.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// What the client learns before the body starts.
#[derive(Debug, Clone)]
struct DownloadHead {
    name: String,
    size: u64,
    content_type: &'static str,
}

/// `Content-Disposition` value naming only the final path segment.
pub fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let value = if name.is_ascii() && !name.contains(['"', '\\']) {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            utf8_percent_encode(name, ATTR_CHAR)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Fill `buf` from `reader`, stopping early only at end of file.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Stat, open and sniff `path`, leaving the handle rewound to the start.
fn open_for_download<'a>(
    fs: &'a dyn RemoteFs,
    path: &str,
) -> Result<(DownloadHead, Box<dyn RemoteRead + 'a>), FileError> {
    let stat = fs.stat(path)?;
    if stat.is_directory {
        return Err(FileError::IsDirectory(path.to_string()));
    }

    let mut file = fs.open(path)?;
    let mut sample = vec![0u8; stat.size.min(SNIFF_LEN as u64) as usize];
    let filled = read_full(&mut file, &mut sample).map_err(|e| FileError::from_io(e, path))?;
    let content_type = detect_content_type(&sample[..filled]);
    file.rewind().map_err(|e| FileError::from_io(e, path))?;

    let head = DownloadHead {
        name: base_name(path).to_string(),
        size: stat.size,
        content_type,
    };
    Ok((head, file))
}

/// Blocking half of a download: report the head, then pump chunks.
fn send_file(
    fs: &dyn RemoteFs,
    path: &str,
    head_tx: oneshot::Sender<Result<DownloadHead, GatewayError>>,
    chunk_tx: mpsc::Sender<io::Result<Bytes>>,
) -> Result<u64, GatewayError> {
    let (head, mut file) = match open_for_download(fs, path) {
        Ok(opened) => opened,
        Err(e) => {
            let err = GatewayError::file(&e, Stage::GetFile);
            let _ = head_tx.send(Err(err.clone()));
            return Err(err);
        }
    };
    if head_tx.send(Ok(head)).is_err() {
        return Ok(0);
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => return Ok(sent),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let err = GatewayError::file(&FileError::from_io(e, path), Stage::GetFile);
                warn!(path = %path, sent, "download truncated: {}", err.message);
                let _ = chunk_tx.blocking_send(Err(io::Error::other(err.message.clone())));
                return Err(err);
            }
        };

        if chunk_tx
            .blocking_send(Ok(Bytes::copy_from_slice(&buf[..n])))
            .is_err()
        {
            debug!(path = %path, sent, "client stopped reading download");
            return Ok(sent);
        }
        sent += n as u64;
    }
}

pub async fn download(gateway: &Gateway, path: String) -> Result<Response, GatewayError> {
    let handle = acquire(gateway).await?;
    let (head_tx, head_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_DEPTH);

    let worker_path = path.clone();
    tokio::spawn(async move {
        let outcome = run_blocking(handle, Stage::GetFile, move |fs| {
            send_file(fs, &worker_path, head_tx, chunk_tx)
        })
        .await;
        match outcome {
            Ok(sent) => debug!(path = %path, sent, "download finished"),
            Err(e) => debug!(path = %path, "download worker failed: {}", e.message),
        }
    });

    let head = head_rx.await.map_err(|_| {
        GatewayError::wrap(ErrorKind::Io, "Download worker exited", Stage::GetFile)
    })??;

    let body = Body::from_stream(stream::unfold(chunk_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_DISPOSITION, content_disposition(&head.name)),
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(head.content_type),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(head.size)),
        ],
        body,
    )
        .into_response())
}

/// Blocking half of an upload: create the file and write every chunk.
fn receive_file(
    fs: &dyn RemoteFs,
    path: &str,
    mut chunk_rx: mpsc::Receiver<Result<Bytes, String>>,
) -> Result<u64, GatewayError> {
    let copy_err = |e: io::Error| GatewayError::file(&FileError::from_io(e, path), Stage::CopyFile);

    let mut file = fs
        .create(path)
        .map_err(|e| GatewayError::file(&e, Stage::CreateFile))?;

    let mut written = 0u64;
    while let Some(chunk) = chunk_rx.blocking_recv() {
        let chunk = chunk.map_err(|e| GatewayError::malformed(e, Stage::CopyFile))?;
        file.write_all(&chunk).map_err(copy_err)?;
        written += chunk.len() as u64;
    }
    file.flush().map_err(copy_err)?;
    Ok(written)
}

pub async fn upload(
    gateway: &Gateway,
    path: String,
    request: Request,
) -> Result<Response, GatewayError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| GatewayError::malformed(e.body_text(), Stage::PostFile))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::malformed(e.body_text(), Stage::PostFile))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let handle = acquire(gateway).await?;
        let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_DEPTH);
        let worker_path = path.clone();
        let writer = run_blocking(handle, Stage::CopyFile, move |fs| {
            receive_file(fs, &worker_path, chunk_rx)
        });

        let pump = async move {
            loop {
                let next = match field.chunk().await {
                    Ok(Some(chunk)) => Ok(chunk),
                    Ok(None) => break,
                    Err(e) => Err(e.body_text()),
                };
                let failed = next.is_err();
                // A closed channel means the writer gave up; its result says why.
                if chunk_tx.send(next).await.is_err() || failed {
                    break;
                }
            }
        };

        let (written, ()) = tokio::join!(writer, pump);
        let written = written?;
        debug!(path = %path, written, "upload finished");
        return Ok(respond_no_content(StatusCode::OK));
    }

    Err(GatewayError::malformed(
        format!("Missing form field \"{UPLOAD_FIELD}\""),
        Stage::PostFile,
    ))
}

pub async fn remove(gateway: &Gateway, path: String) -> Result<Response, GatewayError> {
    let handle = acquire(gateway).await?;
    run_blocking(handle, Stage::DeleteFile, move |fs| {
        fs.remove(&path)
            .map_err(|e| GatewayError::file(&e, Stage::DeleteFile))
    })
    .await?;
    Ok(respond_no_content(StatusCode::OK))
}
