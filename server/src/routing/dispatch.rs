//! Maps an HTTP method and path kind onto a remote operation.

use axum::http::Method;

use super::path::is_directory;

/// HTTP methods the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Verb::Get),
            Method::POST => Some(Verb::Post),
            Method::DELETE => Some(Verb::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    pub fn of(path: &str) -> Self {
        if is_directory(path) {
            PathKind::Directory
        } else {
            PathKind::File
        }
    }
}

/// The six remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListDirectory,
    CreateDirectory,
    RemoveDirectory,
    DownloadFile,
    UploadFile,
    RemoveFile,
}

impl Operation {
    pub fn select(verb: Verb, kind: PathKind) -> Self {
        match (verb, kind) {
            (Verb::Get, PathKind::Directory) => Operation::ListDirectory,
            (Verb::Get, PathKind::File) => Operation::DownloadFile,
            (Verb::Post, PathKind::Directory) => Operation::CreateDirectory,
            (Verb::Post, PathKind::File) => Operation::UploadFile,
            (Verb::Delete, PathKind::Directory) => Operation::RemoveDirectory,
            (Verb::Delete, PathKind::File) => Operation::RemoveFile,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::ListDirectory => "list_directory",
            Operation::CreateDirectory => "create_directory",
            Operation::RemoveDirectory => "remove_directory",
            Operation::DownloadFile => "download_file",
            Operation::UploadFile => "upload_file",
            Operation::RemoveFile => "remove_file",
        }
    }
}
