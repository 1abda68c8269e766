use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::{RemoteFs, RemoteRead, RemoteStat};
use crate::errors::FileError;

/// [`RemoteFs`] over a local directory.
///
/// Gateway paths are interpreted relative to `root`; a leading `/` refers
/// to the root itself. Paths that climb out of the root are refused.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FileError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FileError::PermissionDenied(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

fn to_stat(name: String, metadata: &fs::Metadata) -> RemoteStat {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    RemoteStat {
        name,
        is_directory: metadata.is_dir(),
        size: metadata.len(),
        modified,
    }
}

impl RemoteFs for LocalFs {
    fn read_dir(&self, path: &str) -> Result<Vec<RemoteStat>, FileError> {
        let dir = self.resolve(path)?;
        let entries = fs::read_dir(&dir).map_err(|e| FileError::from_io(e, path))?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FileError::from_io(e, path))?;
            let name = entry.file_name().to_string_lossy().to_string();

            if name == "." || name == ".." {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| FileError::from_io(e, path))?;
            result.push(to_stat(name, &metadata));
        }

        Ok(result)
    }

    fn stat(&self, path: &str) -> Result<RemoteStat, FileError> {
        let target = self.resolve(path)?;
        let metadata = fs::metadata(&target).map_err(|e| FileError::from_io(e, path))?;
        Ok(to_stat(super::base_name(path).to_string(), &metadata))
    }

    fn open<'a>(&'a self, path: &str) -> Result<Box<dyn RemoteRead + 'a>, FileError> {
        let target = self.resolve(path)?;
        let file = fs::File::open(&target).map_err(|e| FileError::from_io(e, path))?;
        Ok(Box::new(file))
    }

    fn create<'a>(&'a self, path: &str) -> Result<Box<dyn Write + 'a>, FileError> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            return Err(FileError::IsDirectory(path.to_string()));
        }
        let file = fs::File::create(&target).map_err(|e| FileError::from_io(e, path))?;
        Ok(Box::new(file))
    }

    fn remove(&self, path: &str) -> Result<(), FileError> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            return Err(FileError::IsDirectory(path.to_string()));
        }
        fs::remove_file(&target).map_err(|e| FileError::from_io(e, path))
    }

    fn mkdir_all(&self, path: &str) -> Result<(), FileError> {
        let target = self.resolve(path)?;
        if target.exists() && !target.is_dir() {
            return Err(FileError::AlreadyExists(path.to_string()));
        }
        fs::create_dir_all(&target).map_err(|e| FileError::from_io(e, path))
    }

    fn remove_dir(&self, path: &str) -> Result<(), FileError> {
        let target = self.resolve(path)?;
        fs::remove_dir(&target).map_err(|e| FileError::from_io(e, path))
    }

    fn is_alive(&self) -> bool {
        self.root.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn fixture() -> (tempfile::TempDir, LocalFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn read_dir_empty() {
        let (_dir, fs) = fixture();
        let entries = fs.read_dir("/").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn read_dir_returns_files_with_metadata() {
        let (dir, fs) = fixture();
        std::fs::write(dir.path().join("hello.txt"), "world").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let entries = fs.read_dir("/").unwrap();
        assert_eq!(entries.len(), 2);

        let file_entry = entries.iter().find(|e| e.name == "hello.txt").unwrap();
        assert!(!file_entry.is_directory);
        assert_eq!(file_entry.size, 5);
        assert!(file_entry.modified.is_some());

        let dir_entry = entries.iter().find(|e| e.name == "subdir").unwrap();
        assert!(dir_entry.is_directory);
    }

    #[test]
    fn read_dir_missing_directory_is_not_found() {
        let (_dir, fs) = fixture();
        let err = fs.read_dir("/nope/").unwrap_err();
        assert!(matches!(err, FileError::NotFound(ref p) if p == "/nope/"));
    }

    #[test]
    fn parent_components_are_refused() {
        let (_dir, fs) = fixture();
        let err = fs.stat("/../etc/passwd").unwrap_err();
        assert!(matches!(err, FileError::PermissionDenied(_)));
    }

    #[test]
    fn create_then_open_round_trips() {
        let (_dir, fs) = fixture();
        {
            let mut out = fs.create("/data.bin").unwrap();
            out.write_all(b"0123456789").unwrap();
        }

        let mut input = fs.open("/data.bin").unwrap();
        let mut head = [0u8; 4];
        input.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"0123");

        input.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        input.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"0123456789");

        let stat = fs.stat("/data.bin").unwrap();
        assert_eq!(stat.name, "data.bin");
        assert_eq!(stat.size, 10);
    }

    #[test]
    fn create_truncates_existing_file() {
        let (dir, fs) = fixture();
        std::fs::write(dir.path().join("f.txt"), "long old content").unwrap();
        {
            let mut out = fs.create("/f.txt").unwrap();
            out.write_all(b"new").unwrap();
        }
        assert_eq!(std::fs::read(dir.path().join("f.txt")).unwrap(), b"new");
    }

    #[test]
    fn mkdir_all_is_idempotent() {
        let (dir, fs) = fixture();
        fs.mkdir_all("/a/b/c/").unwrap();
        fs.mkdir_all("/a/b/c/").unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[test]
    fn mkdir_all_over_a_file_fails() {
        let (dir, fs) = fixture();
        std::fs::write(dir.path().join("taken"), "x").unwrap();
        let err = fs.mkdir_all("/taken/").unwrap_err();
        assert!(matches!(err, FileError::AlreadyExists(_)));
    }

    #[test]
    fn remove_twice_reports_not_found() {
        let (dir, fs) = fixture();
        std::fs::write(dir.path().join("once.txt"), "x").unwrap();
        fs.remove("/once.txt").unwrap();
        let err = fs.remove("/once.txt").unwrap_err();
        assert!(matches!(err, FileError::NotFound(_)));
    }

    #[test]
    fn remove_dir_requires_empty_directory() {
        let (dir, fs) = fixture();
        std::fs::create_dir(dir.path().join("full")).unwrap();
        std::fs::write(dir.path().join("full/x"), "x").unwrap();
        assert!(fs.remove_dir("/full/").is_err());

        std::fs::remove_file(dir.path().join("full/x")).unwrap();
        fs.remove_dir("/full/").unwrap();
        assert!(!dir.path().join("full").exists());
    }

    #[test]
    fn alive_while_root_exists() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let fs = LocalFs::new(&root);
        assert!(fs.is_alive());

        std::fs::remove_dir(&root).unwrap();
        assert!(!fs.is_alive());
    }
}
