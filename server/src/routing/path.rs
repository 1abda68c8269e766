//! Request path to remote path resolution.

use percent_encoding::percent_decode_str;

use crate::errors::{GatewayError, Stage};

/// How the configured base prefix is removed from request paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PrefixMatch {
    /// Strip only a leading prefix that ends on a segment boundary.
    #[default]
    Anchored,
    /// Remove the first occurrence of the prefix anywhere in the path.
    Substring,
}

/// True when `path` names a directory, i.e. ends in `/`.
pub fn is_directory(path: &str) -> bool {
    path.ends_with('/')
}

/// Strip `base` from `path` according to `mode`.
///
/// Returns `None` when anchored matching finds no leading prefix.
pub fn strip_base(path: &str, base: &str, mode: PrefixMatch) -> Option<String> {
    if base.is_empty() {
        return Some(path.to_string());
    }

    match mode {
        PrefixMatch::Substring => Some(path.replacen(base, "", 1)),
        PrefixMatch::Anchored => {
            let base = base.trim_end_matches('/');
            if base.is_empty() {
                return Some(path.to_string());
            }
            let rest = path.strip_prefix(base)?;
            if rest.is_empty() || rest.starts_with('/') {
                Some(rest.to_string())
            } else {
                None
            }
        }
    }
}

/// Turns raw request paths into remote paths.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    base: String,
    mode: PrefixMatch,
}

impl PathResolver {
    pub fn new(base: impl Into<String>, mode: PrefixMatch) -> Self {
        Self {
            base: base.into(),
            mode,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Decode `raw` and strip the base prefix.
    ///
    /// The result is never empty and never contains a `..` segment.
    pub fn resolve(&self, raw: &str) -> Result<String, GatewayError> {
        let decoded = percent_decode_str(raw).decode_utf8().map_err(|e| {
            GatewayError::malformed(format!("Invalid path encoding: {e}"), Stage::ResolvePath)
        })?;

        let path = strip_base(&decoded, &self.base, self.mode).ok_or_else(|| {
            GatewayError::malformed(
                format!("Path {decoded} is outside base path {}", self.base),
                Stage::ResolvePath,
            )
        })?;

        if path.is_empty() {
            return Err(GatewayError::malformed("empty path", Stage::ResolvePath));
        }
        if path.split('/').any(|segment| segment == "..") {
            return Err(GatewayError::malformed(
                format!("Path {path} contains a parent segment"),
                Stage::ResolvePath,
            ));
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn directory_iff_trailing_slash() {
        assert!(is_directory("/"));
        assert!(is_directory("/a/b/"));
        assert!(!is_directory("/a/b"));
        assert!(!is_directory("/a/b.txt"));
        assert!(!is_directory(""));
    }

    #[test]
    fn empty_base_is_identity() {
        for mode in [PrefixMatch::Anchored, PrefixMatch::Substring] {
            assert_eq!(strip_base("/x/y", "", mode).as_deref(), Some("/x/y"));
        }
    }

    #[test]
    fn substring_removes_first_occurrence_only() {
        assert_eq!(
            strip_base("/api/docs/api/x", "/api", PrefixMatch::Substring).as_deref(),
            Some("/docs/api/x")
        );
        assert_eq!(
            strip_base("/files/api/x", "/api", PrefixMatch::Substring).as_deref(),
            Some("/files/x")
        );
        assert_eq!(
            strip_base("/other", "/api", PrefixMatch::Substring).as_deref(),
            Some("/other")
        );
    }

    #[test]
    fn anchored_requires_leading_segment_boundary() {
        assert_eq!(
            strip_base("/api/dir/", "/api", PrefixMatch::Anchored).as_deref(),
            Some("/dir/")
        );
        assert_eq!(
            strip_base("/api/dir/", "/api/", PrefixMatch::Anchored).as_deref(),
            Some("/dir/")
        );
        assert_eq!(strip_base("/apiary/x", "/api", PrefixMatch::Anchored), None);
        assert_eq!(strip_base("/files/api/x", "/api", PrefixMatch::Anchored), None);
        assert_eq!(
            strip_base("/api", "/api", PrefixMatch::Anchored).as_deref(),
            Some("")
        );
    }

    #[test]
    fn resolve_decodes_percent_escapes() {
        let resolver = PathResolver::new("/api", PrefixMatch::Anchored);
        assert_eq!(
            resolver.resolve("/api/my%20docs/r%C3%A9sum%C3%A9.pdf").unwrap(),
            "/my docs/résumé.pdf"
        );
    }

    #[test]
    fn resolve_rejects_empty_result() {
        let resolver = PathResolver::new("/api", PrefixMatch::Anchored);
        let err = resolver.resolve("/api").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRequest);
        assert_eq!(err.message, "empty path, Resolve path error");

        let resolver = PathResolver::new("", PrefixMatch::Substring);
        assert!(resolver.resolve("").is_err());
    }

    #[test]
    fn resolve_rejects_parent_segments() {
        let resolver = PathResolver::new("", PrefixMatch::Anchored);
        assert!(resolver.resolve("/a/../etc/passwd").is_err());
        assert!(resolver.resolve("/a/%2E%2E/b").is_err());
        assert!(resolver.resolve("/a/..b/c").is_ok());
    }

    #[test]
    fn resolve_rejects_paths_outside_anchored_base() {
        let resolver = PathResolver::new("/api", PrefixMatch::Anchored);
        let err = resolver.resolve("/elsewhere/x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRequest);
    }

    #[test]
    fn resolve_rejects_invalid_utf8() {
        let resolver = PathResolver::default();
        assert!(resolver.resolve("/bad%FF").is_err());
    }
}
