//! Helpers for the coordination service's slash separated node paths.

use crate::Error;
use crate::Result;

/// Checks that `path` is absolute, has no empty segment and no trailing
/// slash (the root `/` excepted).
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidArgument("path must not be empty".into()));
    }
    if !path.starts_with('/') {
        return Err(Error::InvalidArgument(format!("path {path} must start with '/'")));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(Error::InvalidArgument(format!("path {path} must not end with '/'")));
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err(Error::InvalidArgument(format!("path {path} contains an empty segment")));
    }
    Ok(())
}

/// Full path of the child `name` under `parent`.
pub fn child_path(
    parent: &str,
    name: &str,
) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent of `path`, `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Every proper ancestor of `path` except the root, outermost first.
///
/// `/a/b/c` yields `["/a", "/a/b"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return result;
    }
    for segment in &segments[..segments.len() - 1] {
        current.push('/');
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}
