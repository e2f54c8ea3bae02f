//! Path codec for the coordination service's hierarchical namespace.
//!
//! Paths are absolute and `/`-delimited; the root is a single `/`. Everything
//! in this module is a pure function over string slices.

use crate::Error;

/// Segment separator.
pub const SEPARATOR: char = '/';

/// The root path.
pub const ROOT: &str = "/";

/// Returns true if `path` is the root.
#[must_use]
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Normalizes an administrative path request.
///
/// An empty request means the root. Repeated separators collapse to one, a
/// missing leading separator is added and trailing separators are dropped, so
/// the result never ends with `/` unless it is the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Checks that `path` is a well-formed absolute path.
pub fn validate(path: &str) -> Result<(), Error> {
    let invalid = |reason| Error::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if !path.starts_with(SEPARATOR) {
        return Err(invalid("path must start with '/'"));
    }
    if is_root(path) {
        return Ok(());
    }
    if path.ends_with(SEPARATOR) {
        return Err(invalid("path must not end with '/'"));
    }
    for segment in path[1..].split(SEPARATOR) {
        check_segment(segment).map_err(invalid)?;
    }
    Ok(())
}

/// Checks that `name` can be used as a single path segment.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.contains(SEPARATOR) {
        return Err(Error::InvalidPath {
            path: name.to_string(),
            reason: "node name must not contain '/'",
        });
    }
    check_segment(name).map_err(|reason| Error::InvalidPath {
        path: name.to_string(),
        reason,
    })
}

fn check_segment(segment: &str) -> Result<(), &'static str> {
    match segment {
        "" => Err("empty path segment"),
        "." | ".." => Err("relative path segments are not allowed"),
        s if s.contains('\0') => Err("null character is not allowed"),
        _ => Ok(()),
    }
}

/// Joins a child name onto a parent path without doubling the separator
/// under the root.
#[must_use]
pub fn join(parent: &str, child: &str) -> String {
    if is_root(parent) {
        format!("{SEPARATOR}{child}")
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// Returns the last segment of `path`; empty for the root.
#[must_use]
pub fn basename(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Returns the parent of `path`, or `None` for the root.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if is_root(path) {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns true if `path` equals `ancestor` or lies somewhere below it.
#[must_use]
pub fn is_within(ancestor: &str, path: &str) -> bool {
    if is_root(ancestor) {
        return path.starts_with(SEPARATOR);
    }
    path == ancestor
        || (path.starts_with(ancestor) && path[ancestor.len()..].starts_with(SEPARATOR))
}

/// Number of segments below the root.
#[must_use]
pub fn depth(path: &str) -> usize {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).count()
}
