//! Mapping between filesystem paths and bucket keys.
//!
//! Paths are stored the way keys are: slash separated, no leading slash, and
//! the root is the empty string.

use object_store::DELIMITER;

use super::error::FsError;

/// Path of the filesystem root.
pub const ROOT: &str = "";

/// Join a directory path and a child name into a key.
///
/// Only a single leading delimiter is stripped, so joining onto the root
/// yields `name` rather than `/name`.
pub fn join(parent: &str, name: &str) -> String {
    let joined = format!("{}{}{}", parent, DELIMITER, name);
    match joined.strip_prefix(DELIMITER) {
        Some(stripped) => stripped.to_string(),
        None => joined,
    }
}

/// Listing prefix for the children of `path` (`"a"` → `"a/"`, root → `""`).
pub fn dir_prefix(path: &str) -> String {
    join(path, "")
}

/// Name of a child given its listed key or common prefix and the queried prefix.
pub fn child_name<'a>(entry: &'a str, prefix: &str) -> &'a str {
    let name = entry.strip_prefix(prefix).unwrap_or(entry);
    name.strip_suffix(DELIMITER).unwrap_or(name)
}

/// Split a stored path into its parent path and final component.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind(DELIMITER) {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (ROOT, path),
    }
}

/// Reject names that cannot be a single path component.
pub fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(DELIMITER) {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b.txt"), "a/b.txt");
        assert_eq!(join("a/b", "c"), "a/b/c");
    }

    #[test]
    fn test_dir_prefix() {
        assert_eq!(dir_prefix(""), "");
        assert_eq!(dir_prefix("a"), "a/");
        assert_eq!(dir_prefix("a/d"), "a/d/");
    }

    #[test]
    fn test_child_name() {
        assert_eq!(child_name("a/b.txt", "a/"), "b.txt");
        assert_eq!(child_name("a/d/", "a/"), "d");
        assert_eq!(child_name("top.txt", ""), "top.txt");
        assert_eq!(child_name("x/", ""), "x");
    }

    #[test]
    fn test_split() {
        assert_eq!(split("a"), ("", "a"));
        assert_eq!(split("a/b"), ("a", "b"));
        assert_eq!(split("a/b/c.txt"), ("a/b", "c.txt"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("file.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
