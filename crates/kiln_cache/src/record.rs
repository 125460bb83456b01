//! Line-oriented record files shared by both stores.

use std::path::Path;

use crate::error::CacheError;

/// Reads a record file, returning `None` if it is missing or not UTF-8.
pub(crate) fn read(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Writes a record through a temporary sibling so a crash mid-write never
/// leaves a truncated record behind.
///
/// Creates the parent directory if it doesn't exist.
pub(crate) fn write(path: &Path, contents: &str) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents).map_err(|e| CacheError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| CacheError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("fingerprints");
        write(&path, "a.c xxh3:00\n").unwrap();
        assert_eq!(read(&path).as_deref(), Some("a.c xxh3:00\n"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(&dir.path().join("nope")).is_none());
    }

    #[test]
    fn read_non_utf8_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(read(&path).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn write_into_file_as_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let err = write(&blocker.join("fingerprints"), "x").unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
