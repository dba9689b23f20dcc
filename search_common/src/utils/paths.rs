use std::io;
use std::path::Path;

/// Reports whether `path` exists.
///
/// An empty path is rejected with `InvalidInput` instead of silently
/// resolving to the current directory. Any error other than `NotFound`
/// (permissions, broken mounts) is returned to the caller.
pub fn path_exists(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path is empty, please check",
        ));
    }
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_exists_reports_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{}").unwrap();

        assert!(path_exists(&file).unwrap());
        assert!(!path_exists(dir.path().join("missing.json")).unwrap());
    }

    #[test]
    fn test_path_exists_rejects_empty_path() {
        let err = path_exists("").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
