use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to scan input directory: {0}")]
    Scan(#[from] glob::GlobError),
}

/// Find every regular file in `dir` whose name ends in `.{extension}`.
///
/// Results are sorted by path so that runs over the same directory submit
/// files in the same order regardless of the filesystem.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let dir_pattern = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!(
        "{}/*.{}",
        dir_pattern.trim_end_matches('/'),
        glob::Pattern::escape(extension)
    );

    let entries = glob::glob(&pattern).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    tracing::debug!(pattern = %pattern, files = files.len(), "Discovered input files");

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_matches_extension_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.log"), "").unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("c.log.shipped"), "").unwrap();

        let files = discover_files(dir.path(), "log").unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a.log"), dir.path().join("b.log")]
        );
    }

    #[test]
    fn test_skips_directories_and_nested_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("archive.log")).unwrap();
        fs::write(dir.path().join("archive.log").join("old.log"), "").unwrap();
        fs::write(dir.path().join("current.log"), "").unwrap();

        let files = discover_files(dir.path(), "log").unwrap();

        assert_eq!(files, vec![dir.path().join("current.log")]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(discover_files(dir.path(), "log").unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let files = discover_files(Path::new("/nonexistent/logship-input"), "log").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_directory_with_glob_metacharacters() {
        let dir = TempDir::new().unwrap();
        let odd = dir.path().join("logs[1]");
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("x.log"), "").unwrap();

        let files = discover_files(&odd, "log").unwrap();

        assert_eq!(files, vec![odd.join("x.log")]);
    }
}
