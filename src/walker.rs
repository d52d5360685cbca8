use std::path::{Path, PathBuf};

use crate::error::Result;

/// A registry snapshot file found under an import directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the import root.
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    /// File size in bytes.
    pub size: u64,
}

const SOURCE_EXTENSION: &str = "csv";

/// Recursively collect `*.csv` files under `root`, sorted by relative path.
///
/// Hidden files and directories (names starting with `.`) are skipped, as
/// are symlinked directories.
pub fn discover_csv_files(root: &Path) -> Result<Vec<SourceFile>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<SourceFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(root, &path, results)?;
            continue;
        }

        // Follow file symlinks, skip broken ones.
        let Ok(absolute_path) = path.canonicalize() else {
            continue;
        };
        if !absolute_path.is_file() || !is_source(&path) {
            continue;
        }

        results.push(SourceFile {
            relative_path: path.strip_prefix(root).unwrap_or(&path).to_path_buf(),
            size: std::fs::metadata(&absolute_path)?.len(),
            absolute_path,
        });
    }

    Ok(())
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn discovers_only_csv() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("01_hokkaido_all.csv"), "a").unwrap();
        std::fs::write(tmp.path().join("UPPER.CSV"), "b").unwrap();
        std::fs::write(tmp.path().join("readme.txt"), "c").unwrap();
        std::fs::write(tmp.path().join("archive.zip"), "d").unwrap();

        let files = discover_csv_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["01_hokkaido_all.csv", "UPPER.CSV"]);
        assert_eq!(files[0].size, 1);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".cache");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("old.csv"), "x").unwrap();
        std::fs::write(tmp.path().join(".partial.csv"), "x").unwrap();
        std::fs::write(tmp.path().join("data.csv"), "x").unwrap();

        let files = discover_csv_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["data.csv"]);
    }

    #[test]
    fn recurses_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("corporate");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.csv"), "x").unwrap();
        std::fs::write(tmp.path().join("z.csv"), "x").unwrap();
        std::fs::write(tmp.path().join("a.csv"), "x").unwrap();

        let files = discover_csv_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["a.csv", "corporate/b.csv", "z.csv"]);
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_csv_files(tmp.path()).unwrap().is_empty());
    }
}
