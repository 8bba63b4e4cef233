use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories that never hold API types.
const DEFAULT_SKIPPED_DIRS: &[&str] = &["target", "tests", "benches", "examples"];

/// Collects the Rust sources whose types go into the catalog.
///
/// Files come back in a stable order (directory walk sorted by file name) so
/// that name collisions are always resolved the same way.
///
/// # Example
///
/// ```no_run
/// use openapi_from_types::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    skipped_dirs: Vec<String>,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered `.rs` files, sorted
    pub rust_files: Vec<PathBuf>,
    /// Paths that could not be read
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a scanner for `root_path` skipping `target`, `tests`, `benches`,
    /// `examples` and hidden directories.
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            skipped_dirs: DEFAULT_SKIPPED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Adds directory names to skip.
    pub fn skip_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_dirs.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    fn is_skipped(&self, name: &str) -> bool {
        name.starts_with('.') || self.skipped_dirs.iter().any(|d| d == name)
    }

    /// Walks the tree under the root and collects `.rs` files.
    ///
    /// Unreadable entries are logged and reported as warnings; scanning
    /// carries on past them.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        let walker = WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path() == self.root_path
                    || !e.file_type().is_dir()
                    || !self.is_skipped(&e.file_name().to_string_lossy())
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file()
                        && path.extension().and_then(|s| s.to_str()) == Some("rs")
                    {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        debug!(
            "Scanned {}: {} Rust files",
            self.root_path.display(),
            rust_files.len()
        );
        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(result: &ScanResult, root: &Path) -> Vec<String> {
        result
            .rust_files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_scan_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src/models")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub mod models;").unwrap();
        fs::write(root.join("src/models/user.rs"), "pub struct User {}").unwrap();
        fs::write(root.join("src/models/account.rs"), "pub struct Account {}").unwrap();
        fs::write(root.join("README.md"), "# README").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(
            names(&result, root),
            vec!["src/lib.rs", "src/models/account.rs", "src/models/user.rs"]
        );
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();

        assert!(result.rust_files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_skips_build_test_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        for dir in ["target", "tests", ".git", "src"] {
            fs::create_dir(root.join(dir)).unwrap();
        }
        fs::write(root.join("target/build.rs"), "fn main() {}").unwrap();
        fs::write(root.join("tests/it.rs"), "struct Fixture {}").unwrap();
        fs::write(root.join(".git/config.rs"), "// config").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();
        assert_eq!(names(&result, root), vec!["src/main.rs"]);
    }

    #[test]
    fn test_scan_extra_skipped_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src/generated")).unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("src/generated/api.rs"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf())
            .skip_dirs(["generated"])
            .scan()
            .unwrap();
        assert_eq!(names(&result, root), vec!["src/lib.rs"]);
    }
}
