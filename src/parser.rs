use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Parser for Rust source files.
///
/// Wraps `syn::parse_file` and records the module path each file defines,
/// which becomes the module half of every type identity found in it.
///
/// # Example
///
/// ```no_run
/// use openapi_from_types::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/models/user.rs")).unwrap();
/// assert_eq!(parsed.module_path, "crate::models::user");
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module the file defines, e.g. `crate::models::user`
    pub module_path: String,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

/// Derives the module path of a source file.
///
/// Components after the last `src` directory name the module; `lib.rs`,
/// `main.rs` and `mod.rs` stand for their parent. Files outside any `src`
/// directory are named by their file stem alone.
pub fn module_path_for(path: &Path) -> String {
    let components: Vec<String> = path
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    let relative = match components.iter().rposition(|c| c == "src") {
        Some(src) => &components[src + 1..],
        None => &components[components.len().saturating_sub(1)..],
    };

    let mut segments: Vec<&str> = relative.iter().map(String::as_str).collect();
    if matches!(segments.last(), Some(&"lib") | Some(&"main") | Some(&"mod")) {
        segments.pop();
    }
    // A binary under src/bin is its own crate root
    if segments.first() == Some(&"bin") && segments.len() >= 2 {
        segments.drain(..2);
    }

    std::iter::once("crate")
        .chain(segments)
        .collect::<Vec<_>>()
        .join("::")
}

impl AstParser {
    /// Parses a single Rust source file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid Rust.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let syntax_tree = syn::parse_file(&content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            module_path: module_path_for(path),
            syntax_tree,
        })
    }

    /// Parses in-memory source as if it lived at `path`.
    pub fn parse_source(path: &Path, content: &str) -> Result<ParsedFile> {
        let syntax_tree = syn::parse_file(content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            module_path: module_path_for(path),
            syntax_tree,
        })
    }

    /// Parses every file, returning one result per path.
    ///
    /// Failures are logged and returned in place so callers can build a
    /// partial catalog from the files that did parse.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                let parsed = Self::parse_file(path);
                if let Err(e) = &parsed {
                    warn!("Failed to parse {}: {:#}", path.display(), e);
                }
                parsed
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_parse_file_records_module_path() {
        let temp_dir = TempDir::new().unwrap();
        let code = r#"
            #[derive(Serialize)]
            pub struct User {
                pub id: u32,
                #[serde(rename = "userName")]
                pub name: String,
            }
        "#;
        let file_path = create_temp_file(&temp_dir, "src/models/user.rs", code);

        let parsed = AstParser::parse_file(&file_path).unwrap();
        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.module_path, "crate::models::user");
        assert_eq!(parsed.syntax_tree.items.len(), 1);
    }

    #[test]
    fn test_parse_invalid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(&temp_dir, "invalid.rs", "pub struct User { id: u32 name: String }");

        let err_msg = AstParser::parse_file(&file_path).unwrap_err().to_string();
        assert!(err_msg.contains("Failed to parse Rust syntax"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let err_msg = AstParser::parse_file(Path::new("/nonexistent/file.rs"))
            .unwrap_err()
            .to_string();
        assert!(err_msg.contains("Failed to read file"));
    }

    #[test]
    fn test_parse_files_keeps_going_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = create_temp_file(&temp_dir, "a.rs", "pub struct A;");
        let file2 = create_temp_file(&temp_dir, "b.rs", "pub fn broken( {");
        let file3 = create_temp_file(&temp_dir, "c.rs", "pub enum C { X }");

        let results = AstParser::parse_files(&[file1.clone(), file2, file3]);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().path, file1);
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_module_paths() {
        assert_eq!(module_path_for(Path::new("proj/src/lib.rs")), "crate");
        assert_eq!(module_path_for(Path::new("proj/src/main.rs")), "crate");
        assert_eq!(module_path_for(Path::new("proj/src/billing/mod.rs")), "crate::billing");
        assert_eq!(
            module_path_for(Path::new("proj/src/billing/models.rs")),
            "crate::billing::models"
        );
        assert_eq!(module_path_for(Path::new("proj/src/bin/tool.rs")), "crate");
        assert_eq!(module_path_for(Path::new("/tmp/scratch/item.rs")), "crate::item");
    }

    #[test]
    fn test_parse_source_uses_given_path() {
        let parsed = AstParser::parse_source(Path::new("src/shop.rs"), "pub struct Item;").unwrap();
        assert_eq!(parsed.module_path, "crate::shop");
    }
}
