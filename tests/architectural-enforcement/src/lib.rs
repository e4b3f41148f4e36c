//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No unmarked sleeps in production code
//! - No blocking I/O inside async functions
//!
//! The helpers here walk the production sources of the workspace crates and
//! classify lines; the policies themselves live under `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_SOURCES: [&str; 2] = ["harmony/core/src", "harmony/daemon/src"];

/// A line of production code
#[derive(Debug)]
pub struct SourceLine<'a> {
    /// File the line belongs to
    pub path: &'a Path,
    /// 1-based line number
    pub number: usize,
    /// Full line text
    pub text: &'a str,
}

impl SourceLine<'_> {
    /// The line with any trailing `//` comment stripped
    pub fn code(&self) -> &str {
        self.text.split("//").next().unwrap_or(self.text)
    }

    /// `path:line - text` for violation reports
    pub fn report(&self, what: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            self.number,
            what,
            self.text.trim()
        )
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Every `.rs` file under the production source roots
pub fn production_files() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_SOURCES {
        let path = root.join(dir);
        assert!(path.exists(), "missing source root {}", path.display());

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files
}

/// Run `check` over each production line that precedes the file's test module
pub fn scan_production<F>(mut check: F) -> Vec<String>
where
    F: FnMut(&SourceLine<'_>, &[&str], usize) -> Option<String>,
{
    let mut violations = Vec::new();

    for path in production_files() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let end = test_module_start(&lines).unwrap_or(lines.len());

        for (idx, text) in lines.iter().enumerate().take(end) {
            let line = SourceLine {
                path: &path,
                number: idx + 1,
                text,
            };
            if let Some(violation) = check(&line, &lines, idx) {
                violations.push(violation);
            }
        }
    }

    violations
}

/// Index of the `#[cfg(test)]` attribute opening the unit test module
pub fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines
        .iter()
        .position(|line| line.trim_start().starts_with("#[cfg(test)]"))
}

/// Signature line of the function enclosing `current_idx`, if any
pub fn enclosing_fn<'a>(lines: &[&'a str], current_idx: usize) -> Option<&'a str> {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim_start();
        let signature = line
            .trim_start_matches("pub(crate) ")
            .trim_start_matches("pub ");

        if signature.starts_with("fn ") || signature.starts_with("async fn ") {
            return Some(line);
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || (line.starts_with("impl") && line.ends_with('{')) {
            return None;
        }
    }
    None
}

/// Whether the enclosing function is `async`
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    enclosing_fn(lines, current_idx).is_some_and(|signature| signature.contains("async fn "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_fn_detection() {
        let code = [
            "impl Loader {",
            "    pub async fn load(&self) -> Result<()> {",
            "        let text = std::fs::read_to_string(\"x\")?;",
            "    }",
            "    pub fn parse(&self) {",
            "        let text = std::fs::read_to_string(\"x\")?;",
            "    }",
            "}",
        ];

        assert!(is_in_async_function(&code, 2));
        assert!(!is_in_async_function(&code, 5));
        assert!(enclosing_fn(&code, 0).is_none());
    }

    #[test]
    fn test_test_module_start() {
        let code = ["fn a() {}", "", "#[cfg(test)]", "mod tests {}"];
        assert_eq!(test_module_start(&code), Some(2));
        assert_eq!(test_module_start(&code[..2]), None);
    }

    #[test]
    fn test_production_sources_found() {
        let files = production_files();
        assert!(files.iter().any(|p| p.ends_with("harmony/core/src/lib.rs")));
        assert!(files.iter().any(|p| p.ends_with("harmony/daemon/src/main.rs")));
    }
}
