//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async production code MUST NOT use blocking I/O.
//! **Required**: Use `tokio::net`, `tokio::io`, async `reqwest`, not `std::net`,
//! `std::io::stdin()` or `reqwest::blocking`.
//!
//! Synchronous functions (config loading before the runtime does any hub work)
//! may read files with `std::fs`.

use architectural_enforcement::{is_in_async_function, scan_production, SourceLine};

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = scan_production(check_line);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN blocking I/O:");
        eprintln!("  - std::net::TcpStream, std::net::TcpListener");
        eprintln!("  - std::fs inside async functions");
        eprintln!("  - std::io::stdin() inside async functions");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::net / tokio_tungstenite for the hub session");
        eprintln!("  - reqwest::Client for discovery");
        eprintln!("  - tokio::io::stdin() for control lines");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn check_line(line: &SourceLine<'_>, lines: &[&str], idx: usize) -> Option<String> {
    let code = line.code();

    if code.contains("std::net") {
        return Some(line.report("Blocking network I/O"));
    }

    if code.contains("reqwest::blocking") {
        return Some(line.report("Blocking HTTP client"));
    }

    if !is_in_async_function(lines, idx) {
        return None;
    }

    if code.contains("std::fs::") {
        return Some(line.report("Blocking file I/O in async"));
    }

    if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
        return Some(line.report("Blocking stdin/stdout in async"));
    }

    None
}

#[test]
fn test_sync_file_read_is_allowed() {
    let code = [
        "pub fn load_config_from_path(path: Option<PathBuf>) -> Result<Config> {",
        "    let text = std::fs::read_to_string(path)?;",
        "}",
    ];
    let path = std::path::Path::new("config.rs");
    let line = SourceLine {
        path,
        number: 2,
        text: code[1],
    };

    assert!(check_line(&line, &code, 1).is_none());
}

#[test]
fn test_async_file_read_is_flagged() {
    let code = [
        "async fn refresh(&self) {",
        "    let text = std::fs::read_to_string(\"state\")?;",
        "}",
    ];
    let path = std::path::Path::new("platform.rs");
    let line = SourceLine {
        path,
        number: 2,
        text: code[1],
    };

    assert!(check_line(&line, &code, 1).is_some());
}
