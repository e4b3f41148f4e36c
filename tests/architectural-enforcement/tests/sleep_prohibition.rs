//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep to wait for state. Hub state is
//! read on demand and background work runs off `tokio::time::interval`.
//!
//! **Exceptions**: a sleep is accepted only directly under one of the marker
//! comments naming a protocol delay:
//!
//! - `// Retry backoff` - pause between busy switch attempts
//! - `// Settle delay` - deferred timer resume after a switch
//! - `// Reconcile delay` - deferred re-read after a no-op switch
//!
//! Unit test modules are not scanned.

use architectural_enforcement::{scan_production, SourceLine};

const MARKERS: [&str; 3] = ["// Retry backoff", "// Settle delay", "// Reconcile delay"];

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan_production(check_line);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - tokio::time::sleep directly under a protocol delay marker");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - std::thread::sleep anywhere");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for the hub (await the reply!)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn check_line(line: &SourceLine<'_>, lines: &[&str], idx: usize) -> Option<String> {
    let code = line.code();

    if code.contains("thread::sleep") {
        return Some(line.report("Blocking sleep"));
    }

    if (code.contains("::sleep(") || code.contains(".sleep(")) && !is_marked_delay(lines, idx) {
        return Some(line.report("Unmarked sleep"));
    }

    None
}

/// Whether the line directly above carries a delay marker
fn is_marked_delay(lines: &[&str], idx: usize) -> bool {
    idx.checked_sub(1)
        .and_then(|above| lines.get(above))
        .is_some_and(|above| MARKERS.contains(&above.trim()))
}

#[test]
fn test_marker_detection() {
    let code = [
        "loop {",
        "    // Retry backoff",
        "    tokio::time::sleep(self.backoff).await;",
        "    tokio::time::sleep(self.backoff).await;",
        "}",
    ];

    assert!(is_marked_delay(&code, 2));
    assert!(!is_marked_delay(&code, 3));
    assert!(!is_marked_delay(&code, 0));
}
