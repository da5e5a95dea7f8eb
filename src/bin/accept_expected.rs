//! Binary to regenerate the expected outlines in tests/corpus/*.txt
//!
//! Usage:
//!   cargo run --bin accept_expected            # Update all
//!   cargo run --bin accept_expected -- match   # Update only files matching "match"

use rshtml_parser::{outline, parse};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const RULE_WIDTH: usize = 80;

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let corpus_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("corpus");

    let mut updated = 0;
    let mut skipped = 0;

    for entry in WalkDir::new(&corpus_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|s| s == "txt").unwrap_or(false))
    {
        let path = entry.path();
        let path_str = path.to_string_lossy();

        if let Some(ref f) = filter {
            if !path_str.contains(f) {
                skipped += 1;
                continue;
            }
        }

        process_file(path);
        updated += 1;
    }

    println!("Updated {} files, skipped {}", updated, skipped);
}

fn process_file(path: &Path) {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", path, e);
            return;
        }
    };

    let mut out = String::new();
    for (title, source) in read_sources(&text) {
        let actual = match parse(&source) {
            Ok(ast) => outline::to_sexp(&ast),
            Err(err) => format!("(FATAL {:?})", err.kind),
        };
        out.push_str(&format!(
            "{rule}\n{title}\n{rule}\n{source}\n{dash}\n\n{actual}\n\n",
            rule = "=".repeat(RULE_WIDTH),
            dash = "-".repeat(RULE_WIDTH),
        ));
    }

    match fs::write(path, out.trim_end().to_string() + "\n") {
        Ok(()) => println!("  wrote {}", path.display()),
        Err(e) => eprintln!("Failed to write {:?}: {}", path, e),
    }
}

fn is_rule(line: &str, ch: char) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == ch)
}

/// Titles and sources of a corpus file, dropping the old expectations
fn read_sources(text: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !is_rule(lines[i], '=') || i + 2 >= lines.len() {
            i += 1;
            continue;
        }
        let title = lines[i + 1].trim().to_string();
        i += 3;

        let source_start = i;
        while i < lines.len() && !is_rule(lines[i], '-') {
            i += 1;
        }
        entries.push((title, lines[source_start..i].join("\n")));

        while i < lines.len() && !is_rule(lines[i], '=') {
            i += 1;
        }
    }
    entries
}
