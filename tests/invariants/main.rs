//! Structural invariants checked over every template in tests/fixtures/.
//!
//! Run with: cargo test --test invariants

use libtest_mimic::{Arguments, Failed, Trial};
use rshtml_parser::ast::{Node, escape_text};
use rshtml_parser::transform::{Visitor, walk};
use rshtml_parser::{Ast, parse};
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let args = Arguments::from_args();
    let pattern = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/*.rs.html");

    let mut trials = Vec::new();
    for path in glob::glob(&pattern.to_string_lossy()).expect("valid glob pattern").flatten() {
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("fixture").to_string();
        let spans = path.clone();
        let escapes = path.clone();
        trials.push(Trial::test(format!("{}::span_partition", name), move || span_partition(&spans)));
        trials.push(Trial::test(format!("{}::escape_round_trip", name), move || escape_round_trip(&escapes)));
        trials.push(Trial::test(format!("{}::error_free", name), move || error_free(&path)));
    }

    libtest_mimic::run(&args, trials).exit();
}

fn load(path: &PathBuf) -> Result<Ast, Failed> {
    let source = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse(&source).map_err(|e| e.render(&source, &path.display().to_string()).into())
}

fn span_partition(path: &PathBuf) -> Result<(), Failed> {
    let ast = load(path)?;
    ast.check_spans().map_err(Failed::from)
}

struct TextCollector<'a> {
    texts: Vec<&'a Node>,
}

impl<'a> Visitor<'a> for TextCollector<'a> {
    fn enter(&mut self, node: &'a Node) -> bool {
        if matches!(node, Node::Text(_)) {
            self.texts.push(node);
        }
        true
    }
}

fn escape_round_trip(path: &PathBuf) -> Result<(), Failed> {
    let ast = load(path)?;
    let mut collector = TextCollector { texts: Vec::new() };
    walk(&ast.nodes, &mut collector);

    for node in collector.texts {
        let Node::Text(text) = node else { continue };
        let original = ast.text(text.span);
        if escape_text(&text.content) != original {
            return Err(format!(
                "text at {:?} re-escapes to {:?}, source has {:?}",
                text.span,
                escape_text(&text.content),
                original
            )
            .into());
        }
    }
    Ok(())
}

fn error_free(path: &PathBuf) -> Result<(), Failed> {
    let ast = load(path)?;
    let source = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let rendered: Vec<String> = ast
        .errors()
        .iter()
        .map(|err| err.render(&source, &path.display().to_string()))
        .collect();
    if rendered.is_empty() {
        Ok(())
    } else {
        Err(rendered.join("").into())
    }
}
