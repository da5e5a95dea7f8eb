//! Parsing many templates at once.

use crate::ast::Ast;
use crate::error::ParseError;
use crate::parser::{ParseOptions, Parser, RsHtmlParser};
use std::thread;
use tracing::debug;

/// Parse every source on scoped worker threads.
///
/// Results come back in input order. Each parse is independent, so one
/// template's fatal error does not affect the others.
pub fn parse_all<S: AsRef<str> + Sync>(sources: &[S], options: &ParseOptions) -> Vec<Result<Ast, ParseError>> {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    parse_all_with(sources, options, workers)
}

/// [`parse_all`] with an explicit worker count
pub fn parse_all_with<S: AsRef<str> + Sync>(
    sources: &[S],
    options: &ParseOptions,
    workers: usize,
) -> Vec<Result<Ast, ParseError>> {
    if sources.is_empty() {
        return Vec::new();
    }
    let chunk_size = sources.len().div_ceil(workers.max(1));
    debug!(templates = sources.len(), chunk_size, "batch parse");

    let parser = RsHtmlParser::with_options(options.clone());
    let parser = &parser;
    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|source| parser.parse(source.as_ref()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
