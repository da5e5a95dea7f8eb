pub mod fragment;
pub mod keyword;
pub mod positions;
pub mod scanner;

mod component;
mod directives;
mod statements;
mod tree_builder;

pub use positions::Position;
pub use scanner::{Scanner, Span};
use tree_builder::TreeBuilder;

use crate::ast::Ast;
use crate::error::ParseError;
use std::sync::Arc;

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum nesting of regions, statements, tags and expression delimiters
    pub max_depth: usize,
    /// Recognize a leading `@(name: Type, …);` parameter header
    pub parameter_header: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: 128,
            parameter_header: true,
        }
    }
}

/// Parser trait - converts source code to AST
pub trait Parser {
    fn parse(&self, source: &str) -> Result<Ast, ParseError>;
}

/// RsHtml template parser
#[derive(Debug, Clone, Default)]
pub struct RsHtmlParser {
    options: ParseOptions,
}

impl RsHtmlParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }
}

impl Parser for RsHtmlParser {
    fn parse(&self, source: &str) -> Result<Ast, ParseError> {
        let source_arc: Arc<str> = Arc::from(source);
        let mut builder = TreeBuilder::new(&source_arc, &self.options);
        let nodes = builder.build()?;
        let content_start = builder.content_start();

        Ok(Ast::new(nodes, source_arc, content_start))
    }
}

/// Parse `source` with default options
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    RsHtmlParser::new().parse(source)
}
