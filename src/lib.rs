//! Parser for RsHtml, a Razor-style template language that mixes literal
//! markup with `@`-prefixed Rust expressions, control flow, directives and
//! component tags.
//!
//! ```
//! use rshtml_parser::{parse, Node};
//!
//! let ast = parse("<p>Hello @user.name</p>").unwrap();
//! assert!(matches!(ast.nodes[1], Node::Expression(_)));
//! ```

pub mod ast;
pub mod batch;
pub mod error;
pub mod outline;
pub mod parser;
pub mod transform;

pub use ast::{Ast, Node, Span};
pub use error::{ErrorKind, ErrorNodeKind, ParseError};
pub use parser::{ParseOptions, Parser, RsHtmlParser, parse};
pub use transform::{TemplateMetadata, analyze};

/// Parse `source` with the given options
pub fn parse_with(source: &str, options: ParseOptions) -> Result<Ast, ParseError> {
    RsHtmlParser::with_options(options).parse(source)
}
