use crate::ast::{ErrorNode, Span};
use crate::parser::positions::Position;
use serde::Serialize;

/// Kind of fatal parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnterminatedComment,
    UnterminatedRawBlock,
    UnterminatedBlock,
    UnbalancedDelimiter,
    RecursionLimitExceeded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnterminatedComment => "Unterminated comment",
            ErrorKind::UnterminatedRawBlock => "Unterminated raw block",
            ErrorKind::UnterminatedBlock => "Unterminated block",
            ErrorKind::UnbalancedDelimiter => "Unbalanced delimiter",
            ErrorKind::RecursionLimitExceeded => "Recursion limit exceeded",
        }
    }

    /// Errors raised while still scanning characters, before any structure applies
    pub fn is_lex_error(&self) -> bool {
        matches!(self, ErrorKind::UnterminatedComment | ErrorKind::UnterminatedRawBlock)
    }
}

/// Kind of recoverable error, carried by error nodes in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorNodeKind {
    EmptyCondition,
    MissingBlock,
    MalformedArm,
    UnmatchedTag,
    UnclosedTag,
    MalformedTag,
    MalformedDirective,
    UnbalancedDelimiter,
    InvalidSigil,
    UnexpectedElse,
}

impl ErrorNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorNodeKind::EmptyCondition => "Empty condition",
            ErrorNodeKind::MissingBlock => "Missing block",
            ErrorNodeKind::MalformedArm => "Malformed match arm",
            ErrorNodeKind::UnmatchedTag => "Unmatched tag",
            ErrorNodeKind::UnclosedTag => "Unclosed tag",
            ErrorNodeKind::MalformedTag => "Malformed tag",
            ErrorNodeKind::MalformedDirective => "Malformed directive",
            ErrorNodeKind::UnbalancedDelimiter => "Unbalanced delimiter",
            ErrorNodeKind::InvalidSigil => "Invalid sigil",
            ErrorNodeKind::UnexpectedElse => "Unexpected else",
        }
    }
}

/// Error that aborts the whole parse
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub related_span: Option<Span>,
    pub related_label: Option<String>,
    pub help: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            related_span: None,
            related_label: None,
            help: None,
        }
    }

    /// Add a related span with a label (e.g., "opened here")
    pub fn with_related(mut self, span: Span) -> Self {
        self.related_span = Some(span);
        self
    }

    /// Set the label for the related span
    pub fn with_related_label(mut self, label: impl Into<String>) -> Self {
        self.related_label = Some(label.into());
        self
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.diagnostic().render(source, filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.diagnostic().render(source, filename, true)
    }

    fn diagnostic(&self) -> Diagnostic<'_> {
        Diagnostic {
            message: &self.message,
            span: self.span,
            related_span: self.related_span,
            related_label: self.related_label.as_deref(),
            help: self.help.as_deref(),
        }
    }
}

impl ErrorNode {
    /// Render the error node like a parse error, with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.diagnostic().render(source, filename, false)
    }

    /// Render the error node with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.diagnostic().render(source, filename, true)
    }

    fn diagnostic(&self) -> Diagnostic<'_> {
        Diagnostic {
            message: &self.message,
            span: self.span,
            related_span: None,
            related_label: None,
            help: None,
        }
    }
}

struct Diagnostic<'a> {
    message: &'a str,
    span: Span,
    related_span: Option<Span>,
    related_label: Option<&'a str>,
    help: Option<&'a str>,
}

impl Diagnostic<'_> {
    fn render(&self, source: &str, filename: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let underline = if color { "\x1b[4m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        let start = Position::at(source, self.span.start);
        let location = format!("{}:{}:{}", filename, start.line + 1, start.col + 1);
        if color {
            // OSC 8 hyperlink
            let abs_path = std::path::Path::new(filename)
                .canonicalize()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| filename.to_string());
            output.push_str(&format!(
                " {}file:{} \x1b]8;;file://{}\x07{}{}{}\x1b]8;;\x07\n",
                dim, reset, abs_path, underline, location, reset
            ));
        } else {
            output.push_str(&format!(" file: {}\n", location));
        }

        output.push_str(&format!("{}error:{} {}\n", red, reset, self.message));

        let width = format!("{}", start.line + 1).len().max(2);
        output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = width));
        if let Some(snippet) = snippet(source, self.span, color) {
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim, snippet.line_number, reset, snippet.text,
                width = width
            ));
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}\n",
                dim, "", reset,
                " ".repeat(snippet.col), red, "^".repeat(snippet.len), reset,
                width = width
            ));
        }

        if let Some(snippet) = self.related_span.and_then(|related| snippet(source, related, color)) {
            let label = self.related_label.unwrap_or("opened here");
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim, snippet.line_number, reset, snippet.text,
                width = width
            ));
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{} {}{}\n",
                dim, "", reset,
                " ".repeat(snippet.col), dim, "^".repeat(snippet.len), label, reset,
                width = width
            ));
        }

        if let Some(help) = self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

struct Snippet {
    line_number: usize,
    text: String,
    col: usize,
    len: usize,
}

/// Source line holding the start of `span`, with caret column and width
fn snippet(source: &str, span: Span, color: bool) -> Option<Snippet> {
    let start = Position::at(source, span.start);
    let end = Position::at(source, span.end);
    let line = source.lines().nth(start.line)?;
    let line_chars = line.chars().count();
    let len = if end.line == start.line {
        end.col.saturating_sub(start.col).max(1)
    } else {
        line_chars.saturating_sub(start.col).max(1)
    };
    let text = if color { highlight_syntax(line) } else { line.to_string() };
    Some(Snippet {
        line_number: start.line + 1,
        text,
        col: start.col,
        len,
    })
}

/// Syntax highlighting for error context lines
fn highlight_syntax(line: &str) -> String {
    const TAG: &str = "\x1b[38;5;180m"; // component tags
    const SIGIL: &str = "\x1b[38;5;173m"; // `@` constructs and keywords
    const STRING: &str = "\x1b[38;5;72m";
    const COMMENT: &str = "\x1b[38;5;243m";
    const RESET: &str = "\x1b[0m";

    let chars: Vec<char> = line.chars().collect();
    let mut result = String::with_capacity(line.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        // @@ is literal text
        if chars[i] == '@' && chars.get(i + 1) == Some(&'@') {
            result.push_str("@@");
            i += 2;
            continue;
        }

        // @* comment *@, possibly running past the end of the line
        if chars[i] == '@' && chars.get(i + 1) == Some(&'*') {
            result.push_str(COMMENT);
            let start = i;
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'@')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            result.extend(&chars[start..i]);
            result.push_str(RESET);
            continue;
        }

        // @keyword, @name, @#name, @&name
        if chars[i] == '@' {
            result.push_str(SIGIL);
            result.push('@');
            i += 1;
            while i < chars.len() && matches!(chars[i], '#' | '&') {
                result.push(chars[i]);
                i += 1;
            }
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                result.push(chars[i]);
                i += 1;
            }
            result.push_str(RESET);
            continue;
        }

        // <Component, </Component
        if chars[i] == '<' {
            let name_at = if chars.get(i + 1) == Some(&'/') { i + 2 } else { i + 1 };
            if chars.get(name_at).is_some_and(|c| c.is_ascii_uppercase()) {
                result.push_str(TAG);
                result.extend(&chars[i..name_at]);
                i = name_at;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(RESET);
                continue;
            }
        }

        if chars[i] == '"' {
            result.push_str(STRING);
            result.push('"');
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push(chars[i]);
                i += 1;
            }
            if i < chars.len() {
                result.push('"');
                i += 1;
            }
            result.push_str(RESET);
            continue;
        }

        result.push(chars[i]);
        i += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_points_at_span() {
        let source = "<p>\n  @if {\n</p>";
        let err = ParseError::new(ErrorKind::UnterminatedBlock, "Unterminated block", Span::new(10, 11))
            .with_help("close the block with '}'");
        let rendered = err.render(source, "page.rs.html");
        assert!(rendered.contains(" file: page.rs.html:2:7"));
        assert!(rendered.contains("error: Unterminated block"));
        assert!(rendered.contains(" 2 |   @if {"));
        assert!(rendered.contains("   |       ^"));
        assert!(rendered.contains(" help: close the block with '}'"));
    }

    #[test]
    fn test_render_related_span() {
        let source = "@* open\nnever closed";
        let err = ParseError::new(ErrorKind::UnterminatedComment, "Unterminated comment", Span::new(20, 20))
            .with_related(Span::new(0, 2))
            .with_related_label("comment opened here");
        let rendered = err.render(source, "t.rs.html");
        assert!(rendered.contains("^^ comment opened here"));
    }

    #[test]
    fn test_display_is_message() {
        let err = ParseError::new(ErrorKind::RecursionLimitExceeded, "nesting too deep", Span::point(0));
        assert_eq!(err.to_string(), "nesting too deep");
        assert!(!err.kind.is_lex_error());
        assert!(ErrorKind::UnterminatedRawBlock.is_lex_error());
    }

    #[test]
    fn test_highlight_keeps_text() {
        let line = "@if x { <Card title=\"a\"/> } @@ @* c *@";
        let highlighted = highlight_syntax(line);
        let stripped: String = {
            let mut out = String::new();
            let mut chars = highlighted.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\x1b' {
                    for c in chars.by_ref() {
                        if c == 'm' {
                            break;
                        }
                    }
                } else {
                    out.push(c);
                }
            }
            out
        };
        assert_eq!(stripped, line);
    }
}
