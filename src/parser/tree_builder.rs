use super::ParseOptions;
use super::fragment::{self, FragmentError};
use super::keyword::{self, Keyword};
use super::scanner::{Scanner, Span, TextMode, TextState, is_ident_start};
use crate::ast::*;
use crate::error::{ErrorKind, ParseError};
use tracing::{debug, trace};

const BOM: char = '\u{FEFF}';

/// Builds an AST by recursive descent over the scanner
pub struct TreeBuilder<'a> {
    pub(super) scanner: Scanner<'a>,
    pub(super) options: &'a ParseOptions,
    /// Open component tag names, innermost last, reset at every `{`
    pub(super) tag_stack: Vec<String>,
    /// Number of enclosing brace-delimited regions
    pub(super) braces: usize,
    depth: usize,
    content_start: usize,
}

/// Where a sequence of nodes is being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Region {
    TopLevel,
    /// Inner template `{ … }`
    Braced,
    /// Component tag body; `braced` when an inner template encloses the tag
    TagBody { braced: bool },
    /// Inline match arm body
    Arm,
}

impl Region {
    fn text_mode(self) -> TextMode {
        match self {
            Region::TopLevel | Region::TagBody { braced: false } => TextMode::Free,
            Region::Braced | Region::TagBody { braced: true } => TextMode::Braced,
            Region::Arm => TextMode::Arm,
        }
    }
}

/// What stopped a region (never consumed by `parse_region`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RegionEnd {
    Eof,
    CloseBrace,
    CloseTag,
    Comma,
    /// A `}` while text still holds an open `(` or `[`; carries the closer expected instead
    Unbalanced(char),
}

/// Outcome of scanning a balanced fragment that may be recovered locally
pub(super) enum Balanced {
    Closed(usize),
    Recovered(Node),
}

impl<'a> TreeBuilder<'a> {
    pub fn new(source: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            scanner: Scanner::new(source),
            options,
            tag_stack: Vec::new(),
            braces: 0,
            depth: 0,
            content_start: 0,
        }
    }

    pub fn content_start(&self) -> usize {
        self.content_start
    }

    pub fn build(&mut self) -> Result<Vec<Node>, ParseError> {
        let source = self.scanner.source();
        debug!(bytes = source.len(), "parsing template");

        if source.starts_with(BOM) {
            self.content_start = BOM.len_utf8();
            self.scanner.reset(self.content_start);
        }

        let mut nodes = Vec::new();
        if self.options.parameter_header {
            if let Some((leading, header)) = self.parse_parameter_header() {
                nodes.extend(leading);
                nodes.push(header);
            }
        }

        let (body, _) = self.parse_region(Region::TopLevel)?;
        nodes.extend(body);

        debug!(nodes = nodes.len(), "parsed template");
        Ok(nodes)
    }

    /// Parse nodes until the region's terminator, which is left unconsumed.
    pub(super) fn parse_region(&mut self, region: Region) -> Result<(Vec<Node>, RegionEnd), ParseError> {
        let mode = region.text_mode();
        let mut nodes = Vec::new();
        let mut state = TextState::default();

        loop {
            let Some(ch) = self.scanner.peek() else {
                return Ok((nodes, RegionEnd::Eof));
            };

            if mode != TextMode::Free && !state.in_string {
                match ch {
                    '}' if state.open.is_empty() => return Ok((nodes, RegionEnd::CloseBrace)),
                    '}' if !state.closes('}') => {
                        let expected = state.open.last().copied().unwrap_or('}');
                        return Ok((nodes, RegionEnd::Unbalanced(expected)));
                    }
                    ',' if mode == TextMode::Arm && state.open.is_empty() => {
                        return Ok((nodes, RegionEnd::Comma));
                    }
                    _ => {}
                }
            }

            if self.scanner.at_component_close() {
                if matches!(region, Region::TagBody { .. }) {
                    return Ok((nodes, RegionEnd::CloseTag));
                }
                nodes.push(self.stray_close_tag());
                continue;
            }

            if self.scanner.at_component_open() {
                nodes.push(self.parse_component_tag()?);
                continue;
            }

            if self.scanner.at_sigil() {
                nodes.push(self.parse_sigil()?);
                continue;
            }

            if let Some((content, span)) = self.scanner.scan_text(mode, &mut state) {
                nodes.push(Node::Text(TextNode { content, span }));
            }
        }
    }

    /// Parse a `{ … }` inner template. The cursor must be on the `{`.
    pub(super) fn parse_block(&mut self, what: &str) -> Result<(Vec<Node>, Span), ParseError> {
        let open = self.scanner.pos();
        debug_assert_eq!(self.scanner.peek(), Some('{'));
        self.scanner.advance();

        self.enter()?;
        let tags = std::mem::take(&mut self.tag_stack);
        self.braces += 1;
        let (nodes, end) = self.parse_region(Region::Braced)?;
        self.braces -= 1;
        self.tag_stack = tags;
        self.leave();

        match end {
            RegionEnd::CloseBrace => {
                self.scanner.advance();
                Ok((nodes, self.scanner.span_from(open)))
            }
            _ => Err(self.unterminated_block(what, open)),
        }
    }

    /// Dispatch on the character after an unescaped `@`
    pub(super) fn parse_sigil(&mut self) -> Result<Node, ParseError> {
        let start = self.scanner.pos();
        debug_assert!(self.scanner.at_sigil());

        match self.scanner.peek_nth(1) {
            Some('*') => self.parse_comment(),
            Some('{') => self.parse_code_block(start),
            Some('(') => self.parse_paren_expression(start, start + 1, false),
            Some('#') => self.parse_raw_output(start),
            Some(c) if is_ident_start(c) => {
                let rest = &self.scanner.source()[start + 1..];
                if let Some((keyword, len)) = keyword::recognize(rest) {
                    self.scanner.reset(start + 1 + len);
                    return self.parse_keyword(keyword, start);
                }
                if c.is_ascii_uppercase() {
                    if let Some(node) = self.try_component_call(start)? {
                        return Ok(node);
                    }
                }
                self.parse_simple_expression(start, start + 1, false)
            }
            Some('&') => self.parse_simple_expression(start, start + 1, false),
            _ => Ok(self.invalid_sigil(start, start + 1)),
        }
    }

    /// The keyword itself has been consumed
    fn parse_keyword(&mut self, keyword: Keyword, start: usize) -> Result<Node, ParseError> {
        match keyword {
            Keyword::If => self.parse_if(start),
            Keyword::For | Keyword::While => self.parse_loop(keyword, start),
            Keyword::Match => self.parse_match(start),
            Keyword::Else => self.unexpected_else(start),
            Keyword::Continue | Keyword::Break => {
                let statement = if keyword == Keyword::Continue {
                    Statement::Continue
                } else {
                    Statement::Break
                };
                Ok(Node::Statement(StatementNode {
                    statement,
                    span: self.scanner.span_from(start),
                }))
            }
            _ => self.parse_directive(keyword, start),
        }
    }

    fn parse_comment(&mut self) -> Result<Node, ParseError> {
        let start = self.scanner.pos();
        match self.scanner.consume_comment() {
            Some(content) => Ok(Node::Comment(CommentNode {
                content: content.slice(self.scanner.source()).to_string(),
                span: self.scanner.span_from(start),
            })),
            None => Err(ParseError::new(
                ErrorKind::UnterminatedComment,
                "This comment is never closed.",
                Span::point(self.scanner.source().len()),
            )
            .with_related(Span::new(start, start + 2))
            .with_related_label("comment opened here")
            .with_help("Close the comment with '*@'")),
        }
    }

    fn parse_code_block(&mut self, start: usize) -> Result<Node, ParseError> {
        let open = start + 1;
        match self.balanced(start, open)? {
            Balanced::Closed(end) => Ok(Node::CodeBlock(CodeBlockNode {
                code: self.scanner.slice(open + 1, end - 1).to_string(),
                span: Span::new(start, end),
            })),
            Balanced::Recovered(node) => Ok(node),
        }
    }

    /// `@(…)` or `@#(…)`; `open` is the offset of the `(`
    fn parse_paren_expression(&mut self, start: usize, open: usize, raw_output: bool) -> Result<Node, ParseError> {
        match self.balanced(start, open)? {
            Balanced::Closed(end) => Ok(Node::Expression(ExpressionNode {
                kind: ExpressionKind::Paren,
                code: self.scanner.slice(open + 1, end - 1).to_string(),
                raw_output,
                span: Span::new(start, end),
            })),
            Balanced::Recovered(node) => Ok(node),
        }
    }

    fn parse_raw_output(&mut self, start: usize) -> Result<Node, ParseError> {
        let after = start + 2;
        self.scanner.reset(after);
        match self.scanner.peek() {
            Some('(') => self.parse_paren_expression(start, after, true),
            Some(c) if is_ident_start(c) || c == '&' => self.parse_simple_expression(start, after, true),
            _ => Ok(self.invalid_sigil(start, after)),
        }
    }

    /// `@name.field[0]`, `@&value`, `@#name`; `chain_start` is the offset after the sigil
    fn parse_simple_expression(&mut self, start: usize, chain_start: usize, raw_output: bool) -> Result<Node, ParseError> {
        let source = self.scanner.source();
        match fragment::scan_chain(source, chain_start, self.fragment_limit()) {
            Ok(Some(chain)) => {
                self.scanner.reset(chain.end);
                Ok(Node::Expression(ExpressionNode {
                    kind: ExpressionKind::Simple {
                        refs: chain.refs,
                        segments: chain.segments,
                    },
                    code: source[chain_start..chain.end].to_string(),
                    raw_output,
                    span: Span::new(start, chain.end),
                }))
            }
            Ok(None) => Ok(self.invalid_sigil(start, chain_start)),
            Err(err) => self.fragment_error(start, err),
        }
    }

    /// `@Name(p: v, …) { … }`. Returns `None` (cursor unchanged) when the
    /// identifier is not followed by a parameter list and a block.
    fn try_component_call(&mut self, start: usize) -> Result<Option<Node>, ParseError> {
        let source = self.scanner.source();
        let name_start = start + 1;
        let name_len = super::scanner::ident_len(&source[name_start..]);
        let open = name_start + name_len;
        if source.as_bytes().get(open) != Some(&b'(') {
            return Ok(None);
        }
        let Ok(close) = fragment::scan_balanced(source, open, self.fragment_limit()) else {
            return Ok(None);
        };
        self.scanner.reset(close);
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some('{') {
            self.scanner.reset(start);
            return Ok(None);
        }

        let name = Fragment::new(&source[name_start..open], Span::new(name_start, open));
        let parameters = call_parameters(source, open + 1, close - 1);

        self.enter()?;
        let (body, _) = self.parse_block("component")?;
        self.leave();
        let span = self.scanner.span_from(start);

        let Some(parameters) = parameters else {
            return Ok(Some(self.recover(
                ErrorNode::new(
                    ErrorNodeKind::MalformedTag,
                    format!("parameters of `@{}` must be `name: value` pairs", name.text),
                    span,
                )
                .with_children(body),
            )));
        };

        Ok(Some(Node::Component(ComponentNode {
            name,
            syntax: ComponentSyntax::Call,
            parameters,
            body,
            self_closing: false,
            span,
        })))
    }

    /// `@else` with no `if` to attach to
    fn unexpected_else(&mut self, start: usize) -> Result<Node, ParseError> {
        let keyword_end = self.scanner.pos();
        self.scanner.skip_whitespace();

        let mut children = Vec::new();
        if self.scanner.peek() == Some('{') {
            let (nodes, _) = self.parse_block("else")?;
            children = nodes;
        } else if let Some((Keyword::If, len)) = keyword::recognize(self.scanner.rest()) {
            let if_start = self.scanner.pos();
            self.scanner.advance_by(len);
            children.push(self.parse_if(if_start)?);
        } else {
            self.scanner.reset(keyword_end);
        }

        Ok(self.recover(
            ErrorNode::new(
                ErrorNodeKind::UnexpectedElse,
                "`else` without a preceding `@if` block",
                self.scanner.span_from(start),
            )
            .with_children(children),
        ))
    }

    /// `</Name>` with no open tag in this region
    fn stray_close_tag(&mut self) -> Node {
        let start = self.scanner.pos();
        let name = self.consume_close_tag().unwrap_or_default();
        self.recover(ErrorNode::new(
            ErrorNodeKind::UnmatchedTag,
            format!("closing tag `</{}>` has no matching opening tag", name),
            self.scanner.span_from(start),
        ))
    }

    /// Leading `@(name: Type, …);`, preceded by optional whitespace
    fn parse_parameter_header(&mut self) -> Option<(Option<Node>, Node)> {
        let source = self.scanner.source();
        let begin = self.scanner.pos();
        let ws = self.scanner.skip_whitespace();
        let start = self.scanner.pos();

        let header = (|| {
            if !self.scanner.starts_with("@(") {
                return None;
            }
            let open = start + 1;
            let close = fragment::scan_balanced(source, open, self.options.max_depth).ok()?;
            let params = template_parameters(source, open + 1, close - 1)?;
            self.scanner.reset(close);
            self.scanner.skip_whitespace();
            if !self.scanner.eat(';') {
                return None;
            }
            Some(Node::Parameters(ParametersNode {
                params,
                span: self.scanner.span_from(start),
            }))
        })();

        let Some(header) = header else {
            self.scanner.reset(begin);
            return None;
        };

        let leading = (ws > 0).then(|| {
            Node::Text(TextNode {
                content: source[begin..start].to_string(),
                span: Span::new(begin, start),
            })
        });
        Some((leading, header))
    }

    /// Scan a balanced fragment opening at `open`, recovering a mismatched
    /// closer as an error node that starts at `start`.
    pub(super) fn balanced(&mut self, start: usize, open: usize) -> Result<Balanced, ParseError> {
        match fragment::scan_balanced(self.scanner.source(), open, self.fragment_limit()) {
            Ok(end) => {
                self.scanner.reset(end);
                Ok(Balanced::Closed(end))
            }
            Err(err) => self.fragment_error(start, err).map(Balanced::Recovered),
        }
    }

    pub(super) fn fragment_error(&mut self, start: usize, err: FragmentError) -> Result<Node, ParseError> {
        let source = self.scanner.source();
        match err {
            FragmentError::Mismatched { at, found, open } => {
                let expected = closer(source.as_bytes()[open]);
                self.scanner.reset(at);
                Ok(self.recover(ErrorNode::new(
                    ErrorNodeKind::UnbalancedDelimiter,
                    format!("expected `{}` before `{}`", expected, found),
                    Span::new(start, at),
                )))
            }
            FragmentError::Unterminated { open } => {
                let opener = source.as_bytes()[open] as char;
                Err(ParseError::new(
                    ErrorKind::UnbalancedDelimiter,
                    format!("This `{}` is never closed.", opener),
                    Span::point(source.len()),
                )
                .with_related(Span::new(open, open + 1))
                .with_help(format!("Add the matching `{}`", closer(opener as u8))))
            }
            FragmentError::TooDeep { at } => Err(self.too_deep(at)),
        }
    }

    pub(super) fn invalid_sigil(&mut self, start: usize, end: usize) -> Node {
        self.scanner.reset(end);
        self.recover(ErrorNode::new(
            ErrorNodeKind::InvalidSigil,
            "expected an expression, keyword or block after `@` (write `@@` for a literal `@`)",
            Span::new(start, end),
        ))
    }

    /// Consume `</Name` and the closing `>`, returning the name.
    /// Returns `None` when the `>` is missing.
    pub(super) fn consume_close_tag(&mut self) -> Option<String> {
        debug_assert!(self.scanner.at_component_close());
        self.scanner.advance_by(2);
        let name = self.consume_tag_name();
        self.scanner.skip_whitespace();
        self.scanner.eat('>').then_some(name)
    }

    /// `Name` or `Name.Part`, the cursor on the first letter
    pub(super) fn consume_tag_name(&mut self) -> String {
        let mut name = self.scanner.consume_while(|c| c.is_ascii_alphanumeric() || c == '_').to_string();
        while self.scanner.peek() == Some('.') && self.scanner.peek_nth(1).is_some_and(is_ident_start) {
            self.scanner.advance();
            name.push('.');
            name.push_str(self.scanner.consume_while(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
        name
    }

    pub(super) fn recover(&self, error: ErrorNode) -> Node {
        trace!(
            kind = error.kind.as_str(),
            start = error.span.start,
            end = error.span.end,
            "recovered from malformed construct"
        );
        Node::Error(error)
    }

    pub(super) fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(self.too_deep(self.scanner.pos()));
        }
        Ok(())
    }

    pub(super) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Delimiter nesting still available to a fragment at the current depth
    pub(super) fn fragment_limit(&self) -> usize {
        self.options.max_depth.saturating_sub(self.depth)
    }

    fn too_deep(&self, at: usize) -> ParseError {
        ParseError::new(
            ErrorKind::RecursionLimitExceeded,
            format!("Nesting exceeds the limit of {} levels.", self.options.max_depth),
            Span::point(at),
        )
        .with_help("Flatten the template or raise the depth limit")
    }

    pub(super) fn unterminated_block(&self, what: &str, open: usize) -> ParseError {
        ParseError::new(
            ErrorKind::UnterminatedBlock,
            format!("This {} block is never closed.", what),
            Span::point(self.scanner.source().len()),
        )
        .with_related(Span::new(open, open + 1))
        .with_related_label("block opened here")
        .with_help("Close the block with '}'")
    }
}

fn closer(open: u8) -> char {
    match open {
        b'(' => ')',
        b'[' => ']',
        _ => '}',
    }
}

/// Parse `name: Type, …` between `start` and `end`. Every entry must have
/// that shape; a trailing comma is allowed.
fn template_parameters(source: &str, start: usize, end: usize) -> Option<Vec<TemplateParam>> {
    let inner = &source[start..end];
    let mut params = Vec::new();
    for (from, to) in fragment::split_top_level(inner, b',') {
        let entry = &inner[from..to];
        if entry.trim().is_empty() {
            continue;
        }
        let (name, ty) = name_colon_value(source, start + from, start + to)?;
        if super::scanner::ident_len(&name.text) != name.text.len() || ty.is_empty() {
            return None;
        }
        params.push(TemplateParam { name, ty });
    }
    (!params.is_empty()).then_some(params)
}

/// Parse component call parameters `name: value, …` between `start` and `end`
fn call_parameters(source: &str, start: usize, end: usize) -> Option<Vec<ComponentParam>> {
    let inner = &source[start..end];
    let mut params = Vec::new();
    for (from, to) in fragment::split_top_level(inner, b',') {
        if inner[from..to].trim().is_empty() {
            continue;
        }
        let (name, value) = name_colon_value(source, start + from, start + to)?;
        if super::scanner::ident_len(&name.text) != name.text.len() || value.is_empty() {
            return None;
        }
        let span = name.span.to(value.span);
        params.push(ComponentParam {
            name,
            value: rust_value(value),
            span,
        });
    }
    Some(params)
}

/// Split `source[start..end]` at its first single `:` into two trimmed fragments
fn name_colon_value(source: &str, start: usize, end: usize) -> Option<(Fragment, Fragment)> {
    let entry = &source[start..end];
    let bytes = entry.as_bytes();
    let colon = (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && bytes.get(i + 1) != Some(&b':') && (i == 0 || bytes[i - 1] != b':')
    })?;
    let name = Fragment::trimmed(source, start, start + colon);
    let value = Fragment::trimmed(source, start + colon + 1, end);
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Classify a call-syntax parameter value
fn rust_value(value: Fragment) -> ParamValue {
    let text = value.text.as_str();
    match text {
        "true" => return ParamValue::Bool(true),
        "false" => return ParamValue::Bool(false),
        _ => {}
    }
    if is_number(text) {
        return ParamValue::Number(value.text);
    }
    let quoted = text.len() >= 2 && text.starts_with('"') && text.ends_with('"');
    if quoted && !text[1..text.len() - 1].contains('"') {
        let span = Span::new(value.span.start + 1, value.span.end - 1);
        return ParamValue::String(Fragment::new(&text[1..text.len() - 1], span));
    }
    ParamValue::Rust(value)
}

/// `-?\d+(\.\d+)?`
pub(super) fn is_number(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str) -> Result<Vec<Node>, ParseError> {
        let options = ParseOptions::default();
        TreeBuilder::new(source, &options).build()
    }

    #[test]
    fn test_text_and_simple_expression() {
        let nodes = build("<p>Hello @user.name!</p>").unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[0], Node::Text(t) if t.content == "<p>Hello "));
        match &nodes[1] {
            Node::Expression(expr) => {
                assert_eq!(expr.code, "user.name");
                assert_eq!(expr.span, Span::new(9, 19));
                assert!(matches!(&expr.kind, ExpressionKind::Simple { refs: 0, segments } if segments.len() == 2));
            }
            other => panic!("expected expression, got {:?}", other),
        }
        assert!(matches!(&nodes[2], Node::Text(t) if t.content == "!</p>"));
    }

    #[test]
    fn test_paren_and_raw_expressions() {
        let nodes = build("@(a + b) @#(html) @#body").unwrap();
        assert!(matches!(&nodes[0], Node::Expression(e) if e.kind == ExpressionKind::Paren && e.code == "a + b" && !e.raw_output));
        assert!(matches!(&nodes[2], Node::Expression(e) if e.code == "html" && e.raw_output));
        assert!(matches!(&nodes[4], Node::Expression(e) if e.code == "body" && e.raw_output));
    }

    #[test]
    fn test_borrow_expression() {
        let nodes = build("@&&item").unwrap();
        assert!(matches!(&nodes[0], Node::Expression(e) if matches!(e.kind, ExpressionKind::Simple { refs: 2, .. }) && e.code == "&&item"));
    }

    #[test]
    fn test_code_block() {
        let nodes = build("@{ let x = { 1 }; } after").unwrap();
        assert!(matches!(&nodes[0], Node::CodeBlock(c) if c.code == " let x = { 1 }; "));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == " after"));
    }

    #[test]
    fn test_comment() {
        let nodes = build("a@* note *@b").unwrap();
        assert!(matches!(&nodes[1], Node::Comment(c) if c.content == " note "));
        assert!(matches!(&nodes[2], Node::Text(t) if t.content == "b"));
    }

    #[test]
    fn test_unterminated_comment_is_fatal() {
        let err = build("a @* b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedComment);
        assert_eq!(err.related_span, Some(Span::new(2, 4)));
    }

    #[test]
    fn test_invalid_sigil() {
        let nodes = build("a @ b").unwrap();
        assert!(matches!(&nodes[1], Node::Error(e) if e.kind == ErrorNodeKind::InvalidSigil && e.span == Span::new(2, 3)));
        assert!(matches!(&nodes[2], Node::Text(t) if t.content == " b"));
    }

    #[test]
    fn test_trailing_sigil() {
        let nodes = build("end@").unwrap();
        assert!(matches!(&nodes[1], Node::Error(e) if e.kind == ErrorNodeKind::InvalidSigil));
    }

    #[test]
    fn test_mismatched_delimiter_recovers_before_closer() {
        let nodes = build("@if x { @(a } tail").unwrap();
        match &nodes[0] {
            Node::Statement(stmt) => match &stmt.statement {
                Statement::If(if_stmt) => {
                    assert!(matches!(&if_stmt.body[1], Node::Error(e) if e.kind == ErrorNodeKind::UnbalancedDelimiter && e.span == Span::new(8, 12)));
                }
                other => panic!("expected if, got {:?}", other),
            },
            other => panic!("expected statement, got {:?}", other),
        }
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == " tail"));
    }

    #[test]
    fn test_unterminated_paren_is_fatal() {
        let err = build("@(a + b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnbalancedDelimiter);
    }

    #[test]
    fn test_unterminated_block_is_fatal() {
        let err = build("@for x in y { <li>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedBlock);
        assert_eq!(err.related_span, Some(Span::new(12, 13)));
    }

    #[test]
    fn test_recursion_limit() {
        let options = ParseOptions {
            max_depth: 4,
            ..ParseOptions::default()
        };
        let source = "@if a { @if b { @if c { @if d { @if e { x } } } } }";
        let err = TreeBuilder::new(source, &options).build().unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimitExceeded);
    }

    #[test]
    fn test_parameter_header() {
        let nodes = build("\n@(title: &str, items: Vec<(u8, u8)>);\n<h1>@title</h1>").unwrap();
        assert!(matches!(&nodes[0], Node::Text(t) if t.content == "\n"));
        match &nodes[1] {
            Node::Parameters(header) => {
                assert_eq!(header.params.len(), 2);
                assert_eq!(header.params[0].name.text, "title");
                assert_eq!(header.params[1].ty.text, "Vec<(u8, u8)>");
            }
            other => panic!("expected parameters, got {:?}", other),
        }
    }

    #[test]
    fn test_paren_expression_is_not_a_header() {
        let nodes = build("@(a + b); done").unwrap();
        assert!(matches!(&nodes[0], Node::Expression(e) if e.kind == ExpressionKind::Paren));
    }

    #[test]
    fn test_header_disabled() {
        let options = ParseOptions {
            parameter_header: false,
            ..ParseOptions::default()
        };
        let nodes = TreeBuilder::new("@(x: u8);", &options).build().unwrap();
        assert!(matches!(&nodes[0], Node::Expression(_)));
    }

    #[test]
    fn test_bom_skipped() {
        let options = ParseOptions::default();
        let source = "\u{FEFF}hi";
        let mut builder = TreeBuilder::new(source, &options);
        let nodes = builder.build().unwrap();
        assert_eq!(builder.content_start(), 3);
        assert!(matches!(&nodes[0], Node::Text(t) if t.span == Span::new(3, 5)));
    }

    #[test]
    fn test_component_call() {
        let nodes = build("@Card(title: \"Hi\", count: 3, user: user.clone()) { body }").unwrap();
        match &nodes[0] {
            Node::Component(c) => {
                assert_eq!(c.syntax, ComponentSyntax::Call);
                assert_eq!(c.name.text, "Card");
                assert_eq!(c.parameters.len(), 3);
                assert!(matches!(&c.parameters[0].value, ParamValue::String(s) if s.text == "Hi"));
                assert!(matches!(&c.parameters[1].value, ParamValue::Number(n) if n == "3"));
                assert!(matches!(&c.parameters[2].value, ParamValue::Rust(r) if r.text == "user.clone()"));
                assert!(matches!(&c.body[0], Node::Text(t) if t.content == " body "));
            }
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_uppercase_call_without_block_is_expression() {
        let nodes = build("@Some(x) done").unwrap();
        assert!(matches!(&nodes[0], Node::Expression(e) if e.code == "Some(x)"));
    }

    #[test]
    fn test_stray_close_tag() {
        let nodes = build("a</Card>b").unwrap();
        assert!(matches!(&nodes[1], Node::Error(e) if e.kind == ErrorNodeKind::UnmatchedTag && e.span == Span::new(1, 8)));
        assert!(matches!(&nodes[2], Node::Text(t) if t.content == "b"));
    }

    #[test]
    fn test_unexpected_else() {
        let nodes = build("@else { x } y").unwrap();
        match &nodes[0] {
            Node::Error(e) => {
                assert_eq!(e.kind, ErrorNodeKind::UnexpectedElse);
                assert_eq!(e.children.len(), 1);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_number() {
        assert!(is_number("42"));
        assert!(is_number("-3.14"));
        assert!(!is_number("3."));
        assert!(!is_number("-"));
        assert!(!is_number("1e5"));
    }
}
