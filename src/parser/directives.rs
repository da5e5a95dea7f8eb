use super::fragment::{self, split_top_level};
use super::keyword::Keyword;
use super::scanner::Span;
use super::tree_builder::{Balanced, TreeBuilder};
use crate::ast::*;
use crate::error::{ErrorKind, ParseError};

impl TreeBuilder<'_> {
    /// Directive after its keyword. Arguments that do not fit the
    /// directive's shape turn the consumed head into an error node.
    pub(super) fn parse_directive(&mut self, keyword: Keyword, start: usize) -> Result<Node, ParseError> {
        let parsed = match keyword {
            Keyword::Extends => Ok(self.extends_directive()),
            Keyword::Use => Ok(self.use_directive()),
            Keyword::Include => Ok(self.parenthesized_string().map(|path| Directive::Include { path })),
            Keyword::Render => Ok(self.parenthesized_string().map(|name| Directive::Render { name })),
            Keyword::RenderBody => Ok(Some(self.empty_call(Directive::RenderBody))),
            Keyword::ChildContent => Ok(Some(self.empty_call(Directive::ChildContent))),
            Keyword::Section => return self.section_directive(start),
            Keyword::Raw => self.raw_directive(),
            Keyword::Fn => self.fn_directive(),
            _ => Ok(None),
        }?;

        match parsed {
            Some(directive) => Ok(Node::Directive(DirectiveNode {
                directive,
                span: self.scanner.span_from(start),
            })),
            None => Ok(self.malformed_directive(keyword, start)),
        }
    }

    /// `@extends`, `@extends()`, `@extends("path")`
    fn extends_directive(&mut self) -> Option<Directive> {
        if self.scanner.peek() != Some('(') {
            return Some(Directive::Extends { path: None });
        }
        self.scanner.advance();
        self.scanner.skip_whitespace();
        if self.scanner.eat(')') {
            return Some(Directive::Extends { path: None });
        }
        let path = self.string_literal()?;
        self.scanner.skip_whitespace();
        self.scanner.eat(')').then_some(Directive::Extends { path: Some(path) })
    }

    /// `@use "path" [as Alias][;]`
    fn use_directive(&mut self) -> Option<Directive> {
        self.scanner.skip_inline_whitespace();
        let path = self.string_literal()?;

        let after_path = self.scanner.pos();
        self.scanner.skip_inline_whitespace();
        let alias = if self.scanner.eat_str("as") && self.scanner.peek().is_some_and(char::is_whitespace) {
            self.scanner.skip_inline_whitespace();
            let alias_start = self.scanner.pos();
            let alias = self.scanner.consume_ident()?;
            Some(Fragment::new(alias, self.scanner.span_from(alias_start)))
        } else {
            self.scanner.reset(after_path);
            None
        };

        let before_semi = self.scanner.pos();
        self.scanner.skip_inline_whitespace();
        if !self.scanner.eat(';') {
            self.scanner.reset(before_semi);
        }
        Some(Directive::Use { path, alias })
    }

    /// `("…")`
    fn parenthesized_string(&mut self) -> Option<Fragment> {
        if !self.scanner.eat('(') {
            return None;
        }
        self.scanner.skip_whitespace();
        let value = self.string_literal()?;
        self.scanner.skip_whitespace();
        self.scanner.eat(')').then_some(value)
    }

    /// Bare keyword with an optional empty `()`
    fn empty_call(&mut self, directive: Directive) -> Directive {
        self.scanner.eat_str("()");
        directive
    }

    /// `@section name { … }` or `@section("name", value)`
    fn section_directive(&mut self, start: usize) -> Result<Node, ParseError> {
        let keyword_end = self.scanner.pos();

        if self.scanner.peek() == Some('(') {
            let open = keyword_end;
            let close = match self.balanced(start, open)? {
                Balanced::Closed(close) => close,
                Balanced::Recovered(node) => return Ok(node),
            };
            let directive = inline_section(self.scanner.source(), open + 1, close - 1);
            return Ok(match directive {
                Some(directive) => Node::Directive(DirectiveNode {
                    directive,
                    span: Span::new(start, close),
                }),
                None => self.malformed_directive(Keyword::Section, start),
            });
        }

        self.scanner.skip_inline_whitespace();
        let name_start = self.scanner.pos();
        let Some(name) = self.scanner.consume_ident() else {
            return Ok(self.malformed_directive(Keyword::Section, start));
        };
        let name = Fragment::new(name, self.scanner.span_from(name_start));

        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some('{') {
            return Ok(self.malformed_directive(Keyword::Section, start));
        }
        let (body, _) = self.parse_block("section")?;

        Ok(Node::Directive(DirectiveNode {
            directive: Directive::Section { name, body },
            span: self.scanner.span_from(start),
        }))
    }

    /// `@raw { … }`: the body is opaque, only braces are counted
    fn raw_directive(&mut self) -> Result<Option<Directive>, ParseError> {
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some('{') {
            return Ok(None);
        }

        let open = self.scanner.pos();
        self.scanner.advance();
        let body_start = self.scanner.pos();
        let mut depth = 1usize;
        while let Some(ch) = self.scanner.advance() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body_end = self.scanner.pos() - 1;
                        let body = Fragment::new(
                            self.scanner.slice(body_start, body_end),
                            Span::new(body_start, body_end),
                        );
                        return Ok(Some(Directive::Raw { body }));
                    }
                }
                _ => {}
            }
        }

        Err(ParseError::new(
            ErrorKind::UnterminatedRawBlock,
            "This raw block is never closed.",
            Span::point(self.scanner.source().len()),
        )
        .with_related(Span::new(open, open + 1))
        .with_related_label("raw block opened here")
        .with_help("Balance the braces inside '@raw { … }'"))
    }

    /// `@fn name(params) { … }`
    fn fn_directive(&mut self) -> Result<Option<Directive>, ParseError> {
        self.scanner.skip_inline_whitespace();
        let name_start = self.scanner.pos();
        let Some(name) = self.scanner.consume_ident() else {
            return Ok(None);
        };
        let name = Fragment::new(name, self.scanner.span_from(name_start));

        self.scanner.skip_inline_whitespace();
        if self.scanner.peek() != Some('(') {
            return Ok(None);
        }
        let open = self.scanner.pos();
        let Ok(close) = fragment::scan_balanced(self.scanner.source(), open, self.fragment_limit()) else {
            return Ok(None);
        };
        let params = Fragment::trimmed(self.scanner.source(), open + 1, close - 1);
        self.scanner.reset(close);

        let after_params = self.scanner.pos();
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some('{') {
            self.scanner.reset(after_params);
            return Ok(None);
        }
        let (body, _) = self.parse_block("fn")?;
        Ok(Some(Directive::Fn { name, params, body }))
    }

    /// `"…"` or `'…'` under the cursor, returning its contents.
    /// The cursor is unchanged when the literal is not closed.
    pub(super) fn string_literal(&mut self) -> Option<Fragment> {
        let quote = self.scanner.peek().filter(|c| *c == '"' || *c == '\'')?;
        let start = self.scanner.pos();
        let bytes = self.scanner.source().as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b if b == quote as u8 => {
                    let content = Fragment::new(self.scanner.slice(start + 1, i), Span::new(start + 1, i));
                    self.scanner.reset(i + 1);
                    return Some(content);
                }
                _ => i += 1,
            }
        }
        None
    }

    fn malformed_directive(&mut self, keyword: Keyword, start: usize) -> Node {
        let consumed = self.scanner.slice(start, self.scanner.pos());
        let end = start + consumed.trim_end().len();
        self.scanner.reset(end);
        self.recover(ErrorNode::new(
            ErrorNodeKind::MalformedDirective,
            format!("malformed `@{}` directive", keyword.as_str()),
            Span::new(start, end),
        ))
    }
}

/// Inline section arguments: a string literal name and a value expression
fn inline_section(source: &str, start: usize, end: usize) -> Option<Directive> {
    let inner = &source[start..end];
    let parts = split_top_level(inner, b',');
    let [(name_from, name_to), (value_from, value_to)] = parts.as_slice() else {
        return None;
    };

    let name = Fragment::trimmed(source, start + name_from, start + name_to);
    let quoted = name.text.len() >= 2
        && (name.text.starts_with('"') && name.text.ends_with('"')
            || name.text.starts_with('\'') && name.text.ends_with('\''));
    if !quoted {
        return None;
    }
    let name = Fragment::new(
        &name.text[1..name.text.len() - 1],
        Span::new(name.span.start + 1, name.span.end - 1),
    );

    let value = Fragment::trimmed(source, start + value_from, start + value_to);
    if value.is_empty() {
        return None;
    }
    Some(Directive::SectionInline { name, value })
}

#[cfg(test)]
mod tests {
    use super::super::ParseOptions;
    use super::*;

    fn build(source: &str) -> Vec<Node> {
        let options = ParseOptions::default();
        TreeBuilder::new(source, &options).build().unwrap()
    }

    fn directive(node: &Node) -> &Directive {
        match node {
            Node::Directive(d) => &d.directive,
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn test_extends_forms() {
        assert!(matches!(directive(&build("@extends")[0]), Directive::Extends { path: None }));
        assert!(matches!(directive(&build("@extends()")[0]), Directive::Extends { path: None }));
        let nodes = build("@extends(\"layouts/main.rs.html\")\n<p>");
        assert!(matches!(directive(&nodes[0]), Directive::Extends { path: Some(p) } if p.text == "layouts/main.rs.html"));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == "\n<p>"));
    }

    #[test]
    fn test_use_with_alias() {
        let nodes = build("@use \"components/card.rs.html\" as Card;\n");
        match directive(&nodes[0]) {
            Directive::Use { path, alias } => {
                assert_eq!(path.text, "components/card.rs.html");
                assert_eq!(alias.as_ref().map(|a| a.text.as_str()), Some("Card"));
            }
            other => panic!("expected use, got {:?}", other),
        }
        assert_eq!(nodes[0].span(), Span::new(0, 39));
    }

    #[test]
    fn test_use_without_alias_or_semicolon() {
        let nodes = build("@use 'card.rs.html' rest");
        assert!(matches!(directive(&nodes[0]), Directive::Use { alias: None, .. }));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == " rest"));
    }

    #[test]
    fn test_include_render_and_bodies() {
        let nodes = build("@include(\"nav.rs.html\")@render(\"scripts\")@render_body()@child_content");
        assert!(matches!(directive(&nodes[0]), Directive::Include { path } if path.text == "nav.rs.html"));
        assert!(matches!(directive(&nodes[1]), Directive::Render { name } if name.text == "scripts"));
        assert!(matches!(directive(&nodes[2]), Directive::RenderBody));
        assert!(matches!(directive(&nodes[3]), Directive::ChildContent));
    }

    #[test]
    fn test_sections() {
        let nodes = build("@section(\"title\", \"Home\")@section scripts { <script></script> }");
        assert!(matches!(directive(&nodes[0]), Directive::SectionInline { name, value } if name.text == "title" && value.text == "\"Home\""));
        assert!(matches!(directive(&nodes[1]), Directive::Section { name, body } if name.text == "scripts" && body.len() == 1));
    }

    #[test]
    fn test_raw_block_is_opaque() {
        let nodes = build("@raw { @if { } @@ } after");
        assert!(matches!(directive(&nodes[0]), Directive::Raw { body } if body.text == " @if { } @@ "));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == " after"));
    }

    #[test]
    fn test_unterminated_raw_block() {
        let options = ParseOptions::default();
        let err = TreeBuilder::new("@raw { {", &options).build().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedRawBlock);
        assert!(err.kind.is_lex_error());
    }

    #[test]
    fn test_fn_directive() {
        let nodes = build("@fn badge(label: &str) { <b>@label</b> }");
        match directive(&nodes[0]) {
            Directive::Fn { name, params, body } => {
                assert_eq!(name.text, "badge");
                assert_eq!(params.text, "label: &str");
                assert_eq!(body.len(), 3);
            }
            other => panic!("expected fn, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_directives() {
        let nodes = build("@include(nav) x");
        assert!(matches!(&nodes[0], Node::Error(e) if e.kind == ErrorNodeKind::MalformedDirective && e.span == Span::new(0, 9)));
        let nodes = build("@section 42");
        assert!(matches!(&nodes[0], Node::Error(e) if e.kind == ErrorNodeKind::MalformedDirective && e.span == Span::new(0, 8)));
        let nodes = build("@raw x");
        assert!(matches!(&nodes[0], Node::Error(e) if e.kind == ErrorNodeKind::MalformedDirective));
    }
}
