use super::tree_builder::{Region, RegionEnd, TreeBuilder, is_number};
use crate::ast::*;
use crate::error::ParseError;

impl TreeBuilder<'_> {
    /// `<Name attrs…>body</Name>` or `<Name attrs…/>`
    pub(super) fn parse_component_tag(&mut self) -> Result<Node, ParseError> {
        let start = self.scanner.pos();
        debug_assert!(self.scanner.at_component_open());
        self.scanner.advance();

        let name_start = self.scanner.pos();
        let name_text = self.consume_tag_name();
        let name = Fragment::new(name_text, self.scanner.span_from(name_start));

        self.enter()?;
        let head = self.parse_tag_head()?;
        let (parameters, self_closing) = match head {
            Ok(head) => head,
            Err(children) => {
                self.skip_malformed_head();
                self.leave();
                return Ok(self.recover(
                    ErrorNode::new(
                        ErrorNodeKind::MalformedTag,
                        format!("malformed `<{}>` tag", name.text),
                        self.scanner.span_from(start),
                    )
                    .with_children(children),
                ));
            }
        };

        if self_closing {
            self.leave();
            return Ok(Node::Component(ComponentNode {
                name,
                syntax: ComponentSyntax::Tag,
                parameters,
                body: Vec::new(),
                self_closing: true,
                span: self.scanner.span_from(start),
            }));
        }

        self.tag_stack.push(name.text.clone());
        let (body, end) = self.parse_region(Region::TagBody { braced: self.braces > 0 })?;
        self.tag_stack.pop();
        self.leave();

        let node = match end {
            RegionEnd::CloseTag => self.close_tag(start, name, parameters, body),
            _ => {
                let children = param_nodes(parameters).chain(body).collect();
                self.recover(
                    ErrorNode::new(
                        ErrorNodeKind::UnclosedTag,
                        format!("`<{}>` is never closed", name.text),
                        self.scanner.span_from(start),
                    )
                    .with_children(children),
                )
            }
        };
        Ok(node)
    }

    /// Match the closing tag under the cursor against the open tag
    fn close_tag(&mut self, start: usize, name: Fragment, parameters: Vec<ComponentParam>, body: Vec<Node>) -> Node {
        let close_start = self.scanner.pos();
        let close_name = self.peek_close_name();

        if close_name == name.text {
            if self.consume_close_tag().is_some() {
                return Node::Component(ComponentNode {
                    name,
                    syntax: ComponentSyntax::Tag,
                    parameters,
                    body,
                    self_closing: false,
                    span: self.scanner.span_from(start),
                });
            }
            let children = param_nodes(parameters).chain(body).collect();
            return self.recover(
                ErrorNode::new(
                    ErrorNodeKind::MalformedTag,
                    format!("closing tag `</{}` is missing its `>`", name.text),
                    self.scanner.span_from(start),
                )
                .with_children(children),
            );
        }

        // A close tag for an enclosing component is left for that component
        let end = if self.tag_stack.contains(&close_name) {
            close_start
        } else {
            self.consume_close_tag();
            self.scanner.pos()
        };
        let children = param_nodes(parameters).chain(body).collect();
        self.recover(
            ErrorNode::new(
                ErrorNodeKind::UnmatchedTag,
                format!("`<{}>` is closed by `</{}>`", name.text, close_name),
                Span::new(start, end),
            )
            .with_children(children),
        )
    }

    /// Name of the `</Name` under the cursor, without consuming it
    fn peek_close_name(&mut self) -> String {
        let pos = self.scanner.pos();
        self.scanner.advance_by(2);
        let name = self.consume_tag_name();
        self.scanner.reset(pos);
        name
    }

    /// Attributes up to `>` or `/>`, and whether the tag self-closes. A
    /// malformed head yields the nodes parsed in its attribute values.
    fn parse_tag_head(&mut self) -> Result<Result<(Vec<ComponentParam>, bool), Vec<Node>>, ParseError> {
        let mut parameters: Vec<ComponentParam> = Vec::new();

        loop {
            let gap = self.scanner.skip_whitespace();
            match self.scanner.peek() {
                Some('>') => {
                    self.scanner.advance();
                    return Ok(Ok((parameters, false)));
                }
                Some('/') if self.scanner.starts_with("/>") => {
                    self.scanner.advance_by(2);
                    return Ok(Ok((parameters, true)));
                }
                Some(c) if gap > 0 && is_attribute_start(c) => {
                    match self.parse_attribute()? {
                        Some(param) => parameters.push(param),
                        None => return Ok(Err(param_nodes(parameters).collect())),
                    }
                }
                _ => return Ok(Err(param_nodes(parameters).collect())),
            }
        }
    }

    /// `name`, `name="…"`, `name={ … }`, `name=@expr`, `name=true`, `name=-1.5`
    fn parse_attribute(&mut self) -> Result<Option<ComponentParam>, ParseError> {
        let name_start = self.scanner.pos();
        let name_text = self
            .scanner
            .consume_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let name = Fragment::new(name_text, self.scanner.span_from(name_start));

        let after_name = self.scanner.pos();
        self.scanner.skip_whitespace();
        if !self.scanner.eat('=') {
            self.scanner.reset(after_name);
            return Ok(Some(ComponentParam {
                name,
                value: ParamValue::Flag,
                span: self.scanner.span_from(name_start),
            }));
        }
        self.scanner.skip_whitespace();

        let value = match self.scanner.peek() {
            Some('"') | Some('\'') => match self.string_literal() {
                Some(content) => ParamValue::String(content),
                None => return Ok(None),
            },
            Some('{') => {
                let (nodes, _) = self.parse_block("attribute")?;
                ParamValue::Block(nodes)
            }
            Some('@') if self.scanner.at_sigil() => ParamValue::Expression(Box::new(self.parse_sigil()?)),
            Some(_) => {
                let word = self
                    .scanner
                    .consume_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
                match word {
                    "true" => ParamValue::Bool(true),
                    "false" => ParamValue::Bool(false),
                    _ if is_number(word) => ParamValue::Number(word.to_string()),
                    _ => return Ok(None),
                }
            }
            None => return Ok(None),
        };

        Ok(Some(ComponentParam {
            name,
            value,
            span: self.scanner.span_from(name_start),
        }))
    }

    /// Skip the rest of a broken tag head: through the next `>`, stopping
    /// early at anything that starts other markup or code.
    fn skip_malformed_head(&mut self) {
        while let Some(c) = self.scanner.peek() {
            match c {
                '>' => {
                    self.scanner.advance();
                    return;
                }
                '<' | '@' | '{' | '}' | '\n' => return,
                _ => {
                    self.scanner.advance();
                }
            }
        }
    }
}

fn is_attribute_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn param_nodes(parameters: Vec<ComponentParam>) -> impl Iterator<Item = Node> {
    parameters.into_iter().flat_map(|p| p.value.into_nodes())
}

#[cfg(test)]
mod tests {
    use super::super::ParseOptions;
    use super::*;

    fn build(source: &str) -> Vec<Node> {
        let options = ParseOptions::default();
        TreeBuilder::new(source, &options).build().unwrap()
    }

    fn component(node: &Node) -> &ComponentNode {
        match node {
            Node::Component(c) => c,
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_self_closing() {
        let nodes = build("<Foo bar=\"1\"/>");
        assert_eq!(nodes.len(), 1);
        let c = component(&nodes[0]);
        assert!(c.self_closing);
        assert!(c.body.is_empty());
        assert_eq!(c.parameters.len(), 1);
        assert_eq!(c.parameters[0].name.text, "bar");
        assert!(matches!(&c.parameters[0].value, ParamValue::String(s) if s.text == "1" && s.span == Span::new(10, 11)));
    }

    #[test]
    fn test_attribute_kinds() {
        let nodes = build("<Card disabled count=3 ratio=-0.5 open=false title=@page.title slot={ <b>x</b> }></Card>");
        let c = component(&nodes[0]);
        let values: Vec<_> = c.parameters.iter().map(|p| &p.value).collect();
        assert!(matches!(values[0], ParamValue::Flag));
        assert!(matches!(values[1], ParamValue::Number(n) if n == "3"));
        assert!(matches!(values[2], ParamValue::Number(n) if n == "-0.5"));
        assert!(matches!(values[3], ParamValue::Bool(false)));
        assert!(matches!(values[4], ParamValue::Expression(e) if matches!(e.as_ref(), Node::Expression(x) if x.code == "page.title")));
        assert!(matches!(values[5], ParamValue::Block(nodes) if nodes.len() == 1));
        assert!(c.body.is_empty());
    }

    #[test]
    fn test_body_and_dotted_name() {
        let nodes = build("<Ui.Card>Hello @name</Ui.Card>!");
        let c = component(&nodes[0]);
        assert_eq!(c.name.text, "Ui.Card");
        assert_eq!(c.body.len(), 2);
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == "!"));
    }

    #[test]
    fn test_html_tags_are_text() {
        let nodes = build("<div class=\"a\"><Foo/></div>");
        assert!(matches!(&nodes[0], Node::Text(t) if t.content == "<div class=\"a\">"));
        assert!(matches!(&nodes[2], Node::Text(t) if t.content == "</div>"));
    }

    #[test]
    fn test_mismatched_close_left_for_ancestor() {
        let nodes = build("<Foo><Bar></Foo></Bar>after");
        let foo = component(&nodes[0]);
        assert!(matches!(&foo.body[0], Node::Error(e) if e.kind == ErrorNodeKind::UnmatchedTag && e.span == Span::new(5, 10)));
        assert!(matches!(&nodes[1], Node::Error(e) if e.kind == ErrorNodeKind::UnmatchedTag));
        assert!(matches!(&nodes[2], Node::Text(t) if t.content == "after"));
    }

    #[test]
    fn test_mismatched_close_consumed() {
        let nodes = build("<Foo>x</Bar>y");
        assert!(matches!(&nodes[0], Node::Error(e) if e.kind == ErrorNodeKind::UnmatchedTag && e.span == Span::new(0, 12) && e.children.len() == 1));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == "y"));
    }

    #[test]
    fn test_unclosed_tag_in_block() {
        let nodes = build("@if a { <Foo>x } y");
        let Node::Statement(stmt) = &nodes[0] else { panic!("expected statement") };
        let Statement::If(if_stmt) = &stmt.statement else { panic!("expected if") };
        assert!(matches!(&if_stmt.body[1], Node::Error(e) if e.kind == ErrorNodeKind::UnclosedTag));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == " y"));
    }

    #[test]
    fn test_unclosed_tag_at_eof() {
        let nodes = build("<Foo>x");
        assert!(matches!(&nodes[0], Node::Error(e) if e.kind == ErrorNodeKind::UnclosedTag && e.span == Span::new(0, 6)));
    }

    #[test]
    fn test_malformed_head() {
        let nodes = build("<Foo x=? y>body");
        assert!(matches!(&nodes[0], Node::Error(e) if e.kind == ErrorNodeKind::MalformedTag && e.span == Span::new(0, 11)));
        assert!(matches!(&nodes[1], Node::Text(t) if t.content == "body"));
    }
}
