use serde::Serialize;
use std::sync::Arc;

pub use crate::error::ErrorNodeKind;
// Re-export Span from the scanner so the whole crate uses a single Span type
pub use crate::parser::scanner::Span;

/// Syntax tree of one template
#[derive(Debug, Clone, Serialize)]
pub struct Ast {
    pub nodes: Vec<Node>,
    #[serde(skip)]
    pub source: Arc<str>,
    /// Offset of the first template byte (3 when the source starts with a BOM)
    pub content_start: usize,
}

impl Ast {
    pub fn new(nodes: Vec<Node>, source: Arc<str>, content_start: usize) -> Self {
        Self { nodes, source, content_start }
    }

    pub fn text(&self, span: Span) -> &str {
        span.slice(&self.source)
    }

    /// All error nodes in document order
    pub fn errors(&self) -> Vec<&ErrorNode> {
        let mut collector = ErrorCollector::default();
        crate::transform::walk(&self.nodes, &mut collector);
        collector.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// Flatten the tree into leaf-node spans and syntax gaps, depth-first.
    ///
    /// The bytes of a node that no child covers (sigils, keywords, braces,
    /// opaque heads) come out as gap spans between its children. For a
    /// well-formed tree the result tiles `content_start..source.len()`.
    pub fn leaf_spans(&self) -> Vec<Span> {
        let mut spans = Vec::new();
        for node in &self.nodes {
            collect_leaf_spans(node, &mut spans);
        }
        spans
    }

    /// Check that children sit inside their parents in document order and
    /// that leaf spans tile the content without gaps or overlaps.
    pub fn check_spans(&self) -> Result<(), String> {
        fn check_children(node: &Node) -> Result<(), String> {
            let span = node.span();
            let mut cursor = span.start;
            for child in node.children() {
                let child_span = child.span();
                if !span.contains(child_span) {
                    return Err(format!("{:?} escapes its parent {:?}", child_span, span));
                }
                if child_span.start < cursor {
                    return Err(format!("{:?} overlaps its previous sibling", child_span));
                }
                cursor = child_span.end;
                check_children(child)?;
            }
            Ok(())
        }

        for node in &self.nodes {
            check_children(node)?;
        }

        let mut cursor = self.content_start;
        for span in self.leaf_spans() {
            if span.start != cursor {
                return Err(format!("leaf {:?} does not start at {}", span, cursor));
            }
            cursor = span.end;
        }
        if cursor != self.source.len() {
            return Err(format!("leaves end at {} but source is {} bytes", cursor, self.source.len()));
        }
        Ok(())
    }
}

fn collect_leaf_spans(node: &Node, out: &mut Vec<Span>) {
    let span = node.span();
    let children = node.children();
    if children.is_empty() {
        out.push(span);
        return;
    }

    let mut cursor = span.start;
    for child in children {
        let child_span = child.span();
        if child_span.start > cursor {
            out.push(Span::new(cursor, child_span.start));
        }
        collect_leaf_spans(child, out);
        cursor = child_span.end;
    }
    if cursor < span.end {
        out.push(Span::new(cursor, span.end));
    }
}

#[derive(Default)]
struct ErrorCollector<'a> {
    errors: Vec<&'a ErrorNode>,
}

impl<'a> crate::transform::Visitor<'a> for ErrorCollector<'a> {
    fn enter(&mut self, node: &'a Node) -> bool {
        if let Node::Error(err) = node {
            self.errors.push(err);
        }
        true
    }
}

/// Syntax tree node
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    // Content
    Text(TextNode),
    Comment(CommentNode),

    // Rust
    Expression(ExpressionNode),
    CodeBlock(CodeBlockNode),
    Parameters(ParametersNode),

    // Structure
    Directive(DirectiveNode),
    Statement(StatementNode),
    Component(ComponentNode),

    // Recovery
    Error(ErrorNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(n) => n.span,
            Node::Comment(n) => n.span,
            Node::Expression(n) => n.span,
            Node::CodeBlock(n) => n.span,
            Node::Parameters(n) => n.span,
            Node::Directive(n) => n.span,
            Node::Statement(n) => n.span,
            Node::Component(n) => n.span,
            Node::Error(n) => n.span,
        }
    }

    /// Child nodes in document order
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Text(_) | Node::Comment(_) | Node::Expression(_) | Node::CodeBlock(_) | Node::Parameters(_) => {
                Vec::new()
            }
            Node::Directive(d) => match &d.directive {
                Directive::Section { body, .. } | Directive::Fn { body, .. } => body.iter().collect(),
                _ => Vec::new(),
            },
            Node::Statement(s) => match &s.statement {
                Statement::If(if_stmt) => if_stmt.children(),
                Statement::For(for_stmt) => for_stmt.body.iter().collect(),
                Statement::While(while_stmt) => while_stmt.body.iter().collect(),
                Statement::Match(match_stmt) => match_stmt
                    .arms
                    .iter()
                    .flat_map(|arm| arm.body.nodes())
                    .collect(),
                Statement::Continue | Statement::Break => Vec::new(),
            },
            Node::Component(c) => c
                .parameters
                .iter()
                .flat_map(|p| p.value.nodes())
                .chain(c.body.iter())
                .collect(),
            Node::Error(e) => e.children.iter().collect(),
        }
    }

    pub fn as_error(&self) -> Option<&ErrorNode> {
        match self {
            Node::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Opaque source text with its location (conditions, patterns, literal contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub text: String,
    pub span: Span,
}

impl Fragment {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self { text: text.into(), span }
    }

    /// Fragment for `source[start..end]` with surrounding whitespace trimmed
    pub fn trimmed(source: &str, start: usize, end: usize) -> Self {
        let raw = &source[start..end];
        let lead = raw.len() - raw.trim_start().len();
        let text = raw.trim();
        let from = start + lead;
        Self {
            text: text.to_string(),
            span: Span::new(from, from + text.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Literal markup. `content` holds the logical text (`@@` already folded to `@`).
#[derive(Debug, Clone, Serialize)]
pub struct TextNode {
    pub content: String,
    pub span: Span,
}

impl TextNode {
    /// Source form of the content
    pub fn escaped(&self) -> String {
        escape_text(&self.content)
    }
}

/// `@` → `@@`
pub fn escape_text(text: &str) -> String {
    text.replace('@', "@@")
}

/// `@* … *@`
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub content: String,
    pub span: Span,
}

/// Embedded Rust expression
#[derive(Debug, Clone, Serialize)]
pub struct ExpressionNode {
    pub kind: ExpressionKind,
    /// Expression source: the whole chain for simple expressions, the text
    /// between the parentheses for parenthesized ones
    pub code: String,
    /// `@#…` output is not HTML-escaped
    pub raw_output: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    /// `@user.name`, `@items[0]`, `@&value`
    Simple { refs: usize, segments: Vec<Segment> },
    /// `@(a + b)`
    Paren,
}

/// One link of a simple expression chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Ident(String),
    /// `.field`
    Field(String),
    /// `::item`
    Path(String),
    /// `&ident`
    Borrow(String),
    /// `(args)`, holding the text between the parentheses
    Call(String),
    /// `[index]`, holding the text between the brackets
    Index(String),
}

/// `@{ … }` Rust statements
#[derive(Debug, Clone, Serialize)]
pub struct CodeBlockNode {
    pub code: String,
    pub span: Span,
}

/// Leading `@(name: Type, …);` header
#[derive(Debug, Clone, Serialize)]
pub struct ParametersNode {
    pub params: Vec<TemplateParam>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateParam {
    pub name: Fragment,
    pub ty: Fragment,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectiveNode {
    pub directive: Directive,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// `@extends("path")`; `None` selects the default layout
    Extends { path: Option<Fragment> },
    /// `@use "path" as Alias;`
    Use { path: Fragment, alias: Option<Fragment> },
    /// `@include("path")`
    Include { path: Fragment },
    /// `@render("name")`
    Render { name: Fragment },
    RenderBody,
    ChildContent,
    /// `@section name { … }`
    Section { name: Fragment, body: Vec<Node> },
    /// `@section("name", value)`
    SectionInline { name: Fragment, value: Fragment },
    /// `@raw { … }`
    Raw { body: Fragment },
    /// `@fn name(params) { … }`
    Fn { name: Fragment, params: Fragment, body: Vec<Node> },
}

impl Directive {
    pub fn keyword(&self) -> &'static str {
        match self {
            Directive::Extends { .. } => "extends",
            Directive::Use { .. } => "use",
            Directive::Include { .. } => "include",
            Directive::Render { .. } => "render",
            Directive::RenderBody => "render_body",
            Directive::ChildContent => "child_content",
            Directive::Section { .. } | Directive::SectionInline { .. } => "section",
            Directive::Raw { .. } => "raw",
            Directive::Fn { .. } => "fn",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementNode {
    pub statement: Statement,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    If(IfStatement),
    For(ForStatement),
    While(WhileStatement),
    Match(MatchStatement),
    Continue,
    Break,
}

/// `@if cond { … } else …`
#[derive(Debug, Clone, Serialize)]
pub struct IfStatement {
    pub condition: Fragment,
    pub body: Vec<Node>,
    pub else_clause: Option<ElseClause>,
}

impl IfStatement {
    fn children(&self) -> Vec<&Node> {
        let mut children: Vec<&Node> = self.body.iter().collect();
        match &self.else_clause {
            Some(ElseClause::Block(nodes)) => children.extend(nodes.iter()),
            Some(ElseClause::If(node)) => children.push(node),
            None => {}
        }
        children
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElseClause {
    /// `else if …`: the chained statement (or the error node replacing it)
    If(Box<Node>),
    /// `else { … }`
    Block(Vec<Node>),
}

impl ElseClause {
    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            ElseClause::If(node) => vec![*node],
            ElseClause::Block(nodes) => nodes,
        }
    }
}

/// `@for header { … }`
#[derive(Debug, Clone, Serialize)]
pub struct ForStatement {
    pub header: Fragment,
    pub body: Vec<Node>,
}

impl ForStatement {
    /// Pattern before the top-level ` in `
    pub fn binding(&self) -> Option<&str> {
        self.split_in().map(|(binding, _)| binding)
    }

    /// Expression after the top-level ` in `
    pub fn iterable(&self) -> Option<&str> {
        self.split_in().map(|(_, iterable)| iterable)
    }

    fn split_in(&self) -> Option<(&str, &str)> {
        let header = self.header.text.as_str();
        let mut depth = 0usize;
        for (i, c) in header.char_indices() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ' ' if depth == 0 && header[i..].starts_with(" in ") => {
                    return Some((header[..i].trim(), header[i + 4..].trim()));
                }
                _ => {}
            }
        }
        None
    }
}

/// `@while header { … }`
#[derive(Debug, Clone, Serialize)]
pub struct WhileStatement {
    pub header: Fragment,
    pub body: Vec<Node>,
}

/// `@match subject { pattern => body, … }`
#[derive(Debug, Clone, Serialize)]
pub struct MatchStatement {
    pub subject: Fragment,
    pub arms: Vec<MatchArm>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchArm {
    pub pattern: Fragment,
    pub body: ArmBody,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmBody {
    /// `pattern => { … }`
    Block(Vec<Node>),
    /// `pattern => text @expr …` up to the arm's comma
    Inline(Vec<Node>),
}

impl ArmBody {
    pub fn nodes(&self) -> &[Node] {
        match self {
            ArmBody::Block(nodes) | ArmBody::Inline(nodes) => nodes,
        }
    }

    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            ArmBody::Block(nodes) | ArmBody::Inline(nodes) => nodes,
        }
    }
}

/// Component invocation
#[derive(Debug, Clone, Serialize)]
pub struct ComponentNode {
    pub name: Fragment,
    pub syntax: ComponentSyntax,
    pub parameters: Vec<ComponentParam>,
    pub body: Vec<Node>,
    pub self_closing: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSyntax {
    /// `<Card title="x">…</Card>`
    Tag,
    /// `@Card(title: "x") { … }`
    Call,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentParam {
    pub name: Fragment,
    pub value: ParamValue,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    /// Bare `name`, shorthand for `true`
    Flag,
    Bool(bool),
    Number(String),
    /// String literal contents
    String(Fragment),
    /// `@expr` value
    Expression(Box<Node>),
    /// `{ … }` slot-like value
    Block(Vec<Node>),
    /// Rust expression text in call syntax
    Rust(Fragment),
}

impl ParamValue {
    pub fn nodes(&self) -> Vec<&Node> {
        match self {
            ParamValue::Expression(node) => vec![node.as_ref()],
            ParamValue::Block(nodes) => nodes.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            ParamValue::Expression(node) => vec![*node],
            ParamValue::Block(nodes) => nodes,
            _ => Vec::new(),
        }
    }
}

/// Placeholder for a locally malformed construct
#[derive(Debug, Clone, Serialize)]
pub struct ErrorNode {
    pub kind: ErrorNodeKind,
    pub message: String,
    /// Nodes parsed inside the construct before it was found malformed
    pub children: Vec<Node>,
    pub span: Span,
}

impl ErrorNode {
    pub fn new(kind: ErrorNodeKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            children: Vec::new(),
            span,
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_doubles_every_at() {
        assert_eq!(escape_text("a@b @@ c"), "a@@b @@@@ c");
    }

    #[test]
    fn test_fragment_trimmed() {
        let source = "@if  a > b  {";
        let fragment = Fragment::trimmed(source, 3, 12);
        assert_eq!(fragment.text, "a > b");
        assert_eq!(fragment.span, Span::new(5, 10));
    }

    #[test]
    fn test_for_binding_and_iterable() {
        let stmt = ForStatement {
            header: Fragment::new("(i, item) in items.iter().enumerate()", Span::default()),
            body: Vec::new(),
        };
        assert_eq!(stmt.binding(), Some("(i, item)"));
        assert_eq!(stmt.iterable(), Some("items.iter().enumerate()"));
    }

    #[test]
    fn test_for_without_in() {
        let stmt = ForStatement {
            header: Fragment::new("x", Span::default()),
            body: Vec::new(),
        };
        assert_eq!(stmt.binding(), None);
    }
}
