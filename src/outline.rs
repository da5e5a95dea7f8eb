//! S-expression outline of a syntax tree.
//!
//! One parenthesized form per node, children indented below their parent.
//! Strings are quoted with Rust escaping. Spans are left out, so the outline
//! shows structure only; corpus tests and `rshtml parse --outline` use it.

use crate::ast::*;

/// Render the tree as an indented S-expression
pub fn to_sexp(ast: &Ast) -> String {
    let mut outline = Outline::default();
    outline.open("template");
    outline.nodes(&ast.nodes);
    outline.close();
    outline.out
}

/// Render a single node
pub fn node_to_sexp(node: &Node) -> String {
    let mut outline = Outline::default();
    outline.node(node);
    outline.out
}

#[derive(Default)]
struct Outline {
    out: String,
    depth: usize,
}

impl Outline {
    fn open(&mut self, head: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
            self.out.push_str(&"  ".repeat(self.depth));
        }
        self.out.push('(');
        self.out.push_str(head);
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.out.push(')');
    }

    fn string(&mut self, value: &str) {
        self.out.push_str(&format!(" {:?}", value));
    }

    fn bare(&mut self, value: &str) {
        self.out.push(' ');
        self.out.push_str(value);
    }

    fn leaf(&mut self, head: &str, values: &[&str]) {
        self.open(head);
        for value in values {
            self.string(value);
        }
        self.close();
    }

    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn block(&mut self, head: &str, nodes: &[Node]) {
        self.open(head);
        self.nodes(nodes);
        self.close();
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Text(text) => self.leaf("text", &[&text.content]),
            Node::Comment(comment) => self.leaf("comment", &[&comment.content]),
            Node::Expression(expr) => {
                let head = match (&expr.kind, expr.raw_output) {
                    (ExpressionKind::Simple { .. }, false) => "expr",
                    (ExpressionKind::Simple { .. }, true) => "raw_expr",
                    (ExpressionKind::Paren, false) => "paren_expr",
                    (ExpressionKind::Paren, true) => "raw_paren_expr",
                };
                self.leaf(head, &[&expr.code]);
            }
            Node::CodeBlock(code) => self.leaf("code", &[&code.code]),
            Node::Parameters(header) => {
                self.open("parameters");
                for param in &header.params {
                    self.leaf("parameter", &[&param.name.text, &param.ty.text]);
                }
                self.close();
            }
            Node::Directive(directive) => self.directive(&directive.directive),
            Node::Statement(statement) => self.statement(&statement.statement),
            Node::Component(component) => self.component(component),
            Node::Error(error) => {
                self.open("ERROR");
                self.bare(&format!("{:?}", error.kind));
                self.nodes(&error.children);
                self.close();
            }
        }
    }

    fn directive(&mut self, directive: &Directive) {
        match directive {
            Directive::Extends { path } => {
                self.open("extends");
                if let Some(path) = path {
                    self.string(&path.text);
                }
                self.close();
            }
            Directive::Use { path, alias } => {
                self.open("use");
                self.string(&path.text);
                if let Some(alias) = alias {
                    self.leaf("alias", &[&alias.text]);
                }
                self.close();
            }
            Directive::Include { path } => self.leaf("include", &[&path.text]),
            Directive::Render { name } => self.leaf("render", &[&name.text]),
            Directive::RenderBody => self.leaf("render_body", &[]),
            Directive::ChildContent => self.leaf("child_content", &[]),
            Directive::Section { name, body } => {
                self.open("section");
                self.string(&name.text);
                self.nodes(body);
                self.close();
            }
            Directive::SectionInline { name, value } => self.leaf("section_inline", &[&name.text, &value.text]),
            Directive::Raw { body } => self.leaf("raw", &[&body.text]),
            Directive::Fn { name, params, body } => {
                self.open("fn");
                self.string(&name.text);
                self.string(&params.text);
                self.nodes(body);
                self.close();
            }
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::If(if_stmt) => {
                self.open("if");
                self.leaf("condition", &[&if_stmt.condition.text]);
                self.block("body", &if_stmt.body);
                match &if_stmt.else_clause {
                    Some(ElseClause::If(node)) => {
                        self.open("else");
                        self.node(node);
                        self.close();
                    }
                    Some(ElseClause::Block(nodes)) => self.block("else", nodes),
                    None => {}
                }
                self.close();
            }
            Statement::For(for_stmt) => {
                self.open("for");
                self.string(&for_stmt.header.text);
                self.block("body", &for_stmt.body);
                self.close();
            }
            Statement::While(while_stmt) => {
                self.open("while");
                self.string(&while_stmt.header.text);
                self.block("body", &while_stmt.body);
                self.close();
            }
            Statement::Match(match_stmt) => {
                self.open("match");
                self.string(&match_stmt.subject.text);
                for arm in &match_stmt.arms {
                    self.open("arm");
                    self.string(&arm.pattern.text);
                    match &arm.body {
                        ArmBody::Block(nodes) => self.block("block", nodes),
                        ArmBody::Inline(nodes) => self.block("inline", nodes),
                    }
                    self.close();
                }
                self.close();
            }
            Statement::Continue => self.leaf("continue", &[]),
            Statement::Break => self.leaf("break", &[]),
        }
    }

    fn component(&mut self, component: &ComponentNode) {
        self.open(match component.syntax {
            ComponentSyntax::Tag => "component",
            ComponentSyntax::Call => "component_call",
        });
        self.string(&component.name.text);
        for param in &component.parameters {
            self.open("param");
            self.string(&param.name.text);
            match &param.value {
                ParamValue::Flag => {}
                ParamValue::Bool(value) => self.bare(if *value { "true" } else { "false" }),
                ParamValue::Number(number) => self.bare(number),
                ParamValue::String(value) => self.string(&value.text),
                ParamValue::Expression(node) => self.node(node),
                ParamValue::Block(nodes) => self.block("block", nodes),
                ParamValue::Rust(value) => self.leaf("rust", &[&value.text]),
            }
            self.close();
        }
        if !component.self_closing {
            self.block("body", &component.body);
        }
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_outline_layout() {
        let ast = parse("<ul>@for x in xs {<li>@x</li>}</ul>").unwrap();
        let expected = r#"(template
  (text "<ul>")
  (for "x in xs"
    (body
      (text "<li>")
      (expr "x")
      (text "</li>")))
  (text "</ul>"))"#;
        assert_eq!(to_sexp(&ast), expected);
    }

    #[test]
    fn test_outline_error_and_component() {
        let ast = parse("<Card wide title=\"t\"/>@if {}").unwrap();
        let expected = r#"(template
  (component "Card"
    (param "wide")
    (param "title" "t"))
  (ERROR EmptyCondition))"#;
        assert_eq!(to_sexp(&ast), expected);
    }

    #[test]
    fn test_strings_are_escaped() {
        let ast = parse("say \"hi\"\n").unwrap();
        assert_eq!(node_to_sexp(&ast.nodes[0]), r#"(text "say \"hi\"\n")"#);
    }
}
