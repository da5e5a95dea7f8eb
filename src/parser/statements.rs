use super::fragment::{self, HeadEnd, PatternEnd};
use super::keyword::{self, Keyword};
use super::tree_builder::{Region, RegionEnd, TreeBuilder};
use crate::ast::*;
use crate::error::ParseError;

/// Statement head scanned up to its block
enum Head {
    Ready(Fragment),
    Missing(Node),
}

impl TreeBuilder<'_> {
    /// `@if cond { … } [else …]`, the keyword already consumed
    pub(super) fn parse_if(&mut self, start: usize) -> Result<Node, ParseError> {
        self.enter()?;
        let node = match self.parse_head(start, "if") {
            Head::Missing(node) => node,
            Head::Ready(condition) => {
                let (body, _) = self.parse_block("if")?;
                let else_clause = self.parse_else()?;
                let span = self.scanner.span_from(start);

                if condition.is_empty() {
                    let mut children = body;
                    children.extend(else_clause.map(ElseClause::into_nodes).unwrap_or_default());
                    self.recover(
                        ErrorNode::new(ErrorNodeKind::EmptyCondition, "`@if` needs a condition", span)
                            .with_children(children),
                    )
                } else {
                    Node::Statement(StatementNode {
                        statement: Statement::If(IfStatement {
                            condition,
                            body,
                            else_clause,
                        }),
                        span,
                    })
                }
            }
        };
        self.leave();
        Ok(node)
    }

    /// Optional `else { … }` or `else if …` after an `if` body
    fn parse_else(&mut self) -> Result<Option<ElseClause>, ParseError> {
        let checkpoint = self.scanner.pos();
        self.scanner.skip_whitespace();
        if !self.scanner.eat_str("else") {
            self.scanner.reset(checkpoint);
            return Ok(None);
        }

        let after_else = self.scanner.pos();
        self.scanner.skip_whitespace();
        if self.scanner.peek() == Some('{') {
            let (nodes, _) = self.parse_block("else")?;
            return Ok(Some(ElseClause::Block(nodes)));
        }

        if self.scanner.pos() > after_else {
            if let Some((Keyword::If, len)) = keyword::recognize(self.scanner.rest()) {
                let if_start = self.scanner.pos();
                self.scanner.advance_by(len);
                let node = self.parse_if(if_start)?;
                return Ok(Some(ElseClause::If(Box::new(node))));
            }
        }

        self.scanner.reset(checkpoint);
        Ok(None)
    }

    /// `@for header { … }` and `@while header { … }`
    pub(super) fn parse_loop(&mut self, keyword: Keyword, start: usize) -> Result<Node, ParseError> {
        let name = keyword.as_str();
        self.enter()?;
        let node = match self.parse_head(start, name) {
            Head::Missing(node) => node,
            Head::Ready(header) => {
                let (body, _) = self.parse_block(name)?;
                let span = self.scanner.span_from(start);

                if header.is_empty() {
                    self.recover(
                        ErrorNode::new(ErrorNodeKind::EmptyCondition, format!("`@{}` needs a header", name), span)
                            .with_children(body),
                    )
                } else {
                    let statement = if keyword == Keyword::For {
                        Statement::For(ForStatement { header, body })
                    } else {
                        Statement::While(WhileStatement { header, body })
                    };
                    Node::Statement(StatementNode { statement, span })
                }
            }
        };
        self.leave();
        Ok(node)
    }

    /// `@match subject { pattern => body, … }`
    pub(super) fn parse_match(&mut self, start: usize) -> Result<Node, ParseError> {
        self.enter()?;
        let node = match self.parse_head(start, "match") {
            Head::Missing(node) => node,
            Head::Ready(subject) => {
                let open = self.scanner.pos();
                self.scanner.advance();

                let tags = std::mem::take(&mut self.tag_stack);
                self.braces += 1;
                let arms = self.parse_arms(open)?;
                self.braces -= 1;
                self.tag_stack = tags;

                let span = self.scanner.span_from(start);
                match arms {
                    Ok(arms) if subject.is_empty() => {
                        let children = arms.into_iter().flat_map(|arm| arm.body.into_nodes()).collect();
                        self.recover(
                            ErrorNode::new(ErrorNodeKind::EmptyCondition, "`@match` needs a subject", span)
                                .with_children(children),
                        )
                    }
                    Ok(arms) => Node::Statement(StatementNode {
                        statement: Statement::Match(MatchStatement { subject, arms }),
                        span,
                    }),
                    Err(children) => self.recover(
                        ErrorNode::new(ErrorNodeKind::MalformedArm, "match arm is missing its `=>`", span)
                            .with_children(children),
                    ),
                }
            }
        };
        self.leave();
        Ok(node)
    }

    /// Arms up to and including the closing `}`. A malformed arm swallows
    /// the rest of the body and yields the nodes of the arms before it.
    fn parse_arms(&mut self, open: usize) -> Result<Result<Vec<MatchArm>, Vec<Node>>, ParseError> {
        let source = self.scanner.source();
        let mut arms: Vec<MatchArm> = Vec::new();

        loop {
            self.scanner.skip_whitespace();
            match self.scanner.peek() {
                None => return Err(self.unterminated_block("match", open)),
                Some('}') => {
                    self.scanner.advance();
                    return Ok(Ok(arms));
                }
                _ => {}
            }

            let arm_start = self.scanner.pos();
            let arrow = match fragment::scan_pattern(source, arm_start) {
                PatternEnd::Arrow(arrow) if !source[arm_start..arrow].trim().is_empty() => arrow,
                _ => {
                    self.skip_match_rest(open, arm_start)?;
                    let children = arms.into_iter().flat_map(|arm| arm.body.into_nodes()).collect();
                    return Ok(Err(children));
                }
            };

            let pattern = Fragment::trimmed(source, arm_start, arrow);
            self.scanner.reset(arrow + 2);
            self.scanner.skip_whitespace();

            let (body, end) = if self.scanner.peek() == Some('{') {
                let (nodes, span) = self.parse_block("match arm")?;
                (ArmBody::Block(nodes), span.end)
            } else {
                let body_start = self.scanner.pos();
                self.enter()?;
                let (mut nodes, region_end) = self.parse_region(Region::Arm)?;
                self.leave();
                match region_end {
                    RegionEnd::Eof => return Err(self.unterminated_block("match", open)),
                    RegionEnd::Unbalanced(expected) => {
                        let span = self.scanner.span_from(body_start);
                        let error = self.recover(
                            ErrorNode::new(
                                ErrorNodeKind::UnbalancedDelimiter,
                                format!("expected `{}` before `}}`", expected),
                                span,
                            )
                            .with_children(nodes),
                        );
                        (ArmBody::Inline(vec![error]), span.end)
                    }
                    _ => {
                        trim_arm_tail(&mut nodes);
                        let end = nodes.last().map(|n| n.span().end).unwrap_or(arrow + 2);
                        (ArmBody::Inline(nodes), end)
                    }
                }
            };

            arms.push(MatchArm {
                pattern,
                body,
                span: Span::new(arm_start, end),
            });

            let before_comma = self.scanner.pos();
            self.scanner.skip_whitespace();
            if !self.scanner.eat(',') {
                self.scanner.reset(before_comma);
            }
        }
    }

    /// Move past the `}` closing the match body after a malformed arm
    fn skip_match_rest(&mut self, open: usize, from: usize) -> Result<(), ParseError> {
        let source = self.scanner.source();
        let mut from = from;
        loop {
            match fragment::scan_pattern(source, from) {
                PatternEnd::Arrow(arrow) => from = arrow + 2,
                PatternEnd::Stopped(at) if at < source.len() => {
                    self.scanner.reset(at + 1);
                    return Ok(());
                }
                PatternEnd::Stopped(_) => return Err(self.unterminated_block("match", open)),
            }
        }
    }

    /// Scan a statement head up to the `{` of its block, leaving the cursor on it
    fn parse_head(&mut self, start: usize, keyword: &str) -> Head {
        let source = self.scanner.source();
        let head_start = self.scanner.pos();
        match fragment::scan_head(source, head_start) {
            HeadEnd::Block(brace) => {
                self.scanner.reset(brace);
                Head::Ready(Fragment::trimmed(source, head_start, brace))
            }
            HeadEnd::Stopped(at) => {
                let end = head_start + source[head_start..at].trim_end().len();
                self.scanner.reset(end);
                Head::Missing(self.recover(ErrorNode::new(
                    ErrorNodeKind::MissingBlock,
                    format!("expected `{{` to open the `@{}` block", keyword),
                    Span::new(start, end),
                )))
            }
        }
    }
}

/// Drop whitespace between an inline arm body and its separator
fn trim_arm_tail(nodes: &mut Vec<Node>) {
    let Some(Node::Text(text)) = nodes.last_mut() else {
        return;
    };
    let keep = text.content.trim_end().len();
    let cut = text.content.len() - keep;
    text.content.truncate(keep);
    text.span.end -= cut;
    if text.content.is_empty() {
        nodes.pop();
    }
}
