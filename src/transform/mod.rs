mod component_detect;
mod dependency_detect;
mod metadata;
mod section_detect;
mod signature_detect;

pub use component_detect::ComponentDetectionPlugin;
pub use dependency_detect::DependencyDetectionPlugin;
pub use metadata::{DeclaredParam, LayoutRef, TemplateMetadata, UseImport};
pub use section_detect::SectionDetectionPlugin;
pub use signature_detect::SignatureDetectionPlugin;

use crate::ast::{Ast, Node};

/// Read-only tree visitor
pub trait Visitor<'a> {
    /// Called before visiting children. Return `false` to skip children.
    fn enter(&mut self, _node: &'a Node) -> bool {
        true
    }

    /// Called after visiting children.
    fn exit(&mut self, _node: &'a Node) {}
}

/// Visit `nodes` and their descendants in document order
pub fn walk<'a, V: Visitor<'a> + ?Sized>(nodes: &'a [Node], visitor: &mut V) {
    for node in nodes {
        walk_node(node, visitor);
    }
}

fn walk_node<'a, V: Visitor<'a> + ?Sized>(node: &'a Node, visitor: &mut V) {
    if visitor.enter(node) {
        for child in node.children() {
            walk_node(child, visitor);
        }
    }
    visitor.exit(node);
}

/// Analysis pass that records what it finds into the template metadata
pub trait Plugin {
    /// Called before visiting children. Return `false` to skip children.
    fn enter(&mut self, _node: &Node, _metadata: &mut TemplateMetadata) -> bool {
        true
    }

    /// Called after visiting children.
    fn exit(&mut self, _node: &Node, _metadata: &mut TemplateMetadata) {}
}

struct PluginVisitor<'p> {
    plugin: &'p mut Box<dyn Plugin>,
    metadata: &'p mut TemplateMetadata,
}

impl<'a> Visitor<'a> for PluginVisitor<'_> {
    fn enter(&mut self, node: &'a Node) -> bool {
        self.plugin.enter(node, self.metadata)
    }

    fn exit(&mut self, node: &'a Node) {
        self.plugin.exit(node, self.metadata)
    }
}

/// Runs a series of plugins over a tree
pub struct Transformer {
    plugins: Vec<Box<dyn Plugin>>,
    pub metadata: TemplateMetadata,
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            metadata: TemplateMetadata::new(),
        }
    }

    pub fn add<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn transform(&mut self, ast: &Ast) -> &TemplateMetadata {
        for plugin in &mut self.plugins {
            let mut visitor = PluginVisitor {
                plugin,
                metadata: &mut self.metadata,
            };
            walk(&ast.nodes, &mut visitor);
        }
        self.metadata.error_count = ast.errors().len();

        &self.metadata
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a transformer with the standard plugins
pub fn standard_plugins() -> Transformer {
    Transformer::new()
        .add(DependencyDetectionPlugin)
        .add(SectionDetectionPlugin)
        .add(ComponentDetectionPlugin)
        .add(SignatureDetectionPlugin)
}

/// Collect the metadata of a parsed template with the standard plugins
pub fn analyze(ast: &Ast) -> TemplateMetadata {
    let mut transformer = standard_plugins();
    transformer.transform(ast);
    transformer.metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl<'a> Visitor<'a> for Trace {
        fn enter(&mut self, node: &'a Node) -> bool {
            self.0.push(format!("enter {}", kind(node)));
            !matches!(node, Node::Component(_))
        }

        fn exit(&mut self, node: &'a Node) {
            self.0.push(format!("exit {}", kind(node)));
        }
    }

    fn kind(node: &Node) -> &'static str {
        match node {
            Node::Text(_) => "text",
            Node::Expression(_) => "expr",
            Node::Statement(_) => "stmt",
            Node::Component(_) => "component",
            _ => "other",
        }
    }

    #[test]
    fn test_walk_order_and_skip() {
        let ast = parse("@if a {@x}<Card>@y</Card>").unwrap();
        let mut trace = Trace::default();
        walk(&ast.nodes, &mut trace);
        assert_eq!(
            trace.0,
            [
                "enter stmt",
                "enter expr",
                "exit expr",
                "exit stmt",
                "enter component",
                "exit component",
            ]
        );
    }
}
