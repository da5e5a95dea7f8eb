use super::{Plugin, TemplateMetadata};
use crate::ast::Node;

/// Detects the components a template invokes, in either syntax
pub struct ComponentDetectionPlugin;

impl Plugin for ComponentDetectionPlugin {
    fn enter(&mut self, node: &Node, metadata: &mut TemplateMetadata) -> bool {
        if let Node::Component(component) = node {
            metadata.components.insert(component.name.text.clone());
        }
        true
    }
}
