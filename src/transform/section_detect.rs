use super::{Plugin, TemplateMetadata};
use crate::ast::{Directive, Node};

/// Detects sections defined and rendered in the template
pub struct SectionDetectionPlugin;

impl Plugin for SectionDetectionPlugin {
    fn enter(&mut self, node: &Node, metadata: &mut TemplateMetadata) -> bool {
        if let Node::Directive(directive) = node {
            match &directive.directive {
                Directive::Section { name, .. } | Directive::SectionInline { name, .. } => {
                    metadata.sections_defined.insert(name.text.clone());
                }
                Directive::Render { name } => {
                    metadata.sections_rendered.insert(name.text.clone());
                }
                Directive::RenderBody | Directive::ChildContent => metadata.renders_body = true,
                _ => {}
            }
        }
        true
    }
}
