use super::{DeclaredParam, Plugin, TemplateMetadata};
use crate::ast::{Directive, Node};

/// Detects the template's declared parameters and `@fn` helpers
pub struct SignatureDetectionPlugin;

impl Plugin for SignatureDetectionPlugin {
    fn enter(&mut self, node: &Node, metadata: &mut TemplateMetadata) -> bool {
        match node {
            Node::Parameters(header) => {
                metadata.parameters.extend(header.params.iter().map(|p| DeclaredParam {
                    name: p.name.text.clone(),
                    ty: p.ty.text.clone(),
                }));
            }
            Node::Directive(directive) => {
                if let Directive::Fn { name, .. } = &directive.directive {
                    metadata.functions.push(name.text.clone());
                }
            }
            _ => {}
        }
        true
    }
}
