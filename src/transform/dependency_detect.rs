use super::{LayoutRef, Plugin, TemplateMetadata, UseImport};
use crate::ast::{Directive, Node};

/// Detects the files a template depends on: its layout, `@use` imports and
/// `@include`d partials
pub struct DependencyDetectionPlugin;

impl Plugin for DependencyDetectionPlugin {
    fn enter(&mut self, node: &Node, metadata: &mut TemplateMetadata) -> bool {
        let Node::Directive(directive) = node else {
            return true;
        };
        match &directive.directive {
            Directive::Extends { path } => {
                metadata.layout = Some(match path {
                    Some(path) => LayoutRef::Path(path.text.clone()),
                    None => LayoutRef::Default,
                });
            }
            Directive::Use { path, alias } => {
                metadata.uses.push(UseImport {
                    path: path.text.clone(),
                    alias: alias.as_ref().map(|a| a.text.clone()),
                });
            }
            Directive::Include { path } => {
                if !metadata.includes.contains(&path.text) {
                    metadata.includes.push(path.text.clone());
                }
            }
            _ => {}
        }
        true
    }
}
