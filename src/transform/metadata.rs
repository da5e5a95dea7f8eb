use serde::Serialize;
use std::collections::BTreeSet;

/// Metadata collected by the analysis plugins.
///
/// Paths are recorded as written; resolving them is up to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateMetadata {
    pub layout: Option<LayoutRef>,
    pub uses: Vec<UseImport>,
    pub includes: Vec<String>,
    pub sections_defined: BTreeSet<String>,
    pub sections_rendered: BTreeSet<String>,
    /// `@render_body` or `@child_content` appears
    pub renders_body: bool,
    pub components: BTreeSet<String>,
    pub parameters: Vec<DeclaredParam>,
    /// Names of `@fn` helpers
    pub functions: Vec<String>,
    pub error_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum LayoutRef {
    /// `@extends` / `@extends()`
    Default,
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseImport {
    pub path: String,
    pub alias: Option<String>,
}

impl UseImport {
    /// Component name the import is referred to by: the alias, or the file
    /// stem of the path
    pub fn name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        let file = self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path);
        file.split('.').next().unwrap_or(file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredParam {
    pub name: String,
    pub ty: String,
}

impl TemplateMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_layout_child(&self) -> bool {
        self.layout.is_some()
    }

    /// Sections rendered here but never defined here (to be filled by a child)
    pub fn open_sections(&self) -> Vec<&str> {
        self.sections_rendered
            .difference(&self.sections_defined)
            .map(String::as_str)
            .collect()
    }

    /// Referenced components with no matching `@use` import
    pub fn unresolved_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|name| {
                let root = name.split('.').next().unwrap_or(name.as_str());
                !self.uses.iter().any(|u| u.name() == root)
            })
            .map(String::as_str)
            .collect()
    }
}
