//! Template identity, element tags and inliner settings
//!
//! These are the non-variable pieces of state that scope maps carry per level.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Template modes a template (or a fragment of it) can be processed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemplateMode {
    /// HTML markup
    Html,
    /// XML markup
    Xml,
    /// Plain text
    Text,
    /// JavaScript source
    JavaScript,
    /// CSS source
    Css,
    /// Unprocessed output
    Raw,
}

impl TemplateMode {
    /// Upper-case mode name
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateMode::Html => "HTML",
            TemplateMode::Xml => "XML",
            TemplateMode::Text => "TEXT",
            TemplateMode::JavaScript => "JAVASCRIPT",
            TemplateMode::Css => "CSS",
            TemplateMode::Raw => "RAW",
        }
    }

    /// Whether the mode produces markup
    pub fn is_markup(&self) -> bool {
        matches!(self, TemplateMode::Html | TemplateMode::Xml)
    }
}

impl fmt::Display for TemplateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the template (or fragment) currently being processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateData {
    /// Template name as resolved
    pub template: String,

    /// Selectors applied to the template, if only fragments of it are processed
    pub template_selectors: Vec<String>,

    /// Mode the template is processed in
    pub template_mode: TemplateMode,
}

impl TemplateData {
    /// Create template data for a whole template
    pub fn new(template: impl Into<String>, template_mode: TemplateMode) -> Self {
        Self {
            template: template.into(),
            template_selectors: Vec::new(),
            template_mode,
        }
    }

    /// Restrict processing to the given selectors
    pub fn with_selectors<S: Into<String>>(
        mut self,
        selectors: impl IntoIterator<Item = S>,
    ) -> Self {
        self.template_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Whether only fragments of the template are processed
    pub fn has_template_selectors(&self) -> bool {
        !self.template_selectors.is_empty()
    }

    /// Convenience for building the shared handle scope maps store
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Display for TemplateData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)?;
        if self.has_template_selectors() {
            write!(f, "::{}", self.template_selectors.join(","))?;
        }
        Ok(())
    }
}

/// Processable element recorded on the element stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTag {
    /// Element name as written in the template
    pub element_name: String,

    /// Attributes in document order
    pub attributes: SmallVec<[(String, String); 4]>,

    /// Line in the template where the tag starts
    pub line: Option<u32>,

    /// Column in the template where the tag starts
    pub col: Option<u32>,
}

impl ElementTag {
    /// Create a tag without attributes
    pub fn new(element_name: impl Into<String>) -> Self {
        Self {
            element_name: element_name.into(),
            attributes: SmallVec::new(),
            line: None,
            col: None,
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Record where the tag was found
    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.line = Some(line);
        self.col = Some(col);
        self
    }

    /// Get an attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Text inlining setting in force for a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inliner {
    /// Inlining explicitly switched off for this scope and below
    Disabled,

    /// Standard inliner for a template mode
    Standard(TemplateMode),

    /// Inliner provided by a dialect, identified by name
    Custom(Arc<str>),
}

impl Inliner {
    /// Inliner name as shown in context dumps
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Inliner::Disabled => Cow::Borrowed("NOOP"),
            Inliner::Standard(mode) => Cow::Owned(format!("STANDARD{}", mode.as_str())),
            Inliner::Custom(name) => Cow::Borrowed(&**name),
        }
    }

    /// Whether this setting actually performs inlining
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Inliner::Disabled)
    }
}
