//! Leveled variable scopes
//!
//! Two maps share one contract, [`VariableScope`]:
//!
//! - [`ScopedVariables`] owns its storage in per-level frames.
//! - [`JournaledVariables`] writes through to an [`ExternalStore`] it does not own
//!   and keeps per-level undo journals so that leaving a level restores what the
//!   level changed, without clobbering writes made by anyone else meanwhile.
//!
//! Levels are entered before descending into a nested structure and exited on
//! the way out. A level costs nothing until it binds something.

mod frame;
mod journaled;
mod levels;
mod standalone;
mod store;

pub use journaled::JournaledVariables;
pub use standalone::ScopedVariables;
pub use store::{AttributeTable, ExternalStore};

use crate::error::{ContextError, ContextResult};
use crate::template::{ElementTag, Inliner, TemplateData};
use crate::value::ContextValue;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Scoped variable storage driven by enter/exit calls from the processing pipeline
pub trait VariableScope {
    /// Current nesting depth (0 at the root)
    fn level(&self) -> usize;

    /// Enter a nested level
    fn enter_scope(&mut self);

    /// Leave the current level, undoing everything it bound.
    ///
    /// # Panics
    ///
    /// Panics when called at level 0: unbalanced enter/exit calls are a bug in the caller.
    fn exit_scope(&mut self);

    /// Leave the current level, reporting an unbalanced call as an error instead of panicking
    fn try_exit_scope(&mut self) -> ContextResult<()> {
        if self.level() == 0 {
            return Err(ContextError::ScopeUnderflow);
        }
        self.exit_scope();
        Ok(())
    }

    /// Bind `name` at the current level
    fn bind(&mut self, name: &str, value: ContextValue) -> ContextResult<()>;

    /// Bind several names at the current level.
    ///
    /// Every name is validated before anything is bound.
    fn bind_all<I>(&mut self, variables: I) -> ContextResult<()>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
        Self: Sized;

    /// Make `name` invisible at the current level and below
    fn unbind(&mut self, name: &str) -> ContextResult<()>;

    /// Value visible for `name`, with lazy values resolved
    fn lookup(&self, name: &str) -> Option<ContextValue>;

    /// Whether `name` is visible
    fn contains(&self, name: &str) -> bool;

    /// Whether `name` was bound by a level above 0 and is still bound there
    fn is_local(&self, name: &str) -> bool;

    /// Every visible name.
    ///
    /// This walks all frames (or the whole external store); use [`VariableScope::contains`]
    /// to test a single name.
    fn names(&self) -> FxHashSet<String>;

    /// Whether some level set a selection target
    fn has_selection_target(&self) -> bool;

    /// Selection target set by the nearest level that set one
    fn selection_target(&self) -> Option<&ContextValue>;

    /// Set the selection target for the current level and below
    fn set_selection_target(&mut self, target: ContextValue);

    /// Inliner in force, `None` when none was set or inlining was disabled
    fn inliner(&self) -> Option<&Inliner>;

    /// Set the inliner for the current level and below; `None` disables inlining
    fn set_inliner(&mut self, inliner: Option<Inliner>);

    /// Template currently being processed
    fn template_data(&self) -> Option<&Arc<TemplateData>>;

    /// Switch template identity for the current level and below
    fn set_template_data(&mut self, template_data: Arc<TemplateData>);

    /// Template identities in force, outermost first
    fn template_stack(&self) -> Vec<Arc<TemplateData>>;

    /// Record the element being processed at the current level
    fn set_element_tag(&mut self, tag: Option<Arc<ElementTag>>);

    /// Elements being processed, outermost first
    fn element_stack(&self) -> Vec<Arc<ElementTag>>;

    /// Elements being processed at levels strictly above `context_level`
    fn element_stack_above(&self, context_level: usize) -> Vec<Arc<ElementTag>>;

    /// Debug dump of the bindings of each level, innermost first
    fn level_representation(&self) -> String;
}
