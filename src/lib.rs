//! Leveled variable scopes for template execution
//!
//! The mutable state threaded through template processing: variable bindings
//! that shadow and unshadow as processing enters and leaves nested structures,
//! plus the selection target, inliner, template identity and element stack that
//! are scoped the same way.
//!
//! Two scope maps are provided. [`ScopedVariables`] owns its storage;
//! [`JournaledVariables`] layers scopes over an [`ExternalStore`] that other
//! code may modify at any time. [`EngineContext`] wraps either one together with
//! message resolution, expression objects and identifier counters.
//!
//! ```
//! use octofhir_template_context::{ScopedVariables, TemplateData, TemplateMode, VariableScope};
//!
//! let mut vars = ScopedVariables::new(TemplateData::new("page", TemplateMode::Html).shared());
//! vars.bind("x", 1.into()).unwrap();
//! vars.enter_scope();
//! vars.bind("x", 2.into()).unwrap();
//! assert_eq!(vars.lookup("x"), Some(2.into()));
//! vars.exit_scope();
//! assert_eq!(vars.lookup("x"), Some(1.into()));
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression_objects;
pub mod identifiers;
pub mod messages;
pub mod scope;
pub mod template;
pub mod value;

pub use config::ContextConfig;
pub use context::{EngineContext, ScopeGuard};
pub use engine::{EngineConfiguration, EngineConfigurationBuilder};
pub use error::{ContextError, ContextResult};
pub use expression_objects::{ExpressionObjectFactory, ExpressionObjects, ObjectScope};
pub use identifiers::IdentifierSequences;
pub use messages::{MessageBundle, MessageRequest, MessageResolver, StandardMessageResolver};
pub use scope::{AttributeTable, ExternalStore, JournaledVariables, ScopedVariables, VariableScope};
pub use template::{ElementTag, Inliner, TemplateData, TemplateMode};
pub use value::{ContextValue, LazyVariable};
