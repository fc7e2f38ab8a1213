// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-execution engine context
//!
//! One [`EngineContext`] is created when a template execution starts and is passed
//! by `&mut` through the processing call graph until it ends. It owns the
//! execution's variable scopes and identifier counters and reaches the
//! engine-wide collaborators through the shared [`EngineConfiguration`].

use crate::engine::EngineConfiguration;
use crate::error::ContextResult;
use crate::expression_objects::{ExpressionObjects, ObjectScope};
use crate::identifiers::IdentifierSequences;
use crate::messages::MessageRequest;
use crate::scope::{ExternalStore, JournaledVariables, ScopedVariables, VariableScope};
use crate::template::{ElementTag, Inliner, TemplateData};
use crate::value::ContextValue;
use indexmap::IndexMap;
use log::debug;
use once_cell::unsync::OnceCell;
use rustc_hash::FxHashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Execution state handed to template processing
#[derive(Debug)]
pub struct EngineContext<V> {
    configuration: Arc<EngineConfiguration>,
    locale: String,
    template_resolution_attributes: IndexMap<String, ContextValue>,
    expression_objects: OnceCell<ExpressionObjects>,
    identifier_sequences: IdentifierSequences,
    variables: V,
}

impl EngineContext<ScopedVariables> {
    /// Create a context that owns its variables
    pub fn new<I>(
        configuration: Arc<EngineConfiguration>,
        template_data: Arc<TemplateData>,
        locale: impl Into<String>,
        template_resolution_attributes: IndexMap<String, ContextValue>,
        variables: I,
    ) -> ContextResult<Self>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        let mut scope = ScopedVariables::with_config(configuration.context_config(), template_data);
        scope.bind_all(variables)?;
        Ok(Self::from_parts(
            configuration,
            locale.into(),
            template_resolution_attributes,
            scope,
        ))
    }
}

impl<S: ExternalStore> EngineContext<JournaledVariables<S>> {
    /// Create a context whose variables live in `store`
    pub fn with_external_store<I>(
        configuration: Arc<EngineConfiguration>,
        store: S,
        template_data: Arc<TemplateData>,
        locale: impl Into<String>,
        template_resolution_attributes: IndexMap<String, ContextValue>,
        variables: I,
    ) -> ContextResult<Self>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        let mut scope =
            JournaledVariables::with_config(store, configuration.context_config(), template_data);
        scope.bind_all(variables)?;
        Ok(Self::from_parts(
            configuration,
            locale.into(),
            template_resolution_attributes,
            scope,
        ))
    }

    /// The external store the variables are written to
    pub fn store(&self) -> &S {
        self.variables.store()
    }
}

impl<V: VariableScope> EngineContext<V> {
    fn from_parts(
        configuration: Arc<EngineConfiguration>,
        locale: String,
        template_resolution_attributes: IndexMap<String, ContextValue>,
        variables: V,
    ) -> Self {
        debug!(
            "created engine context for template '{}' (locale '{}')",
            variables
                .template_data()
                .map_or("", |t| t.template.as_str()),
            locale
        );
        Self {
            configuration,
            locale,
            template_resolution_attributes,
            expression_objects: OnceCell::new(),
            identifier_sequences: IdentifierSequences::new(),
            variables,
        }
    }

    pub fn configuration(&self) -> &Arc<EngineConfiguration> {
        &self.configuration
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Attributes the root template was resolved with
    pub fn template_resolution_attributes(&self) -> &IndexMap<String, ContextValue> {
        &self.template_resolution_attributes
    }

    pub fn variables(&self) -> &V {
        &self.variables
    }

    pub fn identifier_sequences(&self) -> &IdentifierSequences {
        &self.identifier_sequences
    }

    pub fn identifier_sequences_mut(&mut self) -> &mut IdentifierSequences {
        &mut self.identifier_sequences
    }

    /// Expression objects of this execution, built on first access
    pub fn expression_objects(&self) -> &ExpressionObjects {
        self.expression_objects.get_or_init(|| {
            let factories = self.configuration.expression_object_factories();
            debug!("building expression objects from {} factories", factories.len());
            ExpressionObjects::new(factories)
        })
    }

    /// The expression object called `name`
    pub fn expression_object(&self, name: &str) -> Option<ContextValue> {
        let scope = ObjectScope {
            locale: &self.locale,
            template: self.variables.template_data(),
        };
        self.expression_objects().get(&scope, name)
    }

    /// Resolve a message with the configured resolvers.
    ///
    /// With `use_absent_representation`, a key no resolver knows yields the first
    /// absent-message placeholder a resolver offers.
    pub fn message(
        &self,
        origin: Option<&str>,
        key: &str,
        params: &[ContextValue],
        use_absent_representation: bool,
    ) -> Option<String> {
        let mut templates = self.variables.template_stack();
        templates.reverse();
        let request = MessageRequest {
            templates: &templates,
            origin,
            key,
            params,
            locale: &self.locale,
        };

        let resolvers = self.configuration.message_resolvers();
        if let Some(message) = resolvers.iter().find_map(|r| r.resolve_message(&request)) {
            return Some(message);
        }
        if !use_absent_representation {
            return None;
        }
        let absent = resolvers
            .iter()
            .find_map(|r| r.absent_message_representation(&request));
        if absent.is_some() {
            debug!("message '{key}' not found for locale '{}'", self.locale);
        }
        absent
    }

    /// Resolve a message, never failing: unknown keys give a placeholder or an empty string
    pub fn resolve_message(
        &self,
        origin: Option<&str>,
        key: &str,
        params: &[ContextValue],
    ) -> String {
        self.message(origin, key, params, true).unwrap_or_else(|| {
            debug!("no message or placeholder for '{key}', using empty string");
            String::new()
        })
    }

    /// Enter a scope that is exited when the returned guard is dropped
    pub fn scoped(&mut self) -> ScopeGuard<'_, V> {
        self.variables.enter_scope();
        let level = self.variables.level();
        ScopeGuard {
            context: self,
            level,
        }
    }

    pub fn level(&self) -> usize {
        self.variables.level()
    }

    pub fn enter_scope(&mut self) {
        self.variables.enter_scope();
    }

    /// # Panics
    ///
    /// Panics at level 0.
    pub fn exit_scope(&mut self) {
        self.variables.exit_scope();
    }

    pub fn try_exit_scope(&mut self) -> ContextResult<()> {
        self.variables.try_exit_scope()
    }

    pub fn bind(&mut self, name: &str, value: impl Into<ContextValue>) -> ContextResult<()> {
        self.variables.bind(name, value.into())
    }

    pub fn bind_all<I>(&mut self, variables: I) -> ContextResult<()>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        self.variables.bind_all(variables)
    }

    pub fn unbind(&mut self, name: &str) -> ContextResult<()> {
        self.variables.unbind(name)
    }

    pub fn lookup(&self, name: &str) -> Option<ContextValue> {
        self.variables.lookup(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.variables.is_local(name)
    }

    pub fn names(&self) -> FxHashSet<String> {
        self.variables.names()
    }

    pub fn has_selection_target(&self) -> bool {
        self.variables.has_selection_target()
    }

    pub fn selection_target(&self) -> Option<&ContextValue> {
        self.variables.selection_target()
    }

    pub fn set_selection_target(&mut self, target: impl Into<ContextValue>) {
        self.variables.set_selection_target(target.into());
    }

    pub fn inliner(&self) -> Option<&Inliner> {
        self.variables.inliner()
    }

    pub fn set_inliner(&mut self, inliner: Option<Inliner>) {
        self.variables.set_inliner(inliner);
    }

    pub fn template_data(&self) -> Option<&Arc<TemplateData>> {
        self.variables.template_data()
    }

    pub fn set_template_data(&mut self, template_data: Arc<TemplateData>) {
        self.variables.set_template_data(template_data);
    }

    pub fn template_stack(&self) -> Vec<Arc<TemplateData>> {
        self.variables.template_stack()
    }

    pub fn set_element_tag(&mut self, tag: Option<Arc<ElementTag>>) {
        self.variables.set_element_tag(tag);
    }

    pub fn element_stack(&self) -> Vec<Arc<ElementTag>> {
        self.variables.element_stack()
    }

    pub fn element_stack_above(&self, context_level: usize) -> Vec<Arc<ElementTag>> {
        self.variables.element_stack_above(context_level)
    }

    pub fn level_representation(&self) -> String {
        self.variables.level_representation()
    }
}

impl<V: fmt::Display> fmt::Display for EngineContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.variables.fmt(f)
    }
}

/// Scope entered by [`EngineContext::scoped`].
///
/// Dropping the guard exits its scope along with any scope entered inside it and
/// left open, so early returns and `?` cannot leak bindings outward.
pub struct ScopeGuard<'a, V: VariableScope> {
    context: &'a mut EngineContext<V>,
    level: usize,
}

impl<V: VariableScope> Deref for ScopeGuard<'_, V> {
    type Target = EngineContext<V>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl<V: VariableScope> DerefMut for ScopeGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl<V: VariableScope> Drop for ScopeGuard<'_, V> {
    fn drop(&mut self) {
        while self.context.level() >= self.level {
            self.context.exit_scope();
        }
    }
}
