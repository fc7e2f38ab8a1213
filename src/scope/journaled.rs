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

//! Leveled variables layered over an external store
//!
//! The store is the source of truth: every bind is written to it immediately and
//! every lookup reads it directly. Levels above 0 keep a journal of what they
//! changed (old and new value, captured at the first write of each name) and
//! replay it backwards on exit. A journal entry is only restored if the store
//! still holds exactly the value this map wrote; anything else means outside
//! code wrote the name in the meantime and its write is kept.

use super::VariableScope;
use super::frame::{Binding, FrameStore};
use super::levels::{LevelState, write_entries, write_slots};
use super::store::ExternalStore;
use crate::config::ContextConfig;
use crate::error::ContextResult;
use crate::template::{ElementTag, Inliner, TemplateData};
use crate::value::ContextValue;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Change made to one name by one level
#[derive(Debug, Clone)]
pub(crate) struct UndoRecord {
    name: String,
    /// Store contents before the level first touched the name
    old: Binding,
    /// Last value the level wrote
    new: Binding,
}

/// Undo records of one level, in first-write order
type Journal = SmallVec<[UndoRecord; 5]>;

impl FrameStore for Journal {
    fn clear(&mut self) {
        SmallVec::clear(self);
    }

    fn is_empty(&self) -> bool {
        SmallVec::is_empty(self)
    }

    fn reserve(&mut self, additional: usize) {
        SmallVec::reserve(self, additional);
    }
}

/// Leveled variable map writing through to an [`ExternalStore`]
#[derive(Debug)]
pub struct JournaledVariables<S> {
    store: S,
    state: LevelState<Journal>,
}

impl<S: ExternalStore> JournaledVariables<S> {
    /// Layer scopes over `store`
    pub fn new(store: S, template_data: Arc<TemplateData>) -> Self {
        Self::with_config(store, &ContextConfig::web(), template_data)
    }

    /// Layer scopes over `store` with custom capacities and reserved names
    pub fn with_config(store: S, config: &ContextConfig, template_data: Arc<TemplateData>) -> Self {
        Self {
            store,
            state: LevelState::new(config, template_data),
        }
    }

    /// Layer scopes over `store`, writing `variables` to it at level 0
    pub fn with_variables<I>(
        store: S,
        template_data: Arc<TemplateData>,
        variables: I,
    ) -> ContextResult<Self>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        let mut map = Self::new(store, template_data);
        map.bind_all(variables)?;
        Ok(map)
    }

    /// The store being written through to
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back
    pub fn into_store(self) -> S {
        self.store
    }

    fn write(&mut self, name: &str, binding: Binding) {
        if self.state.level > 0 {
            let frame = self.state.frames.bindings_for_level(self.state.level, 1);
            match frame.bindings.iter_mut().find(|r| r.name == name) {
                Some(record) => record.new = binding.clone(),
                None => {
                    let old = Binding::from_option(self.store.get(name));
                    frame.bindings.push(UndoRecord {
                        name: name.to_string(),
                        old,
                        new: binding.clone(),
                    });
                }
            }
        }
        match binding {
            Binding::Bound(value) => self.store.set(name, value),
            Binding::Removed => self.store.remove(name),
        }
    }

    /// Null values are stored as removals, as attribute tables do
    fn binding_for(value: ContextValue) -> Binding {
        match value {
            ContextValue::Null => Binding::Removed,
            value => Binding::Bound(value),
        }
    }

    /// Effective writes of each level above 0 (innermost first), plus the
    /// pre-scope values they are hiding
    fn effective_writes(&self) -> (Vec<Vec<(&str, &Binding)>>, IndexMap<&str, &Binding>) {
        let frames = self.state.frames.active();
        let mut hidden: IndexMap<&str, &Binding> = IndexMap::new();
        let mut levels = Vec::with_capacity(frames.len());
        for frame in frames[1..].iter().rev() {
            let mut writes = Vec::new();
            for record in &frame.bindings {
                if record.new.is_same(&record.old) {
                    continue;
                }
                let still_written = match hidden.get(record.name.as_str()) {
                    Some(outer) => record.new.is_same(outer),
                    None => record.new.matches(self.store.get(&record.name).as_ref()),
                };
                if !still_written {
                    continue;
                }
                writes.push((record.name.as_str(), &record.new));
                hidden.insert(record.name.as_str(), &record.old);
            }
            levels.push(writes);
        }
        (levels, hidden)
    }

    /// Store contents as they were before any level above 0 wrote to it
    fn base_attributes(&self, hidden: &IndexMap<&str, &Binding>) -> Vec<(String, String)> {
        let mut attributes = Vec::new();
        let mut seen = FxHashSet::default();
        for name in self.store.keys() {
            let value = match hidden.get(name.as_str()) {
                Some(Binding::Bound(old)) => Some(old.to_string()),
                Some(Binding::Removed) => None,
                None => self.store.get(&name).map(|v| v.to_string()),
            };
            seen.insert(name.clone());
            if let Some(value) = value {
                attributes.push((name, value));
            }
        }
        for (name, old) in hidden {
            if let Binding::Bound(old) = old {
                if !seen.contains(*name) {
                    attributes.push((name.to_string(), old.to_string()));
                }
            }
        }
        attributes
    }
}

impl<S: ExternalStore> VariableScope for JournaledVariables<S> {
    fn level(&self) -> usize {
        self.state.level
    }

    fn enter_scope(&mut self) {
        self.state.enter();
    }

    fn exit_scope(&mut self) {
        let store = &self.store;
        self.state.exit(|journal| {
            for record in journal.iter().rev() {
                // Only undo our own write; anything else was written from outside.
                if !record.new.matches(store.get(&record.name).as_ref()) {
                    continue;
                }
                match &record.old {
                    Binding::Bound(old) => store.set(&record.name, old.clone()),
                    Binding::Removed => store.remove(&record.name),
                }
            }
        });
    }

    fn bind(&mut self, name: &str, value: ContextValue) -> ContextResult<()> {
        self.state.validate_name(name)?;
        self.write(name, Self::binding_for(value));
        Ok(())
    }

    fn bind_all<I>(&mut self, variables: I) -> ContextResult<()>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        let variables: Vec<(String, ContextValue)> = variables.into_iter().collect();
        for (name, _) in &variables {
            self.state.validate_name(name)?;
        }
        if self.state.level > 0 && !variables.is_empty() {
            self.state
                .frames
                .bindings_for_level(self.state.level, variables.len());
        }
        for (name, value) in variables {
            self.write(&name, Self::binding_for(value));
        }
        Ok(())
    }

    fn unbind(&mut self, name: &str) -> ContextResult<()> {
        self.state.validate_name(name)?;
        self.write(name, Binding::Removed);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<ContextValue> {
        self.store.get(name).map(|value| value.resolved())
    }

    fn contains(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    fn is_local(&self, name: &str) -> bool {
        if self.state.level == 0 {
            return false;
        }
        self.state.frames.active()[1..]
            .iter()
            .rev()
            .find_map(|f| f.bindings.iter().find(|r| r.name == name))
            .is_some_and(|record| record.new.is_bound())
    }

    fn names(&self) -> FxHashSet<String> {
        self.store.keys().into_iter().collect()
    }

    fn has_selection_target(&self) -> bool {
        self.state.has_selection_target()
    }

    fn selection_target(&self) -> Option<&ContextValue> {
        self.state.selection_target()
    }

    fn set_selection_target(&mut self, target: ContextValue) {
        self.state.set_selection_target(target);
    }

    fn inliner(&self) -> Option<&Inliner> {
        self.state.inliner()
    }

    fn set_inliner(&mut self, inliner: Option<Inliner>) {
        self.state.set_inliner(inliner);
    }

    fn template_data(&self) -> Option<&Arc<TemplateData>> {
        self.state.template_data()
    }

    fn set_template_data(&mut self, template_data: Arc<TemplateData>) {
        self.state.set_template_data(template_data);
    }

    fn template_stack(&self) -> Vec<Arc<TemplateData>> {
        self.state.template_stack()
    }

    fn set_element_tag(&mut self, tag: Option<Arc<ElementTag>>) {
        self.state.set_element_tag(tag);
    }

    fn element_stack(&self) -> Vec<Arc<ElementTag>> {
        self.state.element_stack_above(None)
    }

    fn element_stack_above(&self, context_level: usize) -> Vec<Arc<ElementTag>> {
        self.state.element_stack_above(Some(context_level))
    }

    fn level_representation(&self) -> String {
        let frames = self.state.frames.active();
        let (levels, hidden) = self.effective_writes();

        let mut out = String::from("{");
        for (frame, writes) in frames[1..].iter().rev().zip(&levels) {
            if writes.is_empty() && !frame.has_slots() {
                continue;
            }
            if out.len() > 1 {
                out.push(',');
            }
            out.push_str(&format!("{}:", frame.level()));
            if !writes.is_empty() {
                write_entries(
                    &mut out,
                    writes.iter().map(|(name, binding)| {
                        let value = match binding {
                            Binding::Bound(value) => value.to_string(),
                            Binding::Removed => "null".to_string(),
                        };
                        (*name, value)
                    }),
                );
            }
            write_slots(&mut out, frame);
        }

        if out.len() > 1 {
            out.push(',');
        }
        out.push_str("0:");
        let base = self.base_attributes(&hidden);
        write_entries(&mut out, base.iter().map(|(n, v)| (n.as_str(), v.clone())));
        write_slots(&mut out, &frames[0]);
        out.push_str(&format!("}}[{}]", self.state.level));
        out
    }
}

impl<S: ExternalStore> fmt::Display for JournaledVariables<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.store.keys();
        names.sort();
        let mut out = String::new();
        write_entries(
            &mut out,
            names.iter().filter_map(|name| {
                self.store
                    .get(name)
                    .map(|value| (name.as_str(), value.to_string()))
            }),
        );
        f.write_str(&out)?;
        if let Some(target) = self.selection_target() {
            write!(f, "<{target}>")?;
        }
        if let Some(inliner) = self.inliner() {
            write!(f, "[{}]", inliner.name())?;
        }
        if let Some(template) = self.template_data() {
            write!(f, "({})", template.template)?;
        }
        Ok(())
    }
}
