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

//! Self-contained leveled variable map

use super::VariableScope;
use super::frame::{Binding, FrameStore};
use super::levels::{LevelState, write_entries, write_slots};
use crate::config::ContextConfig;
use crate::error::ContextResult;
use crate::template::{ElementTag, Inliner, TemplateData};
use crate::value::ContextValue;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

/// Bindings of one level
type VarMap = FxHashMap<String, Binding>;

impl FrameStore for VarMap {
    fn clear(&mut self) {
        std::collections::HashMap::clear(self);
    }

    fn is_empty(&self) -> bool {
        std::collections::HashMap::is_empty(self)
    }

    fn reserve(&mut self, additional: usize) {
        std::collections::HashMap::reserve(self, additional);
    }
}

/// Leveled variable map owning all of its bindings.
///
/// Each level that binds something gets a frame; lookups walk frames from the
/// innermost outwards and the first frame mentioning a name decides. Removing a
/// name above level 0 leaves a tombstone in the current frame, which goes away
/// with the frame when the level is exited.
#[derive(Debug)]
pub struct ScopedVariables {
    state: LevelState<VarMap>,
}

impl ScopedVariables {
    /// Create an empty map processing `template_data`
    pub fn new(template_data: Arc<TemplateData>) -> Self {
        Self::with_config(&ContextConfig::default(), template_data)
    }

    /// Create an empty map with custom capacities and reserved names
    pub fn with_config(config: &ContextConfig, template_data: Arc<TemplateData>) -> Self {
        Self {
            state: LevelState::new(config, template_data),
        }
    }

    /// Create a map seeded with level-0 variables
    pub fn with_variables<I>(template_data: Arc<TemplateData>, variables: I) -> ContextResult<Self>
    where
        I: IntoIterator<Item = (String, ContextValue)>,
    {
        let mut map = Self::new(template_data);
        map.bind_all(variables)?;
        Ok(map)
    }

    /// Innermost binding entry for `name`, tombstones included
    fn find(&self, name: &str) -> Option<&Binding> {
        self.state.frames.nearest(|f| f.bindings.get(name))
    }

    fn put(&mut self, name: &str, binding: Binding) {
        let frame = self.state.frames.bindings_for_level(self.state.level, 1);
        match frame.bindings.get_mut(name) {
            Some(slot) => *slot = binding,
            None => {
                frame.bindings.insert(name.to_string(), binding);
            }
        }
    }

    /// Whether a tombstone at frame `index` hides a live binding further out
    fn removal_hides_binding(&self, index: usize, name: &str) -> bool {
        self.state.frames.active()[..index]
            .iter()
            .rev()
            .find_map(|f| f.bindings.get(name))
            .is_some_and(Binding::is_bound)
    }

    /// Visible variables in the order their names were first bound, level by level
    fn visible(&self) -> IndexMap<&str, &ContextValue> {
        let mut visible = IndexMap::new();
        for frame in self.state.frames.active() {
            let mut names: Vec<&String> = frame.bindings.keys().collect();
            names.sort();
            for name in names {
                match &frame.bindings[name] {
                    Binding::Bound(value) => {
                        visible.insert(name.as_str(), value);
                    }
                    Binding::Removed => {
                        visible.shift_remove(name.as_str());
                    }
                }
            }
        }
        visible
    }
}

impl VariableScope for ScopedVariables {
    fn level(&self) -> usize {
        self.state.level
    }

    fn enter_scope(&mut self) {
        self.state.enter();
    }

    fn exit_scope(&mut self) {
        self.state.exit(|_| {});
    }

    fn bind(&mut self, name: &str, value: ContextValue) -> ContextResult<()> {
        self.state.validate_name(name)?;
        self.put(name, Binding::Bound(value));
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
        if variables.is_empty() {
            return Ok(());
        }

        let frame = self
            .state
            .frames
            .bindings_for_level(self.state.level, variables.len());
        for (name, value) in variables {
            frame.bindings.insert(name, Binding::Bound(value));
        }
        Ok(())
    }

    fn unbind(&mut self, name: &str) -> ContextResult<()> {
        self.state.validate_name(name)?;
        if !self.contains(name) {
            return Ok(());
        }
        if self.state.level == 0 {
            self.state.frames.base_mut().bindings.remove(name);
        } else {
            self.put(name, Binding::Removed);
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<ContextValue> {
        match self.find(name)? {
            Binding::Bound(value) => Some(value.resolved()),
            Binding::Removed => None,
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.find(name).is_some_and(Binding::is_bound)
    }

    fn is_local(&self, name: &str) -> bool {
        self.state.frames.active()[1..]
            .iter()
            .rev()
            .find_map(|f| f.bindings.get(name))
            .is_some_and(Binding::is_bound)
    }

    fn names(&self) -> FxHashSet<String> {
        let mut names = FxHashSet::default();
        for frame in self.state.frames.active() {
            for (name, binding) in &frame.bindings {
                match binding {
                    Binding::Bound(_) => {
                        names.insert(name.clone());
                    }
                    Binding::Removed => {
                        names.remove(name);
                    }
                }
            }
        }
        names
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
        let mut out = String::from("{");
        let frames = self.state.frames.active();
        for (index, frame) in frames.iter().enumerate().rev() {
            let mut names: Vec<&String> = frame.bindings.keys().collect();
            names.sort();
            let entries: Vec<(&str, String)> = names
                .into_iter()
                .filter_map(|name| match &frame.bindings[name] {
                    Binding::Bound(value) => Some((name.as_str(), value.to_string())),
                    Binding::Removed if self.removal_hides_binding(index, name) => {
                        Some((name.as_str(), "(*removed*)".to_string()))
                    }
                    Binding::Removed => None,
                })
                .collect();

            if index != 0 && entries.is_empty() && !frame.has_slots() {
                continue;
            }
            if out.len() > 1 {
                out.push(',');
            }
            out.push_str(&format!("{}:", frame.level()));
            if index == 0 || !entries.is_empty() {
                write_entries(&mut out, entries);
            }
            write_slots(&mut out, frame);
        }
        out.push_str(&format!("}}[{}]", self.state.level));
        out
    }
}

impl fmt::Display for ScopedVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_entries(
            &mut out,
            self.visible()
                .into_iter()
                .map(|(name, value)| (name, value.to_string())),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use crate::template::TemplateMode;
    use pretty_assertions::assert_eq;

    fn template(name: &str) -> Arc<TemplateData> {
        TemplateData::new(name, TemplateMode::Html).shared()
    }

    fn map() -> ScopedVariables {
        ScopedVariables::with_config(&ContextConfig::testing(), template("test"))
    }

    fn sorted(names: FxHashSet<String>) -> Vec<String> {
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        names
    }

    #[test]
    fn test_shadowing() {
        let mut vm = map();
        vm.bind("x", 1.into()).unwrap();
        vm.enter_scope();
        vm.bind("x", 2.into()).unwrap();
        assert_eq!(vm.lookup("x"), Some(2.into()));
        vm.exit_scope();
        assert_eq!(vm.lookup("x"), Some(1.into()));
    }

    #[test]
    fn test_bind_overwrites_in_place() {
        let mut vm = map();
        vm.enter_scope();
        vm.bind("x", 1.into()).unwrap();
        vm.bind("x", 2.into()).unwrap();
        assert_eq!(vm.state.frames.active()[1].bindings.len(), 1);
        assert_eq!(vm.lookup("x"), Some(2.into()));
    }

    #[test]
    fn test_unbind_within_scope_is_undone() {
        let mut vm = map();
        vm.bind("x", 1.into()).unwrap();
        vm.enter_scope();
        vm.unbind("x").unwrap();
        assert!(!vm.contains("x"));
        assert_eq!(vm.lookup("x"), None);
        assert!(!vm.names().contains("x"));
        vm.exit_scope();
        assert!(vm.contains("x"));
        assert_eq!(vm.lookup("x"), Some(1.into()));
    }

    #[test]
    fn test_unbind_absent_name_allocates_nothing() {
        let mut vm = map();
        vm.enter_scope();
        vm.unbind("missing").unwrap();
        assert_eq!(vm.state.frames.top(), 0);
    }

    #[test]
    fn test_unbind_at_level_zero_removes() {
        let mut vm = map();
        vm.bind("x", 1.into()).unwrap();
        vm.unbind("x").unwrap();
        assert!(vm.state.frames.active()[0].bindings.is_empty());
        assert!(!vm.contains("x"));
    }

    #[test]
    fn test_null_is_a_live_binding() {
        let mut vm = map();
        vm.bind("n", ContextValue::Null).unwrap();
        assert!(vm.contains("n"));
        assert_eq!(vm.lookup("n"), Some(ContextValue::Null));
    }

    #[test]
    fn test_empty_levels_are_invisible() {
        let mut vm = map();
        vm.bind("a", 1.into()).unwrap();
        vm.bind("b", 2.into()).unwrap();
        let before = sorted(vm.names());

        for _ in 0..10 {
            vm.enter_scope();
        }
        assert_eq!(vm.state.frames.top(), 0);
        for _ in 0..10 {
            vm.exit_scope();
        }

        assert_eq!(sorted(vm.names()), before);
        assert_eq!(vm.lookup("a"), Some(1.into()));
        assert_eq!(vm.lookup("b"), Some(2.into()));
    }

    #[test]
    fn test_names_apply_tombstones() {
        let mut vm = map();
        vm.bind("a", 1.into()).unwrap();
        vm.bind("b", 2.into()).unwrap();
        vm.enter_scope();
        vm.unbind("a").unwrap();
        vm.bind("c", 3.into()).unwrap();
        assert_eq!(sorted(vm.names()), vec!["b", "c"]);
    }

    #[test]
    fn test_is_local() {
        let mut vm = map();
        vm.bind("w", 5.into()).unwrap();
        vm.enter_scope();
        assert!(!vm.is_local("w"));
        vm.bind("w", 6.into()).unwrap();
        assert!(vm.is_local("w"));
        vm.enter_scope();
        vm.unbind("w").unwrap();
        assert!(!vm.is_local("w"));
        vm.exit_scope();
        assert!(vm.is_local("w"));
        vm.exit_scope();
        assert!(!vm.is_local("w"));
    }

    #[test]
    fn test_bind_all_validates_first() {
        let mut vm = ScopedVariables::with_config(&ContextConfig::web(), template("test"));
        let result = vm.bind_all(vec![
            ("ok".to_string(), 1.into()),
            ("session".to_string(), 2.into()),
        ]);
        assert_eq!(
            result,
            Err(ContextError::ReservedName {
                name: "session".into()
            })
        );
        assert!(!vm.contains("ok"));
    }

    #[test]
    fn test_bind_rejects_empty_name() {
        let mut vm = map();
        assert_eq!(vm.bind("", 1.into()), Err(ContextError::InvalidName));
    }

    #[test]
    fn test_lazy_values_resolve_on_lookup() {
        let mut vm = map();
        vm.bind("lazy", ContextValue::lazy(|| ContextValue::from("ready")))
            .unwrap();
        assert!(vm.contains("lazy"));
        assert_eq!(vm.lookup("lazy"), Some(ContextValue::from("ready")));
    }

    #[test]
    fn test_selection_target_scoping() {
        let mut vm = map();
        assert!(!vm.has_selection_target());
        vm.enter_scope();
        vm.set_selection_target("person".into());
        vm.enter_scope();
        assert_eq!(vm.selection_target(), Some(&ContextValue::from("person")));
        vm.exit_scope();
        vm.exit_scope();
        assert!(!vm.has_selection_target());
        assert_eq!(vm.selection_target(), None);
    }

    #[test]
    fn test_frames_are_reused_across_iterations() {
        let mut vm = map();
        for i in 0..5 {
            vm.enter_scope();
            vm.bind("item", i.into()).unwrap();
            vm.enter_scope();
            vm.bind("inner", i.into()).unwrap();
            vm.exit_scope();
            vm.exit_scope();
        }
        assert_eq!(vm.state.frames.allocated(), 3);
        assert!(!vm.contains("item"));
    }

    #[test]
    fn test_level_representation() {
        let mut vm = map();
        vm.bind("a", 0.into()).unwrap();
        vm.bind("b", 2.into()).unwrap();
        vm.enter_scope();
        vm.enter_scope();
        vm.bind("a", 1.into()).unwrap();
        vm.unbind("b").unwrap();
        vm.unbind("a").unwrap();
        vm.set_inliner(Some(Inliner::Standard(TemplateMode::Text)));
        vm.enter_scope();

        assert_eq!(
            vm.level_representation(),
            "{2:{a=(*removed*), b=(*removed*)}[STANDARDTEXT],0:{a=0, b=2}(test)}[3]"
        );
    }

    #[test]
    fn test_level_representation_skips_useless_tombstones() {
        let mut vm = map();
        vm.bind("x", 1.into()).unwrap();
        vm.enter_scope();
        vm.unbind("x").unwrap();
        vm.enter_scope();
        vm.bind("x", 2.into()).unwrap();
        vm.unbind("x").unwrap();

        // level 2 only re-removes what level 1 already hid
        assert_eq!(
            vm.level_representation(),
            "{1:{x=(*removed*)},0:{x=1}(test)}[2]"
        );
    }

    #[test]
    fn test_display() {
        let mut vm = map();
        vm.bind("b", 2.into()).unwrap();
        vm.bind("a", 1.into()).unwrap();
        vm.enter_scope();
        vm.bind("c", "x".into()).unwrap();
        vm.set_selection_target("sel".into());
        assert_eq!(vm.to_string(), "{a=1, b=2, c=x}<sel>(test)");
    }
}
