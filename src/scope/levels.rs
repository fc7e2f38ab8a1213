//! Level bookkeeping shared by both scope maps
//!
//! Everything here is independent of how bindings are stored: the level counter,
//! the frame arena, the per-level slots (selection target, inliner, template data),
//! the element stack and name validation.

use super::frame::{Frame, FrameArena, FrameStore};
use crate::config::ContextConfig;
use crate::error::{ContextError, ContextResult};
use crate::template::{ElementTag, Inliner, TemplateData};
use crate::value::ContextValue;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct LevelState<S> {
    pub(crate) level: usize,
    pub(crate) frames: FrameArena<S>,
    element_tags: Vec<Option<Arc<ElementTag>>>,
    reserved: Arc<[String]>,
}

impl<S: FrameStore> LevelState<S> {
    pub(crate) fn new(config: &ContextConfig, template_data: Arc<TemplateData>) -> Self {
        let mut frames = FrameArena::new(config.initial_frames, config.initial_bindings);
        frames.base_mut().template_data = Some(template_data);
        Self {
            level: 0,
            frames,
            element_tags: Vec::with_capacity(config.element_hierarchy),
            reserved: config.reserved(),
        }
    }

    pub(crate) fn validate_name(&self, name: &str) -> ContextResult<()> {
        if name.is_empty() {
            return Err(ContextError::InvalidName);
        }
        if self.reserved.iter().any(|r| r == name) {
            return Err(ContextError::ReservedName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn enter(&mut self) {
        self.level += 1;
    }

    /// Leave the current level, handing its bindings to `drain` before they are cleared
    pub(crate) fn exit(&mut self, drain: impl FnOnce(&mut S)) {
        assert!(self.level > 0, "{}", ContextError::ScopeUnderflow);
        self.frames.retire(self.level, drain);
        if let Some(tag) = self.element_tags.get_mut(self.level) {
            *tag = None;
        }
        self.level -= 1;
    }

    pub(crate) fn has_selection_target(&self) -> bool {
        self.selection_target().is_some()
    }

    pub(crate) fn selection_target(&self) -> Option<&ContextValue> {
        self.frames.nearest(|f| f.selection_target.as_ref())
    }

    pub(crate) fn set_selection_target(&mut self, target: ContextValue) {
        self.frames.frame_for_level(self.level).selection_target = Some(target);
    }

    pub(crate) fn inliner(&self) -> Option<&Inliner> {
        self.frames
            .nearest(|f| f.inliner.as_ref())
            .filter(|inliner| inliner.is_enabled())
    }

    pub(crate) fn set_inliner(&mut self, inliner: Option<Inliner>) {
        let inliner = inliner.unwrap_or(Inliner::Disabled);
        self.frames.frame_for_level(self.level).inliner = Some(inliner);
    }

    pub(crate) fn template_data(&self) -> Option<&Arc<TemplateData>> {
        self.frames.nearest(|f| f.template_data.as_ref())
    }

    pub(crate) fn set_template_data(&mut self, template_data: Arc<TemplateData>) {
        self.frames.frame_for_level(self.level).template_data = Some(template_data);
    }

    pub(crate) fn template_stack(&self) -> Vec<Arc<TemplateData>> {
        self.frames
            .active()
            .iter()
            .filter_map(|f| f.template_data.clone())
            .collect()
    }

    pub(crate) fn set_element_tag(&mut self, tag: Option<Arc<ElementTag>>) {
        if self.element_tags.len() <= self.level {
            self.element_tags.resize(self.level + 1, None);
        }
        self.element_tags[self.level] = tag;
    }

    pub(crate) fn element_stack_above(&self, context_level: Option<usize>) -> Vec<Arc<ElementTag>> {
        let from = context_level.map_or(0, |l| l.saturating_add(1));
        self.element_tags
            .iter()
            .take(self.level + 1)
            .skip(from)
            .flatten()
            .cloned()
            .collect()
    }
}

/// Append `:<target>[inliner](template)` style markers of a frame to a level dump
pub(crate) fn write_slots<S>(out: &mut String, frame: &Frame<S>) {
    if let Some(target) = &frame.selection_target {
        let _ = write!(out, "<{target}>");
    }
    if let Some(inliner) = &frame.inliner {
        let _ = write!(out, "[{}]", inliner.name());
    }
    if let Some(template) = &frame.template_data {
        let _ = write!(out, "({})", template.template);
    }
}

/// Render `name=value` pairs the way level dumps show a single level
pub(crate) fn write_entries<'a>(
    out: &mut String,
    entries: impl IntoIterator<Item = (&'a str, String)>,
) {
    out.push('{');
    for (i, (name, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{name}={value}");
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateMode;

    #[derive(Default, Debug)]
    struct NoBindings;

    impl FrameStore for NoBindings {
        fn clear(&mut self) {}
        fn is_empty(&self) -> bool {
            true
        }
        fn reserve(&mut self, _additional: usize) {}
    }

    fn state() -> LevelState<NoBindings> {
        LevelState::new(
            &ContextConfig::web(),
            TemplateData::new("main", TemplateMode::Html).shared(),
        )
    }

    #[test]
    fn test_validate_name() {
        let state = state();
        assert!(state.validate_name("x").is_ok());
        assert_eq!(state.validate_name(""), Err(ContextError::InvalidName));
        assert_eq!(
            state.validate_name("session"),
            Err(ContextError::ReservedName {
                name: "session".into()
            })
        );
    }

    #[test]
    #[should_panic(expected = "Cannot decrease variable map level below 0")]
    fn test_exit_below_zero_panics() {
        let mut state = state();
        state.exit(|_| {});
    }

    #[test]
    fn test_inliner_disabled_hides_outer_inliner() {
        let mut state = state();
        state.set_inliner(Some(Inliner::Standard(TemplateMode::Text)));
        state.enter();
        state.set_inliner(None);
        assert_eq!(state.inliner(), None);
        state.exit(|_| {});
        assert_eq!(state.inliner(), Some(&Inliner::Standard(TemplateMode::Text)));
    }

    #[test]
    fn test_element_stack() {
        let mut state = state();
        state.set_element_tag(Some(Arc::new(ElementTag::new("html"))));
        state.enter();
        state.enter();
        state.set_element_tag(Some(Arc::new(ElementTag::new("div"))));

        let names = |tags: Vec<Arc<ElementTag>>| {
            tags.iter().map(|t| t.element_name.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(state.element_stack_above(None)), vec!["html", "div"]);
        assert_eq!(names(state.element_stack_above(Some(0))), vec!["div"]);

        state.exit(|_| {});
        assert_eq!(names(state.element_stack_above(None)), vec!["html"]);
    }

    #[test]
    fn test_template_stack_follows_levels() {
        let mut state = state();
        state.enter();
        state.set_template_data(TemplateData::new("fragment", TemplateMode::Html).shared());
        let stack: Vec<_> = state.template_stack().iter().map(|t| t.template.clone()).collect();
        assert_eq!(stack, vec!["main", "fragment"]);
        assert_eq!(state.template_data().map(|t| t.template.as_str()), Some("fragment"));

        state.exit(|_| {});
        assert_eq!(state.template_stack().len(), 1);
        assert_eq!(state.template_data().map(|t| t.template.as_str()), Some("main"));
    }

    #[test]
    fn test_element_stack_above_deepest_level_is_empty() {
        let mut state = state();
        state.set_element_tag(Some(Arc::new(ElementTag::new("html"))));
        state.enter();
        state.set_element_tag(Some(Arc::new(ElementTag::new("body"))));
        assert!(state.element_stack_above(Some(usize::MAX)).is_empty());
        assert!(state.element_stack_above(Some(1)).is_empty());
    }
}
