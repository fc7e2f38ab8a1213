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

//! Level frames
//!
//! A frame is attached to a level only once that level mutates something. Frames
//! live in a dense arena addressed by [`FrameIndex`]; levels that never bind
//! anything take no slot at all. Retired frames stay in the arena with their
//! storage intact so the next level to need a frame reuses it.

use crate::template::{Inliner, TemplateData};
use crate::value::ContextValue;
use std::sync::Arc;

/// Compact handle of a frame inside a [`FrameArena`]
pub(crate) type FrameIndex = usize;

/// Level marker of frames that are not in use
const RETIRED: usize = usize::MAX;

/// State of a name inside one frame
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    /// Name is bound to a value
    Bound(ContextValue),
    /// Name was removed at this frame's level
    Removed,
}

impl Binding {
    pub(crate) fn from_option(value: Option<ContextValue>) -> Self {
        match value {
            Some(value) => Binding::Bound(value),
            None => Binding::Removed,
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }

    /// Identity check against a value read back from a store
    pub(crate) fn matches(&self, current: Option<&ContextValue>) -> bool {
        match (self, current) {
            (Binding::Bound(expected), Some(current)) => expected.is_same(current),
            (Binding::Removed, None) => true,
            _ => false,
        }
    }

    pub(crate) fn is_same(&self, other: &Binding) -> bool {
        match other {
            Binding::Bound(value) => self.matches(Some(value)),
            Binding::Removed => self.matches(None),
        }
    }
}

/// Per-frame binding storage
pub(crate) trait FrameStore: Default {
    /// Drop every entry, keeping the allocation
    fn clear(&mut self);

    /// Check if the frame holds no entries
    fn is_empty(&self) -> bool;

    /// Make room for at least `additional` entries
    fn reserve(&mut self, additional: usize);
}

/// Storage attached to one level
#[derive(Debug)]
pub(crate) struct Frame<S> {
    level: usize,
    pub(crate) bindings: S,
    pub(crate) selection_target: Option<ContextValue>,
    pub(crate) inliner: Option<Inliner>,
    pub(crate) template_data: Option<Arc<TemplateData>>,
}

impl<S: FrameStore> Frame<S> {
    fn new(level: usize) -> Self {
        Self {
            level,
            bindings: S::default(),
            selection_target: None,
            inliner: None,
            template_data: None,
        }
    }

    /// Level this frame belongs to
    pub(crate) fn level(&self) -> usize {
        self.level
    }

    /// Whether the frame sets any of the per-level slots
    pub(crate) fn has_slots(&self) -> bool {
        self.selection_target.is_some() || self.inliner.is_some() || self.template_data.is_some()
    }

    fn reset(&mut self) {
        self.level = RETIRED;
        self.bindings.clear();
        self.selection_target = None;
        self.inliner = None;
        self.template_data = None;
    }
}

/// Dense arena of frames, ordered by level
///
/// Invariants: index 0 always belongs to level 0, indices `0..=top` are active and
/// their levels strictly increase, and at most one active frame exists per level.
#[derive(Debug)]
pub(crate) struct FrameArena<S> {
    frames: Vec<Frame<S>>,
    top: FrameIndex,
    binding_capacity: usize,
}

impl<S: FrameStore> FrameArena<S> {
    pub(crate) fn new(frame_capacity: usize, binding_capacity: usize) -> Self {
        let mut frames = Vec::with_capacity(frame_capacity.max(1));
        frames.push(Frame::new(0));
        Self {
            frames,
            top: 0,
            binding_capacity,
        }
    }

    /// Frames currently in use, outermost first
    pub(crate) fn active(&self) -> &[Frame<S>] {
        &self.frames[..=self.top]
    }

    /// Index of the innermost active frame
    pub(crate) fn top(&self) -> FrameIndex {
        self.top
    }

    /// The permanent level-0 frame
    pub(crate) fn base_mut(&mut self) -> &mut Frame<S> {
        &mut self.frames[0]
    }

    /// The frame owned by `level`, if that level has allocated one
    #[cfg(test)]
    pub(crate) fn current(&self, level: usize) -> Option<&Frame<S>> {
        let frame = &self.frames[self.top];
        (frame.level == level).then_some(frame)
    }

    /// The frame owned by `level`, allocating (or reusing) one if needed.
    ///
    /// `level` must not be lower than the level of the innermost active frame.
    pub(crate) fn frame_for_level(&mut self, level: usize) -> &mut Frame<S> {
        if self.frames[self.top].level != level {
            debug_assert!(self.frames[self.top].level < level);
            self.top += 1;
            if self.top == self.frames.len() {
                log::trace!("allocating frame {} for level {}", self.top, level);
                self.frames.push(Frame::new(level));
            } else {
                self.frames[self.top].level = level;
            }
        }
        &mut self.frames[self.top]
    }

    /// Same as [`FrameArena::frame_for_level`], with binding storage ready for writes
    pub(crate) fn bindings_for_level(&mut self, level: usize, additional: usize) -> &mut Frame<S> {
        let capacity = self.binding_capacity.max(additional);
        let frame = self.frame_for_level(level);
        if frame.bindings.is_empty() {
            frame.bindings.reserve(capacity);
        }
        frame
    }

    /// Retire the frame owned by `level`, if any.
    ///
    /// `drain` sees the frame's bindings before they are cleared. Returns whether
    /// a frame was retired.
    pub(crate) fn retire(&mut self, level: usize, drain: impl FnOnce(&mut S)) -> bool {
        if self.top == 0 || self.frames[self.top].level != level {
            return false;
        }
        let frame = &mut self.frames[self.top];
        if !frame.bindings.is_empty() {
            drain(&mut frame.bindings);
        }
        frame.reset();
        log::trace!("retired frame {} of level {}", self.top, level);
        self.top -= 1;
        true
    }

    /// First value picked from the active frames, innermost first
    pub(crate) fn nearest<'a, T: ?Sized + 'a>(
        &'a self,
        pick: impl Fn(&'a Frame<S>) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.active().iter().rev().find_map(pick)
    }

    /// Number of frames ever allocated (active or retired)
    #[cfg(test)]
    pub(crate) fn allocated(&self) -> usize {
        self.frames.len()
    }
}
