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

//! Message resolution
//!
//! A context asks every configured [`MessageResolver`] in turn for a message and
//! takes the first answer. When nobody knows the key, resolvers are asked again
//! for their "absent message" placeholder.

use crate::template::TemplateData;
use crate::value::ContextValue;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// `{0}`, `{1}`, ... placeholders in message text
static PARAMETER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\d+)\}").expect("valid placeholder pattern"));

/// Everything a resolver gets to look a message up with
#[derive(Debug, Clone, Copy)]
pub struct MessageRequest<'a> {
    /// Templates in force, innermost first
    pub templates: &'a [Arc<TemplateData>],
    /// Component asking for the message, if it wants its own bundle searched
    pub origin: Option<&'a str>,
    pub key: &'a str,
    pub params: &'a [ContextValue],
    /// Locale such as `en_US`; empty for the default locale
    pub locale: &'a str,
}

/// Source of externalized messages
pub trait MessageResolver: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Position among the configured resolvers; lower goes first
    fn order(&self) -> i32 {
        0
    }

    /// Resolved and formatted message, `None` if this resolver does not know the key
    fn resolve_message(&self, request: &MessageRequest<'_>) -> Option<String>;

    /// Placeholder text for a key no resolver knows, `None` to let the next resolver decide
    fn absent_message_representation(&self, request: &MessageRequest<'_>) -> Option<String>;
}

/// Messages of one bundle, by locale then key
#[derive(Debug, Clone, Default)]
pub struct MessageBundle {
    locales: FxHashMap<String, FxHashMap<String, String>>,
}

impl MessageBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key = message` for `locale` (empty locale for the fallback messages)
    pub fn with_message(
        mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.insert(locale, key, message);
        self
    }

    pub fn insert(
        &mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.locales
            .entry(locale.into())
            .or_default()
            .insert(key.into(), message.into());
    }

    /// Message for `key`, trying `locale`, then its language, then the fallback messages
    pub fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        locale_candidates(locale).find_map(|candidate| {
            self.locales
                .get(candidate)
                .and_then(|messages| messages.get(key))
                .map(String::as_str)
        })
    }
}

/// `en_US_POSIX` -> `en_US_POSIX`, `en_US`, `en`, ``
fn locale_candidates(locale: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(locale);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current.is_empty() {
            None
        } else {
            Some(current.rfind('_').map_or("", |i| &current[..i]))
        };
        Some(current)
    })
}

/// Replace `{n}` placeholders with the matching parameter.
///
/// Placeholders without a parameter are left as they are.
pub fn format_message<'m>(message: &'m str, params: &[ContextValue]) -> Cow<'m, str> {
    if params.is_empty() {
        return Cow::Borrowed(message);
    }
    PARAMETER_PATTERN.replace_all(message, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|i| params.get(i))
            .map_or_else(|| caps[0].to_string(), |param| param.resolved().to_string())
    })
}

/// In-memory resolver searching template bundles, then origin bundles, then shared messages
#[derive(Debug, Clone)]
pub struct StandardMessageResolver {
    name: String,
    order: i32,
    template_messages: FxHashMap<String, MessageBundle>,
    origin_messages: FxHashMap<String, MessageBundle>,
    default_messages: MessageBundle,
}

impl Default for StandardMessageResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardMessageResolver {
    pub fn new() -> Self {
        Self {
            name: "StandardMessageResolver".to_string(),
            order: 0,
            template_messages: FxHashMap::default(),
            origin_messages: FxHashMap::default(),
            default_messages: MessageBundle::new(),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Messages used when neither a template nor an origin bundle knows the key
    pub fn with_default_messages(mut self, bundle: MessageBundle) -> Self {
        self.default_messages = bundle;
        self
    }

    /// Messages specific to the template named `template`
    pub fn with_template_messages(
        mut self,
        template: impl Into<String>,
        bundle: MessageBundle,
    ) -> Self {
        self.template_messages.insert(template.into(), bundle);
        self
    }

    /// Messages specific to one origin component
    pub fn with_origin_messages(
        mut self,
        origin: impl Into<String>,
        bundle: MessageBundle,
    ) -> Self {
        self.origin_messages.insert(origin.into(), bundle);
        self
    }

    fn find(&self, request: &MessageRequest<'_>) -> Option<&str> {
        let from_templates = request.templates.iter().find_map(|template| {
            self.template_messages
                .get(&template.template)
                .and_then(|bundle| bundle.lookup(request.locale, request.key))
        });
        from_templates
            .or_else(|| {
                request
                    .origin
                    .and_then(|origin| self.origin_messages.get(origin))
                    .and_then(|bundle| bundle.lookup(request.locale, request.key))
            })
            .or_else(|| self.default_messages.lookup(request.locale, request.key))
    }
}

impl MessageResolver for StandardMessageResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn resolve_message(&self, request: &MessageRequest<'_>) -> Option<String> {
        self.find(request)
            .map(|message| format_message(message, request.params).into_owned())
    }

    fn absent_message_representation(&self, request: &MessageRequest<'_>) -> Option<String> {
        Some(format!("??{}_{}??", request.key, request.locale))
    }
}
