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

//! Values held by template variables
//!
//! Every value is cheap to clone: composite variants share their payload through
//! `Arc`, which also gives journaled scopes an identity to compare against when
//! deciding whether a value in an external store is still the one they wrote.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Value bound to a template variable or used as a selection target
#[derive(Clone, PartialEq)]
pub enum ContextValue {
    /// Explicit null
    Null,

    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// String value
    String(Arc<str>),

    /// Ordered list of values
    List(Arc<[ContextValue]>),

    /// Ordered map of named values
    Map(Arc<IndexMap<String, ContextValue>>),

    /// Arbitrary JSON document
    Json(Arc<serde_json::Value>),

    /// Value computed on first access
    Lazy(LazyVariable),
}

impl ContextValue {
    /// Create a string value
    pub fn string(value: impl AsRef<str>) -> Self {
        Self::String(Arc::from(value.as_ref()))
    }

    /// Create a list value
    pub fn list(values: impl IntoIterator<Item = ContextValue>) -> Self {
        Self::List(values.into_iter().collect())
    }

    /// Create a map value
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ContextValue)>) -> Self {
        Self::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Create a lazily computed value
    pub fn lazy<F>(init: F) -> Self
    where
        F: Fn() -> ContextValue + Send + Sync + 'static,
    {
        Self::Lazy(LazyVariable::new(init))
    }

    /// Identity comparison.
    ///
    /// Shared variants are the same only if they point at the same allocation,
    /// scalars are the same if they are equal. Two strings with equal contents
    /// built separately are *not* the same value.
    pub fn is_same(&self, other: &ContextValue) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::Json(a), Self::Json(b)) => Arc::ptr_eq(a, b),
            (Self::Lazy(a), Self::Lazy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Return the value with any lazy wrapper resolved
    pub fn resolved(&self) -> ContextValue {
        match self {
            Self::Lazy(lazy) => lazy.value().clone(),
            other => other.clone(),
        }
    }

    /// Check if this is an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the boolean payload, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::Json(_) => "Json",
            Self::Lazy(_) => "Lazy",
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                write!(f, "}}")
            }
            Self::Json(json) => write!(f, "{json}"),
            Self::Lazy(lazy) => match lazy.get() {
                Some(value) => write!(f, "{value}"),
                None => write!(f, "(lazy)"),
            },
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Lazy(lazy) => fmt::Debug::fmt(lazy, f),
            other => write!(f, "{}({other})", other.type_name()),
        }
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ContextValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<Vec<ContextValue>> for ContextValue {
    fn from(values: Vec<ContextValue>) -> Self {
        Self::List(values.into())
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Json(Arc::new(serde_json::Value::Number(n))),
            },
            other => Self::Json(Arc::new(other)),
        }
    }
}

struct LazyInner {
    cell: OnceCell<ContextValue>,
    init: Box<dyn Fn() -> ContextValue + Send + Sync>,
}

/// Variable whose value is computed the first time it is looked up.
///
/// Clones share the computed value.
#[derive(Clone)]
pub struct LazyVariable {
    inner: Arc<LazyInner>,
}

impl LazyVariable {
    /// Create a lazy variable from its initializer
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> ContextValue + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(LazyInner {
                cell: OnceCell::new(),
                init: Box::new(init),
            }),
        }
    }

    /// Get the value, computing it on first access
    pub fn value(&self) -> &ContextValue {
        self.inner.cell.get_or_init(|| (self.inner.init)())
    }

    /// Get the value only if it has already been computed
    pub fn get(&self) -> Option<&ContextValue> {
        self.inner.cell.get()
    }

    /// Check whether the initializer has run
    pub fn is_initialized(&self) -> bool {
        self.inner.cell.get().is_some()
    }

    /// Check whether two handles share the same lazy cell
    pub fn ptr_eq(&self, other: &LazyVariable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for LazyVariable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for LazyVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyVariable")
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_scalars_are_same_by_value() {
        assert!(ContextValue::Integer(3).is_same(&ContextValue::Integer(3)));
        assert!(!ContextValue::Integer(3).is_same(&ContextValue::Integer(4)));
        assert!(ContextValue::Null.is_same(&ContextValue::Null));
        assert!(!ContextValue::Null.is_same(&ContextValue::Boolean(false)));
    }

    #[test]
    fn test_strings_are_same_by_identity() {
        let a = ContextValue::from("hello");
        let b = a.clone();
        let c = ContextValue::from("hello");

        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
        // equality still compares contents
        assert_eq!(a, c);
    }

    #[test]
    fn test_lazy_is_computed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = ContextValue::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ContextValue::from("computed")
        });

        let ContextValue::Lazy(lazy) = &value else {
            panic!("expected lazy value");
        };
        assert!(!lazy.is_initialized());
        assert_eq!(format!("{value}"), "(lazy)");

        assert_eq!(value.resolved(), ContextValue::from("computed"));
        assert_eq!(value.clone().resolved(), ContextValue::from("computed"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(format!("{value}"), "computed");
    }

    #[test]
    fn test_display() {
        let list = ContextValue::list([ContextValue::from(1), ContextValue::from("a")]);
        assert_eq!(list.to_string(), "[1, a]");

        let map = ContextValue::map([("x", ContextValue::from(true)), ("y", ContextValue::Null)]);
        assert_eq!(map.to_string(), "{x=true, y=null}");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            ContextValue::from(serde_json::json!(42)),
            ContextValue::Integer(42)
        );
        assert_eq!(
            ContextValue::from(serde_json::json!("text")),
            ContextValue::from("text")
        );
        assert!(matches!(
            ContextValue::from(serde_json::json!({"a": 1})),
            ContextValue::Json(_)
        ));
    }

    #[test]
    fn test_accessors() {
        assert!(ContextValue::Null.is_null());
        assert!(!ContextValue::from(0).is_null());
        assert_eq!(ContextValue::from(7).as_integer(), Some(7));
        assert_eq!(ContextValue::from("7").as_integer(), None);
        assert_eq!(ContextValue::from(false).as_bool(), Some(false));
        assert_eq!(ContextValue::Null.as_bool(), None);
        assert_eq!(ContextValue::from("s").as_str(), Some("s"));
    }
}
