//! External key/value stores that journaled scopes write through to

use crate::value::ContextValue;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::rc::Rc;
use std::sync::Arc;

/// Mutable key/value table owned by someone else (e.g. a web request's attributes).
///
/// Methods take `&self`: the table is shared with code outside the template
/// engine, which may read or write it at any moment.
pub trait ExternalStore {
    /// Current value stored under `name`
    fn get(&self, name: &str) -> Option<ContextValue>;

    /// Store `value` under `name`, replacing any previous value
    fn set(&self, name: &str, value: ContextValue);

    /// Remove `name` from the table
    fn remove(&self, name: &str);

    /// Every name currently stored.
    ///
    /// May be slow on real stores; never call it per evaluation.
    fn keys(&self) -> Vec<String>;

    /// Whether `name` is stored
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl<T: ExternalStore + ?Sized> ExternalStore for &T {
    fn get(&self, name: &str) -> Option<ContextValue> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: ContextValue) {
        (**self).set(name, value)
    }

    fn remove(&self, name: &str) {
        (**self).remove(name)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

impl<T: ExternalStore + ?Sized> ExternalStore for Rc<T> {
    fn get(&self, name: &str) -> Option<ContextValue> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: ContextValue) {
        (**self).set(name, value)
    }

    fn remove(&self, name: &str) {
        (**self).remove(name)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

impl<T: ExternalStore + ?Sized> ExternalStore for Arc<T> {
    fn get(&self, name: &str) -> Option<ContextValue> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: ContextValue) {
        (**self).set(name, value)
    }

    fn remove(&self, name: &str) {
        (**self).remove(name)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

/// In-memory attribute table keeping insertion order
#[derive(Debug, Default)]
pub struct AttributeTable {
    attributes: RwLock<IndexMap<String, ContextValue>>,
}

impl AttributeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding `attributes`
    pub fn with_attributes<K: Into<String>>(
        attributes: impl IntoIterator<Item = (K, ContextValue)>,
    ) -> Self {
        Self {
            attributes: RwLock::new(
                attributes
                    .into_iter()
                    .map(|(name, value)| (name.into(), value))
                    .collect(),
            ),
        }
    }

    /// Number of attributes stored
    pub fn len(&self) -> usize {
        self.attributes.read().len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.attributes.read().is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> IndexMap<String, ContextValue> {
        self.attributes.read().clone()
    }
}

impl ExternalStore for AttributeTable {
    fn get(&self, name: &str) -> Option<ContextValue> {
        self.attributes.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: ContextValue) {
        let mut attributes = self.attributes.write();
        match attributes.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                attributes.insert(name.to_string(), value);
            }
        }
    }

    fn remove(&self, name: &str) {
        self.attributes.write().shift_remove(name);
    }

    fn keys(&self) -> Vec<String> {
        self.attributes.read().keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_table_keeps_order() {
        let table = AttributeTable::with_attributes([("b", 1.into()), ("a", 2.into())]);
        table.set("c", 3.into());
        table.set("b", 4.into());
        assert_eq!(table.keys(), vec!["b", "a", "c"]);
        assert_eq!(table.get("b"), Some(4.into()));

        table.remove("a");
        assert_eq!(table.keys(), vec!["b", "c"]);
        assert!(!table.contains("a"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_shared_handles_see_the_same_table() {
        let table = Rc::new(AttributeTable::new());
        let other = Rc::clone(&table);
        table.set("x", "y".into());
        assert_eq!(other.get("x"), Some("y".into()));

        let by_ref: &AttributeTable = &table;
        ExternalStore::remove(&by_ref, "x");
        assert!(other.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let table = AttributeTable::with_attributes([("a", 1.into())]);
        let snapshot = table.snapshot();
        table.set("b", 2.into());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a"), Some(&ContextValue::from(1)));
        assert_eq!(table.snapshot().keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
