//! Expression objects
//!
//! Utility objects (`#dates`, `#strings`, ...) exposed to expressions. Factories
//! are registered in the engine configuration; a context builds its object set on
//! first use and each object on first request.

use crate::template::TemplateData;
use crate::value::ContextValue;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// What a factory can see of the context it builds objects for
#[derive(Debug, Clone, Copy)]
pub struct ObjectScope<'a> {
    pub locale: &'a str,
    pub template: Option<&'a Arc<TemplateData>>,
}

/// Builds the expression objects of one family
pub trait ExpressionObjectFactory: Send + Sync + fmt::Debug {
    /// Names of every object this factory can build
    fn object_names(&self) -> Vec<String>;

    /// Build the object called `name`
    fn build_object(&self, scope: &ObjectScope<'_>, name: &str) -> Option<ContextValue>;

    /// Whether a built object may be reused for the rest of the execution
    fn is_cacheable(&self, name: &str) -> bool;
}

/// Expression objects available to one execution
pub struct ExpressionObjects {
    /// Object name to the factory that owns it (first registration wins)
    owners: IndexMap<String, Arc<dyn ExpressionObjectFactory>>,
    cache: RefCell<FxHashMap<String, Option<ContextValue>>>,
}

impl ExpressionObjects {
    pub fn new(factories: &[Arc<dyn ExpressionObjectFactory>]) -> Self {
        let mut owners = IndexMap::new();
        for factory in factories {
            for name in factory.object_names() {
                owners.entry(name).or_insert_with(|| Arc::clone(factory));
            }
        }
        Self {
            owners,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    /// Object names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    /// The object called `name`, building it if needed
    pub fn get(&self, scope: &ObjectScope<'_>, name: &str) -> Option<ContextValue> {
        let factory = self.owners.get(name)?;
        if let Some(cached) = self.cache.borrow().get(name) {
            return cached.clone();
        }
        let object = factory.build_object(scope, name);
        if factory.is_cacheable(name) {
            self.cache
                .borrow_mut()
                .insert(name.to_string(), object.clone());
        }
        object
    }
}

impl fmt::Debug for ExpressionObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionObjects")
            .field("names", &self.owners.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        builds: AtomicUsize,
    }

    impl ExpressionObjectFactory for Counting {
        fn object_names(&self) -> Vec<String> {
            vec!["locale".to_string(), "now".to_string()]
        }

        fn build_object(&self, scope: &ObjectScope<'_>, name: &str) -> Option<ContextValue> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst) as i64;
            match name {
                "locale" => Some(scope.locale.into()),
                "now" => Some(n.into()),
                _ => None,
            }
        }

        fn is_cacheable(&self, name: &str) -> bool {
            name != "now"
        }
    }

    #[test]
    fn test_cacheable_objects_are_built_once() {
        let factory = Arc::new(Counting::default());
        let factories = [factory.clone() as Arc<dyn ExpressionObjectFactory>];
        let objects = ExpressionObjects::new(&factories);
        let scope = ObjectScope {
            locale: "en",
            template: None,
        };

        assert_eq!(objects.get(&scope, "locale"), Some("en".into()));
        assert_eq!(objects.get(&scope, "locale"), Some("en".into()));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);

        assert_eq!(objects.get(&scope, "now"), Some(1.into()));
        assert_eq!(objects.get(&scope, "now"), Some(2.into()));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unknown_object() {
        let objects = ExpressionObjects::new(&[]);
        let scope = ObjectScope {
            locale: "",
            template: None,
        };
        assert!(!objects.contains("dates"));
        assert_eq!(objects.get(&scope, "dates"), None);
        assert_eq!(objects.names().count(), 0);
    }
}
