//! Per-execution identifier counters
//!
//! Used by processors that must generate unique element ids (`id="item1"`,
//! `id="item2"`, ...) within one template execution.

use crate::error::{ContextError, ContextResult};
use rustc_hash::FxHashMap;

/// Counter map from identifier prefix to its next sequence number
#[derive(Debug, Clone, Default)]
pub struct IdentifierSequences {
    counts: FxHashMap<String, u32>,
}

impl IdentifierSequences {
    /// Create an empty counter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for `id` (1 if unseen), then advance it
    pub fn next_and_increment(&mut self, id: &str) -> u32 {
        match self.counts.get_mut(id) {
            Some(count) => {
                let current = *count;
                *count += 1;
                current
            }
            None => {
                self.counts.insert(id.to_string(), 2);
                1
            }
        }
    }

    /// Current count for `id` (1 if unseen), without advancing it
    pub fn peek_next(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(1)
    }

    /// Count returned by the last [`IdentifierSequences::next_and_increment`] for `id`
    pub fn peek_previous(&self, id: &str) -> ContextResult<u32> {
        self.counts
            .get(id)
            .map(|count| count - 1)
            .ok_or_else(|| ContextError::NoPreviousIdentifier { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence() {
        let mut ids = IdentifierSequences::new();
        assert_eq!(ids.peek_next("id"), 1);
        assert_eq!(ids.next_and_increment("id"), 1);
        assert_eq!(ids.next_and_increment("id"), 2);
        assert_eq!(ids.peek_previous("id"), Ok(2));
        assert_eq!(ids.peek_next("id"), 3);
    }

    #[test]
    fn test_ids_are_independent() {
        let mut ids = IdentifierSequences::new();
        ids.next_and_increment("a");
        ids.next_and_increment("a");
        assert_eq!(ids.next_and_increment("b"), 1);
        assert_eq!(ids.peek_next("a"), 3);
    }

    #[test]
    fn test_peek_previous_unseen_fails() {
        let ids = IdentifierSequences::new();
        let err = ids.peek_previous("never").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot obtain previous ID count for ID 'never'"
        );
    }
}
