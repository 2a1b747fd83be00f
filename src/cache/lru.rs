//! Recency Order Module
//!
//! Tracks key recency for the memory tier's LRU eviction.

use std::collections::VecDeque;

// == Recency Order ==
/// Keys ordered by recency of use.
///
/// - Front = least recently used
/// - Back = most recently used
#[derive(Debug, Default)]
pub struct RecencyOrder {
    order: VecDeque<String>,
}

impl RecencyOrder {
    pub fn new() -> Self {
        Self::default()
    }

    // == Promote ==
    /// Marks a key as most recently used, inserting it if untracked.
    pub fn promote(&mut self, key: &str) {
        self.remove(key);
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(idx) => {
                self.order.remove(idx);
                true
            }
            None => false,
        }
    }

    // == Pop LRU ==
    /// Removes and returns the least recently used key.
    pub fn pop_lru(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    /// Keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn keys(order: &RecencyOrder) -> Vec<&str> {
        order.iter().collect()
    }

    #[test]
    fn test_new_is_empty() {
        let order = RecencyOrder::new();
        assert!(order.is_empty());
        assert!(keys(&order).is_empty());
    }

    #[test]
    fn test_insertion_order() {
        let mut order = RecencyOrder::new();
        order.promote("a");
        order.promote("b");
        order.promote("c");

        assert_eq!(keys(&order), vec!["a", "b", "c"]);
        assert_eq!(order.pop_lru().as_deref(), Some("a"));
    }

    #[test]
    fn test_promote_moves_to_back() {
        let mut order = RecencyOrder::new();
        order.promote("a");
        order.promote("b");
        order.promote("c");
        order.promote("a");

        assert_eq!(keys(&order), vec!["b", "c", "a"]);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_pop_lru_sequence() {
        let mut order = RecencyOrder::new();
        // touch a, b, c then a, c, b: final order a, c, b
        for key in ["a", "b", "c", "a", "c", "b"] {
            order.promote(key);
        }

        assert_eq!(order.pop_lru().as_deref(), Some("a"));
        assert_eq!(order.pop_lru().as_deref(), Some("c"));
        assert_eq!(order.pop_lru().as_deref(), Some("b"));
        assert_eq!(order.pop_lru(), None);
    }

    #[test]
    fn test_remove() {
        let mut order = RecencyOrder::new();
        order.promote("a");
        order.promote("b");

        assert!(order.remove("a"));
        assert!(!order.remove("a"));
        assert!(!order.remove("missing"));
        assert_eq!(keys(&order), vec!["b"]);
    }

    #[test]
    fn test_repeated_promote_tracks_once() {
        let mut order = RecencyOrder::new();
        order.promote("k");
        order.promote("k");
        order.promote("k");

        assert_eq!(order.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut order = RecencyOrder::new();
        order.promote("a");
        order.promote("b");
        order.clear();
        assert!(order.is_empty());
    }
}
