//! Access-order bookkeeping for LRU eviction.
//!
//! Every touch hands out a fresh, strictly increasing sequence number. The
//! ordered map from sequence to key gives the least recently used entry in
//! O(log n) and a move-to-most-recent in O(log n).

use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct AccessOrder {
    by_seq: BTreeMap<u64, String>,
    next_seq: u64,
}

impl AccessOrder {
    /// Allocate a sequence number without recording an access.
    pub fn allocate(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Record `key` as most recently used, dropping its previous position.
    pub fn touch(&mut self, key: &str, previous: Option<u64>) -> u64 {
        if let Some(prev) = previous {
            self.by_seq.remove(&prev);
        }
        let seq = self.allocate();
        self.by_seq.insert(seq, key.to_string());
        seq
    }

    /// Re-insert a persisted position. Returns `false` if `seq` is taken.
    pub fn restore(&mut self, seq: u64, key: &str) -> bool {
        if self.by_seq.contains_key(&seq) {
            return false;
        }
        self.by_seq.insert(seq, key.to_string());
        self.bump_past(seq);
        true
    }

    /// Make sure future sequence numbers are strictly greater than `seq`.
    pub fn bump_past(&mut self, seq: u64) {
        self.next_seq = self.next_seq.max(seq.saturating_add(1));
    }

    pub fn remove(&mut self, seq: u64) -> Option<String> {
        self.by_seq.remove(&seq)
    }

    /// Least recently used entry.
    pub fn oldest(&self) -> Option<(u64, &str)> {
        self.by_seq
            .first_key_value()
            .map(|(seq, key)| (*seq, key.as_str()))
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.by_seq.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_follows_insertion_without_touches() {
        let mut order = AccessOrder::default();
        order.touch("a", None);
        order.touch("b", None);
        order.touch("c", None);
        assert_eq!(order.oldest().map(|(_, k)| k), Some("a"));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_touch_moves_to_most_recent() {
        let mut order = AccessOrder::default();
        let a = order.touch("a", None);
        order.touch("b", None);
        order.touch("a", Some(a));
        assert_eq!(order.oldest().map(|(_, k)| k), Some("b"));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_restore_rejects_duplicates_and_bumps_counter() {
        let mut order = AccessOrder::default();
        assert!(order.restore(41, "x"));
        assert!(!order.restore(41, "y"));
        assert_eq!(order.next_seq(), 42);
        assert_eq!(order.touch("z", None), 42);
    }

    #[test]
    fn test_allocate_never_reuses() {
        let mut order = AccessOrder::default();
        let first = order.allocate();
        let second = order.touch("k", None);
        assert!(second > first);
        order.remove(second);
        assert!(order.allocate() > second);
        assert!(order.oldest().is_none());
    }
}
