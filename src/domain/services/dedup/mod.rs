use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

/// Per-symbol bounded FIFO set of recently seen command ids, grounded on
/// the original reference's `_dedup = defaultdict(lambda:
/// deque(maxlen=100000))` / `already_processed`. Once a symbol's set
/// reaches `capacity`, the oldest id is evicted to make room for the
/// newest, so duplicate detection has a bounded footprint per symbol at
/// the cost of eventually forgetting very old ids.
pub struct CommandDeduplicator {
    capacity: usize,
    per_symbol: Mutex<HashMap<String, SymbolWindow>>,
}

struct SymbolWindow {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl SymbolWindow {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }
}

impl CommandDeduplicator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            per_symbol: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `command_id` was already recorded for `symbol`
    /// (i.e. this command is a duplicate and should be dropped), otherwise
    /// records it and returns `false`.
    pub fn seen_or_record(&self, symbol: &str, command_id: &str) -> bool {
        let mut per_symbol = self.per_symbol.lock();
        let window = per_symbol
            .entry(symbol.to_string())
            .or_insert_with(SymbolWindow::new);

        if window.seen.contains(command_id) {
            return true;
        }

        if window.order.len() >= self.capacity {
            if let Some(oldest) = window.order.pop_front() {
                window.seen.remove(&oldest);
            }
        }
        window.order.push_back(command_id.to_string());
        window.seen.insert(command_id.to_string());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_of_the_same_id_is_a_duplicate() {
        let dedup = CommandDeduplicator::new(100);
        assert!(!dedup.seen_or_record("BTC-USD", "cmd-1"));
        assert!(dedup.seen_or_record("BTC-USD", "cmd-1"));
    }

    #[test]
    fn dedup_is_scoped_per_symbol() {
        let dedup = CommandDeduplicator::new(100);
        assert!(!dedup.seen_or_record("BTC-USD", "cmd-1"));
        assert!(!dedup.seen_or_record("ETH-USD", "cmd-1"));
    }

    #[test]
    fn oldest_id_is_evicted_once_capacity_is_reached() {
        let dedup = CommandDeduplicator::new(2);
        assert!(!dedup.seen_or_record("BTC-USD", "a"));
        assert!(!dedup.seen_or_record("BTC-USD", "b"));
        assert!(!dedup.seen_or_record("BTC-USD", "c"));
        // "a" has been evicted, so it is treated as new again.
        assert!(!dedup.seen_or_record("BTC-USD", "a"));
    }
}
