use std::collections::HashMap;

/// Per-code cooldown to prevent the same barcode from being reported on
/// every tick while it stays in view.
///
/// Timestamps are passed in, so the debouncer never reads a clock itself.
pub struct DetectionDebouncer {
    last_emitted: HashMap<String, i64>,
    cooldown_ms: i64,
    capacity: usize,
}

impl DetectionDebouncer {
    /// Create a new debouncer with the given cooldown and table size
    pub fn new(cooldown_ms: u64, capacity: usize) -> Self {
        Self {
            last_emitted: HashMap::new(),
            cooldown_ms: cooldown_ms as i64,
            capacity: capacity.max(1),
        }
    }

    /// Check if `text` may be reported at `now_ms`.
    /// Returns true and records `now_ms` if it has not been reported within
    /// the cooldown window, false otherwise.
    pub fn should_emit(&mut self, text: &str, now_ms: i64) -> bool {
        match self.last_emitted.get_mut(text) {
            Some(last) if now_ms - *last < self.cooldown_ms => false,
            Some(last) => {
                *last = now_ms;
                true
            }
            None => {
                if self.last_emitted.len() >= self.capacity {
                    self.evict_oldest();
                }
                self.last_emitted.insert(text.to_string(), now_ms);
                true
            }
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .last_emitted
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(text, _)| text.clone());
        if let Some(text) = oldest {
            self.last_emitted.remove(&text);
        }
    }

    pub fn len(&self) -> usize {
        self.last_emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emitted.is_empty()
    }

    /// Forget every code
    pub fn clear(&mut self) {
        self.last_emitted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer() {
        let mut debouncer = DetectionDebouncer::new(2_500, 256);

        assert!(debouncer.should_emit("8901030895146", 10_000));
        // Same code 500ms later is suppressed
        assert!(!debouncer.should_emit("8901030895146", 10_500));
        // 3000ms after the first emission it is reported again
        assert!(debouncer.should_emit("8901030895146", 13_000));
    }

    #[test]
    fn test_window_boundary_emits() {
        let mut debouncer = DetectionDebouncer::new(2_500, 256);
        assert!(debouncer.should_emit("A", 0));
        assert!(!debouncer.should_emit("A", 2_499));
        assert!(debouncer.should_emit("A", 2_500));
    }

    #[test]
    fn test_suppressed_attempt_does_not_extend_window() {
        let mut debouncer = DetectionDebouncer::new(1_000, 256);
        assert!(debouncer.should_emit("A", 0));
        assert!(!debouncer.should_emit("A", 900));
        assert!(debouncer.should_emit("A", 1_000));
    }

    #[test]
    fn test_different_codes_are_independent() {
        let mut debouncer = DetectionDebouncer::new(2_500, 256);
        assert!(debouncer.should_emit("A", 0));
        assert!(debouncer.should_emit("B", 10));
        assert!(!debouncer.should_emit("A", 20));
        assert_eq!(debouncer.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut debouncer = DetectionDebouncer::new(10_000, 2);
        assert!(debouncer.should_emit("A", 0));
        assert!(debouncer.should_emit("B", 100));
        assert!(debouncer.should_emit("C", 200));
        assert_eq!(debouncer.len(), 2);

        // A was evicted so it is treated as new
        assert!(debouncer.should_emit("A", 300));
        // C is still cooling down
        assert!(!debouncer.should_emit("C", 400));
    }

    #[test]
    fn test_clear() {
        let mut debouncer = DetectionDebouncer::new(2_500, 256);
        assert!(debouncer.should_emit("A", 0));
        debouncer.clear();
        assert!(debouncer.is_empty());
        assert!(debouncer.should_emit("A", 1));
    }
}
