//! Request-scoped overlay in front of the durable store.
//!
//! A `RequestContext` belongs to exactly one logical request: create it at
//! request start, pass it by mutable reference into every cache call of
//! that request, and drop it at request end. It is a latency optimization
//! only, never a durability guarantee, and must not be shared across
//! request boundaries.

use rowcache_core::Cached;
use std::collections::HashMap;

/// Per-request cache keyed identically to the store.
#[derive(Debug, Default)]
pub struct RequestContext {
    entries: HashMap<String, Cached>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the overlay's value for a key.
    ///
    /// A recorded miss never short-circuits: callers fall through to the
    /// store, so a concurrent writer's data is still picked up within the
    /// same request.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<&Cached> {
        match self.entries.get(key) {
            Some(Cached::Miss) | None => None,
            hit => hit,
        }
    }

    /// Unconditionally records a value, overwriting any prior entry.
    pub fn write(&mut self, key: impl Into<String>, value: Cached) {
        self.entries.insert(key.into(), value);
    }

    /// Removes a key's entry; absence is not an error.
    pub fn evict(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops all entries (request boundary).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcache_core::Record;
    use serde_json::json;

    fn single() -> Cached {
        let mut record = Record::new();
        record.insert("id".to_string(), json!(1));
        Cached::Single(record)
    }

    #[test]
    fn test_read_write_evict() {
        let mut ctx = RequestContext::new();
        assert!(ctx.read("Vo:users:1").is_none());

        ctx.write("Vo:users:1", single());
        assert_eq!(ctx.read("Vo:users:1"), Some(&single()));

        ctx.evict("Vo:users:1");
        assert!(ctx.read("Vo:users:1").is_none());

        // Evicting an absent key is fine.
        ctx.evict("Vo:users:1");
    }

    #[test]
    fn test_recorded_miss_does_not_short_circuit() {
        let mut ctx = RequestContext::new();
        ctx.write("Vo:users:1", Cached::Miss);

        assert!(ctx.read("Vo:users:1").is_none());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_nil_hit_short_circuits() {
        let mut ctx = RequestContext::new();
        ctx.write("Vo:users:1", Cached::Nil);

        assert_eq!(ctx.read("Vo:users:1"), Some(&Cached::Nil));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut ctx = RequestContext::new();
        ctx.write("a", single());
        ctx.write("b", Cached::Nil);

        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_write_overwrites() {
        let mut ctx = RequestContext::new();
        ctx.write("a", Cached::Nil);
        ctx.write("a", single());

        assert_eq!(ctx.read("a"), Some(&single()));
    }
}
