use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 64;

/// Memoized roster reports keyed by a SHA-256 of their inputs.
#[derive(Debug)]
pub struct ReportCache {
    capacity: usize,
    entries: HashMap<String, serde_json::Value>,
    order: VecDeque<String>,
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ReportCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Hex digest of the serialized inputs. Inputs use ordered maps, so equal
    /// values always hash equal.
    pub fn key_for<T: serde::Serialize>(inputs: &T) -> anyhow::Result<String> {
        let bytes = serde_json::to_vec(inputs)?;
        let digest = Sha256::digest(&bytes);
        Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, value: serde_json::Value) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.entries.remove(&old);
            }
        }
    }

    pub fn cached_reports(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_inputs_share_a_key() {
        let a = ReportCache::key_for(&json!({ "x": 1, "y": [1, 2] })).expect("key");
        let b = ReportCache::key_for(&json!({ "x": 1, "y": [1, 2] })).expect("key");
        let c = ReportCache::key_for(&json!({ "x": 2, "y": [1, 2] })).expect("key");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn oldest_entry_is_evicted_past_capacity() {
        let mut cache = ReportCache::with_capacity(2);
        cache.insert("a".into(), json!(1));
        cache.insert("b".into(), json!(2));
        cache.insert("c".into(), json!(3));
        assert_eq!(cache.cached_reports(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c"), Some(&json!(3)));

        cache.clear();
        assert_eq!(cache.cached_reports(), 0);
    }
}
