use dashmap::DashMap;
use std::sync::Arc;
use watch_core::IndicatorSet;

/// Latest indicator values per symbol. Written by the moving-average engine,
/// read by the alert engine; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct IndicatorCache {
    inner: Arc<DashMap<String, IndicatorSet>>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<IndicatorSet> {
        self.inner.get(symbol).map(|set| set.clone())
    }

    pub fn value(&self, symbol: &str, label: &str) -> Option<f64> {
        self.inner
            .get(symbol)
            .and_then(|set| set.get(label).copied().flatten())
    }

    pub fn insert(&self, symbol: &str, label: &str, value: Option<f64>) {
        self.inner
            .entry(symbol.to_string())
            .or_default()
            .insert(label.to_string(), value);
    }

    pub fn remove(&self, symbol: &str) -> Option<IndicatorSet> {
        self.inner.remove(symbol).map(|(_, set)| set)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read() {
        let cache = IndicatorCache::new();
        cache.insert("SH600000", "MA20", Some(10.25));
        cache.insert("SH600000", "MA60", None);

        assert_eq!(cache.value("SH600000", "MA20"), Some(10.25));
        assert_eq!(cache.value("SH600000", "MA60"), None);
        assert_eq!(cache.get("SH600000").unwrap().len(), 2);

        let shared = cache.clone();
        shared.remove("SH600000");
        assert!(cache.is_empty());
    }
}
