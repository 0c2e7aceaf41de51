//! # Manifest Cache
//!
//! Rendered manifests per release, reused until the chart version or the
//! release flags change. The cache is a cheap clonable handle; every clone
//! shares the same entries.

use kube::api::DynamicObject;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Entry {
    version: String,
    flags: BTreeMap<String, String>,
    objects: Arc<Vec<DynamicObject>>,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached objects for `key`, if rendered from the same version and flags
    pub fn get(
        &self,
        key: &str,
        version: &str,
        flags: &BTreeMap<String, String>,
    ) -> Option<Arc<Vec<DynamicObject>>> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|e| e.version == version && &e.flags == flags)
            .map(|e| Arc::clone(&e.objects))
    }

    pub fn set(
        &self,
        key: &str,
        version: &str,
        flags: &BTreeMap<String, String>,
        objects: Vec<DynamicObject>,
    ) -> Arc<Vec<DynamicObject>> {
        let objects = Arc::new(objects);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                Entry {
                    version: version.to_string(),
                    flags: flags.clone(),
                    objects: Arc::clone(&objects),
                },
            );
        }
        objects
    }

    /// Objects cached for `key` regardless of version, used for removal
    pub fn last(&self, key: &str) -> Option<Arc<Vec<DynamicObject>>> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).map(|e| Arc::clone(&e.objects))
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(value: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("eventing.endpoint".to_string(), value.to_string())])
    }

    fn object(name: &str) -> DynamicObject {
        let mut obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {}
        }))
        .unwrap();
        obj.metadata.name = Some(name.to_string());
        obj
    }

    #[test]
    fn test_hit_on_same_version_and_flags() {
        let cache = ManifestCache::new();
        cache.set("kyma-system/serverless", "1.0.0", &flags("a"), vec![object("cm")]);

        let hit = cache.get("kyma-system/serverless", "1.0.0", &flags("a")).unwrap();
        assert_eq!(hit.len(), 1);
    }

    #[test]
    fn test_version_or_flag_change_misses() {
        let cache = ManifestCache::new();
        cache.set("kyma-system/serverless", "1.0.0", &flags("a"), vec![object("cm")]);

        assert!(cache.get("kyma-system/serverless", "1.1.0", &flags("a")).is_none());
        assert!(cache.get("kyma-system/serverless", "1.0.0", &flags("b")).is_none());
        assert!(cache.last("kyma-system/serverless").is_some());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ManifestCache::new();
        let handle = cache.clone();
        handle.set("ns/serverless", "1.0.0", &flags("a"), vec![]);
        assert_eq!(cache.len(), 1);

        cache.remove("ns/serverless");
        assert!(handle.is_empty());
    }
}
