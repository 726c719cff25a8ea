use std::collections::HashMap;
use std::sync::Arc;

use campus_core::{ListingParams, RawEntry};
use tokio::sync::Mutex;

pub const LIST_KEY_PREFIX: &str = "files:list:";

/// Cache key for a listing request. The key is deliberately coarser than
/// the request: `itemid` (and the optional context fields) are excluded,
/// so listings differing only in those share one entry. Downstream
/// invalidation assumes exactly this key shape.
pub fn listing_cache_key(params: &ListingParams) -> String {
    format!(
        "{LIST_KEY_PREFIX}{}:{}:{}",
        listing_root(params),
        params.contextid,
        params.filepath
    )
}

pub fn listing_root(params: &ListingParams) -> &'static str {
    if params.component.is_empty() { "site" } else { "my" }
}

pub fn my_files_key_prefix() -> String {
    format!("{LIST_KEY_PREFIX}my")
}

pub fn site_files_key_prefix() -> String {
    format!("{LIST_KEY_PREFIX}site")
}

/// In-memory key/value store for raw listing responses. Writes replace the
/// key's value wholesale, so concurrent fillers resolve last-writer-wins;
/// a listing already in flight when a key is invalidated may still store
/// its result, which the next invalidation or refresh replaces.
#[derive(Debug, Clone, Default)]
pub struct ListingStore {
    inner: Arc<Mutex<HashMap<String, Vec<RawEntry>>>>,
}

impl ListingStore {
    pub async fn get(&self, key: &str) -> Option<Vec<RawEntry>> {
        self.inner.lock().await.get(key).cloned()
    }

    pub async fn put(&self, key: &str, value: Vec<RawEntry>) {
        self.inner.lock().await.insert(key.to_string(), value);
    }

    pub async fn remove(&self, key: &str) {
        self.inner.lock().await.remove(key);
    }

    pub async fn remove_prefix(&self, prefix: &str) {
        self.inner
            .lock()
            .await
            .retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(component: &str, contextid: i64, filepath: &str) -> ListingParams {
        ListingParams {
            contextid,
            component: component.to_string(),
            filepath: filepath.to_string(),
            ..ListingParams::default()
        }
    }

    #[test]
    fn key_ignores_itemid() {
        let a = params("", 5, "/a");
        let mut b = params("", 5, "/a");
        b.itemid = 999;
        assert_eq!(listing_cache_key(&a), listing_cache_key(&b));
    }

    #[test]
    fn root_follows_component_presence() {
        assert_eq!(listing_cache_key(&params("", 5, "/a")), "files:list:site:5:/a");
        assert_eq!(listing_cache_key(&params("user", -1, "/")), "files:list:my:-1:/");
    }

    #[tokio::test]
    async fn remove_prefix_clears_only_matching_keys() {
        let store = ListingStore::default();
        store.put("files:list:my:-1:/", Vec::new()).await;
        store.put("files:list:my:-1:/docs/", Vec::new()).await;
        store.put("files:list:site:0:/", Vec::new()).await;

        store.remove_prefix(&my_files_key_prefix()).await;

        assert!(store.get("files:list:my:-1:/").await.is_none());
        assert!(store.get("files:list:my:-1:/docs/").await.is_none());
        assert!(store.get("files:list:site:0:/").await.is_some());
    }

    #[tokio::test]
    async fn put_replaces_existing_value() {
        let store = ListingStore::default();
        let entry = RawEntry {
            filename: Some("a.txt".to_string()),
            isdir: Some(false),
            ..RawEntry::default()
        };
        store.put("k", Vec::new()).await;
        store.put("k", vec![entry]).await;
        assert_eq!(store.get("k").await.unwrap().len(), 1);
    }
}
