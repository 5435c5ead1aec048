use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::asset::AudioAsset;

const DEFAULT_CAPACITY: usize = 64;

/// Temporary playable resources, the server-side stand-in for object URLs.
///
/// Every entry must be released when the view that owns it replaces or drops
/// it. The LRU bound is a backstop for clients that never do.
#[derive(Clone)]
pub struct AssetStore {
    inner: Arc<RwLock<LruCache<Uuid, AudioAsset>>>,
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AssetStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn insert(&self, asset: AudioAsset) -> Uuid {
        let id = Uuid::new_v4();
        let mut cache = self.inner.write().await;
        if let Some((evicted, _)) = cache.push(id, asset) {
            if evicted != id {
                tracing::warn!("audio asset {evicted} evicted without release");
            }
        }
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<AudioAsset> {
        // `get` bumps recency, so it needs the write half
        self.inner.write().await.get(id).cloned()
    }

    /// Drop an asset. Returns false if it was never stored or already gone.
    pub async fn release(&self, id: &Uuid) -> bool {
        self.inner.write().await.pop(id).is_some()
    }

    /// Swap the asset a view is showing: the previous one is released first.
    pub async fn replace(&self, previous: Option<&Uuid>, asset: AudioAsset) -> Uuid {
        if let Some(previous) = previous {
            self.release(previous).await;
        }
        self.insert(asset).await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
