//! TTL render cache and the decorator that applies it.
//!
//! Keys are derived from the template identifier, the canonical (sorted)
//! JSON serialization of the parameters, and the search-path fingerprint, so
//! identical inputs always hit the same entry and a path reconfiguration
//! invalidates everything implicitly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::EngineError;
use crate::renderer::Renderer;
use crate::traits::Render;
use crate::types::TemplateParams;

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

/// Concurrent key-value store for rendered output, with a fixed TTL.
#[derive(Clone)]
pub struct RenderCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl RenderCache {
    pub fn new(ttl: Duration) -> Self {
        RenderCache {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Fetch an unexpired entry. Expired entries are dropped lazily here.
    fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let expired = {
            let guard = self.entries.read()?;
            match guard.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.body.clone()));
                }
                Some(_) => true,
            }
        };
        if expired {
            let mut guard = self.entries.write()?;
            // A racer may have refreshed the key between the locks; only
            // evict if the entry is still stale.
            if guard.get(key).is_some_and(|e| e.expires_at <= Instant::now()) {
                guard.remove(key);
            }
        }
        Ok(None)
    }

    fn put(&self, key: String, body: String) -> Result<(), EngineError> {
        self.entries.write()?.insert(
            key,
            CacheEntry {
                body,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), EngineError> {
        self.entries.write()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), EngineError> {
        self.entries.write()?.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caching decorator around any [`Render`] implementation.
///
/// Concurrency note: there is no per-key compute lock. Two requests racing on
/// a cold key both render and both store; rendering is deterministic for a
/// given (template, params, fingerprint), so the duplicate work is the whole
/// cost and the stored value is the same either way.
pub struct CachedRenderer<R: Render> {
    inner: R,
    cache: RenderCache,
    fingerprint: String,
}

impl CachedRenderer<Renderer> {
    /// Wrap a [`Renderer`], taking the fingerprint from its path set.
    pub fn over(renderer: Renderer, ttl: Duration) -> Self {
        let fingerprint = renderer.path_fingerprint().to_string();
        CachedRenderer::new(renderer, ttl, fingerprint)
    }
}

impl<R: Render> CachedRenderer<R> {
    pub fn new(inner: R, ttl: Duration, fingerprint: impl Into<String>) -> Self {
        CachedRenderer {
            inner,
            cache: RenderCache::new(ttl),
            fingerprint: fingerprint.into(),
        }
    }

    /// Drop the cached entry for one (template, params) pair.
    pub fn invalidate(&self, name: &str, params: &TemplateParams) -> Result<(), EngineError> {
        let key = self.key(name, params)?;
        self.cache.remove(&key)
    }

    /// Drop everything; the next render of any template recomputes.
    pub fn invalidate_all(&self) -> Result<(), EngineError> {
        self.cache.clear()
    }

    fn key(&self, name: &str, params: &TemplateParams) -> Result<String, EngineError> {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(params.canonical_json()?.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.fingerprint.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl<R: Render> Render for CachedRenderer<R> {
    fn render(&self, name: &str, params: &TemplateParams) -> Result<String, EngineError> {
        let key = self.key(name, params)?;
        if let Some(body) = self.cache.get(&key)? {
            debug!(event = "Cache", phase = "Hit", template = name);
            return Ok(body);
        }
        debug!(event = "Cache", phase = "Miss", template = name);
        let body = self.inner.render(name, params)?;
        self.cache.put(key, body.clone())?;
        Ok(body)
    }
}
