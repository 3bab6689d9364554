//! Backend-owned caches for compiled programs and uploaded textures.
//!
//! Both caches are generic over the handle type so the bookkeeping is shared between the wgpu
//! backend and tests that stand in plain values for GPU objects.

use std::collections::{HashMap, VecDeque};

use crate::foundation::error::FxResult;

/// Counters shared by the program and texture caches.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to create the entry.
    pub misses: u64,
    /// Entries dropped because their image changed.
    pub invalidations: u64,
    /// Entries dropped to stay under capacity.
    pub evictions: u64,
}

/// Compiled programs keyed by filter type (plus a variant suffix for multi-mode filters).
///
/// Entries are created on first use and live as long as the cache; every filter instance with the
/// same key shares one program.
pub struct ProgramCache<P> {
    programs: HashMap<String, P>,
    stats: CacheStats,
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ProgramCache<P> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Return the program for `key`, compiling it with `compile` if absent.
    ///
    /// A failed compile leaves the cache untouched, so a later call retries.
    pub fn get_or_try_compile(
        &mut self,
        key: &str,
        compile: impl FnOnce() -> FxResult<P>,
    ) -> FxResult<&P> {
        if self.programs.contains_key(key) {
            self.stats.hits = self.stats.hits.saturating_add(1);
        } else {
            self.stats.misses = self.stats.misses.saturating_add(1);
            let program = compile()?;
            tracing::debug!(key, "compiled filter program");
            self.programs.insert(key.to_string(), program);
        }
        Ok(&self.programs[key])
    }

    /// Whether a program is cached under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.programs.contains_key(key)
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// `true` when nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Lookup counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Drop every program, e.g. after device loss.
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

/// Uploaded textures keyed by image content identity.
///
/// Each image also owns a *slot* (its stable id). When an image comes back with a different cache
/// key, the texture stored for its previous key is invalidated and replaced, so stale uploads never
/// accumulate across frames.
pub struct TextureCache<T> {
    textures: HashMap<String, T>,
    key_by_slot: HashMap<u64, String>,
    order: VecDeque<String>,
    capacity: usize,
    stats: CacheStats,
}

impl<T> TextureCache<T> {
    /// Create a cache holding at most `capacity` textures (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            textures: HashMap::new(),
            key_by_slot: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Return the texture for `key`, uploading it with `upload` on a miss.
    pub fn get_or_try_upload(
        &mut self,
        slot: u64,
        key: &str,
        upload: impl FnOnce() -> FxResult<T>,
    ) -> FxResult<&T> {
        if let Some(prev) = self.key_by_slot.get(&slot)
            && prev != key
        {
            let prev = prev.clone();
            if self.remove_key(&prev) {
                self.stats.invalidations = self.stats.invalidations.saturating_add(1);
                tracing::debug!(slot, key = %prev, "invalidated stale texture");
            }
        }

        if self.textures.contains_key(key) {
            self.stats.hits = self.stats.hits.saturating_add(1);
            self.touch(key);
        } else {
            self.stats.misses = self.stats.misses.saturating_add(1);
            let texture = upload()?;
            while self.textures.len() >= self.capacity {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.textures.remove(&oldest);
                self.key_by_slot.retain(|_, k| *k != oldest);
                self.stats.evictions = self.stats.evictions.saturating_add(1);
            }
            tracing::debug!(slot, key, "uploaded texture");
            self.textures.insert(key.to_string(), texture);
            self.order.push_back(key.to_string());
        }
        self.key_by_slot.insert(slot, key.to_string());
        Ok(&self.textures[key])
    }

    /// Whether a texture is cached under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    /// Number of cached textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// `true` when no texture is cached.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Explicitly drop the texture stored for `key`.
    pub fn evict_key(&mut self, key: &str) -> bool {
        self.remove_key(key)
    }

    /// Lookup counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Drop every texture.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.key_by_slot.clear();
        self.order.clear();
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let removed = self.textures.remove(key).is_some();
        self.order.retain(|k| k != key);
        self.key_by_slot.retain(|_, k| k != key);
        removed
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key)
            && let Some(k) = self.order.remove(pos)
        {
            self.order.push_back(k);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
