//! Screen-fitted bitmap cache.
//!
//! Fitting a large photo to the screen is the expensive part of showing it,
//! so the last few fitted bitmaps are kept in memory keyed by absolute path.
//! Flipping back to a recent image then skips decode and resize entirely.
//!
//! # Freshness
//!
//! An entry is reused only if the file on disk still has the byte size it had
//! when the entry was stored. This is a heuristic: an edit that keeps the
//! exact size goes unnoticed. It is cheap (one `stat`) and good enough for a
//! viewer; a content hash would cost a full read of the file.
//!
//! # Eviction
//!
//! Strict LRU by count. Lookups through [`ImageCache::get`] count as use;
//! [`ImageCache::peek`] and [`ImageCache::is_fresh`] do not. A capacity of 0
//! disables caching: puts are dropped.

use crate::imaging::{Bitmap, ColorMode, SourceFormat};
use lru::LruCache;
use std::io;
use std::path::{Path, PathBuf};

/// One fitted image and the facts shown about it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bitmap: Bitmap,
    /// Source dimensions, not the bitmap's.
    pub width: u32,
    pub height: u32,
    /// On-disk size when stored; the freshness check compares against it.
    pub byte_size: u64,
    pub display_size: String,
    pub source_mode: ColorMode,
    pub format: SourceFormat,
}

/// Normalize a path into a cache key: absolute, without `.` components.
///
/// Symlinks are not resolved, so the key stays valid if the file is deleted.
pub fn cache_key(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

#[derive(Debug)]
pub struct ImageCache {
    entries: LruCache<PathBuf, CacheEntry>,
    max_items: usize,
}

impl ImageCache {
    pub fn new(max_items: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_items,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_items
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &Path) -> bool {
        self.entries.contains(key)
    }

    /// Look up and mark as most recently used.
    pub fn get(&mut self, key: &Path) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Look up without touching recency.
    pub fn peek(&self, key: &Path) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    /// Store an entry, evicting the least recently used if full.
    ///
    /// Replacing an existing key never evicts.
    pub fn put(&mut self, key: PathBuf, entry: CacheEntry) {
        if self.max_items == 0 {
            return;
        }
        if !self.entries.contains(&key) {
            while self.entries.len() >= self.max_items {
                if self.entries.pop_lru().is_none() {
                    break;
                }
            }
        }
        self.entries.put(key, entry);
    }

    pub fn remove(&mut self, key: &Path) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    /// Move an entry to a new key after its file was renamed.
    pub fn rename_key(&mut self, old: &Path, new: PathBuf) {
        if let Some(entry) = self.entries.pop(old) {
            self.entries.put(new, entry);
        }
    }

    /// Whether `key` is cached and its file still has the stored byte size.
    ///
    /// Any I/O failure reads as stale.
    pub fn is_fresh(&self, key: &Path) -> bool {
        let Some(entry) = self.entries.peek(key) else {
            return false;
        };
        std::fs::metadata(key).is_ok_and(|meta| meta.len() == entry.byte_size)
    }

    /// Change the bound, evicting least recently used entries to fit.
    pub fn set_capacity(&mut self, max_items: usize) {
        self.max_items = max_items;
        while self.entries.len() > max_items {
            if self.entries.pop_lru().is_none() {
                break;
            }
        }
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter().map(|(key, _)| key)
    }
}
