#![forbid(unsafe_code)]

//! LRU cache for grapheme widths.
//!
//! Width classification is on the measure hot path, which runs for every
//! component on every tick. The cache remembers non-ASCII grapheme widths
//! keyed by the grapheme text. Because CJK classification depends on the
//! [`TerminalEnv`], the cache is cleared wholesale whenever a lookup arrives
//! with a different environment than the previous one.
//!
//! # Example
//! ```
//! use dterm_core::TerminalEnv;
//! use dterm_text::WidthCache;
//!
//! let env = TerminalEnv::modern();
//! let mut cache = WidthCache::new(1000);
//!
//! assert_eq!(cache.width("\u{4E00}", &env), 2);
//! assert_eq!(cache.width("\u{4E00}", &env), 2);
//!
//! let stats = cache.stats();
//! assert_eq!(stats.hits, 1);
//! assert_eq!(stats.misses, 1);
//! ```

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dterm_core::TerminalEnv;
use lru::LruCache;
use rustc_hash::FxBuildHasher;

use crate::width::{grapheme_width, graphemes};

/// Statistics about cache performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that computed and stored a width.
    pub misses: u64,
    /// ASCII lookups that bypassed the cache.
    pub fast_path: u64,
    /// Wholesale clears caused by an environment change.
    pub invalidations: u64,
    /// Current number of entries.
    pub size: usize,
    /// Maximum capacity.
    pub capacity: usize,
}

impl CacheStats {
    /// Hit rate over cached lookups (0.0 to 1.0). ASCII fast-path lookups
    /// are excluded.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of grapheme widths.
///
/// `get` promotes the entry to most-recently-used; inserting at capacity
/// evicts the least-recently-used entry.
///
/// Not thread-safe on its own. Use [`SharedWidthCache`] across threads.
#[derive(Debug)]
pub struct WidthCache {
    cache: LruCache<Box<str>, usize, FxBuildHasher>,
    env: Option<TerminalEnv>,
    hits: u64,
    misses: u64,
    fast_path: u64,
    invalidations: u64,
}

impl Default for WidthCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl WidthCache {
    /// Default capacity.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a new cache with the given capacity. Zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::with_hasher(capacity, FxBuildHasher),
            env: None,
            hits: 0,
            misses: 0,
            fast_path: 0,
            invalidations: 0,
        }
    }

    /// Width of one grapheme cluster under `env`.
    pub fn width(&mut self, grapheme: &str, env: &TerminalEnv) -> usize {
        if grapheme.is_ascii() {
            self.fast_path += 1;
            return grapheme.len();
        }
        self.sync_env(env);

        if let Some(&width) = self.cache.get(grapheme) {
            self.hits += 1;
            return width;
        }

        self.misses += 1;
        let width = grapheme_width(grapheme, env);
        self.cache.put(grapheme.into(), width);
        width
    }

    /// Width of arbitrary text, summing cached grapheme widths.
    pub fn str_width(&mut self, text: &str, env: &TerminalEnv) -> usize {
        if text.is_ascii() {
            self.fast_path += 1;
            return text.len();
        }
        graphemes(text).map(|g| self.width(g, env)).sum()
    }

    /// Cached width without computing. Promotes the entry on a hit.
    #[must_use]
    pub fn get(&mut self, grapheme: &str) -> Option<usize> {
        self.cache.get(grapheme).copied()
    }

    /// Cached width without updating LRU order.
    #[must_use]
    pub fn peek(&self, grapheme: &str) -> Option<usize> {
        self.cache.peek(grapheme).copied()
    }

    #[must_use]
    pub fn contains(&self, grapheme: &str) -> bool {
        self.cache.contains(grapheme)
    }

    /// The environment used by the most recent cached lookup.
    #[must_use]
    pub fn env(&self) -> Option<TerminalEnv> {
        self.env
    }

    /// Remove every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.fast_path = 0;
        self.invalidations = 0;
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            fast_path: self.fast_path,
            invalidations: self.invalidations,
            size: self.cache.len(),
            capacity: self.cache.cap().get(),
        }
    }

    fn sync_env(&mut self, env: &TerminalEnv) {
        match self.env {
            Some(previous) if previous == *env => {}
            Some(previous) => {
                tracing::debug!(
                    entries = self.cache.len(),
                    old_cjk = previous.cjk,
                    new_cjk = env.cjk,
                    "width cache invalidated by environment change"
                );
                self.cache.clear();
                self.invalidations += 1;
                self.env = Some(*env);
            }
            None => self.env = Some(*env),
        }
    }
}

/// A [`WidthCache`] shared between threads.
///
/// Cloning shares the same underlying cache. ASCII lookups never take the
/// lock. A poisoned lock is recovered rather than propagated, since the
/// cache holds no invariants a panic could break beyond stale entries.
#[derive(Debug, Clone, Default)]
pub struct SharedWidthCache {
    inner: Arc<Mutex<WidthCache>>,
}

impl SharedWidthCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WidthCache::new(capacity))),
        }
    }

    pub fn width(&self, grapheme: &str, env: &TerminalEnv) -> usize {
        if grapheme.is_ascii() {
            return grapheme.len();
        }
        self.lock().width(grapheme, env)
    }

    pub fn str_width(&self, text: &str, env: &TerminalEnv) -> usize {
        if text.is_ascii() {
            return text.len();
        }
        self.lock().str_width(text, env)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, WidthCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
