#![forbid(unsafe_code)]

//! Per-panel cache of formatted rows.
//!
//! Entries are keyed by the row's stable key and remember the width and
//! rounded hash they were built for. A lookup hits only when both match;
//! otherwise the row is rebuilt and the entry replaced.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dterm_render::Line;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::format::FormatError;

/// Hit/miss counters for a [`RowCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl RowCacheStats {
    /// Fraction of lookups that hit, `0.0` before any lookup.
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

#[derive(Debug)]
struct CachedRow {
    line: Line,
    width: u16,
    hash: u64,
}

#[derive(Debug, Default)]
struct Inner {
    rows: FxHashMap<String, CachedRow>,
    hits: u64,
    misses: u64,
}

/// Shared row cache. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct RowCache {
    inner: Arc<Mutex<Inner>>,
}

impl RowCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached row for `key` if it was built for `width` and
    /// `hash`, otherwise build it with `build` and remember it.
    ///
    /// A failed build is returned as-is and leaves any old entry in place.
    pub fn get_or_try_build<F>(
        &self,
        key: &str,
        width: u16,
        hash: u64,
        build: F,
    ) -> Result<Line, FormatError>
    where
        F: FnOnce() -> Result<Line, FormatError>,
    {
        let mut inner = self.lock();
        if let Some(row) = inner.rows.get(key)
            && row.width == width
            && row.hash == hash
        {
            let line = row.line.clone();
            inner.hits += 1;
            return Ok(line);
        }
        inner.misses += 1;
        let line = build()?;
        inner.rows.insert(
            key.to_owned(),
            CachedRow {
                line: line.clone(),
                width,
                hash,
            },
        );
        Ok(line)
    }

    /// Drop entries whose key is not in `live`.
    pub fn retain_keys<'a>(&self, live: impl IntoIterator<Item = &'a str>) {
        let live: FxHashSet<&str> = live.into_iter().collect();
        self.lock().rows.retain(|key, _| live.contains(key.as_str()));
    }

    #[must_use]
    pub fn stats(&self) -> RowCacheStats {
        let inner = self.lock();
        RowCacheStats {
            entries: inner.rows.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub fn reset_stats(&self) {
        let mut inner = self.lock();
        inner.hits = 0;
        inner.misses = 0;
    }

    pub fn clear(&self) {
        self.lock().rows.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn build(count: &Cell<u32>, text: &str) -> Result<Line, FormatError> {
        count.set(count.get() + 1);
        Ok(Line::from(text))
    }

    #[test]
    fn hit_requires_same_width_and_hash() {
        let cache = RowCache::new();
        let builds = Cell::new(0);
        let get = |w, h| cache.get_or_try_build("BTC", w, h, || build(&builds, "row"));

        assert!(get(40, 1).is_ok());
        assert!(get(40, 1).is_ok());
        assert_eq!(builds.get(), 1);
        assert!(get(41, 1).is_ok());
        assert!(get(41, 2).is_ok());
        assert_eq!(builds.get(), 3);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 3, 1));
        assert!((stats.hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_build_keeps_old_entry() {
        let cache = RowCache::new();
        let builds = Cell::new(0);
        assert!(cache.get_or_try_build("k", 10, 1, || build(&builds, "old")).is_ok());
        let err = cache.get_or_try_build("k", 10, 2, || Err(FormatError::MissingField("asset")));
        assert_eq!(err, Err(FormatError::MissingField("asset")));
        let line = cache.get_or_try_build("k", 10, 1, || build(&builds, "new"));
        assert_eq!(line.map(|l| l.as_str().to_owned()), Ok("old".to_owned()));
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn clones_share_entries() {
        let a = RowCache::new();
        let b = a.clone();
        let builds = Cell::new(0);
        assert!(a.get_or_try_build("k", 5, 9, || build(&builds, "x")).is_ok());
        assert!(b.get_or_try_build("k", 5, 9, || build(&builds, "x")).is_ok());
        assert_eq!(builds.get(), 1);
        assert_eq!(b.stats().hits, 1);
    }

    #[test]
    fn retain_drops_departed_rows() {
        let cache = RowCache::new();
        for key in ["a", "b", "c"] {
            assert!(cache.get_or_try_build(key, 1, 0, || Ok(Line::from(key))).is_ok());
        }
        cache.retain_keys(["a", "c"]);
        assert_eq!(cache.stats().entries, 2);
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let cache = RowCache::new();
        let clone = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.inner.lock();
            panic!("poison");
        })
        .join();
        assert!(cache.get_or_try_build("k", 1, 1, || Ok(Line::from("ok"))).is_ok());
    }
}
