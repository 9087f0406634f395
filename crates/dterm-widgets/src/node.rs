#![forbid(unsafe_code)]

//! Node identity and dirty tracking shared by every component.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique component identity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate the next id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Why a component needs to be rendered again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyReason: u8 {
        const STATE      = 0b0000_0001;
        const LAYOUT     = 0b0000_0010;
        const STYLE      = 0b0000_0100;
        const VISIBILITY = 0b0000_1000;
        const FOCUS      = 0b0001_0000;
        const ENV        = 0b0010_0000;
    }
}

/// Identity plus dirty bits, embedded in each component.
///
/// A fresh node is dirty with every reason set; [`clear`](Self::clear)
/// makes it clean until the next [`mark`](Self::mark).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    id: NodeId,
    dirty: DirtyReason,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NodeId::next(),
            dirty: DirtyReason::all(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn reasons(&self) -> DirtyReason {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn mark(&mut self, reasons: DirtyReason) {
        self.dirty |= reasons;
    }

    pub fn clear(&mut self) {
        self.dirty = DirtyReason::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_ne!(NodeState::new().id(), NodeState::new().id());
    }

    #[test]
    fn fresh_state_is_dirty_until_cleared() {
        let mut state = NodeState::new();
        assert!(state.is_dirty());
        assert_eq!(state.reasons(), DirtyReason::all());
        state.clear();
        assert!(!state.is_dirty());
        state.mark(DirtyReason::FOCUS | DirtyReason::STYLE);
        assert_eq!(state.reasons(), DirtyReason::FOCUS | DirtyReason::STYLE);
        state.mark(DirtyReason::FOCUS);
        assert_eq!(state.reasons(), DirtyReason::FOCUS | DirtyReason::STYLE);
        state.clear();
        assert!(!state.is_dirty());
    }

    #[test]
    fn display_is_prefixed() {
        let id = NodeId::next();
        assert_eq!(id.to_string(), format!("#{}", id.get()));
    }
}
