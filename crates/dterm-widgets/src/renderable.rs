#![forbid(unsafe_code)]

//! The component contract.
//!
//! A pass calls [`Renderable::measure`] and then [`Renderable::render`] at
//! the same size. Components may remember what they decided while measuring
//! and reuse it when rendering; nothing else may change between the two.
//!
//! Identity and dirty bits live in an embedded [`NodeState`], so a component
//! only implements the accessors and gets the rest of the protocol from the
//! default methods.

use std::fmt;
use std::hash::Hasher;

use dterm_core::{Point, Rect, Size};
use dterm_layout::FlexProperties;
use dterm_render::TerminalBuffer;
use rustc_hash::{FxHashSet, FxHasher};

use crate::node::{DirtyReason, NodeId, NodeState};

/// A node of the retained component tree.
pub trait Renderable: Send {
    /// Stable, caller-chosen identifier.
    fn id(&self) -> &str;

    fn node(&self) -> &NodeState;

    fn node_mut(&mut self) -> &mut NodeState;

    /// Size this component wants inside `available`, never larger than it.
    ///
    /// Calling this twice with the same `available` returns the same size.
    fn measure(&mut self, available: Size) -> Size;

    /// Draw at `at`. Anything outside the buffer is clipped; an origin
    /// entirely outside draws nothing.
    fn render(&self, buffer: &mut TerminalBuffer, at: Point);

    /// Draw into `area`. Components that fill their extent (borders,
    /// backgrounds) override this; the default draws at the area's origin.
    fn render_in(&self, buffer: &mut TerminalBuffer, area: Rect) {
        self.render(buffer, area.origin);
    }

    fn children(&self) -> &[Box<dyn Renderable>] {
        &[]
    }

    fn children_mut(&mut self) -> &mut [Box<dyn Renderable>] {
        &mut []
    }

    /// Feed render-affecting content (not layout) into `hasher`.
    fn hash_content(&self, _hasher: &mut dyn Hasher) {}

    /// Hash of identity, content, and children. Positions and sizes are
    /// excluded.
    fn structural_hash(&self, hasher: &mut dyn Hasher) {
        hasher.write_u64(self.node_id().get());
        hasher.write(self.id().as_bytes());
        self.hash_content(hasher);
        for child in self.children() {
            child.structural_hash(hasher);
        }
    }

    fn node_id(&self) -> NodeId {
        self.node().id()
    }

    fn dirty_reasons(&self) -> DirtyReason {
        self.node().reasons()
    }

    fn is_dirty(&self) -> bool {
        self.node().is_dirty()
    }

    fn mark_dirty(&mut self, reasons: DirtyReason) {
        self.node_mut().mark(reasons);
    }

    /// Clear this node and its whole subtree.
    fn clear_dirty(&mut self) {
        self.node_mut().clear();
        for child in self.children_mut() {
            child.clear_dirty();
        }
    }

    fn on_focus_change(&mut self, _focused: bool) {}

    /// Factors used when this component sits in a flex stack.
    fn flex_properties(&self) -> FlexProperties {
        FlexProperties::default()
    }
}

/// [`Renderable::structural_hash`] finished with an `FxHasher`.
#[must_use]
pub fn structural_hash_of(node: &dyn Renderable) -> u64 {
    let mut hasher = FxHasher::default();
    node.structural_hash(&mut hasher);
    hasher.finish()
}

/// True when `node` or any descendant is dirty.
#[must_use]
pub fn any_dirty(node: &dyn Renderable) -> bool {
    node.is_dirty() || node.children().iter().any(|c| any_dirty(c.as_ref()))
}

/// Find a node by [`Renderable::id`], depth first.
pub fn find_mut<'a>(node: &'a mut dyn Renderable, id: &str) -> Option<&'a mut dyn Renderable> {
    if node.id() == id {
        return Some(node);
    }
    for child in node.children_mut() {
        if let Some(found) = find_mut(child.as_mut(), id) {
            return Some(found);
        }
    }
    None
}

/// A structural defect found by [`validate_unique_ids`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Two children of `parent` share `id`.
    DuplicateId { parent: String, id: String },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { parent, id } => {
                write!(f, "duplicate id {id:?} under {parent:?}")
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Check that no two siblings anywhere under `node` share an
/// [`Renderable::id`]. Ids are keys within their parent, so the same id may
/// appear in different subtrees.
pub fn validate_unique_ids(node: &dyn Renderable) -> Result<(), TreeError> {
    let mut seen = FxHashSet::default();
    for child in node.children() {
        if !seen.insert(child.id()) {
            return Err(TreeError::DuplicateId {
                parent: node.id().to_owned(),
                id: child.id().to_owned(),
            });
        }
    }
    node.children()
        .iter()
        .try_for_each(|child| validate_unique_ids(child.as_ref()))
}
