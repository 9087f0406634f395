#![forbid(unsafe_code)]

//! Retained component tree for the dashboard.
//!
//! Components implement [`Renderable`]: measured against an available size,
//! then rendered into a [`TerminalBuffer`](dterm_render::TerminalBuffer) at
//! a point. Rows are formatted from view-models and cached per panel in a
//! [`RowCache`], keyed by the row's stable key and guarded by its width and
//! rounded hash.

pub mod dashboard;
pub mod format;
pub mod metrics;
pub mod node;
pub mod panel;
pub mod renderable;
pub mod row;
pub mod row_cache;
pub mod stack;
pub mod text;
pub mod view_model;

pub use dashboard::{Dashboard, DashboardModel, PanelCaches, StatusModel};
pub use format::FormatError;
pub use metrics::{Align, TextMetrics};
pub use node::{DirtyReason, NodeId, NodeState};
pub use panel::Panel;
pub use renderable::{
    Renderable, TreeError, any_dirty, find_mut, structural_hash_of, validate_unique_ids,
};
pub use row::Row;
pub use row_cache::{RowCache, RowCacheStats};
pub use stack::{Axis, Stack, StackAlignment};
pub use text::Text;
pub use view_model::{
    ActivityRowModel, BalanceRowModel, PriceRowModel, RowContext, RowModel, SwapRowModel,
};
