#![forbid(unsafe_code)]

//! Layout for the dashboard.
//!
//! - [`FlexLayout`]: one-dimensional flexbox-style arrangement with grow,
//!   shrink, justification and cross-axis alignment
//! - [`LayoutManager`]: assigns terminal rows and columns to the fixed set
//!   of dashboard panels, degrading gracefully on small terminals
//! - [`validate_layout`]: checks a computed layout for overlap and bounds

pub mod flex;
pub mod panel;

pub use dterm_core::geometry::{Point, Rect, Size};
pub use flex::{AlignItems, FlexDirection, FlexLayout, FlexProperties, JustifyContent};
pub use panel::{
    LayoutConfig, LayoutError, LayoutManager, PanelLayout, PanelLayouts, PanelPriority, PanelType,
    validate_layout,
};
