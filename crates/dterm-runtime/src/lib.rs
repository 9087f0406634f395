#![forbid(unsafe_code)]

//! Runtime glue: the snapshot contract, key commands, configuration, the
//! output writer, and the render pipeline that ties the lower crates
//! together once per tick.

pub mod command;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod snapshot;
pub mod writer;

pub use command::Command;
pub use config::RenderConfig;
pub use logging::{init_tracing, init_tracing_with};
pub use pipeline::{DashboardState, FrameReport, RenderPipeline};
pub use snapshot::{
    AutomationState, Holding, Snapshot, SnapshotSource, StaticSource, Transaction,
    TransactionKind,
};
pub use writer::{OutputWriter, StdoutProbe, TtyProbe, WriterMode, WriterStats};
