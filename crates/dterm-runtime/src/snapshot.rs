#![forbid(unsafe_code)]

//! Inbound data contract.
//!
//! A [`Snapshot`] is produced by whatever collects exchange data and is
//! read-only for the duration of a render pass. The pipeline only ever
//! holds it behind a shared reference.

use std::collections::BTreeMap;
use std::sync::Arc;

/// What a transaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Buy,
    Sell,
    Deposit,
    Withdrawal,
    Stake,
    Swap,
}

impl TransactionKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdraw",
            Self::Stake => "stake",
            Self::Swap => "swap",
        }
    }
}

/// One entry of the transaction history.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub kind: TransactionKind,
    pub asset: String,
    pub amount: f64,
    pub status: String,
    /// Received side of a swap.
    pub counter_asset: Option<String>,
    pub counter_amount: Option<f64>,
}

/// Quantities of one asset held on one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub asset: String,
    pub available: f64,
    pub pending: f64,
    pub staked: f64,
    pub exchange: String,
    /// Unix seconds.
    pub last_updated: i64,
}

impl Holding {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.available + self.pending + self.staked
    }
}

/// State of the external automation loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutomationState {
    pub running: bool,
    pub mode: String,
    pub started_at: Option<i64>,
    pub last_exec: Option<i64>,
    pub next_exec: Option<i64>,
}

/// Immutable view of everything the dashboard shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Increases with every new snapshot.
    pub sequence: u64,
    /// Unix seconds at which the snapshot was taken.
    pub taken_at: i64,
    /// Most recent first.
    pub transactions: Vec<Transaction>,
    pub holdings: Vec<Holding>,
    /// Quote price per asset symbol.
    pub prices: BTreeMap<String, f64>,
    pub automation: AutomationState,
    /// Recent log lines, oldest first.
    pub logs: Vec<String>,
}

/// Producer of snapshots, polled once per tick.
pub trait SnapshotSource {
    fn latest(&mut self) -> Arc<Snapshot>;
}

/// A source that always returns the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub Arc<Snapshot>);

impl SnapshotSource for StaticSource {
    fn latest(&mut self) -> Arc<Snapshot> {
        Arc::clone(&self.0)
    }
}
