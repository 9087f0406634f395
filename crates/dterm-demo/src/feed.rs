#![forbid(unsafe_code)]

//! Synthetic snapshot feed: a few assets whose prices random-walk.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dterm_runtime::{
    AutomationState, Holding, Snapshot, SnapshotSource, Transaction, TransactionKind,
};

const ASSETS: [(&str, f64, &str); 5] = [
    ("BTC", 64_000.0, "kraken"),
    ("ETH", 3_100.0, "coinbase"),
    ("SOL", 145.0, "kraken"),
    ("ATOM", 8.4, "osmosis"),
    ("USDC", 1.0, "coinbase"),
];

const HISTORY: usize = 24;
const LOG_LINES: usize = 50;

/// Linear congruential generator; enough to make the numbers move.
#[derive(Debug, Clone)]
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0
    }

    /// Uniform in `[-1, 1)`.
    fn signed_unit(&mut self) -> f64 {
        let bits = self.next_u64() >> 11;
        (bits as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }

    fn below(&mut self, n: u64) -> u64 {
        (self.next_u64() >> 33) % n.max(1)
    }
}

/// Produces a new snapshot on every call.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    rng: Lcg,
    clock: fn() -> i64,
    sequence: u64,
    prices: BTreeMap<String, f64>,
    holdings: Vec<Holding>,
    transactions: Vec<Transaction>,
    logs: Vec<String>,
    started_at: i64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

impl SyntheticFeed {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_clock(seed, unix_now)
    }

    #[must_use]
    pub fn with_clock(seed: u64, clock: fn() -> i64) -> Self {
        let now = clock();
        let prices = ASSETS
            .iter()
            .map(|(asset, price, _)| ((*asset).to_owned(), *price))
            .collect();
        let holdings = ASSETS
            .iter()
            .enumerate()
            .map(|(i, (asset, price, exchange))| Holding {
                asset: (*asset).to_owned(),
                available: 2_000.0 / price * (i + 1) as f64,
                pending: 0.0,
                staked: if *asset == "ATOM" { 120.0 } else { 0.0 },
                exchange: (*exchange).to_owned(),
                last_updated: now,
            })
            .collect();
        Self {
            rng: Lcg(seed ^ 0x9E37_79B9_7F4A_7C15),
            clock,
            sequence: 0,
            prices,
            holdings,
            transactions: Vec::new(),
            logs: vec![format!("feed started with {} assets", ASSETS.len())],
            started_at: now,
        }
    }

    fn step(&mut self) {
        let now = (self.clock)();
        self.sequence += 1;
        for (asset, price) in &mut self.prices {
            if asset != "USDC" {
                *price *= 1.0 + self.rng.signed_unit() * 0.004;
            }
        }
        if self.rng.below(4) == 0 {
            self.record_trade(now);
        }
        if self.logs.len() > LOG_LINES {
            let excess = self.logs.len() - LOG_LINES;
            self.logs.drain(..excess);
        }
    }

    fn record_trade(&mut self, now: i64) {
        let pick = |rng: &mut Lcg| ASSETS[rng.below(ASSETS.len() as u64) as usize].0;
        let asset = pick(&mut self.rng);
        let kind = match self.rng.below(4) {
            0 => TransactionKind::Buy,
            1 => TransactionKind::Sell,
            2 => TransactionKind::Stake,
            _ => TransactionKind::Swap,
        };
        let amount = 0.01 + self.rng.signed_unit().abs() * 2.0;
        let (counter_asset, counter_amount) = if kind == TransactionKind::Swap {
            let to = pick(&mut self.rng);
            let from_price = self.prices.get(asset).copied().unwrap_or(1.0);
            let to_price = self.prices.get(to).copied().unwrap_or(1.0);
            (Some(to.to_owned()), Some(amount * from_price / to_price))
        } else {
            (None, None)
        };
        let id = format!("tx-{}", self.sequence);
        self.logs
            .push(format!("{} {amount:.4} {asset} ({id})", kind.label()));
        if let Some(holding) = self.holdings.iter_mut().find(|h| h.asset == asset) {
            match kind {
                TransactionKind::Buy => holding.available += amount,
                TransactionKind::Sell | TransactionKind::Swap => {
                    holding.available = (holding.available - amount).max(0.0);
                }
                TransactionKind::Stake => {
                    let moved = amount.min(holding.available);
                    holding.available -= moved;
                    holding.staked += moved;
                }
                TransactionKind::Deposit | TransactionKind::Withdrawal => {}
            }
            holding.last_updated = now;
        }
        self.transactions.insert(
            0,
            Transaction {
                id,
                timestamp: now,
                kind,
                asset: asset.to_owned(),
                amount,
                status: "filled".to_owned(),
                counter_asset,
                counter_amount,
            },
        );
        self.transactions.truncate(HISTORY);
    }

    fn snapshot(&self) -> Snapshot {
        let now = (self.clock)();
        Snapshot {
            sequence: self.sequence,
            taken_at: now,
            transactions: self.transactions.clone(),
            holdings: self.holdings.clone(),
            prices: self.prices.clone(),
            automation: AutomationState {
                running: true,
                mode: "synthetic".to_owned(),
                started_at: Some(self.started_at),
                last_exec: Some(now),
                next_exec: Some(now + 1),
            },
            logs: self.logs.clone(),
        }
    }
}

impl SnapshotSource for SyntheticFeed {
    fn latest(&mut self) -> Arc<Snapshot> {
        self.step();
        Arc::new(self.snapshot())
    }
}
