//! Matching trades against best-level volume drops
//!
//! A trade that consumed resting liquidity shows up in the depth stream as a
//! volume drop at the best level of its side. Queued trades are compared
//! against the [`LevelDelta`]s of each applied diff; an exact price and
//! quantity match ties the trade to the diff's event time.
//!
//! Fills that share an event time and price are one taker order swept across
//! several makers, so consecutive trades with the same time and price are
//! merged into one pending entry and matched on their summed quantity.

use crate::orderbook::LevelDelta;
use depth_types::{Side, TradeEvent};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Default horizon (ms) after which an unmatched trade is given up on
pub const DEFAULT_MATCH_HORIZON_MS: u64 = 100;

/// How a trade left the matcher queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchOutcome {
    /// Matched a level delta carrying this event time
    Matched { event_time: u64 },
    /// Deltas moved past the horizon without a match
    Dropped,
    /// Still unmatched when the session ended
    Purged,
}

/// Result for one trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeMatch {
    /// Trade id as delivered
    pub trade_id: String,
    /// Event time of the trade
    pub trade_time: u64,
    /// Outcome
    pub outcome: MatchOutcome,
}

/// Trades merged by event time and price, waiting for a match
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingTrade {
    trade_ids: Vec<String>,
    event_time: u64,
    price: Decimal,
    quantity: Decimal,
}

impl PendingTrade {
    fn label(&self) -> String {
        self.trade_ids.join("-")
    }

    fn resolve(self, outcome: MatchOutcome) -> impl Iterator<Item = TradeMatch> {
        let trade_time = self.event_time;
        self.trade_ids.into_iter().map(move |trade_id| TradeMatch {
            trade_id,
            trade_time,
            outcome,
        })
    }
}

impl From<TradeEvent> for PendingTrade {
    fn from(trade: TradeEvent) -> Self {
        Self {
            trade_ids: vec![trade.trade_id],
            event_time: trade.event_time,
            price: trade.price,
            quantity: trade.quantity,
        }
    }
}

/// Per-side queue of trades waiting for a matching level delta
#[derive(Debug, Clone)]
pub struct TradeMatcher {
    side: Side,
    queue: VecDeque<PendingTrade>,
    horizon_ms: u64,
}

impl TradeMatcher {
    /// Create a matcher for one side
    pub fn new(side: Side, horizon_ms: u64) -> Self {
        Self {
            side,
            queue: VecDeque::new(),
            horizon_ms,
        }
    }

    /// Side this matcher serves
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of trades waiting, counting merged fills individually
    pub fn pending(&self) -> usize {
        self.queue.iter().map(|p| p.trade_ids.len()).sum()
    }

    /// Queue a trade, merging it into the previous one on equal time and price
    pub fn add_trade(&mut self, trade: TradeEvent) {
        if let Some(last) = self.queue.back_mut() {
            if last.event_time == trade.event_time && last.price == trade.price {
                last.quantity += trade.quantity;
                last.trade_ids.push(trade.trade_id);
                debug!(side = %self.side, trade_ids = %last.label(), quantity = %last.quantity, "Merged trade");
                return;
            }
        }
        debug!(side = %self.side, trade_id = %trade.trade_id, "Queued trade");
        self.queue.push_back(trade.into());
    }

    /// Try every queued trade against `deltas`, consuming matched volume
    pub fn match_deltas(&mut self, deltas: &mut [LevelDelta]) -> Vec<TradeMatch> {
        let mut results = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.queue.len());

        while let Some(trade) = self.queue.pop_front() {
            match self.try_match(&trade, deltas) {
                Some(outcome) => {
                    match outcome {
                        MatchOutcome::Matched { event_time } => {
                            info!(side = %self.side, trade_ids = %trade.label(), event_time, "Matched trade");
                        }
                        _ => warn!(side = %self.side, trade_ids = %trade.label(), "Dropped trade"),
                    }
                    results.extend(trade.resolve(outcome));
                }
                None => waiting.push_back(trade),
            }
        }

        self.queue = waiting;
        results
    }

    fn try_match(&self, trade: &PendingTrade, deltas: &mut [LevelDelta]) -> Option<MatchOutcome> {
        for delta in deltas.iter_mut() {
            // added liquidity says nothing about fills; a consumed (zero) delta
            // still counts towards the horizon
            if delta.volume < Decimal::ZERO {
                continue;
            }
            if delta.event_time > trade.event_time.saturating_add(self.horizon_ms) {
                return Some(MatchOutcome::Dropped);
            }
            if trade.price == delta.price && trade.quantity == delta.volume {
                delta.volume -= trade.quantity;
                return Some(MatchOutcome::Matched {
                    event_time: delta.event_time,
                });
            }
        }
        None
    }

    /// Flush every waiting trade as purged
    pub fn purge(&mut self) -> Vec<TradeMatch> {
        let side = self.side;
        self.queue
            .drain(..)
            .flat_map(|trade| {
                info!(side = %side, trade_ids = %trade.label(), "Purged trade");
                trade.resolve(MatchOutcome::Purged)
            })
            .collect()
    }
}
