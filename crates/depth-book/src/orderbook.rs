//! Order book engine
//!
//! Projects accepted diffs onto a [`PriceLevelBook`]. Sequencing is not
//! checked here: callers only hand over diffs a
//! [`DiffSequencer`](crate::DiffSequencer) has accepted.

use crate::storage::PriceLevelBook;
use depth_types::{DiffMessage, Level, Side, Snapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Volume change observed at the top of one side
///
/// `volume` is `previous - new`, so a positive value means liquidity was
/// taken off the best level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDelta {
    /// Price of the touched level
    pub price: Decimal,
    /// Quantity removed from the level
    pub volume: Decimal,
    /// Event time of the diff that changed it
    pub event_time: u64,
}

impl LevelDelta {
    /// Create a new level delta
    pub fn new(price: Decimal, volume: Decimal, event_time: u64) -> Self {
        Self {
            price,
            volume,
            event_time,
        }
    }
}

/// Best-level deltas produced by one applied diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Event time of the applied diff
    pub event_time: u64,
    /// Deltas at the top of the bid side
    pub bid_deltas: Vec<LevelDelta>,
    /// Deltas at the top of the ask side
    pub ask_deltas: Vec<LevelDelta>,
}

impl ApplyReport {
    /// Deltas for one side
    pub fn deltas(&self, side: Side) -> &[LevelDelta] {
        match side {
            Side::Bid => &self.bid_deltas,
            Side::Ask => &self.ask_deltas,
        }
    }

    /// Mutable deltas for one side
    pub fn deltas_mut(&mut self, side: Side) -> &mut Vec<LevelDelta> {
        match side {
            Side::Bid => &mut self.bid_deltas,
            Side::Ask => &mut self.ask_deltas,
        }
    }

    /// Returns true if the best level of a side changed
    pub fn best_updated(&self, side: Side) -> bool {
        !self.deltas(side).is_empty()
    }
}

/// Owns the live book and applies accepted diffs to it
#[derive(Debug, Clone, Default)]
pub struct OrderBookEngine {
    /// Live price levels
    book: PriceLevelBook,
    /// Final update id of the last applied diff (or the snapshot watermark)
    last_update_id: u64,
    /// Event time of the last applied diff
    last_event_time: Option<u64>,
}

impl OrderBookEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the book from a snapshot
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut engine = Self::new();
        engine.seed(snapshot);
        engine
    }

    /// Replace the book contents with a snapshot
    pub fn seed(&mut self, snapshot: &Snapshot) {
        self.book.clear();
        for side in Side::BOTH {
            for level in snapshot.levels(side) {
                self.book.upsert(side, level.price, level.qty);
            }
        }
        self.last_update_id = snapshot.last_update_id;
        self.last_event_time = None;
        debug!(
            last_update_id = snapshot.last_update_id,
            bids = self.book.len(Side::Bid),
            asks = self.book.len(Side::Ask),
            "Seeded book from snapshot"
        );
    }

    /// Apply every bid and ask change of a diff
    pub fn apply_diff(&mut self, diff: &DiffMessage) -> ApplyReport {
        let mut report = ApplyReport {
            event_time: diff.event_time,
            ..Default::default()
        };
        for side in Side::BOTH {
            let deltas = self.apply_side(side, diff.changes(side), diff.event_time);
            *report.deltas_mut(side) = deltas;
        }
        self.last_update_id = diff.final_update_id;
        self.last_event_time = Some(diff.event_time);
        report
    }

    /// Apply one side's changes, recording volume drops at the best level
    ///
    /// When the best level is emptied, the next change on that side is also
    /// tracked since it usually touches the new best level.
    fn apply_side(&mut self, side: Side, changes: &[Level], event_time: u64) -> Vec<LevelDelta> {
        let best_price = self.book.best(side).map(|l| l.price);
        let mut deltas = Vec::new();
        let mut follow_next = false;

        for change in changes {
            if Some(change.price) == best_price || follow_next {
                if let Some(current) = self.book.quantity(side, change.price) {
                    follow_next = change.qty.is_zero();
                    deltas.push(LevelDelta::new(change.price, current - change.qty, event_time));
                }
            }
            self.book.upsert(side, change.price, change.qty);
        }
        deltas
    }

    /// Read access to the live book
    pub fn book(&self) -> &PriceLevelBook {
        &self.book
    }

    /// Final update id reflected in the book
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    /// Event time of the last applied diff
    pub fn last_event_time(&self) -> Option<u64> {
        self.last_event_time
    }

    /// Get the spread (ask - bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.book.best_ask(), self.book.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}
