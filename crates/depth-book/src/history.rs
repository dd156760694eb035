//! Event-time indexed book history
//!
//! Every applied diff leaves one immutable [`BookState`] behind, so a replay
//! viewer can scrub to any point of a captured session.

use crate::storage::PriceLevelBook;
use depth_types::{Level, Side};
use rust_decimal::Decimal;

/// A recorded book, frozen at the event time of the diff that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookState {
    event_time: u64,
    book: PriceLevelBook,
}

/// One displayed level and how much it moved since the previous state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelVariation {
    /// Level price
    pub price: Decimal,
    /// Quantity in this state
    pub qty: Decimal,
    /// `qty` minus the quantity in the previous state (absent counts as zero)
    pub change: Decimal,
}

impl BookState {
    /// Event time this state is tagged with
    pub fn event_time(&self) -> u64 {
        self.event_time
    }

    /// The recorded levels
    pub fn book(&self) -> &PriceLevelBook {
        &self.book
    }

    /// Get the best bid price
    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.book.best_bid().map(|l| l.price)
    }

    /// Get the best ask price
    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.book.best_ask().map(|l| l.price)
    }

    /// Get the spread
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get the mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some((ask + bid) / Decimal::TWO),
            _ => None,
        }
    }

    /// Top `depth` levels of a side with their change against `previous`
    pub fn variations(&self, previous: &BookState, side: Side, depth: usize) -> Vec<LevelVariation> {
        self.book
            .view(side)
            .take(depth)
            .map(|Level { price, qty }| {
                let before = previous.book.quantity(side, price).unwrap_or(Decimal::ZERO);
                LevelVariation {
                    price,
                    qty,
                    change: qty - before,
                }
            })
            .collect()
    }
}

/// Book states in strictly increasing event-time order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookTimeline {
    states: Vec<BookState>,
}

impl BookTimeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an independent copy of `book` at `event_time`
    ///
    /// A state recorded at an event time equal to the latest one replaces it,
    /// so the index stays strictly increasing and the entry reflects every
    /// diff carrying that time. Returns `false` (and records nothing) for an
    /// event time older than the latest state.
    pub fn record(&mut self, event_time: u64, book: &PriceLevelBook) -> bool {
        let state = BookState {
            event_time,
            book: book.clone(),
        };
        match self.states.last().map(|s| s.event_time) {
            Some(latest) if event_time < latest => return false,
            Some(latest) if event_time == latest => {
                let idx = self.states.len() - 1;
                self.states[idx] = state;
            }
            _ => self.states.push(state),
        }
        true
    }

    /// Number of recorded states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Get a state by index (0 = oldest)
    pub fn get(&self, index: usize) -> Option<&BookState> {
        self.states.get(index)
    }

    /// Get the oldest state
    pub fn first(&self) -> Option<&BookState> {
        self.states.first()
    }

    /// Get the most recent state
    pub fn last(&self) -> Option<&BookState> {
        self.states.last()
    }

    /// Index of the first state at or after `query_time`
    ///
    /// Clamps to the last state when `query_time` is past the end.
    pub fn index_at_or_after(&self, query_time: u64) -> Option<usize> {
        if self.states.is_empty() {
            return None;
        }
        let idx = self.states.partition_point(|s| s.event_time < query_time);
        Some(idx.min(self.states.len() - 1))
    }

    /// First state with `event_time >= query_time`, or the last state
    pub fn nearest_at_or_after(&self, query_time: u64) -> Option<&BookState> {
        self.index_at_or_after(query_time).map(|i| &self.states[i])
    }

    /// State immediately before `index`, or the same state for index 0
    pub fn previous_of(&self, index: usize) -> Option<&BookState> {
        if index >= self.states.len() {
            return None;
        }
        self.states.get(index.saturating_sub(1))
    }

    /// State whose event time is closest to `query_time` (ties go earlier)
    pub fn closest(&self, query_time: u64) -> Option<&BookState> {
        let after = self.index_at_or_after(query_time)?;
        let candidate = &self.states[after];
        match after.checked_sub(1).map(|i| &self.states[i]) {
            Some(before)
                if query_time.abs_diff(before.event_time)
                    <= query_time.abs_diff(candidate.event_time) =>
            {
                Some(before)
            }
            _ => Some(candidate),
        }
    }

    /// States with `start <= event_time <= end`
    pub fn range(&self, start: u64, end: u64) -> &[BookState] {
        if start > end {
            return &[];
        }
        let lo = self.states.partition_point(|s| s.event_time < start);
        let hi = self.states.partition_point(|s| s.event_time <= end);
        &self.states[lo..hi]
    }

    /// Iterator over all states (oldest first)
    pub fn iter(&self) -> impl Iterator<Item = &BookState> {
        self.states.iter()
    }
}
