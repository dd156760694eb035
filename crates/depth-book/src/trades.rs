//! Trade classification into per-side buckets

use depth_types::{Side, TradeEvent};
use std::collections::BTreeMap;

/// Trades of one side grouped by event time
pub type TradeBucket = BTreeMap<u64, Vec<TradeEvent>>;

/// Side a trade belongs to, from the feed's maker flag
///
/// A buyer-maker trade hit a resting bid, so it lands in the bid bucket.
pub fn trade_side(trade: &TradeEvent) -> Side {
    if trade.is_buyer_maker {
        Side::Bid
    } else {
        Side::Ask
    }
}

/// Trades with `center - half_width <= event_time <= center + half_width`
pub fn in_window(
    bucket: &TradeBucket,
    center: u64,
    half_width: u64,
) -> impl Iterator<Item = &TradeEvent> {
    let lo = center.saturating_sub(half_width);
    let hi = center.saturating_add(half_width);
    bucket.range(lo..=hi).flat_map(|(_, trades)| trades.iter())
}

/// Routes trades into bid and ask buckets
#[derive(Debug, Clone, Default)]
pub struct TradeClassifier {
    bids: TradeBucket,
    asks: TradeBucket,
}

impl TradeClassifier {
    /// Create empty buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// File a trade under its side and event time
    pub fn classify(&mut self, trade: TradeEvent) -> Side {
        let side = trade_side(&trade);
        self.bucket_mut(side)
            .entry(trade.event_time)
            .or_default()
            .push(trade);
        side
    }

    /// Bucket for one side
    pub fn bucket(&self, side: Side) -> &TradeBucket {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn bucket_mut(&mut self, side: Side) -> &mut TradeBucket {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Trades of a side within `half_width` of `center`
    pub fn in_window(&self, side: Side, center: u64, half_width: u64) -> Vec<&TradeEvent> {
        in_window(self.bucket(side), center, half_width).collect()
    }

    /// Number of trades on a side
    pub fn trade_count(&self, side: Side) -> usize {
        self.bucket(side).values().map(Vec::len).sum()
    }
}
