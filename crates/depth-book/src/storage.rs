//! BTreeMap-based price level storage
//!
//! Provides O(log N) upserts keyed by exact decimal price.
//! Uses `Reverse<Decimal>` for bids so both sides iterate best price first.

use depth_types::{Level, Side};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Price → quantity storage for both sides of one book
///
/// - Bids: keyed by `Reverse<Decimal>` (highest first)
/// - Asks: keyed by `Decimal` (lowest first)
///
/// No entry ever holds a zero quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceLevelBook {
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl PriceLevelBook {
    /// Create a new empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a level; zero quantity removes it
    ///
    /// Removing an absent price is a no-op.
    pub fn upsert(&mut self, side: Side, price: Decimal, qty: Decimal) {
        match side {
            Side::Bid => {
                if qty.is_zero() {
                    self.bids.remove(&Reverse(price));
                } else {
                    self.bids.insert(Reverse(price), qty);
                }
            }
            Side::Ask => {
                if qty.is_zero() {
                    self.asks.remove(&price);
                } else {
                    self.asks.insert(price, qty);
                }
            }
        }
    }

    /// Quantity resting at `price`, if any
    pub fn quantity(&self, side: Side, price: Decimal) -> Option<Decimal> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)).copied(),
            Side::Ask => self.asks.get(&price).copied(),
        }
    }

    /// Ordered view of one side: bids descending, asks ascending
    ///
    /// Walks the live maps on every call, nothing is cached.
    pub fn view(&self, side: Side) -> LevelView<'_> {
        match side {
            Side::Bid => LevelView::Bids(self.bids.iter()),
            Side::Ask => LevelView::Asks(self.asks.iter()),
        }
    }

    /// Best level of a side
    pub fn best(&self, side: Side) -> Option<Level> {
        self.view(side).next()
    }

    /// Get the best bid (highest price)
    pub fn best_bid(&self) -> Option<Level> {
        self.best(Side::Bid)
    }

    /// Get the best ask (lowest price)
    pub fn best_ask(&self) -> Option<Level> {
        self.best(Side::Ask)
    }

    /// Get top N levels of a side
    pub fn top(&self, side: Side, n: usize) -> Vec<Level> {
        self.view(side).take(n).collect()
    }

    /// Number of levels on a side
    pub fn len(&self, side: Side) -> usize {
        match side {
            Side::Bid => self.bids.len(),
            Side::Ask => self.asks.len(),
        }
    }

    /// Total number of levels
    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Check if the book is empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Clear all levels
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}

/// Lazily ordered iterator over one side of a [`PriceLevelBook`]
#[derive(Debug, Clone)]
pub enum LevelView<'a> {
    /// Bids, highest price first
    Bids(btree_map::Iter<'a, Reverse<Decimal>, Decimal>),
    /// Asks, lowest price first
    Asks(btree_map::Iter<'a, Decimal, Decimal>),
}

impl Iterator for LevelView<'_> {
    type Item = Level;

    fn next(&mut self) -> Option<Level> {
        match self {
            Self::Bids(iter) => iter.next().map(|(Reverse(p), q)| Level::new(*p, *q)),
            Self::Asks(iter) => iter.next().map(|(p, q)| Level::new(*p, *q)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Bids(iter) => iter.size_hint(),
            Self::Asks(iter) => iter.size_hint(),
        }
    }
}

impl ExactSizeIterator for LevelView<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bid_order() {
        let mut book = PriceLevelBook::new();
        book.upsert(Side::Bid, dec!(100), dec!(1));
        book.upsert(Side::Bid, dec!(101), dec!(2));
        book.upsert(Side::Bid, dec!(99), dec!(3));

        let bids: Vec<_> = book.view(Side::Bid).collect();
        assert_eq!(bids.len(), 3);
        // Should be in descending order
        assert_eq!(bids[0].price, dec!(101));
        assert_eq!(bids[1].price, dec!(100));
        assert_eq!(bids[2].price, dec!(99));
    }

    #[test]
    fn test_ask_order() {
        let mut book = PriceLevelBook::new();
        book.upsert(Side::Ask, dec!(100), dec!(1));
        book.upsert(Side::Ask, dec!(101), dec!(2));
        book.upsert(Side::Ask, dec!(99), dec!(3));

        let asks: Vec<_> = book.view(Side::Ask).collect();
        assert_eq!(asks.len(), 3);
        // Should be in ascending order
        assert_eq!(asks[0].price, dec!(99));
        assert_eq!(asks[1].price, dec!(100));
        assert_eq!(asks[2].price, dec!(101));
    }

    #[test]
    fn test_zero_qty_removes_level() {
        let mut book = PriceLevelBook::new();
        book.upsert(Side::Bid, dec!(100), dec!(1));
        assert_eq!(book.len(Side::Bid), 1);

        book.upsert(Side::Bid, dec!(100), dec!(0.000));
        assert_eq!(book.len(Side::Bid), 0);

        // removing an absent level is a no-op
        book.upsert(Side::Ask, dec!(5), dec!(0));
        assert!(book.is_empty());
    }

    #[test]
    fn test_equal_prices_with_different_scale_share_a_level() {
        let mut book = PriceLevelBook::new();
        book.upsert(Side::Ask, dec!(10.0), dec!(1));
        book.upsert(Side::Ask, dec!(10.00), dec!(3));
        assert_eq!(book.len(Side::Ask), 1);
        assert_eq!(book.quantity(Side::Ask, dec!(10)), Some(dec!(3)));
    }

    #[test]
    fn test_view_tracks_mutation() {
        let mut book = PriceLevelBook::new();
        book.upsert(Side::Bid, dec!(1), dec!(1));
        assert_eq!(book.view(Side::Bid).count(), 1);

        book.upsert(Side::Bid, dec!(2), dec!(1));
        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(2)));
        assert_eq!(book.view(Side::Bid).len(), 2);
    }

    #[test]
    fn test_best_and_top() {
        let mut book = PriceLevelBook::new();
        for i in 1..=20 {
            book.upsert(Side::Bid, Decimal::from(i), dec!(1));
            book.upsert(Side::Ask, Decimal::from(100 + i), dec!(1));
        }

        assert_eq!(book.level_count(), 40);
        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(20)));
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(101)));

        let top = book.top(Side::Ask, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[2].price, dec!(103));
    }

    fn arb_update() -> impl Strategy<Value = (bool, i64, i64)> {
        (any::<bool>(), 1i64..50, 0i64..4)
    }

    proptest! {
        #[test]
        fn prop_no_zero_quantity_survives(updates in proptest::collection::vec(arb_update(), 0..200)) {
            let mut book = PriceLevelBook::new();
            for (is_bid, price, qty) in updates {
                let side = if is_bid { Side::Bid } else { Side::Ask };
                book.upsert(side, Decimal::new(price, 1), Decimal::from(qty));
            }
            for side in Side::BOTH {
                prop_assert!(book.view(side).all(|l| !l.qty.is_zero()));
            }
        }
    }
}
