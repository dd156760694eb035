//! Cumulative depth curves
//!
//! Running sum of quantity walking away from the best price, per side.

use crate::storage::PriceLevelBook;
use depth_types::{Level, Side};
use rust_decimal::Decimal;
use serde::Serialize;

/// One point of a cumulative depth curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepthPoint {
    /// Level price
    pub price: Decimal,
    /// Quantity at this level
    pub qty: Decimal,
    /// Quantity summed from the best level through this one
    pub cumulative: Decimal,
}

/// Cumulative curve for one side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthCurve {
    /// Side the curve was built from
    pub side: Side,
    /// Points, best price first
    pub points: Vec<DepthPoint>,
}

impl DepthCurve {
    /// Total quantity on the side (last cumulative value)
    pub fn total(&self) -> Decimal {
        self.points.last().map(|p| p.cumulative).unwrap_or(Decimal::ZERO)
    }

    /// Cumulative quantity available at prices no worse than `price`
    pub fn cumulative_at(&self, price: Decimal) -> Decimal {
        let within = |p: &DepthPoint| match self.side {
            Side::Bid => p.price >= price,
            Side::Ask => p.price <= price,
        };
        self.points
            .iter()
            .take_while(|p| within(*p))
            .last()
            .map(|p| p.cumulative)
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the curve has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Both sides' curves for one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthCurves {
    /// Bid curve, highest price first
    pub bids: DepthCurve,
    /// Ask curve, lowest price first
    pub asks: DepthCurve,
}

/// Builds cumulative depth curves from ordered levels
pub struct DepthAggregator;

impl DepthAggregator {
    /// Prefix sums of quantity over levels already in best-first order
    pub fn cumulative_curve<I>(levels: I, side: Side) -> DepthCurve
    where
        I: IntoIterator<Item = Level>,
    {
        let mut running = Decimal::ZERO;
        let points = levels
            .into_iter()
            .map(|level| {
                running += level.qty;
                DepthPoint {
                    price: level.price,
                    qty: level.qty,
                    cumulative: running,
                }
            })
            .collect();
        DepthCurve { side, points }
    }

    /// Curve for one side of a book
    pub fn side_curve(book: &PriceLevelBook, side: Side) -> DepthCurve {
        Self::cumulative_curve(book.view(side), side)
    }

    /// Curves for both sides of a book
    pub fn curves(book: &PriceLevelBook) -> DepthCurves {
        DepthCurves {
            bids: Self::side_curve(book, Side::Bid),
            asks: Self::side_curve(book, Side::Ask),
        }
    }
}
