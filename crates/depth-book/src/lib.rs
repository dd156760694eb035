//! Deterministic order book reconstruction
//!
//! Aligns a depth snapshot with an incremental diff stream, applies diffs in
//! update-id order with exact decimal arithmetic, and records every resulting
//! book state for point-in-time queries.
//!
//! # Constraints
//!
//! - NO `tokio`, NO networking, NO file I/O
//! - Single-threaded: replaying the same inputs yields the same timeline
//!
//! # Example
//!
//! ```
//! use depth_book::{reconstruct, DepthAggregator};
//! use depth_types::{DiffMessage, Level, Side, Snapshot};
//! use rust_decimal::Decimal;
//!
//! let snapshot = Snapshot { last_update_id: 5, bids: Vec::new(), asks: Vec::new() };
//! let diff = DiffMessage::new(3, 5, 1_000, vec![Level::new(Decimal::TEN, Decimal::ONE)], Vec::new());
//!
//! let timeline = reconstruct(&snapshot, vec![diff]).unwrap();
//! let state = timeline.nearest_at_or_after(0).unwrap();
//! let curve = DepthAggregator::side_curve(state.book(), Side::Bid);
//! assert_eq!(curve.total(), Decimal::ONE);
//! ```

pub mod depth;
pub mod history;
pub mod matcher;
pub mod orderbook;
pub mod reconstruct;
pub mod sequencer;
pub mod session;
pub mod storage;
pub mod trades;

// Re-export main types
pub use depth::{DepthAggregator, DepthCurve, DepthCurves, DepthPoint};
pub use history::{BookState, BookTimeline, LevelVariation};
pub use matcher::{MatchOutcome, TradeMatch, TradeMatcher, DEFAULT_MATCH_HORIZON_MS};
pub use orderbook::{ApplyReport, LevelDelta, OrderBookEngine};
pub use reconstruct::{reconstruct, ReconstructStats, Reconstructor, Step};
pub use sequencer::{DiffSequencer, SequencerState, Verdict};
pub use session::{Session, SessionReport, SessionStats};
pub use storage::{LevelView, PriceLevelBook};
pub use trades::{in_window, trade_side, TradeBucket, TradeClassifier};
