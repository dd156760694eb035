//! One capture or live session: book reconstruction plus trade handling
//!
//! Depth and trade records are fed in arrival order. Trades are classified
//! into buckets and queued for matching against the best-level deltas of
//! every diff applied after them.

use crate::history::BookTimeline;
use crate::matcher::{TradeMatch, TradeMatcher};
use crate::reconstruct::{ReconstructStats, Reconstructor, Step};
use crate::trades::TradeClassifier;
use depth_types::{DepthResult, DiffMessage, FeedMessage, Side, Snapshot, TradeEvent};
use tracing::{info, warn};

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Diff handling counters
    pub book: ReconstructStats,
    /// Trades classified
    pub trades: u64,
    /// Records skipped as malformed
    pub malformed: u64,
    /// Snapshot records seen mid-stream and ignored
    pub ignored_snapshots: u64,
}

/// Everything a finished session produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Recorded book states
    pub timeline: BookTimeline,
    /// Trades by side and event time
    pub trades: TradeClassifier,
    /// Matching outcome for every trade
    pub matches: Vec<TradeMatch>,
    /// Counters
    pub stats: SessionStats,
}

/// Live session state
#[derive(Debug, Clone)]
pub struct Session {
    reconstructor: Reconstructor,
    trades: TradeClassifier,
    bid_matcher: TradeMatcher,
    ask_matcher: TradeMatcher,
    matches: Vec<TradeMatch>,
    stats: SessionStats,
}

impl Session {
    /// Start a session from a snapshot
    pub fn new(snapshot: &Snapshot, match_horizon_ms: u64) -> Self {
        Self {
            reconstructor: Reconstructor::new(snapshot),
            trades: TradeClassifier::new(),
            bid_matcher: TradeMatcher::new(Side::Bid, match_horizon_ms),
            ask_matcher: TradeMatcher::new(Side::Ask, match_horizon_ms),
            matches: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    fn matcher_mut(&mut self, side: Side) -> &mut TradeMatcher {
        match side {
            Side::Bid => &mut self.bid_matcher,
            Side::Ask => &mut self.ask_matcher,
        }
    }

    /// Feed one diff
    pub fn on_diff(&mut self, diff: &DiffMessage) -> DepthResult<Step> {
        let mut step = self.reconstructor.process(diff)?;
        if let Step::Applied(report) = &mut step {
            for side in Side::BOTH {
                let matched = self.matcher_mut(side).match_deltas(report.deltas_mut(side));
                self.matches.extend(matched);
            }
        }
        Ok(step)
    }

    /// Feed one trade; returns the side it was filed under
    pub fn on_trade(&mut self, trade: TradeEvent) -> Side {
        let side = self.trades.classify(trade.clone());
        self.matcher_mut(side).add_trade(trade);
        self.stats.trades += 1;
        side
    }

    /// Feed one typed record
    pub fn on_message(&mut self, message: FeedMessage) -> DepthResult<()> {
        match message {
            FeedMessage::Diff(diff) => self.on_diff(&diff).map(|_| ()),
            FeedMessage::Trade(trade) => {
                self.on_trade(trade);
                Ok(())
            }
            FeedMessage::Snapshot(snapshot) => {
                warn!(
                    last_update_id = snapshot.last_update_id,
                    "Snapshot received mid-session, ignoring"
                );
                self.stats.ignored_snapshots += 1;
                Ok(())
            }
        }
    }

    /// Feed one raw JSON record; malformed records are logged and skipped
    pub fn on_raw(&mut self, line: &str) -> DepthResult<()> {
        match FeedMessage::parse(line) {
            Ok(message) => self.on_message(message),
            Err(e) if e.is_skippable() => {
                warn!(error = %e, "Skipping malformed record");
                self.stats.malformed += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Reconstruction state so far
    pub fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    /// Trades classified so far
    pub fn trades(&self) -> &TradeClassifier {
        &self.trades
    }

    /// Counters so far
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            book: self.reconstructor.stats(),
            ..self.stats
        }
    }

    /// Close the session, purging unmatched trades
    pub fn finish(mut self) -> DepthResult<SessionReport> {
        let stats = self.stats();
        let mut matches = std::mem::take(&mut self.matches);
        matches.extend(self.bid_matcher.purge());
        matches.extend(self.ask_matcher.purge());

        let timeline = self.reconstructor.finish()?;
        info!(
            states = timeline.len(),
            trades = stats.trades,
            malformed = stats.malformed,
            "Session finished"
        );
        Ok(SessionReport {
            timeline,
            trades: self.trades,
            matches,
            stats,
        })
    }
}
