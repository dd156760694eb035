//! Snapshot + diff stream → book timeline
//!
//! Wires [`DiffSequencer`] → [`OrderBookEngine`] → [`BookTimeline`]. A diff
//! only reaches the book after the sequencer accepts it, so a sync failure
//! can never leave a partially applied diff in the timeline.

use crate::history::BookTimeline;
use crate::orderbook::{ApplyReport, OrderBookEngine};
use crate::sequencer::{DiffSequencer, Verdict};
use depth_types::{DepthResult, DiffMessage, Snapshot};
use tracing::{debug, info, warn};

/// What happened to one offered diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Discarded before alignment
    Stale,
    /// Applied and recorded
    Applied(ApplyReport),
    /// Already applied, dropped
    Replay,
}

/// Counters for one reconstruction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructStats {
    /// Diffs discarded before alignment
    pub stale: u64,
    /// Diffs applied to the book
    pub applied: u64,
    /// Replayed diffs dropped after alignment
    pub replayed: u64,
    /// Applied diffs whose event time went backwards (not recorded)
    pub unrecorded: u64,
}

/// Deterministic single-threaded reconstruction of one alignment attempt
#[derive(Debug, Clone)]
pub struct Reconstructor {
    sequencer: DiffSequencer,
    engine: OrderBookEngine,
    timeline: BookTimeline,
    stats: ReconstructStats,
}

impl Reconstructor {
    /// Seed from a snapshot; nothing is recorded until the first applied diff
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            sequencer: DiffSequencer::for_snapshot(snapshot),
            engine: OrderBookEngine::from_snapshot(snapshot),
            timeline: BookTimeline::new(),
            stats: ReconstructStats::default(),
        }
    }

    /// Offer the next diff from the stream
    ///
    /// Errors from the sequencer are terminal for this reconstructor.
    pub fn process(&mut self, diff: &DiffMessage) -> DepthResult<Step> {
        let verdict = self.sequencer.offer(diff)?;
        if !verdict.should_apply() {
            if verdict == Verdict::Stale {
                self.stats.stale += 1;
                return Ok(Step::Stale);
            }
            self.stats.replayed += 1;
            return Ok(Step::Replay);
        }

        let report = self.engine.apply_diff(diff);
        self.stats.applied += 1;
        if !self.timeline.record(diff.event_time, self.engine.book()) {
            warn!(
                event_time = diff.event_time,
                final_update_id = diff.final_update_id,
                "Event time went backwards, state not recorded"
            );
            self.stats.unrecorded += 1;
        }
        debug!(
            first = diff.first_update_id,
            last = diff.final_update_id,
            event_time = diff.event_time,
            "Applied diff"
        );
        Ok(Step::Applied(report))
    }

    /// The sequencer
    pub fn sequencer(&self) -> &DiffSequencer {
        &self.sequencer
    }

    /// The live engine
    pub fn engine(&self) -> &OrderBookEngine {
        &self.engine
    }

    /// States recorded so far
    pub fn timeline(&self) -> &BookTimeline {
        &self.timeline
    }

    /// Counters so far
    pub fn stats(&self) -> ReconstructStats {
        self.stats
    }

    /// End of stream; fails with `AlignmentNotFound` if no diff ever aligned
    pub fn finish(self) -> DepthResult<BookTimeline> {
        self.sequencer.finish()?;
        info!(
            states = self.timeline.len(),
            applied = self.stats.applied,
            stale = self.stats.stale,
            replayed = self.stats.replayed,
            "Reconstruction finished"
        );
        Ok(self.timeline)
    }
}

/// Rebuild the full timeline for a snapshot and an ordered diff stream
pub fn reconstruct<I>(snapshot: &Snapshot, diffs: I) -> DepthResult<BookTimeline>
where
    I: IntoIterator<Item = DiffMessage>,
{
    let mut reconstructor = Reconstructor::new(snapshot);
    for diff in diffs {
        reconstructor.process(&diff)?;
    }
    reconstructor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_types::{DepthError, Level, Side};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn empty_snapshot(last_update_id: u64) -> Snapshot {
        Snapshot {
            last_update_id,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    fn bid_diff(first: u64, last: u64, time: u64, price: Decimal, qty: Decimal) -> DiffMessage {
        DiffMessage::new(first, last, time, vec![Level::new(price, qty)], Vec::new())
    }

    #[test]
    fn test_end_to_end_bid_removed() {
        let diffs = vec![
            bid_diff(3, 5, 1000, dec!(10.0), dec!(2.0)),
            bid_diff(6, 7, 1100, dec!(10.0), dec!(0)),
        ];

        let timeline = reconstruct(&empty_snapshot(5), diffs).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.first().unwrap().best_bid_price(), Some(dec!(10)));
        assert_eq!(timeline.last().unwrap().book().len(Side::Bid), 0);
    }

    #[test]
    fn test_stale_diffs_never_reach_book() {
        let snapshot = Snapshot {
            last_update_id: 10,
            bids: vec![Level::new(dec!(50), dec!(1))],
            asks: Vec::new(),
        };
        let mut reconstructor = Reconstructor::new(&snapshot);

        // would wipe the snapshot level if applied
        let step = reconstructor
            .process(&bid_diff(1, 4, 100, dec!(50), dec!(0)))
            .unwrap();
        assert_eq!(step, Step::Stale);
        assert_eq!(reconstructor.engine().book().len(Side::Bid), 1);
        assert!(reconstructor.timeline().is_empty());

        reconstructor
            .process(&bid_diff(9, 11, 200, dec!(49), dec!(1)))
            .unwrap();
        let timeline = reconstructor.finish().unwrap();
        assert_eq!(timeline.last().unwrap().book().len(Side::Bid), 2);
    }

    #[test]
    fn test_gap_leaves_timeline_consistent() {
        let mut reconstructor = Reconstructor::new(&empty_snapshot(102));
        reconstructor
            .process(&bid_diff(100, 105, 1, dec!(1), dec!(1)))
            .unwrap();
        reconstructor
            .process(&bid_diff(106, 110, 2, dec!(2), dec!(1)))
            .unwrap();

        let err = reconstructor
            .process(&bid_diff(112, 115, 3, dec!(3), dec!(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            DepthError::Desynchronization {
                expected: 111,
                actual: 112
            }
        ));
        assert_eq!(reconstructor.timeline().len(), 2);
        assert_eq!(reconstructor.engine().book().quantity(Side::Bid, dec!(3)), None);
    }

    #[test]
    fn test_replay_is_counted_not_applied() {
        let mut reconstructor = Reconstructor::new(&empty_snapshot(5));
        reconstructor.process(&bid_diff(3, 5, 1, dec!(1), dec!(1))).unwrap();
        let step = reconstructor.process(&bid_diff(3, 5, 1, dec!(1), dec!(7))).unwrap();
        assert_eq!(step, Step::Replay);
        assert_eq!(reconstructor.stats().replayed, 1);
        assert_eq!(reconstructor.engine().book().quantity(Side::Bid, dec!(1)), Some(dec!(1)));
    }

    #[test]
    fn test_no_alignment() {
        let err = reconstruct(&empty_snapshot(50), vec![bid_diff(60, 70, 1, dec!(1), dec!(1))])
            .unwrap_err();
        assert!(err.requires_snapshot());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let snapshot = empty_snapshot(1);
        let diffs: Vec<_> = (1..=50u64)
            .map(|i| bid_diff(i, i, i * 10, Decimal::from(i % 7), Decimal::from(i % 3)))
            .collect();

        let a = reconstruct(&snapshot, diffs.clone()).unwrap();
        let b = reconstruct(&snapshot, diffs).unwrap();
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x == y));
    }

    proptest! {
        #[test]
        fn prop_contiguous_diffs_leave_no_zero_levels(
            changes in proptest::collection::vec((any::<bool>(), 1i64..20, 0i64..3), 1..100)
        ) {
            let snapshot = Snapshot {
                last_update_id: 1,
                bids: vec![Level::new(dec!(1), dec!(1))],
                asks: vec![Level::new(dec!(30), dec!(1))],
            };
            let diffs = changes.iter().enumerate().map(|(i, &(is_bid, price, qty))| {
                let id = i as u64 + 1;
                let level = Level::new(Decimal::from(price), Decimal::from(qty));
                let (bids, asks) = if is_bid { (vec![level], Vec::new()) } else { (Vec::new(), vec![level]) };
                DiffMessage::new(id, id, id, bids, asks)
            });

            let timeline = reconstruct(&snapshot, diffs).unwrap();
            for state in timeline.iter() {
                for side in Side::BOTH {
                    prop_assert!(state.book().view(side).all(|l| !l.qty.is_zero()));
                }
            }
        }
    }
}
