//! Update-id sequencing between a snapshot and the diff stream
//!
//! # State Machine
//!
//! ```text
//! Seeking → Synced → Desynchronized
//! ```
//!
//! While seeking, the first diff whose range `U..=u` brackets the snapshot's
//! `lastUpdateId` becomes the alignment point and everything before it is
//! discarded. Once synced, each diff must start exactly one past the previous
//! applied `u`. Pure replays (`u` at or below the last applied id) are dropped.
//! A gap is terminal: the sequencer stays desynchronized until it is replaced
//! with one built from a fresh snapshot.

use depth_types::{DepthError, DepthResult, DiffMessage, Snapshot};
use tracing::{debug, error, info, warn};

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    /// No diff has bridged the snapshot watermark yet
    #[default]
    Seeking,
    /// Applying diffs in contiguous update-id order
    Synced,
    /// A gap was detected; needs a fresh snapshot
    Desynchronized,
}

impl std::fmt::Display for SequencerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Seeking => "Seeking",
            Self::Synced => "Synced",
            Self::Desynchronized => "Desynchronized",
        };
        f.write_str(name)
    }
}

/// What to do with an offered diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Precedes alignment; the snapshot already covers (or cannot reach) it
    Stale,
    /// The alignment diff; apply it
    Aligned,
    /// Next contiguous diff; apply it
    Next,
    /// Already applied; drop it
    Replay,
}

impl Verdict {
    /// Returns true if the diff must be applied to the book
    pub fn should_apply(&self) -> bool {
        matches!(self, Self::Aligned | Self::Next)
    }
}

/// Aligns a snapshot watermark with the diff stream and enforces contiguity
#[derive(Debug, Clone)]
pub struct DiffSequencer {
    /// Snapshot watermark
    last_update_id: u64,
    /// Final update id of the last applied diff
    last_applied: Option<u64>,
    /// Current state
    state: SequencerState,
    /// Diffs offered while seeking
    scanned: u64,
    /// Seeking diffs that started past the watermark
    ahead: u64,
}

impl DiffSequencer {
    /// Create a sequencer for a snapshot watermark
    pub fn new(last_update_id: u64) -> Self {
        Self {
            last_update_id,
            last_applied: None,
            state: SequencerState::Seeking,
            scanned: 0,
            ahead: 0,
        }
    }

    /// Create a sequencer for a snapshot
    pub fn for_snapshot(snapshot: &Snapshot) -> Self {
        Self::new(snapshot.last_update_id)
    }

    /// Get the current state
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Check if the sequencer is synchronized
    pub fn is_synced(&self) -> bool {
        self.state == SequencerState::Synced
    }

    /// Diffs discarded while seeking because they started past the watermark
    ///
    /// Non-zero means the snapshot is older than the stream and alignment
    /// will not happen without a fresher snapshot.
    pub fn ahead_of_snapshot(&self) -> u64 {
        self.ahead
    }

    /// Snapshot watermark this sequencer aligns against
    pub fn watermark(&self) -> u64 {
        self.last_update_id
    }

    /// Final update id of the last accepted diff
    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    /// Offer the next diff from the stream
    pub fn offer(&mut self, diff: &DiffMessage) -> DepthResult<Verdict> {
        self.offer_range(diff.first_update_id, diff.final_update_id)
    }

    /// Offer a diff by its update-id range `first..=last`
    pub fn offer_range(&mut self, first: u64, last: u64) -> DepthResult<Verdict> {
        match self.state {
            SequencerState::Seeking => {
                self.scanned += 1;
                if first <= self.last_update_id && self.last_update_id <= last {
                    info!(
                        watermark = self.last_update_id,
                        first,
                        last,
                        discarded = self.scanned - 1,
                        "Aligned diff stream with snapshot"
                    );
                    self.state = SequencerState::Synced;
                    self.last_applied = Some(last);
                    Ok(Verdict::Aligned)
                } else if first > self.last_update_id {
                    self.ahead += 1;
                    warn!(
                        first,
                        last,
                        watermark = self.last_update_id,
                        "Diff starts past the snapshot, snapshot is too old"
                    );
                    Ok(Verdict::Stale)
                } else {
                    debug!(first, last, watermark = self.last_update_id, "Discarding stale diff");
                    Ok(Verdict::Stale)
                }
            }
            SequencerState::Synced => {
                let previous = self.last_applied.unwrap_or(self.last_update_id);
                if last <= previous {
                    warn!(first, last, previous, "Dropping replayed diff");
                    return Ok(Verdict::Replay);
                }
                let expected = previous + 1;
                if first != expected {
                    error!(expected, actual = first, "Update id gap in diff stream");
                    self.state = SequencerState::Desynchronized;
                    return Err(DepthError::Desynchronization {
                        expected,
                        actual: first,
                    });
                }
                self.last_applied = Some(last);
                Ok(Verdict::Next)
            }
            SequencerState::Desynchronized => Err(DepthError::invalid_state(
                SequencerState::Synced.to_string(),
                self.state.to_string(),
            )),
        }
    }

    /// Consume diffs until the alignment diff is found and return it
    ///
    /// Stale diffs are dropped. The iterator is left positioned right after
    /// the alignment diff.
    pub fn align<I>(&mut self, diffs: &mut I) -> DepthResult<DiffMessage>
    where
        I: Iterator<Item = DiffMessage>,
    {
        for diff in diffs.by_ref() {
            if self.offer(&diff)? == Verdict::Aligned {
                return Ok(diff);
            }
        }
        Err(self.not_found())
    }

    /// Signal end of stream; fails if alignment never happened
    pub fn finish(&self) -> DepthResult<()> {
        match self.state {
            SequencerState::Seeking => Err(self.not_found()),
            _ => Ok(()),
        }
    }

    fn not_found(&self) -> DepthError {
        DepthError::AlignmentNotFound {
            last_update_id: self.last_update_id,
            diffs_scanned: self.scanned,
        }
    }
}
