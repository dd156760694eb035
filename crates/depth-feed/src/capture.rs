//! Capture folder reader
//!
//! A capture folder holds one session recorded from the exchange:
//!
//! - `snapshot.txt`: the REST depth snapshot, one JSON document
//! - `depth.txt`: depth diffs, one JSON record per line
//! - `bid_trade.txt`, `ask_trade.txt`: trades, one JSON record per line
//!
//! Trade files are optional. Malformed lines are logged and skipped.

use crate::config::PipelineConfig;
use crate::pipeline::{FeedInput, FeedSender};
use depth_book::{Session, SessionReport};
use depth_types::{DepthError, DepthResult, DiffMessage, Side, Snapshot, TradeEvent};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot file name
pub const SNAPSHOT_FILE: &str = "snapshot.txt";
/// Diff file name
pub const DEPTH_FILE: &str = "depth.txt";

/// Trade file name for a side
pub fn trade_file(side: Side) -> &'static str {
    match side {
        Side::Bid => "bid_trade.txt",
        Side::Ask => "ask_trade.txt",
    }
}

/// Parsed records from one line-delimited file
#[derive(Debug, Clone, PartialEq)]
pub struct Records<T> {
    /// Records that parsed
    pub items: Vec<T>,
    /// Lines skipped as malformed
    pub malformed: u64,
}

impl<T> Default for Records<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            malformed: 0,
        }
    }
}

/// A capture folder on disk
#[derive(Debug, Clone)]
pub struct CaptureFolder {
    root: PathBuf,
}

impl CaptureFolder {
    /// Point at a capture folder
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the snapshot; a malformed snapshot is an error
    pub fn snapshot(&self) -> DepthResult<Snapshot> {
        let path = self.root.join(SNAPSHOT_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        Snapshot::from_json(text.trim())
    }

    /// Read every diff line
    pub fn diffs(&self) -> DepthResult<Records<DiffMessage>> {
        let path = self.root.join(DEPTH_FILE);
        read_lines(&path, DiffMessage::from_json)
    }

    /// Read the trades of one side; a missing file means no trades
    pub fn trades(&self, side: Side) -> DepthResult<Records<TradeEvent>> {
        let path = self.root.join(trade_file(side));
        if !path.exists() {
            debug!(path = %path.display(), "No trade file");
            return Ok(Records::default());
        }
        read_lines(&path, TradeEvent::from_json)
    }

    /// Read the whole folder
    pub fn load(&self) -> DepthResult<Capture> {
        let snapshot = self.snapshot()?;
        let diffs = self.diffs()?;
        let bid_trades = self.trades(Side::Bid)?;
        let ask_trades = self.trades(Side::Ask)?;

        let capture = Capture {
            snapshot,
            diffs: diffs.items,
            bid_trades: bid_trades.items,
            ask_trades: ask_trades.items,
            malformed: diffs.malformed + bid_trades.malformed + ask_trades.malformed,
        };
        info!(
            root = %self.root.display(),
            diffs = capture.diffs.len(),
            trades = capture.bid_trades.len() + capture.ask_trades.len(),
            malformed = capture.malformed,
            "Capture loaded"
        );
        Ok(capture)
    }
}

fn io_error(path: &Path, source: io::Error) -> DepthError {
    DepthError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_lines<T>(path: &Path, parse: fn(&str) -> DepthResult<T>) -> DepthResult<Records<T>> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut records = Records::default();

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_error(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse(line) {
            Ok(item) => records.items.push(item),
            Err(e) => {
                warn!(path = %path.display(), line = number + 1, error = %e, "Skipping malformed line");
                records.malformed += 1;
            }
        }
    }
    Ok(records)
}

/// Loaded contents of a capture folder
#[derive(Debug, Clone)]
pub struct Capture {
    /// Depth snapshot
    pub snapshot: Snapshot,
    /// Diffs in file order
    pub diffs: Vec<DiffMessage>,
    /// Trades from the bid file
    pub bid_trades: Vec<TradeEvent>,
    /// Trades from the ask file
    pub ask_trades: Vec<TradeEvent>,
    /// Lines skipped while loading
    pub malformed: u64,
}

impl Capture {
    /// Diffs and trades in replay order
    ///
    /// Trades are merged by event time and delivered before any diff with
    /// an equal or later event time; diffs keep file order.
    pub fn records(&self) -> Vec<FeedInput> {
        let mut trades: Vec<&TradeEvent> =
            self.bid_trades.iter().chain(self.ask_trades.iter()).collect();
        trades.sort_by_key(|t| t.event_time);
        let mut trades = trades.into_iter().peekable();

        let mut records = Vec::with_capacity(self.diffs.len() + trades.len());
        for diff in &self.diffs {
            while let Some(trade) = trades.next_if(|t| t.event_time <= diff.event_time) {
                records.push(FeedInput::Trade(trade.clone()));
            }
            records.push(FeedInput::Diff(diff.clone()));
        }
        records.extend(trades.map(|t| FeedInput::Trade(t.clone())));
        records
    }

    /// Replay synchronously into a fresh session
    pub fn replay(&self, config: &PipelineConfig) -> DepthResult<SessionReport> {
        let mut session = Session::new(&self.snapshot, config.match_horizon_ms);
        for record in self.records() {
            match record {
                FeedInput::Diff(diff) => {
                    session.on_diff(&diff)?;
                }
                FeedInput::Trade(trade) => {
                    session.on_trade(trade);
                }
                FeedInput::Raw(line) => session.on_raw(&line)?,
            }
        }

        let mut report = session.finish()?;
        report.stats.malformed += self.malformed;
        Ok(report)
    }

    /// Push every record into a running pipeline, then close the feed
    ///
    /// Returns how many records were queued without loss.
    pub async fn feed(&self, sender: &FeedSender) -> DepthResult<u64> {
        let mut queued = 0;
        for record in self.records() {
            if !sender.send(record).await?.lost_record() {
                queued += 1;
            }
        }
        sender.close();
        Ok(queued)
    }
}
