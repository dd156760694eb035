//! Ingestion boundary for depth reconstruction
//!
//! Moves exchange records from a producer (socket reader, capture file) to
//! the single-threaded reconstruction session.
//!
//! # Features
//!
//! - Bounded handoff with block, drop-oldest, or drop-newest overflow
//! - Cooperative stop signal
//! - Capture folder reader with malformed-line skipping
//!
//! # Example
//!
//! ```no_run
//! use depth_feed::{CaptureFolder, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let capture = CaptureFolder::new("data/capture/btcusdt/1702798595534677").load()?;
//!     let pipeline = Pipeline::new(PipelineConfig::new())?;
//!     let sender = pipeline.sender();
//!
//!     let handle = pipeline.spawn(capture.snapshot.clone());
//!     capture.feed(&sender).await?;
//!
//!     let output = handle.await??;
//!     println!("{} states recorded", output.report.timeline.len());
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod handoff;
pub mod pipeline;

// Re-export main types
pub use capture::{trade_file, Capture, CaptureFolder, Records, DEPTH_FILE, SNAPSHOT_FILE};
pub use config::{OverflowPolicy, PipelineConfig};
pub use handoff::{Handoff, Pushed};
pub use pipeline::{FeedInput, FeedSender, Pipeline, PipelineOutput, StopSignal, Termination};
