//! Async ingestion pipeline
//!
//! A producer task (socket reader, file tailer) pushes records through a
//! [`FeedSender`]; the pipeline task pops them and drives a [`Session`].
//! Reconstruction itself stays single-threaded and synchronous.

use crate::config::PipelineConfig;
use crate::handoff::{Handoff, Pushed};
use depth_book::{Session, SessionReport};
use depth_types::{DepthResult, DiffMessage, Snapshot, TradeEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cooperative stop flag shared between the pipeline and its owner
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once a stop is requested
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// One record handed to the pipeline
#[derive(Debug, Clone)]
pub enum FeedInput {
    /// Parsed depth diff
    Diff(DiffMessage),
    /// Parsed trade
    Trade(TradeEvent),
    /// Unparsed JSON record; malformed ones are skipped
    Raw(String),
}

/// Why the pipeline stopped consuming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Stop signal was raised
    Stopped,
    /// Producer closed the feed
    Closed,
    /// Producer reported a transport failure
    Transport(String),
}

/// Result of a finished pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Session output up to termination
    pub report: SessionReport,
    /// Why consumption ended
    pub termination: Termination,
    /// Records discarded by the handoff
    pub dropped: u64,
}

/// Producer handle for a pipeline
#[derive(Debug, Clone)]
pub struct FeedSender {
    handoff: Arc<Handoff<FeedInput>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl FeedSender {
    /// Push any record
    pub async fn send(&self, input: FeedInput) -> DepthResult<Pushed> {
        self.handoff.push(input).await
    }

    /// Push a diff
    pub async fn send_diff(&self, diff: DiffMessage) -> DepthResult<Pushed> {
        self.send(FeedInput::Diff(diff)).await
    }

    /// Push a trade
    pub async fn send_trade(&self, trade: TradeEvent) -> DepthResult<Pushed> {
        self.send(FeedInput::Trade(trade)).await
    }

    /// Push a raw JSON record
    pub async fn send_raw(&self, line: impl Into<String>) -> DepthResult<Pushed> {
        self.send(FeedInput::Raw(line.into())).await
    }

    /// Close the feed normally; queued records are still consumed
    pub fn close(&self) {
        self.handoff.close();
    }

    /// Close the feed after a transport failure
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Feed transport failed");
        self.failure.lock().get_or_insert(reason);
        self.handoff.close();
    }

    /// Whether the consumer side has gone away or the feed was closed
    pub fn is_closed(&self) -> bool {
        self.handoff.is_closed()
    }

    /// Records discarded by the handoff so far
    pub fn dropped(&self) -> u64 {
        self.handoff.dropped()
    }
}

/// Consumer side of the ingestion pipeline
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    handoff: Arc<Handoff<FeedInput>>,
    failure: Arc<Mutex<Option<String>>>,
    stop: StopSignal,
}

enum Next {
    Stop,
    Input(Option<FeedInput>),
}

impl Pipeline {
    /// Create a pipeline from a validated config
    pub fn new(config: PipelineConfig) -> DepthResult<Self> {
        config.validate()?;
        let handoff = Arc::new(Handoff::new(config.queue_capacity, config.overflow_policy));
        Ok(Self {
            config,
            handoff,
            failure: Arc::new(Mutex::new(None)),
            stop: StopSignal::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Producer handle; clone freely
    pub fn sender(&self) -> FeedSender {
        FeedSender {
            handoff: Arc::clone(&self.handoff),
            failure: Arc::clone(&self.failure),
        }
    }

    /// Stop handle for this pipeline
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Consume records until stop, close, or an unrecoverable error
    ///
    /// The feed is closed on return so blocked producers are released.
    pub async fn run(self, snapshot: Snapshot) -> DepthResult<PipelineOutput> {
        info!(
            last_update_id = snapshot.last_update_id,
            capacity = self.config.queue_capacity,
            policy = ?self.config.overflow_policy,
            "Pipeline starting"
        );
        let result = self.consume(&snapshot).await;
        self.handoff.close();
        if let Err(e) = &result {
            error!(error = %e, "Pipeline aborted");
        }
        result
    }

    /// Run on a spawned task
    pub fn spawn(self, snapshot: Snapshot) -> JoinHandle<DepthResult<PipelineOutput>> {
        tokio::spawn(self.run(snapshot))
    }

    async fn consume(&self, snapshot: &Snapshot) -> DepthResult<PipelineOutput> {
        let mut session = Session::new(snapshot, self.config.match_horizon_ms);

        let termination = loop {
            if self.stop.is_stopped() {
                break Termination::Stopped;
            }

            let next = tokio::select! {
                biased;
                _ = self.stop.stopped() => Next::Stop,
                input = self.handoff.pop() => Next::Input(input),
            };

            match next {
                Next::Stop => break Termination::Stopped,
                Next::Input(None) => {
                    break match self.failure.lock().take() {
                        Some(reason) => Termination::Transport(reason),
                        None => Termination::Closed,
                    };
                }
                Next::Input(Some(FeedInput::Diff(diff))) => {
                    session.on_diff(&diff)?;
                }
                Next::Input(Some(FeedInput::Trade(trade))) => {
                    session.on_trade(trade);
                }
                Next::Input(Some(FeedInput::Raw(line))) => {
                    session.on_raw(&line)?;
                }
            }
        };

        debug!(termination = ?termination, "Pipeline consumer finished");
        let report = session.finish()?;
        Ok(PipelineOutput {
            report,
            termination,
            dropped: self.handoff.dropped(),
        })
    }
}
