//! Error types for depth reconstruction

use std::path::PathBuf;
use thiserror::Error;

/// Kind of record that failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Depth snapshot (`lastUpdateId`, `bids`, `asks`)
    Snapshot,
    /// Incremental depth diff (`depthUpdate`)
    Diff,
    /// Trade event
    Trade,
    /// Record whose kind could not be determined
    Unknown,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Snapshot => "snapshot",
            Self::Diff => "diff",
            Self::Trade => "trade",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// What a supervisor should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Drop the offending record and keep consuming the stream
    Skip,
    /// Discard the current book and restart alignment from a fresh snapshot
    RequestSnapshot,
    /// Cannot continue
    Fatal,
}

/// Main error type for reconstruction operations
#[derive(Error, Debug)]
pub enum DepthError {
    // === Record Errors ===
    /// A record failed to parse into its typed form
    #[error("Malformed {kind} record: {reason}")]
    MalformedMessage { kind: RecordKind, reason: String },

    // === Synchronization Errors ===
    /// No diff brackets the snapshot watermark
    #[error("No diff brackets snapshot lastUpdateId {last_update_id} ({diffs_scanned} diffs scanned)")]
    AlignmentNotFound {
        last_update_id: u64,
        diffs_scanned: u64,
    },

    /// Update-id gap detected after alignment
    #[error("Desynchronized: expected first update id {expected}, got {actual}")]
    Desynchronization { expected: u64, actual: u64 },

    /// Operation not permitted in the current state
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    // === Boundary Errors ===
    /// Ingestion handoff was closed
    #[error("Feed channel closed")]
    ChannelClosed,

    /// Failed to read a capture file
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DepthError {
    /// Create a malformed record error
    pub fn malformed(kind: RecordKind, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            kind,
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Get the recovery strategy for this error
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::MalformedMessage { .. } => Recovery::Skip,
            Self::AlignmentNotFound { .. } | Self::Desynchronization { .. } => {
                Recovery::RequestSnapshot
            }
            Self::InvalidState { .. }
            | Self::ChannelClosed
            | Self::Io { .. }
            | Self::Configuration(_) => Recovery::Fatal,
        }
    }

    /// Returns true if the record can be skipped and the stream continued
    pub fn is_skippable(&self) -> bool {
        self.recovery() == Recovery::Skip
    }

    /// Returns true if the caller must restart from a fresh snapshot
    pub fn requires_snapshot(&self) -> bool {
        self.recovery() == Recovery::RequestSnapshot
    }
}

/// Result type alias for reconstruction operations
pub type DepthResult<T> = Result<T, DepthError>;
