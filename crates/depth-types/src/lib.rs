//! Shared types for depth snapshot / diff stream reconstruction
//!
//! This crate provides the typed records consumed by the reconstruction engine.
//! It has minimal dependencies and no I/O.
//!
//! # Key Types
//!
//! - [`Level`] - Price level with exact decimal precision
//! - [`Side`] - Bid or ask side of the book
//! - [`Snapshot`], [`DiffMessage`], [`TradeEvent`] - Validated wire records
//! - [`FeedMessage`] - Closed set of parsed record variants
//! - [`DepthError`] - Error taxonomy with recovery hints

pub mod enums;
pub mod error;
pub mod level;
pub mod messages;

// Re-export commonly used types
pub use enums::*;
pub use error::*;
pub use level::*;
pub use messages::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
