//! Typed records for depth snapshots, depth diffs and trades
//!
//! Every record arrives as JSON with decimal strings. Parsing goes through a
//! validating step so malformed data never reaches book arithmetic.

use crate::error::{DepthError, DepthResult, RecordKind};
use crate::level::{deserialize_decimal, serialize_decimal};
use crate::{Level, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type carried by every depth diff
pub const DEPTH_UPDATE_EVENT: &str = "depthUpdate";

/// Event type carried by trade records
pub const TRADE_EVENT: &str = "trade";

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time depth snapshot
///
/// Complete up to and including `last_update_id` (the snapshot watermark).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Watermark: last update id reflected in this snapshot
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    /// Bid levels as delivered
    pub bids: Vec<Level>,
    /// Ask levels as delivered
    pub asks: Vec<Level>,
}

impl Snapshot {
    /// Parse and validate a snapshot record
    pub fn from_json(json: &str) -> DepthResult<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| DepthError::malformed(RecordKind::Snapshot, e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Serialize back to the wire form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Levels for one side
    pub fn levels(&self, side: Side) -> &[Level] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn validate(&self) -> DepthResult<()> {
        validate_levels(RecordKind::Snapshot, &self.bids)?;
        validate_levels(RecordKind::Snapshot, &self.asks)
    }
}

// ============================================================================
// Depth diff
// ============================================================================

/// Incremental depth update covering update ids `U..=u`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffMessage {
    /// Event type, always "depthUpdate"
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time in milliseconds
    #[serde(rename = "E")]
    pub event_time: u64,
    /// Instrument symbol
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// First update id in this event (`U`)
    #[serde(rename = "U")]
    pub first_update_id: u64,
    /// Final update id in this event (`u`)
    #[serde(rename = "u")]
    pub final_update_id: u64,
    /// Bid changes; zero quantity removes the level
    #[serde(rename = "b", default)]
    pub bids: Vec<Level>,
    /// Ask changes; zero quantity removes the level
    #[serde(rename = "a", default)]
    pub asks: Vec<Level>,
}

impl DiffMessage {
    /// Create a diff with an empty symbol
    pub fn new(
        first_update_id: u64,
        final_update_id: u64,
        event_time: u64,
        bids: Vec<Level>,
        asks: Vec<Level>,
    ) -> Self {
        Self {
            event_type: DEPTH_UPDATE_EVENT.to_string(),
            event_time,
            symbol: String::new(),
            first_update_id,
            final_update_id,
            bids,
            asks,
        }
    }

    /// Parse and validate a diff record
    pub fn from_json(json: &str) -> DepthResult<Self> {
        let diff: Self = serde_json::from_str(json)
            .map_err(|e| DepthError::malformed(RecordKind::Diff, e.to_string()))?;
        diff.validate()?;
        Ok(diff)
    }

    /// Serialize back to the wire form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Changes for one side
    pub fn changes(&self, side: Side) -> &[Level] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Returns true if `update_id` falls within `U..=u`
    pub fn brackets(&self, update_id: u64) -> bool {
        self.first_update_id <= update_id && update_id <= self.final_update_id
    }

    fn validate(&self) -> DepthResult<()> {
        if self.event_type != DEPTH_UPDATE_EVENT {
            return Err(DepthError::malformed(
                RecordKind::Diff,
                format!("unexpected event type {:?}", self.event_type),
            ));
        }
        if self.first_update_id > self.final_update_id {
            return Err(DepthError::malformed(
                RecordKind::Diff,
                format!(
                    "inverted update range U={} > u={}",
                    self.first_update_id, self.final_update_id
                ),
            ));
        }
        validate_levels(RecordKind::Diff, &self.bids)?;
        validate_levels(RecordKind::Diff, &self.asks)
    }
}

// ============================================================================
// Trade
// ============================================================================

/// Executed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Event type, normally "trade"
    #[serde(rename = "e", default = "default_trade_event")]
    pub event_type: String,
    /// Event time in milliseconds
    #[serde(rename = "E")]
    pub event_time: u64,
    /// Instrument symbol
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Trade id (string or number on the wire)
    #[serde(rename = "t", default, deserialize_with = "deserialize_trade_id")]
    pub trade_id: String,
    /// Trade price
    #[serde(
        rename = "p",
        deserialize_with = "deserialize_decimal",
        serialize_with = "serialize_decimal"
    )]
    pub price: Decimal,
    /// Trade quantity
    #[serde(
        rename = "q",
        deserialize_with = "deserialize_decimal",
        serialize_with = "serialize_decimal"
    )]
    pub quantity: Decimal,
    /// Trade time in milliseconds
    #[serde(rename = "T", default)]
    pub trade_time: u64,
    /// True if the buyer was the resting (maker) order
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
    /// Buyer order id, when the feed still sends it
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub buyer_order_id: Option<u64>,
    /// Seller order id, when the feed still sends it
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub seller_order_id: Option<u64>,
}

fn default_trade_event() -> String {
    TRADE_EVENT.to_string()
}

impl TradeEvent {
    /// Create a trade with empty symbol and id
    pub fn new(event_time: u64, price: Decimal, quantity: Decimal, is_buyer_maker: bool) -> Self {
        Self {
            event_type: default_trade_event(),
            event_time,
            symbol: String::new(),
            trade_id: String::new(),
            price,
            quantity,
            trade_time: event_time,
            is_buyer_maker,
            buyer_order_id: None,
            seller_order_id: None,
        }
    }

    /// Set the trade id
    pub fn with_trade_id(mut self, trade_id: impl Into<String>) -> Self {
        self.trade_id = trade_id.into();
        self
    }

    /// Parse and validate a trade record
    pub fn from_json(json: &str) -> DepthResult<Self> {
        let trade: Self = serde_json::from_str(json)
            .map_err(|e| DepthError::malformed(RecordKind::Trade, e.to_string()))?;
        trade.validate()?;
        Ok(trade)
    }

    /// Serialize back to the wire form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn validate(&self) -> DepthResult<()> {
        if self.price.is_sign_negative() || self.quantity.is_sign_negative() {
            return Err(DepthError::malformed(
                RecordKind::Trade,
                format!("negative price or quantity ({} @ {})", self.quantity, self.price),
            ));
        }
        Ok(())
    }
}

/// Trade ids show up as either JSON strings or numbers
fn deserialize_trade_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid trade id: expected string or number, found {other}"
        ))),
    }
}

fn validate_levels(kind: RecordKind, levels: &[Level]) -> DepthResult<()> {
    for level in levels {
        if level.price.is_sign_negative() || level.qty.is_sign_negative() {
            return Err(DepthError::malformed(
                kind,
                format!("negative level [{}, {}]", level.price, level.qty),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Raw Message Parsing
// ============================================================================

/// Parsed feed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// Depth snapshot
    Snapshot(Snapshot),
    /// Depth diff
    Diff(DiffMessage),
    /// Trade
    Trade(TradeEvent),
}

impl FeedMessage {
    /// Parse a raw JSON record into one of the typed variants
    pub fn parse(json: &str) -> DepthResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| DepthError::malformed(RecordKind::Unknown, e.to_string()))?;

        if value.get("lastUpdateId").is_some() {
            return parse_value::<Snapshot>(value, RecordKind::Snapshot)
                .and_then(|s| s.validate().map(|_| Self::Snapshot(s)));
        }

        let event_type = value.get("e").and_then(|v| v.as_str());
        match event_type {
            Some(DEPTH_UPDATE_EVENT) => parse_value::<DiffMessage>(value, RecordKind::Diff)
                .and_then(|d| d.validate().map(|_| Self::Diff(d))),
            Some(TRADE_EVENT) | Some("aggTrade") => {
                parse_value::<TradeEvent>(value, RecordKind::Trade)
                    .and_then(|t| t.validate().map(|_| Self::Trade(t)))
            }
            None if value.get("p").is_some() && value.get("m").is_some() => {
                parse_value::<TradeEvent>(value, RecordKind::Trade)
                    .and_then(|t| t.validate().map(|_| Self::Trade(t)))
            }
            Some(other) => Err(DepthError::malformed(
                RecordKind::Unknown,
                format!("unsupported event type {other:?}"),
            )),
            None => Err(DepthError::malformed(
                RecordKind::Unknown,
                "record is not a snapshot, diff or trade",
            )),
        }
    }

    /// Kind of record this is
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Snapshot(_) => RecordKind::Snapshot,
            Self::Diff(_) => RecordKind::Diff,
            Self::Trade(_) => RecordKind::Trade,
        }
    }
}

fn parse_value<T: serde::de::DeserializeOwned>(value: Value, kind: RecordKind) -> DepthResult<T> {
    serde_json::from_value(value).map_err(|e| DepthError::malformed(kind, e.to_string()))
}
