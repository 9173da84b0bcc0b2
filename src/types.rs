use crate::error::{EnclaveError, Result};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

// --- Channels ---

pub const CHANNEL_PRICES: &str = "prices";
pub const CHANNEL_DEPOSITS: &str = "deposits";
pub const CHANNEL_FILLS_PERPS: &str = "fillsPerps";
pub const CHANNEL_POSITIONS_PERPS: &str = "positionsPerps";
pub const CHANNEL_MARK_PRICES_PERPS: &str = "markPricesPerps";
pub const CHANNEL_TOP_OF_BOOKS_PERPS: &str = "topOfBooksPerps";

// --- Outbound Frames ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginArgs {
    pub key: String,
    pub time: String, // Unix ms, as a string
    pub sign: String,
}

/// Client-to-server frames, tagged by `op`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum OutboundFrame {
    Login { args: LoginArgs },
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

impl OutboundFrame {
    pub fn subscribe(channel: &str) -> Self {
        OutboundFrame::Subscribe {
            channel: channel.to_string(),
        }
    }

    pub fn unsubscribe(channel: &str) -> Self {
        OutboundFrame::Unsubscribe {
            channel: channel.to_string(),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// --- Inbound Frames ---

/// Classification of a parsed server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    LoggedIn,
    Update { channel: String },
    Other(Option<String>), // Carries the `type` field, if any
}

impl InboundFrame {
    pub fn classify(message: &Value) -> Self {
        let kind = message.get("type").and_then(Value::as_str);
        match kind {
            Some("loggedIn") => InboundFrame::LoggedIn,
            Some("update") => match message.get("channel").and_then(Value::as_str) {
                Some(channel) => InboundFrame::Update {
                    channel: channel.to_string(),
                },
                None => InboundFrame::Other(Some("update".to_string())),
            },
            other => InboundFrame::Other(other.map(str::to_string)),
        }
    }
}

/// Parses one text frame. Numbers keep their full literal precision.
pub fn parse_frame(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Reads the decimal at a JSON pointer (e.g. `/data/price`).
///
/// Accepts decimal strings and raw JSON numbers; neither path goes through `f64`.
pub fn decimal_at(message: &Value, pointer: &str) -> Result<Decimal> {
    let invalid = |value: String| EnclaveError::InvalidDecimal {
        field: pointer.to_string(),
        value,
    };
    let literal = match message.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => return Err(invalid(other.to_string())),
        None => return Err(invalid("<missing>".to_string())),
    };
    parse_decimal(&literal).ok_or_else(|| invalid(literal.clone()))
}

fn parse_decimal(literal: &str) -> Option<Decimal> {
    if literal.contains(['e', 'E']) {
        Decimal::from_scientific(literal).ok()
    } else {
        Decimal::from_str_exact(literal)
            .or_else(|_| Decimal::from_str(literal))
            .ok()
    }
}

// --- Update Payloads ---

/// An `update` frame with its `data` decoded into `T`.
#[derive(Deserialize, Debug, Clone)]
pub struct Update<T> {
    pub channel: String,
    pub data: T,
}

impl<T: DeserializeOwned> Update<T> {
    pub fn from_message(message: &Value) -> Result<Self> {
        Ok(serde_json::from_value(message.clone())?)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub pair: Pair,
    pub price: Decimal,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkPrice {
    pub market: String,
    pub mark_price: Decimal,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "(Decimal, Decimal)")]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl From<(Decimal, Decimal)> for BookLevel {
    fn from((price, size): (Decimal, Decimal)) -> Self {
        Self { price, size }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopOfBook {
    pub market: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub time: Option<String>,
}

impl TopOfBook {
    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.first().copied()
    }
}
