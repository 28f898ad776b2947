// src/connectors/messages.rs
use crate::types::{Alert, PriceTick, StreamEvent};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const PRICES_TOPIC: &str = "/topic/prices";
pub const ALERTS_TOPIC: &str = "/topic/alerts";

/// First frame sent on every fresh connection.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    action: &'static str,
    topics: Vec<String>,
}

impl SubscribeRequest {
    pub fn new(topics: &[String]) -> Self {
        Self {
            action: "subscribe",
            topics: topics.to_vec(),
        }
    }
}

/// Envelope around every inbound frame: which topic, and its payload.
#[derive(Debug, Deserialize)]
struct TopicFrame {
    topic: String,
    body: Value,
}

// Gateway timestamps come without a zone offset; they are UTC by
// convention, so we parse naive and attach Utc ourselves.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceFrame {
    symbol_code: String,
    price: Decimal,
    #[serde(default)]
    volume: Option<i64>,
    timestamp: NaiveDateTime,
}

impl From<PriceFrame> for PriceTick {
    fn from(frame: PriceFrame) -> Self {
        PriceTick {
            symbol_code: frame.symbol_code,
            price: frame.price,
            volume: frame.volume,
            observed_at: frame.timestamp.and_utc(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertFrame {
    #[serde(default)]
    id: Option<i64>,
    symbol_code: String,
    alert_type: String,
    #[serde(default)]
    threshold: Option<Decimal>,
    triggered_at: NaiveDateTime,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    acknowledged: Option<bool>,
}

impl From<AlertFrame> for Alert {
    fn from(frame: AlertFrame) -> Self {
        Alert {
            id: frame.id,
            symbol_code: frame.symbol_code,
            kind: frame.alert_type,
            threshold: frame.threshold,
            detail: frame.details.unwrap_or_default(),
            triggered_at: frame.triggered_at.and_utc(),
            acknowledged: frame.acknowledged.unwrap_or(false),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

/// Decodes one text frame into a stream event, dispatching on topic.
pub fn decode_frame(raw: &str) -> Result<StreamEvent, DecodeError> {
    let frame: TopicFrame = serde_json::from_str(raw)?;
    match frame.topic.as_str() {
        PRICES_TOPIC => {
            let price: PriceFrame = serde_json::from_value(frame.body)?;
            Ok(StreamEvent::Price(price.into()))
        }
        ALERTS_TOPIC => {
            let alert: AlertFrame = serde_json::from_value(frame.body)?;
            Ok(StreamEvent::Alert(alert.into()))
        }
        other => Err(DecodeError::UnknownTopic(other.to_string())),
    }
}
