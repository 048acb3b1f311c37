//! Exchange wire formats.
//!
//! Subscription: `{"op":"subscribe","args":["kline.<timeframe>.<symbol>"]}`.
//! Inbound kline pushes carry the bucket start time as a millisecond
//! epoch and OHLCV as numeric strings. The historical REST endpoint
//! returns rows newest-first as string arrays
//! `[start, open, high, low, close, volume, turnover]`.

use crate::error::FeedError;
use serde::Deserialize;
use serde_json::{json, Value};
use types::{Candle, InstrumentKey};

/// Classified inbound WebSocket message.
#[derive(Debug)]
pub enum InboundMessage {
    /// Kline payload entries, already normalized to candles
    Candles(Vec<Candle>),
    /// Response to our subscribe request
    SubscriptionAck {
        /// Whether the venue accepted the subscription
        success: bool,
        /// Venue-provided detail, when present
        ret_msg: Option<String>,
    },
    /// Heartbeats and anything else we do not act on
    Other,
}

/// Body of the subscribe request for one stream.
pub fn subscribe_message(key: &InstrumentKey) -> String {
    json!({
        "op": "subscribe",
        "args": [format!("kline.{}.{}", key.timeframe, key.symbol)],
    })
    .to_string()
}

/// Parse one inbound text frame.
pub fn parse_message(text: &str) -> Result<InboundMessage, FeedError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FeedError::Parse(format!("invalid json: {e}")))?;

    if let Some(topic) = value.get("topic").and_then(Value::as_str) {
        if topic.starts_with("kline.") {
            let data = value
                .get("data")
                .ok_or_else(|| FeedError::Parse("kline message without data".to_string()))?;
            let entries = match data {
                Value::Array(items) => items.iter().map(parse_kline_entry).collect::<Result<_, _>>()?,
                Value::Object(_) => vec![parse_kline_entry(data)?],
                other => {
                    return Err(FeedError::Parse(format!(
                        "unexpected kline data shape: {other}"
                    )))
                }
            };
            return Ok(InboundMessage::Candles(entries));
        }
        return Ok(InboundMessage::Other);
    }

    if let Some(success) = value.get("success").and_then(Value::as_bool) {
        return Ok(InboundMessage::SubscriptionAck {
            success,
            ret_msg: value
                .get("ret_msg")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    Ok(InboundMessage::Other)
}

/// One kline push entry: start time as ms epoch, prices as strings.
fn parse_kline_entry(entry: &Value) -> Result<Candle, FeedError> {
    let timestamp = entry
        .get("start")
        .and_then(as_i64_lenient)
        .ok_or_else(|| FeedError::Parse("missing or invalid start field".to_string()))?;

    Ok(Candle {
        timestamp,
        open: string_field(entry, "open")?,
        high: string_field(entry, "high")?,
        low: string_field(entry, "low")?,
        close: string_field(entry, "close")?,
        volume: string_field(entry, "volume")?,
    })
}

fn string_field(entry: &Value, field: &str) -> Result<f64, FeedError> {
    entry
        .get(field)
        .and_then(as_f64_lenient)
        .ok_or_else(|| FeedError::Parse(format!("missing or invalid {field} field")))
}

fn as_i64_lenient(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Envelope of the historical kline REST endpoint.
#[derive(Debug, Deserialize)]
pub struct KlineResponse {
    /// Vendor return code; 0 means success
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    /// Vendor message
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    /// Payload, present on success
    #[serde(default)]
    pub result: Option<KlineResult>,
}

/// Payload of the historical kline endpoint.
#[derive(Debug, Deserialize)]
pub struct KlineResult {
    /// Rows newest-first: `[start, open, high, low, close, volume, turnover]`
    #[serde(default)]
    pub list: Vec<Vec<Value>>,
}

/// Parse one REST kline row.
pub fn parse_rest_row(row: &[Value]) -> Result<Candle, FeedError> {
    if row.len() < 6 {
        return Err(FeedError::Parse(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let timestamp = as_i64_lenient(&row[0])
        .ok_or_else(|| FeedError::Parse("invalid start time in kline row".to_string()))?;
    let mut prices = [0.0f64; 5];
    for (i, slot) in prices.iter_mut().enumerate() {
        *slot = as_f64_lenient(&row[i + 1])
            .ok_or_else(|| FeedError::Parse(format!("invalid field {} in kline row", i + 1)))?;
    }
    Ok(Candle {
        timestamp,
        open: prices[0],
        high: prices[1],
        low: prices[2],
        close: prices[3],
        volume: prices[4],
    })
}
