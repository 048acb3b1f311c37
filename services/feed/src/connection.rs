//! Per-stream connection state machine.
//!
//! Each (symbol, timeframe) key runs one task owning its socket and its
//! reconnect timer. The task loops through
//! `Connecting → Subscribed → Disconnected → (delay) → Connecting`
//! until the shutdown signal fires; `Stopped` is terminal. At most one
//! live socket and one pending timer exist per key, by construction.

use crate::error::FeedError;
use crate::feed::{self, FeedEvent};
use crate::metrics::FeedMetrics;
use crate::protocol::{self, InboundMessage};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use indicators::IndicatorEngine;
use types::InstrumentKey;

/// Lifecycle state of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; a reconnect may be pending
    Disconnected,
    /// Dialing the venue
    Connecting,
    /// Subscribe sent, receiving data
    Subscribed,
    /// Feed stopped; terminal
    Stopped,
}

/// Everything one stream task needs.
pub(crate) struct StreamContext {
    pub key: InstrumentKey,
    pub ws_url: String,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub engine: Arc<IndicatorEngine>,
    pub events: mpsc::Sender<FeedEvent>,
    pub metrics: Arc<FeedMetrics>,
    pub states: Arc<DashMap<InstrumentKey, ConnectionState>>,
    pub shutdown: watch::Receiver<bool>,
}

impl StreamContext {
    fn set_state(&self, state: ConnectionState) {
        self.states.insert(self.key.clone(), state);
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn report(&self, error: FeedError) {
        tracing::warn!(key = %self.key, %error, "feed stream error");
        if self.events.send(FeedEvent::Error(error)).await.is_err() {
            tracing::debug!(key = %self.key, "feed event receiver dropped");
        }
    }
}

/// Run one stream until shutdown.
pub(crate) async fn run_stream(mut ctx: StreamContext) {
    while !ctx.stopping() {
        ctx.set_state(ConnectionState::Connecting);
        tracing::info!(key = %ctx.key, url = %ctx.ws_url, "connecting stream");

        match timeout(ctx.connect_timeout, connect_async(ctx.ws_url.as_str())).await {
            Ok(Ok((ws, _response))) => {
                read_until_closed(&mut ctx, ws).await;
            }
            Ok(Err(e)) => {
                ctx.metrics.record_connection_failure();
                ctx.report(FeedError::ConnectionFailed {
                    key: ctx.key.clone(),
                    reason: e.to_string(),
                })
                .await;
            }
            Err(_) => {
                ctx.metrics.record_connection_failure();
                ctx.report(FeedError::ConnectionTimeout {
                    key: ctx.key.clone(),
                    timeout_ms: ctx.connect_timeout.as_millis() as u64,
                })
                .await;
            }
        }

        // A close observed after stop must not schedule a reconnect.
        if ctx.stopping() {
            break;
        }
        ctx.set_state(ConnectionState::Disconnected);
        if ctx
            .events
            .send(FeedEvent::Disconnected {
                key: ctx.key.clone(),
            })
            .await
            .is_err()
        {
            tracing::debug!(key = %ctx.key, "feed event receiver dropped");
        }

        ctx.metrics.record_reconnect_scheduled();
        tracing::info!(
            key = %ctx.key,
            delay_ms = ctx.reconnect_delay.as_millis() as u64,
            "scheduling reconnect"
        );
        tokio::select! {
            _ = tokio::time::sleep(ctx.reconnect_delay) => {}
            _ = ctx.shutdown.changed() => break,
        }
    }
    ctx.set_state(ConnectionState::Stopped);
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Subscribe, then pump messages until the socket closes or shutdown.
async fn read_until_closed(ctx: &mut StreamContext, mut ws: WsStream) {
    let subscribe = protocol::subscribe_message(&ctx.key);
    if let Err(e) = ws.send(Message::Text(subscribe)).await {
        ctx.report(FeedError::WebSocket {
            key: ctx.key.clone(),
            reason: e.to_string(),
        })
        .await;
        return;
    }

    ctx.set_state(ConnectionState::Subscribed);
    ctx.metrics.record_connected();
    tracing::info!(key = %ctx.key, "stream subscribed");

    loop {
        tokio::select! {
            _ = ctx.shutdown.changed() => {
                let _ = ws.close(None).await;
                break;
            }
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(ctx, &text).await,
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = ws.send(Message::Pong(payload)).await {
                        tracing::warn!(key = %ctx.key, error = %e, "failed to answer ping");
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(key = %ctx.key, ?frame, "stream closed by venue");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    ctx.report(FeedError::WebSocket {
                        key: ctx.key.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                    break;
                }
                None => {
                    tracing::info!(key = %ctx.key, "stream ended");
                    break;
                }
            }
        }
    }

    ctx.metrics.record_disconnected();
}

/// Handle one text frame. Parse failures are dropped after logging;
/// they never tear down the connection.
async fn handle_text(ctx: &StreamContext, text: &str) {
    ctx.metrics.record_message();
    match protocol::parse_message(text) {
        Ok(InboundMessage::Candles(candles)) => {
            for candle in candles {
                let snapshot = feed::ingest(&ctx.engine, &ctx.metrics, &ctx.key, candle, true);
                let event = FeedEvent::Candle {
                    key: ctx.key.clone(),
                    candle,
                    snapshot,
                };
                if ctx.events.send(event).await.is_err() {
                    tracing::debug!(key = %ctx.key, "feed event receiver dropped");
                }
            }
        }
        Ok(InboundMessage::SubscriptionAck { success: true, .. }) => {
            tracing::debug!(key = %ctx.key, "subscription acknowledged");
        }
        Ok(InboundMessage::SubscriptionAck { success: false, ret_msg }) => {
            ctx.report(FeedError::SubscriptionRejected {
                key: ctx.key.clone(),
                reason: ret_msg.unwrap_or_default(),
            })
            .await;
        }
        Ok(InboundMessage::Other) => {
            tracing::trace!(key = %ctx.key, "ignoring unrelated message");
        }
        Err(error) => {
            ctx.metrics.record_parse_error();
            ctx.report(error).await;
        }
    }
}
