//! HTTP surface over hyper.
//!
//! Routing is a plain match on method and path; every handler returns a
//! JSON response and parse failures become 400s, never panics.

use feed_service::{CandleFeed, FeedMetrics};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use indicators::IndicatorEngine;
use risk_engine::store::RULE_CONFIG_SCHEMA;
use risk_engine::{
    DrawdownLimits, InMemoryGateMetrics, RiskGate, RiskGateError, RuleConfigStore, TradeRecord,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use types::{Candle, RuleConfig, Timeframe};

/// Shared handles for every route.
pub struct AppState {
    /// Indicator engine backing the query API
    pub engine: Arc<IndicatorEngine>,
    /// Rule configuration store
    pub store: Arc<RuleConfigStore>,
    /// Risk gate
    pub gate: Arc<RiskGate>,
    /// Gate metrics recorder rendered at `/metrics`
    pub gate_metrics: Arc<InMemoryGateMetrics>,
    /// Feed metrics rendered at `/metrics`
    pub feed_metrics: Arc<FeedMetrics>,
    /// The feed, for connection-state reporting
    pub feed: Option<Arc<CandleFeed>>,
}

/// Serve the API until the process exits.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle_request(req, state).await) }
            }))
        }
    });

    tracing::info!(%addr, "gateway listening");
    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}

/// Route one request. Public for in-process tests.
pub async fn handle_request(req: Request<Body>, state: Arc<AppState>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::POST, "/rules/publish") => rules_publish(req, &state).await,
        (&Method::POST, "/rules/validate") => rules_validate(req, &state).await,
        (&Method::GET, "/rules/active") => {
            let active = state.store.active();
            json_response(StatusCode::OK, json!({ "ok": true, "config": &*active }))
        }
        (&Method::GET, "/rules/history") => rules_history(&req, &state),
        (&Method::GET, "/rules/schema") => {
            json_response(StatusCode::OK, RULE_CONFIG_SCHEMA.clone())
        }
        (&Method::GET, "/api/v1/indicators/candles") => indicators_candles(&req, &state),
        (&Method::GET, "/api/v1/indicators/latest") => indicators_latest(&req, &state),
        (&Method::POST, "/api/v1/indicators/candles") => indicators_inject(req, &state).await,
        (&Method::POST, "/api/v1/indicators/clear") => indicators_clear(req, &state).await,
        (&Method::POST, "/risk/killswitch") => risk_killswitch(req, &state).await,
        (&Method::GET, "/risk/status") => risk_status(&state),
        (&Method::POST, "/risk/drawdown-limit") => risk_set_drawdown_limit(req, &state).await,
        (&Method::GET, "/risk/drawdown-limit") => risk_get_drawdown_limit(&state),
        (&Method::POST, "/trades/record") => trades_record(req, &state).await,
        (&Method::GET, "/healthz") => healthz(&state),
        (&Method::GET, "/metrics") => metrics(&state),
        _ => json_response(
            StatusCode::NOT_FOUND,
            json!({ "ok": false, "error": "not found" }),
        ),
    }
}

async fn rules_publish(req: Request<Body>, state: &AppState) -> Response<Body> {
    let cfg: RuleConfig = match read_json(req).await {
        Ok(cfg) => cfg,
        Err(response) => return response,
    };
    match state.store.publish(cfg) {
        Ok(receipt) => json_response(
            StatusCode::OK,
            json!({ "ok": true, "appliedAt": receipt.applied_at, "warnings": receipt.warnings }),
        ),
        Err(errors) => json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "errors": errors }),
        ),
    }
}

async fn rules_validate(req: Request<Body>, state: &AppState) -> Response<Body> {
    let cfg: RuleConfig = match read_json(req).await {
        Ok(cfg) => cfg,
        Err(response) => return response,
    };
    let outcome = state.store.validate(&cfg);
    if outcome.is_ok() {
        json_response(
            StatusCode::OK,
            json!({ "ok": true, "warnings": outcome.warnings }),
        )
    } else {
        json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "errors": outcome.errors }),
        )
    }
}

fn rules_history(req: &Request<Body>, state: &AppState) -> Response<Body> {
    let query = parse_query(req);
    let limit = query.get("limit").and_then(|v| v.parse::<usize>().ok());
    let history = state.store.history(limit);
    let entries: Vec<&RuleConfig> = history.iter().map(Arc::as_ref).collect();
    json_response(
        StatusCode::OK,
        json!({ "ok": true, "count": entries.len(), "history": entries }),
    )
}

fn indicators_candles(req: &Request<Body>, state: &AppState) -> Response<Body> {
    let query = parse_query(req);
    let (symbol, timeframe) = match required_key(&query) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    let limit = query.get("limit").and_then(|v| v.parse::<usize>().ok());
    let candles = state.engine.get_candles(&symbol, timeframe, limit);
    json_response(
        StatusCode::OK,
        json!({ "ok": true, "count": candles.len(), "candles": candles }),
    )
}

fn indicators_latest(req: &Request<Body>, state: &AppState) -> Response<Body> {
    let query = parse_query(req);
    let (symbol, timeframe) = match required_key(&query) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    match state.engine.latest(&symbol, timeframe) {
        Some(snapshot) => json_response(
            StatusCode::OK,
            json!({ "ok": true, "indicators": snapshot }),
        ),
        None => json_response(
            StatusCode::NOT_FOUND,
            json!({ "ok": false, "error": "no data for symbol/timeframe" }),
        ),
    }
}

#[derive(Deserialize)]
struct InjectCandleBody {
    symbol: String,
    timeframe: Timeframe,
    candle: Candle,
}

async fn indicators_inject(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body: InjectCandleBody = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let snapshot = state
        .engine
        .add_candle(&body.symbol, body.timeframe, body.candle);
    json_response(
        StatusCode::OK,
        json!({ "ok": true, "indicators": snapshot }),
    )
}

#[derive(Deserialize)]
struct ClearBuffersBody {
    symbol: Option<String>,
    timeframe: Option<Timeframe>,
}

async fn indicators_clear(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body: ClearBuffersBody = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    match (body.symbol, body.timeframe) {
        (Some(symbol), Some(timeframe)) => {
            state.engine.clear_buffer(&symbol, timeframe);
            json_response(StatusCode::OK, json!({ "ok": true, "cleared": "one" }))
        }
        (None, None) => {
            state.engine.clear_all_buffers();
            json_response(StatusCode::OK, json!({ "ok": true, "cleared": "all" }))
        }
        _ => json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "provide both symbol and timeframe, or neither" }),
        ),
    }
}

#[derive(Deserialize)]
struct KillSwitchBody {
    active: bool,
}

async fn risk_killswitch(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body: KillSwitchBody = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    state.gate.set_manual_kill_switch(body.active);
    json_response(StatusCode::OK, json!({ "ok": true, "active": body.active }))
}

fn risk_status(state: &AppState) -> Response<Body> {
    let status = state.gate.drawdown_status();
    json_response(
        StatusCode::OK,
        json!({
            "ok": true,
            "manualKillSwitch": state.gate.manual_kill_switch(),
            "drawdown": status,
            "recentTransitions": state.gate.recent_transitions(50),
        }),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrawdownLimitBody {
    usd: Option<f64>,
    pct: Option<f64>,
    base: Option<f64>,
    per_symbol_usd: Option<f64>,
}

async fn risk_set_drawdown_limit(req: Request<Body>, state: &AppState) -> Response<Body> {
    let body: DrawdownLimitBody = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let current = state.gate.drawdown_limits();
    let global_usd = match (body.usd, body.pct) {
        (Some(usd), _) if usd > 0.0 => Some(usd),
        (_, Some(pct)) if pct > 0.0 => match body.base {
            Some(base) if base > 0.0 => {
                let fraction = if pct >= 1.0 { pct / 100.0 } else { pct };
                Some(base * fraction)
            }
            _ => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    json!({ "ok": false, "error": "pct requires a positive base" }),
                )
            }
        },
        _ => current.global_usd,
    };

    let limits = DrawdownLimits {
        global_usd,
        per_symbol_usd: body.per_symbol_usd.filter(|v| *v > 0.0).or(current.per_symbol_usd),
    };
    state.gate.set_drawdown_limits(limits);
    json_response(StatusCode::OK, json!({ "ok": true, "limits": limits }))
}

fn risk_get_drawdown_limit(state: &AppState) -> Response<Body> {
    json_response(
        StatusCode::OK,
        json!({
            "ok": true,
            "limits": state.gate.drawdown_limits(),
            "status": state.gate.drawdown_status(),
        }),
    )
}

async fn trades_record(req: Request<Body>, state: &AppState) -> Response<Body> {
    let trade: TradeRecord = match read_json(req).await {
        Ok(trade) => trade,
        Err(response) => return response,
    };
    match state.gate.record_trade(&trade) {
        Ok(()) => json_response(StatusCode::OK, json!({ "ok": true })),
        Err(RiskGateError::InvalidCloseTime(value)) => json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": format!("invalid closedAt: {value}") }),
        ),
    }
}

fn healthz(state: &AppState) -> Response<Body> {
    let streams: Vec<Value> = state
        .feed
        .as_ref()
        .map(|feed| {
            feed.connection_states()
                .into_iter()
                .map(|(key, st)| json!({ "key": key.to_string(), "state": format!("{st:?}") }))
                .collect()
        })
        .unwrap_or_default();
    json_response(StatusCode::OK, json!({ "status": "ok", "streams": streams }))
}

fn metrics(state: &AppState) -> Response<Body> {
    let mut text = state.gate_metrics.render_prometheus();
    text.push_str(&state.feed_metrics.render_prometheus());
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4")
        .body(Body::from(text))
        .unwrap_or_default()
}

fn required_key(
    query: &HashMap<String, String>,
) -> Result<(String, Timeframe), Response<Body>> {
    let Some(symbol) = query.get("symbol").filter(|s| !s.is_empty()) else {
        return Err(json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "missing symbol parameter" }),
        ));
    };
    let timeframe = query
        .get("timeframe")
        .and_then(|v| v.parse::<Timeframe>().ok());
    let Some(timeframe) = timeframe else {
        return Err(json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "missing or invalid timeframe parameter" }),
        ));
    };
    Ok((symbol.clone(), timeframe))
}

fn parse_query(req: &Request<Body>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<Body>,
) -> Result<T, Response<Body>> {
    let bytes = hyper::body::to_bytes(req.into_body()).await.map_err(|e| {
        json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "errors": [format!("failed to read body: {e}")] }),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        json_response(
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "errors": [format!("invalid body: {e}")] }),
        )
    })
}

fn json_response(status: StatusCode, value: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .unwrap_or_default()
}
