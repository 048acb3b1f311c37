//! Gateway configuration: TOML file with environment overrides.

use feed_service::FeedConfig;
use risk_engine::DrawdownLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use types::Timeframe;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address, `host:port`
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Use the venue's testnet endpoints unless explicit URLs are given
    pub testnet: bool,
    /// Explicit WebSocket URL override
    pub ws_url: Option<String>,
    /// Explicit REST URL override
    pub rest_url: Option<String>,
    /// Symbols to stream
    pub symbols: Vec<String>,
    /// Timeframes to stream per symbol
    pub timeframes: Vec<Timeframe>,
    /// Candles backfilled per key on start (0 disables)
    pub backfill_limit: u32,
    /// Seconds between reconnect attempts
    pub reconnect_delay_secs: u64,
    /// Connection attempt timeout in seconds
    pub connect_timeout_secs: u64,
    /// Backfill request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            testnet: true,
            ws_url: None,
            rest_url: None,
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            timeframes: vec![
                Timeframe::M1,
                Timeframe::M3,
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::H1,
            ],
            backfill_limit: 200,
            reconnect_delay_secs: 5,
            connect_timeout_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

/// Risk and audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    /// JSONL audit file for accepted rule configs
    pub rules_audit_path: String,
    /// JSONL audit file for gate transitions
    pub gate_audit_path: String,
    /// Global daily drawdown limit in USD
    pub max_daily_drawdown_usd: Option<f64>,
    /// Global daily drawdown limit as percent of base equity
    pub max_daily_drawdown_pct: Option<f64>,
    /// Base equity used with the percent limit
    pub base_equity_usd: Option<f64>,
    /// Per-symbol daily drawdown limit in USD
    pub max_symbol_drawdown_usd: Option<f64>,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            rules_audit_path: "rules.jsonl".to_string(),
            gate_audit_path: "risk_audit.jsonl".to_string(),
            max_daily_drawdown_usd: None,
            max_daily_drawdown_pct: None,
            base_equity_usd: None,
            max_symbol_drawdown_usd: None,
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server settings
    pub server: ServerSettings,
    /// Feed settings
    pub feed: FeedSettings,
    /// Risk settings
    pub risk: RiskSettings,
}

impl GatewayConfig {
    /// Load from a TOML file when present, then apply environment
    /// overrides. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("failed to read config {}: {e}", path.display())
                })?;
                toml::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("GATEWAY_BIND") {
            self.server.bind = bind;
        }
        if let Ok(url) = std::env::var("FEED_WS_URL") {
            self.feed.ws_url = Some(url);
        }
        if let Ok(url) = std::env::var("FEED_REST_URL") {
            self.feed.rest_url = Some(url);
        }
        if let Ok(symbols) = std::env::var("FEED_SYMBOLS") {
            let parsed: Vec<String> = symbols
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.feed.symbols = parsed;
            }
        }
        if let Ok(timeframes) = std::env::var("FEED_TIMEFRAMES") {
            let parsed: Vec<Timeframe> = timeframes
                .split(',')
                .map(str::trim)
                .filter_map(|s| s.parse().ok())
                .collect();
            if !parsed.is_empty() {
                self.feed.timeframes = parsed;
            }
        }
        if let Some(value) = env_f64("MAX_DAILY_DRAWDOWN_USD") {
            self.risk.max_daily_drawdown_usd = Some(value);
        }
        if let Some(value) = env_f64("MAX_DAILY_DRAWDOWN_PCT") {
            self.risk.max_daily_drawdown_pct = Some(value);
        }
        if let Some(value) = env_f64("BASE_EQUITY_USD") {
            self.risk.base_equity_usd = Some(value);
        }
        if let Some(value) = env_f64("MAX_SYMBOL_DRAWDOWN_USD") {
            self.risk.max_symbol_drawdown_usd = Some(value);
        }
    }

    /// The feed configuration derived from these settings.
    pub fn feed_config(&self) -> FeedConfig {
        let base = if self.feed.testnet {
            FeedConfig::testnet(self.feed.symbols.clone(), self.feed.timeframes.clone())
        } else {
            FeedConfig::mainnet(self.feed.symbols.clone(), self.feed.timeframes.clone())
        };
        FeedConfig {
            ws_url: self.feed.ws_url.clone().unwrap_or(base.ws_url),
            rest_url: self.feed.rest_url.clone().unwrap_or(base.rest_url),
            connect_timeout: Duration::from_secs(self.feed.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.feed.request_timeout_secs),
            reconnect_delay: Duration::from_secs(self.feed.reconnect_delay_secs),
            backfill_limit: self.feed.backfill_limit,
            ..base
        }
    }

    /// Initial drawdown limits. A USD limit wins over the percent form;
    /// a percent of 1 or more is read as a percentage (1 == 1%).
    pub fn drawdown_limits(&self) -> DrawdownLimits {
        let global_usd = match (self.risk.max_daily_drawdown_usd, self.risk.max_daily_drawdown_pct) {
            (Some(usd), _) if usd > 0.0 => Some(usd),
            (_, Some(pct)) if pct > 0.0 => self.risk.base_equity_usd.and_then(|base| {
                if base > 0.0 {
                    let fraction = if pct >= 1.0 { pct / 100.0 } else { pct };
                    Some(base * fraction)
                } else {
                    None
                }
            }),
            _ => None,
        };
        DrawdownLimits {
            global_usd,
            per_symbol_usd: self.risk.max_symbol_drawdown_usd.filter(|v| *v > 0.0),
        }
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_testnet_with_standard_streams() {
        let config = GatewayConfig::default();
        let feed = config.feed_config();
        assert!(feed.ws_url.contains("testnet"));
        assert_eq!(feed.symbols.len(), 2);
        assert_eq!(feed.timeframes.len(), 5);
        assert_eq!(config.drawdown_limits(), DrawdownLimits::default());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "0.0.0.0:8080"

[feed]
testnet = false
symbols = ["SOLUSDT"]
timeframes = ["5m", "1h"]
backfill_limit = 50

[risk]
max_daily_drawdown_usd = 250.0
"#
        )
        .unwrap();

        let config = GatewayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        let feed = config.feed_config();
        assert!(!feed.ws_url.contains("testnet"));
        assert_eq!(feed.symbols, vec!["SOLUSDT".to_string()]);
        assert_eq!(feed.timeframes, vec![Timeframe::M5, Timeframe::H1]);
        assert_eq!(feed.backfill_limit, 50);
        assert_eq!(config.drawdown_limits().global_usd, Some(250.0));
    }

    #[test]
    fn percent_limit_needs_a_base_and_reads_whole_numbers_as_percent() {
        let mut config = GatewayConfig::default();
        config.risk.max_daily_drawdown_pct = Some(2.0);
        assert_eq!(config.drawdown_limits().global_usd, None);

        config.risk.base_equity_usd = Some(1500.0);
        assert_eq!(config.drawdown_limits().global_usd, Some(30.0));

        // Fractions below 1 are already a ratio.
        config.risk.max_daily_drawdown_pct = Some(0.01);
        assert_eq!(config.drawdown_limits().global_usd, Some(15.0));
    }

    #[test]
    fn usd_limit_wins_over_percent() {
        let mut config = GatewayConfig::default();
        config.risk.max_daily_drawdown_usd = Some(100.0);
        config.risk.max_daily_drawdown_pct = Some(50.0);
        config.risk.base_equity_usd = Some(10_000.0);
        assert_eq!(config.drawdown_limits().global_usd, Some(100.0));
    }
}
