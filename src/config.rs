//! Process-wide settings bound from the environment and an optional `.env` file.
//! All string values are trimmed before binding.

use anyhow::Result;

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key)
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|_| default.to_string())
}

fn env_opt_str(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_csv(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_provider_priority: Vec<String>,
    pub tushare_token: Option<String>,

    pub audit_db_path: String,
    pub snapshot_db_path: String,
    pub license_db_path: String,
    pub event_db_path: String,
    pub replay_db_path: String,
    pub alert_db_path: String,
    pub job_db_path: String,
    pub strategy_gov_db_path: String,
    pub autotune_db_path: String,
    pub holdings_db_path: String,
    pub market_cache_db_path: String,

    pub enforce_data_license: bool,

    pub auth_enabled: bool,
    pub auth_header_name: String,
    /// key -> role, parsed from "key1:role1,key2:role2"
    pub auth_api_keys: Vec<(String, String)>,

    pub ops_scheduler_enabled: bool,
    pub ops_scheduler_tick_seconds: u64,
    pub ops_scheduler_timezone: String,
    pub ops_scheduler_sla_grace_minutes: i64,
    pub ops_scheduler_sla_log_cooldown_seconds: i64,

    pub alert_email_enabled: bool,
    pub alert_smtp_host: String,
    pub alert_smtp_port: u16,
    pub alert_smtp_use_ssl: bool,
    pub alert_smtp_use_tls: bool,
    pub alert_smtp_username: Option<String>,
    pub alert_smtp_password: Option<String>,
    pub alert_email_from: String,
    pub alert_im_enabled: bool,
    pub alert_im_default_webhook: Option<String>,
    pub alert_notify_timeout_seconds: i64,
    pub alert_default_runbook_base_url: String,

    pub risk_max_single_position: f64,
    pub risk_max_drawdown: f64,
    pub risk_max_industry_exposure: f64,
    pub risk_max_theme_exposure: f64,
    pub risk_min_turnover_20d: f64,
    pub risk_max_daily_loss: f64,
    pub risk_max_consecutive_losses: u32,
    pub risk_max_var: f64,
    pub risk_max_es: f64,
    pub risk_var_confidence: f64,
    pub risk_fundamental_buy_warning_score: f64,
    pub risk_fundamental_buy_critical_score: f64,
    pub risk_fundamental_require_data_for_buy: bool,
    pub risk_tushare_disclosure_warning_score: f64,
    pub risk_tushare_disclosure_critical_score: f64,
    pub risk_tushare_forecast_warning_pct: f64,
    pub risk_tushare_forecast_critical_pct: f64,
    pub risk_small_cap_pledge_critical_ratio: f64,
    pub risk_small_cap_unlock_warning_ratio: f64,
    pub risk_small_cap_unlock_critical_ratio: f64,
    pub risk_small_cap_overhang_warning_score: f64,

    pub small_capital_cash_buffer_ratio: f64,
    pub small_capital_min_edge_bps: f64,
    pub small_capital_mode_enabled: bool,
    pub small_capital_principal_cny: f64,
    pub small_capital_lot_size: i64,

    pub default_commission_rate: f64,
    pub fee_min_commission_cny: f64,
    pub fee_transfer_rate: f64,
    pub fee_stamp_duty_sell_rate: f64,
    pub default_slippage_rate: f64,

    pub enforce_approved_strategy: bool,
    pub enable_fundamental_enrichment: bool,
    pub fundamental_max_staleness_days: i64,
    pub event_lookback_days: i64,
    pub event_decay_half_life_days: f64,
    pub pipeline_audit_limit: i64,

    pub http_port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            data_provider_priority: env_csv("DATA_PROVIDER_PRIORITY"),
            tushare_token: env_opt_str("TUSHARE_TOKEN"),

            audit_db_path: env_str("AUDIT_DB_PATH", "./data/audit.db"),
            snapshot_db_path: env_str("SNAPSHOT_DB_PATH", "./data/snapshot.db"),
            license_db_path: env_str("LICENSE_DB_PATH", "./data/license.db"),
            event_db_path: env_str("EVENT_DB_PATH", "./data/event.db"),
            replay_db_path: env_str("REPLAY_DB_PATH", "./data/replay.db"),
            alert_db_path: env_str("ALERT_DB_PATH", "./data/alert.db"),
            job_db_path: env_str("JOB_DB_PATH", "./data/job.db"),
            strategy_gov_db_path: env_str("STRATEGY_GOV_DB_PATH", "./data/strategy_gov.db"),
            autotune_db_path: env_str("AUTOTUNE_DB_PATH", "./data/autotune.db"),
            holdings_db_path: env_str("HOLDINGS_DB_PATH", "./data/holdings.db"),
            market_cache_db_path: env_str("MARKET_CACHE_DB_PATH", "./data/market_cache.db"),

            enforce_data_license: env_bool("ENFORCE_DATA_LICENSE", false),

            auth_enabled: env_bool("AUTH_ENABLED", false),
            auth_header_name: env_str("AUTH_HEADER_NAME", "x-api-key"),
            auth_api_keys: env_csv("AUTH_API_KEYS")
                .into_iter()
                .filter_map(|pair| {
                    let (k, r) = pair.split_once(':')?;
                    Some((k.trim().to_string(), r.trim().to_string()))
                })
                .collect(),

            ops_scheduler_enabled: env_bool("OPS_SCHEDULER_ENABLED", false),
            ops_scheduler_tick_seconds: env_parse("OPS_SCHEDULER_TICK_SECONDS", 30),
            ops_scheduler_timezone: env_str("OPS_SCHEDULER_TIMEZONE", "UTC"),
            ops_scheduler_sla_grace_minutes: env_parse("OPS_SCHEDULER_SLA_GRACE_MINUTES", 15),
            ops_scheduler_sla_log_cooldown_seconds: env_parse(
                "OPS_SCHEDULER_SLA_LOG_COOLDOWN_SECONDS",
                600,
            ),

            alert_email_enabled: env_bool("ALERT_EMAIL_ENABLED", false),
            alert_smtp_host: env_str("ALERT_SMTP_HOST", ""),
            alert_smtp_port: env_parse("ALERT_SMTP_PORT", 587),
            alert_smtp_use_ssl: env_bool("ALERT_SMTP_USE_SSL", false),
            alert_smtp_use_tls: env_bool("ALERT_SMTP_USE_TLS", true),
            alert_smtp_username: env_opt_str("ALERT_SMTP_USERNAME"),
            alert_smtp_password: env_opt_str("ALERT_SMTP_PASSWORD"),
            alert_email_from: env_str("ALERT_EMAIL_FROM", ""),
            alert_im_enabled: env_bool("ALERT_IM_ENABLED", false),
            alert_im_default_webhook: env_opt_str("ALERT_IM_DEFAULT_WEBHOOK"),
            alert_notify_timeout_seconds: env_parse("ALERT_NOTIFY_TIMEOUT_SECONDS", 10),
            alert_default_runbook_base_url: env_str("ALERT_DEFAULT_RUNBOOK_BASE_URL", ""),

            risk_max_single_position: env_parse("RISK_MAX_SINGLE_POSITION", 0.20),
            risk_max_drawdown: env_parse("RISK_MAX_DRAWDOWN", 0.15),
            risk_max_industry_exposure: env_parse("RISK_MAX_INDUSTRY_EXPOSURE", 0.35),
            risk_max_theme_exposure: env_parse("RISK_MAX_THEME_EXPOSURE", 0.45),
            risk_min_turnover_20d: env_parse("RISK_MIN_TURNOVER_20D", 3_000_000.0),
            risk_max_daily_loss: env_parse("RISK_MAX_DAILY_LOSS", 0.05),
            risk_max_consecutive_losses: env_parse("RISK_MAX_CONSECUTIVE_LOSSES", 4),
            risk_max_var: env_parse("RISK_MAX_VAR", 0.08),
            risk_max_es: env_parse("RISK_MAX_ES", 0.12),
            risk_var_confidence: env_parse("RISK_VAR_CONFIDENCE", 0.95),
            risk_fundamental_buy_warning_score: env_parse("RISK_FUNDAMENTAL_BUY_WARNING_SCORE", 0.50),
            risk_fundamental_buy_critical_score: env_parse(
                "RISK_FUNDAMENTAL_BUY_CRITICAL_SCORE",
                0.35,
            ),
            risk_fundamental_require_data_for_buy: env_bool(
                "RISK_FUNDAMENTAL_REQUIRE_DATA_FOR_BUY",
                false,
            ),
            risk_tushare_disclosure_warning_score: env_parse(
                "RISK_TUSHARE_DISCLOSURE_WARNING_SCORE",
                0.75,
            ),
            risk_tushare_disclosure_critical_score: env_parse(
                "RISK_TUSHARE_DISCLOSURE_CRITICAL_SCORE",
                0.90,
            ),
            risk_tushare_forecast_warning_pct: env_parse("RISK_TUSHARE_FORECAST_WARNING_PCT", -35.0),
            risk_tushare_forecast_critical_pct: env_parse(
                "RISK_TUSHARE_FORECAST_CRITICAL_PCT",
                -60.0,
            ),
            risk_small_cap_pledge_critical_ratio: env_parse(
                "RISK_SMALL_CAP_PLEDGE_CRITICAL_RATIO",
                50.0,
            ),
            risk_small_cap_unlock_warning_ratio: env_parse(
                "RISK_SMALL_CAP_UNLOCK_WARNING_RATIO",
                0.20,
            ),
            risk_small_cap_unlock_critical_ratio: env_parse(
                "RISK_SMALL_CAP_UNLOCK_CRITICAL_RATIO",
                0.45,
            ),
            risk_small_cap_overhang_warning_score: env_parse(
                "RISK_SMALL_CAP_OVERHANG_WARNING_SCORE",
                0.75,
            ),

            small_capital_cash_buffer_ratio: env_parse("SMALL_CAPITAL_CASH_BUFFER_RATIO", 0.05),
            small_capital_min_edge_bps: env_parse("SMALL_CAPITAL_MIN_EDGE_BPS", 20.0),
            small_capital_mode_enabled: env_bool("SMALL_CAPITAL_MODE_ENABLED", false),
            small_capital_principal_cny: env_parse("SMALL_CAPITAL_PRINCIPAL_CNY", 50_000.0),
            small_capital_lot_size: env_parse("SMALL_CAPITAL_LOT_SIZE", 100),

            default_commission_rate: env_parse("DEFAULT_COMMISSION_RATE", 0.00025),
            fee_min_commission_cny: env_parse("FEE_MIN_COMMISSION_CNY", 5.0),
            fee_transfer_rate: env_parse("FEE_TRANSFER_RATE", 0.00002),
            fee_stamp_duty_sell_rate: env_parse("FEE_STAMP_DUTY_SELL_RATE", 0.0005),
            default_slippage_rate: env_parse("DEFAULT_SLIPPAGE_RATE", 0.0010),

            enforce_approved_strategy: env_bool("ENFORCE_APPROVED_STRATEGY", false),
            enable_fundamental_enrichment: env_bool("ENABLE_FUNDAMENTAL_ENRICHMENT", true),
            fundamental_max_staleness_days: env_parse("FUNDAMENTAL_MAX_STALENESS_DAYS", 200),
            event_lookback_days: env_parse("EVENT_LOOKBACK_DAYS", 30),
            event_decay_half_life_days: env_parse("EVENT_DECAY_HALF_LIFE_DAYS", 5.0),
            pipeline_audit_limit: env_parse("PIPELINE_AUDIT_LIMIT", 200),

            http_port: env_parse("HTTP_PORT", 8080),
        })
    }
}
