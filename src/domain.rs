//! Shared domain types referenced by more than one component. Field names follow
//! the documented entity catalogue rather than the original Python source where
//! the two diverge.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type JsonMap = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalLevel {
    Info,
    Warning,
    Critical,
}

impl SignalLevel {
    pub fn rank(self) -> u8 {
        match self {
            SignalLevel::Info => 1,
            SignalLevel::Warning => 2,
            SignalLevel::Critical => 3,
        }
    }
}

/// OHLCVA daily bar. Key is {provider, symbol, trade_date}, mutated only by cache ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub is_suspended: bool,
    pub is_st: bool,
    /// Present only when the upstream frame carries it; the PIT announce_date check
    /// is conditional on this — do not invent the column when it is absent.
    pub announce_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCalendarDay {
    pub trade_date: NaiveDate,
    pub is_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityStatus {
    pub is_st: bool,
    pub is_suspended: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub publish_date: Option<NaiveDate>,
    pub report_date: Option<NaiveDate>,
    pub roe: Option<f64>,
    pub revenue_yoy: Option<f64>,
    pub net_profit_yoy: Option<f64>,
    pub gross_margin: Option<f64>,
    pub debt_to_asset: Option<f64>,
    pub ocf_to_profit: Option<f64>,
    pub eps: Option<f64>,
}

impl FundamentalSnapshot {
    pub fn all_metrics_null(&self) -> bool {
        self.roe.is_none()
            && self.revenue_yoy.is_none()
            && self.net_profit_yoy.is_none()
            && self.gross_margin.is_none()
            && self.debt_to_asset.is_none()
            && self.ocf_to_profit.is_none()
            && self.eps.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventPolarity {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub source_name: String,
    pub event_id: String,
    pub symbol: String,
    pub event_type: String,
    pub publish_time: DateTime<Utc>,
    pub effective_time: Option<DateTime<Utc>>,
    pub polarity: EventPolarity,
    pub score: f64,
    pub confidence: f64,
    pub title: String,
    pub summary: String,
    pub raw_ref: Option<String>,
    pub tags: Vec<String>,
    pub metadata: JsonMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleHit {
    pub rule_name: String,
    pub passed: bool,
    pub level: SignalLevel,
    pub message: String,
}

impl RuleHit {
    pub fn ok(rule_name: &str, message: impl Into<String>) -> Self {
        RuleHit {
            rule_name: rule_name.to_string(),
            passed: true,
            level: SignalLevel::Info,
            message: message.into(),
        }
    }

    pub fn fail(rule_name: &str, level: SignalLevel, message: impl Into<String>) -> Self {
        RuleHit {
            rule_name: rule_name.to_string(),
            passed: false,
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub current_drawdown: f64,
    pub industry_exposure: HashMap<String, f64>,
    pub theme_exposure: HashMap<String, f64>,
}

/// Candidate signal under risk evaluation, plus whatever side information the rule
/// pipeline needs. Mirrors the fields the original `RiskCheckRequest` consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub symbol: String,
    pub action: SignalAction,
    pub suggested_position: Option<f64>,
    pub metadata: JsonMap,
}

/// A strategy's raw output before risk evaluation or cost/edge enrichment. Richer
/// than `SignalCandidate`, which only carries what `RiskRule::evaluate` needs;
/// `GeneratedSignal` additionally carries the identity and rationale fields needed
/// to build `SignalRecord`/`TradePrepSheet` and the small-capital override reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSignal {
    pub symbol: String,
    pub strategy_name: String,
    pub trade_date: NaiveDate,
    pub action: SignalAction,
    pub confidence: f64,
    pub reason: String,
    pub suggested_position: Option<f64>,
    pub metadata: JsonMap,
}

impl GeneratedSignal {
    pub fn to_risk_candidate(&self) -> SignalCandidate {
        SignalCandidate {
            symbol: self.symbol.clone(),
            action: self.action,
            suggested_position: self.suggested_position,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub available_quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskCheckRequest {
    pub signal: Option<SignalCandidate>,
    pub position: Option<PositionInfo>,
    pub is_st: bool,
    pub is_suspended: bool,
    pub at_limit_up: bool,
    pub at_limit_down: bool,
    pub avg_turnover_20d: Option<f64>,
    pub portfolio: Option<PortfolioSnapshot>,
    pub symbol_industry: Option<String>,

    pub fundamental_pit_ok: Option<bool>,
    pub fundamental_score: Option<f64>,
    pub fundamental_stale_days: Option<i64>,

    pub enable_small_capital_mode: bool,
    pub available_cash: Option<f64>,
    pub small_capital_principal: Option<f64>,
    pub required_cash_for_min_lot: Option<f64>,
    pub small_capital_cash_buffer_ratio: f64,
    pub expected_edge_bps: Option<f64>,
    pub estimated_roundtrip_cost_bps: Option<f64>,
    pub min_expected_edge_bps: Option<f64>,

    pub tushare_disclosure_risk_score: Option<f64>,
    pub tushare_forecast_pct: Option<f64>,
    pub tushare_pledge_ratio: Option<f64>,
    pub tushare_unlock_ratio: Option<f64>,
    pub tushare_overhang_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskCheckResult {
    pub blocked: bool,
    pub level: SignalLevel,
    pub hits: Vec<RuleHit>,
    pub summary: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskRequest {
    pub portfolio: PortfolioSnapshot,
    pub daily_returns: Vec<f64>,
    pub recent_trade_pnls: Vec<f64>,
    pub pending_signal: Option<SignalCandidate>,
    pub var_confidence: f64,
    pub max_drawdown: f64,
    pub max_industry_exposure: f64,
    pub max_theme_exposure: f64,
    pub max_daily_loss: f64,
    pub max_consecutive_losses: u32,
    pub max_var: f64,
    pub max_es: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioRiskResult {
    pub blocked: bool,
    pub level: SignalLevel,
    pub summary: String,
    pub hits: Vec<RuleHit>,
    pub var_value: Option<f64>,
    pub es_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyStatus {
    Draft,
    InReview,
    Approved,
    Rejected,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GovernanceDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutotuneScope {
    Global,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationChannel {
    Inbox,
    Email,
    Im,
    Dingtalk,
    Wecom,
    Pagerduty,
    Oncall,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Inbox => "inbox",
            NotificationChannel::Email => "email",
            NotificationChannel::Im => "im",
            NotificationChannel::Dingtalk => "dingtalk",
            NotificationChannel::Wecom => "wecom",
            NotificationChannel::Pagerduty => "pagerduty",
            NotificationChannel::Oncall => "oncall",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_lowercase().as_str() {
            "inbox" => NotificationChannel::Inbox,
            "email" => NotificationChannel::Email,
            "im" => NotificationChannel::Im,
            "dingtalk" => NotificationChannel::Dingtalk,
            "wecom" => NotificationChannel::Wecom,
            "pagerduty" => NotificationChannel::Pagerduty,
            "oncall" => NotificationChannel::Oncall,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationStage {
    pub level_threshold: i32,
    pub channel: String,
    pub targets: Vec<String>,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobRunStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualHoldingSide {
    Buy,
    Sell,
}

impl ManualHoldingSide {
    pub fn as_signal_action(self) -> SignalAction {
        match self {
            ManualHoldingSide::Buy => SignalAction::Buy,
            ManualHoldingSide::Sell => SignalAction::Sell,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ManualHoldingSide::Buy => "buy",
            ManualHoldingSide::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(ManualHoldingSide::Buy),
            "sell" => Some(ManualHoldingSide::Sell),
            _ => None,
        }
    }
}

impl SignalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Watch => "watch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(SignalAction::Buy),
            "sell" => Some(SignalAction::Sell),
            "watch" => Some(SignalAction::Watch),
            _ => None,
        }
    }
}

/// A strategy's decision on one symbol for one trade_date. Persisted
/// by `ReplayService::record_signal` and surfaced to callers as a `TradePrepSheet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal_id: String,
    pub symbol: String,
    pub strategy_name: String,
    pub trade_date: NaiveDate,
    pub action: SignalAction,
    pub confidence: f64,
    pub reason: String,
    pub suggested_position: Option<f64>,
}

/// One fill against a previously recorded `SignalRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecordCreate {
    pub signal_id: String,
    pub symbol: String,
    pub execution_date: NaiveDate,
    pub side: ManualHoldingSide,
    pub quantity: i64,
    pub price: f64,
    pub fee: f64,
    pub note: String,
}

/// One signal/execution pairing in a replay report. `executed_action` and the
/// execution fields are `None`/zeroed when the signal was never filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReplayItem {
    pub signal_id: String,
    pub symbol: String,
    pub signal_action: SignalAction,
    pub executed_action: Option<SignalAction>,
    pub signal_confidence: f64,
    pub executed_quantity: i64,
    pub executed_price: f64,
    pub slippage_bps: f64,
    pub followed: bool,
    pub delay_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReplayReport {
    pub items: Vec<ExecutionReplayItem>,
    pub follow_rate: f64,
    pub avg_slippage_bps: f64,
    pub avg_delay_days: f64,
}

/// The trade-ready view of a signal handed to a caller: the signal itself, plus the
/// risk verdict and the cost/edge figures that justified (or blocked) it. Grounded
/// on `SignalService.to_trade_prep_sheet` in the original pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePrepSheet {
    pub signal_id: String,
    pub symbol: String,
    pub strategy_name: String,
    pub trade_date: NaiveDate,
    pub action: SignalAction,
    pub confidence: f64,
    pub reason: String,
    pub suggested_position: Option<f64>,
    pub expected_edge_bps: f64,
    pub estimated_roundtrip_cost_bps: f64,
    pub required_cash_for_min_lot: f64,
    pub blocked: bool,
    pub risk_level: SignalLevel,
    pub risk_summary: String,
    pub risk_recommendations: Vec<String>,
    pub metadata: JsonMap,
}
