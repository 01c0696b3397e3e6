//! `RiskEngine`: a fixed per-signal rule pipeline plus a separate
//! portfolio-level evaluation. Grounded on `risk/engine.py`.

use super::rules::{
    DrawdownRule, FundamentalQualityRule, IndustryExposureRule, LimitPriceRule, LiquidityRule,
    PositionLimitRule, RiskRule, STRule, SmallCapitalTradabilityRule, SuspensionRule, TPlusOneRule,
    TushareDisclosureAndOverhangRule,
};
use crate::config::Settings;
use crate::domain::{PortfolioRiskRequest, PortfolioRiskResult, RiskCheckRequest, RiskCheckResult, RuleHit, SignalAction, SignalLevel};

pub struct RiskEngine {
    rules: Vec<Box<dyn RiskRule>>,
    settings: EngineThresholds,
}

struct EngineThresholds {
    max_drawdown: f64,
    max_industry_exposure: f64,
    max_theme_exposure: f64,
    max_daily_loss: f64,
    max_consecutive_losses: u32,
    max_var: f64,
    max_es: f64,
}

impl RiskEngine {
    pub fn from_settings(settings: &Settings) -> Self {
        let rules: Vec<Box<dyn RiskRule>> = vec![
            Box::new(TPlusOneRule),
            Box::new(STRule),
            Box::new(SuspensionRule),
            Box::new(LimitPriceRule),
            Box::new(PositionLimitRule {
                max_single_position: settings.risk_max_single_position,
            }),
            Box::new(LiquidityRule {
                min_turnover_20d: settings.risk_min_turnover_20d,
            }),
            Box::new(SmallCapitalTradabilityRule {
                cash_buffer_ratio: settings.small_capital_cash_buffer_ratio,
                min_edge_bps: settings.small_capital_min_edge_bps,
            }),
            Box::new(DrawdownRule {
                max_drawdown: settings.risk_max_drawdown,
            }),
            Box::new(IndustryExposureRule {
                max_industry_exposure: settings.risk_max_industry_exposure,
            }),
            Box::new(FundamentalQualityRule {
                warning_score: settings.risk_fundamental_buy_warning_score,
                critical_score: settings.risk_fundamental_buy_critical_score,
                require_data_for_buy: settings.risk_fundamental_require_data_for_buy,
                max_stale_days: 540,
            }),
            Box::new(TushareDisclosureAndOverhangRule {
                disclosure_warning_score: settings.risk_tushare_disclosure_warning_score,
                disclosure_critical_score: settings.risk_tushare_disclosure_critical_score,
                forecast_warning_pct: settings.risk_tushare_forecast_warning_pct,
                forecast_critical_pct: settings.risk_tushare_forecast_critical_pct,
                pledge_critical_ratio: settings.risk_small_cap_pledge_critical_ratio,
                unlock_warning_ratio: settings.risk_small_cap_unlock_warning_ratio,
                unlock_critical_ratio: settings.risk_small_cap_unlock_critical_ratio,
                overhang_warning_score: settings.risk_small_cap_overhang_warning_score,
            }),
        ];

        RiskEngine {
            rules,
            settings: EngineThresholds {
                max_drawdown: settings.risk_max_drawdown,
                max_industry_exposure: settings.risk_max_industry_exposure,
                max_theme_exposure: settings.risk_max_theme_exposure,
                max_daily_loss: settings.risk_max_daily_loss,
                max_consecutive_losses: settings.risk_max_consecutive_losses,
                max_var: settings.risk_max_var,
                max_es: settings.risk_max_es,
            },
        }
    }

    pub fn evaluate_signal(&self, req: &RiskCheckRequest) -> RiskCheckResult {
        let hits: Vec<RuleHit> = self.rules.iter().map(|rule| rule.evaluate(req)).collect();
        aggregate_signal(hits)
    }

    pub fn evaluate_portfolio(&self, req: &PortfolioRiskRequest) -> PortfolioRiskResult {
        let mut hits = Vec::new();

        let industry_breach = req
            .portfolio
            .industry_exposure
            .values()
            .any(|v| *v > self.settings.max_industry_exposure);
        if industry_breach {
            hits.push(RuleHit::fail("industry_concentration", SignalLevel::Warning, "industry exposure exceeds cap"));
        } else {
            hits.push(RuleHit::ok("industry_concentration", "ok"));
        }

        let theme_breach = req
            .portfolio
            .theme_exposure
            .values()
            .any(|v| *v > self.settings.max_theme_exposure);
        if theme_breach {
            hits.push(RuleHit::fail("theme_concentration", SignalLevel::Warning, "theme exposure exceeds cap"));
        } else {
            hits.push(RuleHit::ok("theme_concentration", "ok"));
        }

        if let Some(pending) = &req.pending_signal {
            if pending.action == SignalAction::Buy {
                if let Some(position) = pending.suggested_position {
                    let projected_industry = req
                        .portfolio
                        .industry_exposure
                        .values()
                        .cloned()
                        .fold(0.0_f64, f64::max)
                        + position;
                    if projected_industry > self.settings.max_industry_exposure {
                        hits.push(RuleHit::fail(
                            "projected_industry_concentration",
                            SignalLevel::Warning,
                            "pending signal would push industry exposure over cap",
                        ));
                    }
                }
            }
        }

        if let Some(latest_return) = req.daily_returns.last() {
            if *latest_return <= -self.settings.max_daily_loss {
                hits.push(RuleHit::fail(
                    "daily_loss_breach",
                    SignalLevel::Critical,
                    format!("latest daily return {latest_return:.4} breaches -{:.4}", self.settings.max_daily_loss),
                ));
            } else {
                hits.push(RuleHit::ok("daily_loss_breach", "ok"));
            }
        }

        let streak = consecutive_losses(&req.recent_trade_pnls);
        if streak >= self.settings.max_consecutive_losses {
            hits.push(RuleHit::fail(
                "consecutive_losses",
                SignalLevel::Critical,
                format!("{streak} consecutive losing trades reached the circuit-breaker threshold"),
            ));
        } else {
            hits.push(RuleHit::ok("consecutive_losses", "ok"));
        }

        let (var_value, es_value) = historical_var_es(&req.daily_returns, req.var_confidence);
        if let Some(es) = es_value {
            if es >= self.settings.max_es {
                hits.push(RuleHit::fail(
                    "expected_shortfall",
                    SignalLevel::Critical,
                    format!("ES {es:.4} at or above cap {:.4}", self.settings.max_es),
                ));
            } else {
                hits.push(RuleHit::ok("expected_shortfall", "ok"));
            }
        }
        if let Some(var) = var_value {
            if var >= self.settings.max_var {
                hits.push(RuleHit::fail(
                    "value_at_risk",
                    SignalLevel::Warning,
                    format!("VaR {var:.4} at or above cap {:.4}", self.settings.max_var),
                ));
            } else {
                hits.push(RuleHit::ok("value_at_risk", "ok"));
            }
        }

        let (blocked, level) = aggregate_level(&hits);
        let summary = summarize(&hits);
        PortfolioRiskResult {
            blocked,
            level,
            summary,
            hits,
            var_value,
            es_value,
        }
    }
}

fn aggregate_signal(hits: Vec<RuleHit>) -> RiskCheckResult {
    let (blocked, level) = aggregate_level(&hits);
    let summary = summarize(&hits);
    let recommendations = hits
        .iter()
        .filter(|h| !h.passed)
        .map(|h| h.message.clone())
        .collect();
    RiskCheckResult {
        blocked,
        level,
        hits,
        summary,
        recommendations,
    }
}

fn aggregate_level(hits: &[RuleHit]) -> (bool, SignalLevel) {
    if hits.iter().any(|h| !h.passed && h.level == SignalLevel::Critical) {
        (true, SignalLevel::Critical)
    } else if hits.iter().any(|h| !h.passed && h.level == SignalLevel::Warning) {
        (false, SignalLevel::Warning)
    } else {
        (false, SignalLevel::Info)
    }
}

fn summarize(hits: &[RuleHit]) -> String {
    let failed: Vec<&str> = hits.iter().filter(|h| !h.passed).map(|h| h.rule_name.as_str()).collect();
    if failed.is_empty() {
        "all rules passed".to_string()
    } else {
        format!("failed: {}", failed.join(", "))
    }
}

/// Counts trailing negative pnls from the end of the series until a non-negative
/// entry is hit.
fn consecutive_losses(pnls: &[f64]) -> u32 {
    let mut count = 0u32;
    for pnl in pnls.iter().rev() {
        if *pnl < 0.0 {
            count += 1;
        } else {
            break;
        }
    }
    count
}

/// `losses = sorted(max(0, -r) for r in returns)`; `idx = ceil(confidence*n) - 1`
/// clamped to `[0, n-1]`; `var = losses[idx]`; `es = mean(losses[idx..])`.
fn historical_var_es(returns: &[f64], confidence: f64) -> (Option<f64>, Option<f64>) {
    if returns.is_empty() {
        return (None, None);
    }
    let n = returns.len();
    let mut losses: Vec<f64> = returns.iter().map(|r| (-r).max(0.0)).collect();
    losses.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((confidence * n as f64).ceil() as i64 - 1).clamp(0, n as i64 - 1) as usize;
    let var = losses[idx];
    let es = losses[idx..].iter().sum::<f64>() / (n - idx) as f64;
    (Some(var), Some(es))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_losses_counts_trailing_negatives_only() {
        assert_eq!(consecutive_losses(&[1.0, -1.0, -2.0, -3.0]), 3);
        assert_eq!(consecutive_losses(&[-1.0, -2.0, 1.0]), 0);
        assert_eq!(consecutive_losses(&[]), 0);
    }

    #[test]
    fn var_es_respect_bounds_and_ordering() {
        let returns = vec![0.01, -0.02, -0.01, 0.03, -0.05, 0.00, -0.03];
        let (var, es) = historical_var_es(&returns, 0.95);
        let var = var.unwrap();
        let es = es.unwrap();
        assert!(var >= 0.0);
        assert!(es >= var, "ES must be at least VaR since it averages the tail from VaR's index onward");
    }
}
