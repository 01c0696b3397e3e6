//! The fixed per-signal rule pipeline. Each rule is one `RiskRule`
//! impl evaluated in a fixed order by `RiskEngine::evaluate_signal`. Grounded on
//! `risk/rules.py`; `TushareDisclosureAndOverhangRule` has no surviving source file
//! in the original tree (only imported by `risk/engine.py`) and is reconstructed
//! here from its constructor parameter names plus the CRITICAL/WARNING table.

use crate::domain::{RiskCheckRequest, RuleHit, SignalAction, SignalLevel};

pub trait RiskRule: Send + Sync {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit;
}

pub struct TPlusOneRule;
impl RiskRule for TPlusOneRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("t_plus_one", "no signal");
        };
        if signal.action == SignalAction::Sell {
            let available = req.position.as_ref().map(|p| p.available_quantity).unwrap_or(0);
            if available <= 0 {
                return RuleHit::fail("t_plus_one", SignalLevel::Critical, "no settled quantity available to sell");
            }
        }
        RuleHit::ok("t_plus_one", "ok")
    }
}

pub struct STRule;
impl RiskRule for STRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("st_filter", "no signal");
        };
        if signal.action == SignalAction::Buy && req.is_st {
            return RuleHit::fail("st_filter", SignalLevel::Critical, "symbol is under ST/*ST status");
        }
        RuleHit::ok("st_filter", "ok")
    }
}

pub struct SuspensionRule;
impl RiskRule for SuspensionRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("suspension_filter", "no signal");
        };
        let actionable = matches!(signal.action, SignalAction::Buy | SignalAction::Sell);
        if actionable && req.is_suspended {
            return RuleHit::fail("suspension_filter", SignalLevel::Critical, "symbol is suspended");
        }
        RuleHit::ok("suspension_filter", "ok")
    }
}

pub struct LimitPriceRule;
impl RiskRule for LimitPriceRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("limit_price", "no signal");
        };
        let warn = (signal.action == SignalAction::Buy && req.at_limit_up)
            || (signal.action == SignalAction::Sell && req.at_limit_down);
        if warn {
            return RuleHit::fail("limit_price", SignalLevel::Warning, "order sits at the daily limit price");
        }
        RuleHit::ok("limit_price", "ok")
    }
}

pub struct PositionLimitRule {
    pub max_single_position: f64,
}
impl RiskRule for PositionLimitRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("single_position_limit", "no signal");
        };
        if signal.action == SignalAction::Buy {
            if let Some(suggested) = signal.suggested_position {
                if suggested > self.max_single_position {
                    return RuleHit::fail(
                        "single_position_limit",
                        SignalLevel::Critical,
                        format!("suggested position {suggested:.4} exceeds cap {:.4}", self.max_single_position),
                    );
                }
            }
        }
        RuleHit::ok("single_position_limit", "ok")
    }
}

pub struct LiquidityRule {
    pub min_turnover_20d: f64,
}
impl RiskRule for LiquidityRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("liquidity", "no signal");
        };
        let actionable = matches!(signal.action, SignalAction::Buy | SignalAction::Sell);
        if actionable {
            if let Some(turnover) = req.avg_turnover_20d {
                if turnover < self.min_turnover_20d {
                    return RuleHit::fail(
                        "liquidity",
                        SignalLevel::Warning,
                        format!("20d avg turnover {turnover:.0} below floor {:.0}", self.min_turnover_20d),
                    );
                }
            }
        }
        RuleHit::ok("liquidity", "ok")
    }
}

pub struct SmallCapitalTradabilityRule {
    pub cash_buffer_ratio: f64,
    pub min_edge_bps: f64,
}
impl RiskRule for SmallCapitalTradabilityRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        if !req.enable_small_capital_mode {
            return RuleHit::ok("small_capital_tradability", "small-capital mode disabled");
        }
        let Some(signal) = &req.signal else {
            return RuleHit::ok("small_capital_tradability", "no signal");
        };
        if signal.action != SignalAction::Buy {
            return RuleHit::ok("small_capital_tradability", "not a BUY");
        }
        if let (Some(cash), Some(required)) = (req.available_cash, req.required_cash_for_min_lot) {
            let buffered = required * (1.0 + self.cash_buffer_ratio);
            if cash < buffered {
                return RuleHit::fail(
                    "small_capital_tradability",
                    SignalLevel::Critical,
                    format!("usable cash {cash:.2} below required {buffered:.2}"),
                );
            }
        }
        if let (Some(edge), Some(cost)) = (req.expected_edge_bps, req.estimated_roundtrip_cost_bps) {
            let floor = req.min_expected_edge_bps.unwrap_or(self.min_edge_bps);
            if edge < cost + floor {
                return RuleHit::fail(
                    "small_capital_tradability",
                    SignalLevel::Warning,
                    format!("expected edge {edge:.1}bps below cost+floor {:.1}bps", cost + floor),
                );
            }
        }
        RuleHit::ok("small_capital_tradability", "ok")
    }
}

pub struct DrawdownRule {
    pub max_drawdown: f64,
}
impl RiskRule for DrawdownRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        if let Some(portfolio) = &req.portfolio {
            if portfolio.current_drawdown > self.max_drawdown {
                return RuleHit::fail(
                    "drawdown",
                    SignalLevel::Critical,
                    format!("drawdown {:.4} exceeds cap {:.4}", portfolio.current_drawdown, self.max_drawdown),
                );
            }
        }
        RuleHit::ok("drawdown", "ok")
    }
}

pub struct IndustryExposureRule {
    pub max_industry_exposure: f64,
}
impl RiskRule for IndustryExposureRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("industry_exposure", "no signal");
        };
        if signal.action != SignalAction::Buy {
            return RuleHit::ok("industry_exposure", "not a BUY");
        }
        if let (Some(portfolio), Some(industry)) = (&req.portfolio, &req.symbol_industry) {
            let current = portfolio.industry_exposure.get(industry).copied().unwrap_or(0.0);
            let projected = current + signal.suggested_position.unwrap_or(0.0);
            if projected > self.max_industry_exposure {
                return RuleHit::fail(
                    "industry_exposure",
                    SignalLevel::Warning,
                    format!("projected industry exposure {projected:.4} exceeds cap {:.4}", self.max_industry_exposure),
                );
            }
        }
        RuleHit::ok("industry_exposure", "ok")
    }
}

pub struct FundamentalQualityRule {
    pub warning_score: f64,
    pub critical_score: f64,
    pub require_data_for_buy: bool,
    pub max_stale_days: i64,
}
impl RiskRule for FundamentalQualityRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("fundamental_quality", "no signal");
        };
        if signal.action != SignalAction::Buy {
            return RuleHit::ok("fundamental_quality", "not a BUY");
        }
        if req.fundamental_pit_ok == Some(false) {
            return RuleHit::fail("fundamental_quality", SignalLevel::Critical, "fundamental snapshot fails PIT check");
        }
        if let Some(score) = req.fundamental_score {
            if score < self.critical_score {
                return RuleHit::fail(
                    "fundamental_quality",
                    SignalLevel::Critical,
                    format!("fundamental score {score:.3} below critical floor {:.3}", self.critical_score),
                );
            }
        }
        let missing = req.fundamental_score.is_none();
        if missing && self.require_data_for_buy {
            return RuleHit::fail("fundamental_quality", SignalLevel::Warning, "fundamental data required but missing");
        }
        if let Some(score) = req.fundamental_score {
            if score < self.warning_score {
                return RuleHit::fail(
                    "fundamental_quality",
                    SignalLevel::Warning,
                    format!("fundamental score {score:.3} below warning floor {:.3}", self.warning_score),
                );
            }
        }
        if let Some(stale_days) = req.fundamental_stale_days {
            if stale_days > self.max_stale_days {
                return RuleHit::fail(
                    "fundamental_quality",
                    SignalLevel::Warning,
                    format!("fundamental snapshot is {stale_days} days stale"),
                );
            }
        }
        RuleHit::ok("fundamental_quality", "ok")
    }
}

/// Reconstructed from the documented threshold table and `risk/engine.py`'s constructor
/// parameters (`disclosure_warning/critical_score`, `forecast_warning/critical_pct`,
/// `small_cap_pledge_critical_ratio`, `small_cap_unlock_warning/critical_ratio`,
/// `small_cap_overhang_warning_score`) — the Python rule class itself was not present
/// in the retrieved source tree.
pub struct TushareDisclosureAndOverhangRule {
    pub disclosure_warning_score: f64,
    pub disclosure_critical_score: f64,
    pub forecast_warning_pct: f64,
    pub forecast_critical_pct: f64,
    pub pledge_critical_ratio: f64,
    pub unlock_warning_ratio: f64,
    pub unlock_critical_ratio: f64,
    pub overhang_warning_score: f64,
}
impl RiskRule for TushareDisclosureAndOverhangRule {
    fn evaluate(&self, req: &RiskCheckRequest) -> RuleHit {
        let Some(signal) = &req.signal else {
            return RuleHit::ok("tushare_disclosure_and_overhang", "no signal");
        };
        if signal.action != SignalAction::Buy {
            return RuleHit::ok("tushare_disclosure_and_overhang", "not a BUY");
        }

        let disclosure = req.tushare_disclosure_risk_score;
        let forecast = req.tushare_forecast_pct;
        let pledge = req.tushare_pledge_ratio;
        let unlock = req.tushare_unlock_ratio;
        let overhang = req.tushare_overhang_score;

        let critical = disclosure.map(|v| v >= self.disclosure_critical_score).unwrap_or(false)
            || forecast.map(|v| v < self.forecast_critical_pct).unwrap_or(false)
            || pledge.map(|v| v >= self.pledge_critical_ratio).unwrap_or(false)
            || unlock.map(|v| v >= self.unlock_critical_ratio).unwrap_or(false);
        if critical {
            return RuleHit::fail(
                "tushare_disclosure_and_overhang",
                SignalLevel::Critical,
                "disclosure risk, earnings forecast, pledge ratio, or unlock ratio crosses the critical threshold",
            );
        }

        let warning = disclosure.map(|v| v >= self.disclosure_warning_score).unwrap_or(false)
            || forecast.map(|v| v < self.forecast_warning_pct).unwrap_or(false)
            || unlock.map(|v| v >= self.unlock_warning_ratio).unwrap_or(false)
            || overhang.map(|v| v >= self.overhang_warning_score).unwrap_or(false);
        if warning {
            return RuleHit::fail(
                "tushare_disclosure_and_overhang",
                SignalLevel::Warning,
                "disclosure risk, earnings forecast, unlock ratio, or overhang score crosses the warning threshold",
            );
        }

        RuleHit::ok("tushare_disclosure_and_overhang", "ok")
    }
}
