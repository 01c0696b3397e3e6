//! Strategy generation seam: the alpha/signal-selection algorithm itself is an
//! external collaborator out of scope here. `StrategyGenerator` mirrors
//! `MarketDataProvider`'s pluggable-capability pattern so the pipeline can call an
//! arbitrary registered strategy without depending on any one implementation.
//! Grounded on `strategy/base.py`'s `StrategyContext` and the call shape in
//! `api/signals.py` (`strategy.generate(features, context=context)`); no original
//! source for `strategy/registry.py` or `strategy/base.py` itself was retrievable, so
//! the trait and registry below are designed from that call shape rather than ported.

use crate::domain::{GeneratedSignal, JsonMap};
use crate::factors::FactorRow;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct StrategyContext {
    pub params: JsonMap,
    pub market_state: JsonMap,
}

/// A pluggable strategy: given the latest factor rows for a symbol and the
/// resolved runtime context, produce zero or more candidate signals. Synchronous,
/// since factor computation itself runs synchronously (via rayon, not async).
pub trait StrategyGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, features: &[FactorRow], context: &StrategyContext) -> Vec<GeneratedSignal>;
}

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn StrategyGenerator>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry { strategies: HashMap::new() }
    }

    pub fn register(&mut self, strategy: Arc<dyn StrategyGenerator>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StrategyGenerator>> {
        self.strategies.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalAction;
    use chrono::NaiveDate;

    struct AlwaysWatch;

    impl StrategyGenerator for AlwaysWatch {
        fn name(&self) -> &str {
            "always_watch"
        }

        fn generate(&self, features: &[FactorRow], _context: &StrategyContext) -> Vec<GeneratedSignal> {
            features
                .last()
                .map(|f| GeneratedSignal {
                    symbol: f.symbol.clone(),
                    strategy_name: self.name().to_string(),
                    trade_date: f.trade_date,
                    action: SignalAction::Watch,
                    confidence: 0.5,
                    reason: "placeholder".to_string(),
                    suggested_position: None,
                    metadata: JsonMap::new(),
                })
                .into_iter()
                .collect()
        }
    }

    #[test]
    fn registry_round_trips_registered_strategy() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(AlwaysWatch));
        assert!(registry.get("always_watch").is_some());
        assert!(registry.get("missing").is_none());

        let strategy = registry.get("always_watch").unwrap();
        let features = vec![FactorRow {
            symbol: "600000.SH".to_string(),
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            ma5: None,
            ma20: None,
            ma60: None,
            atr14: None,
            ret_1d: None,
            momentum20: None,
            momentum60: None,
            volatility20: None,
            zscore20: None,
            turnover20: None,
            fundamental_available: false,
            fundamental_score: None,
            tushare_advanced_score: None,
            tushare_disclosure_risk_score: None,
            tushare_overhang_risk_score: None,
        }];
        let signals = strategy.generate(&features, &StrategyContext::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].action, SignalAction::Watch);
    }
}
