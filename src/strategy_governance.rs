//! `StrategyGovernance` state machine service. Grounded on
//! `strategy/governance_service.py`, wrapping `store::strategy_gov`.

use crate::domain::{GovernanceDecision, StrategyStatus};
use crate::store::strategy_gov::{GovernanceRecord, Strategy, StrategyGovStore};
use anyhow::{anyhow, Result};

pub struct StrategyGovernance {
    store: StrategyGovStore,
}

impl StrategyGovernance {
    pub fn new(store: StrategyGovStore) -> Self {
        StrategyGovernance { store }
    }

    pub fn register_draft(&self, strategy_name: &str, required_roles: &[String], min_approvals: i64) -> Result<i64> {
        self.store.create_strategy(strategy_name, required_roles, min_approvals)
    }

    /// DRAFT|REJECTED -> IN_REVIEW.
    pub fn submit_review(&self, strategy_name: &str) -> Result<()> {
        let strategy = self
            .store
            .get_strategy(strategy_name)?
            .ok_or_else(|| anyhow!("strategy '{strategy_name}' not found"))?;
        if !matches!(strategy.status, StrategyStatus::Draft | StrategyStatus::Rejected) {
            return Err(anyhow!(
                "cannot submit for review from status {:?}",
                strategy.status
            ));
        }
        self.store.set_status(strategy_name, StrategyStatus::InReview)
    }

    /// Records one role's decision, then re-evaluates the latest-per-role set
    /// against the approval invariant: no REJECT present, every required role
    /// has decided, and at least `min_approvals` distinct roles approved.
    pub fn decide(
        &self,
        strategy_name: &str,
        role: &str,
        reviewer: &str,
        decision: GovernanceDecision,
        comment: &str,
    ) -> Result<StrategyStatus> {
        let strategy = self
            .store
            .get_strategy(strategy_name)?
            .ok_or_else(|| anyhow!("strategy '{strategy_name}' not found"))?;
        if strategy.status != StrategyStatus::InReview {
            return Err(anyhow!("strategy '{strategy_name}' is not in review"));
        }

        self.store.record_decision(strategy_name, role, reviewer, decision, comment)?;

        let latest = self.store.latest_decisions_by_role(strategy_name)?;
        if latest.iter().any(|d| d.decision == GovernanceDecision::Reject) {
            self.store.set_status(strategy_name, StrategyStatus::Rejected)?;
            return Ok(StrategyStatus::Rejected);
        }

        let approved_roles: Vec<&GovernanceRecord> = latest
            .iter()
            .filter(|d| d.decision == GovernanceDecision::Approve)
            .collect();
        let required_satisfied = strategy
            .required_roles
            .iter()
            .all(|role| approved_roles.iter().any(|d| &d.role == role));
        let quorum_satisfied = approved_roles.len() as i64 >= strategy.min_approvals;

        if required_satisfied && quorum_satisfied {
            self.store.set_status(strategy_name, StrategyStatus::Approved)?;
            return Ok(StrategyStatus::Approved);
        }
        Ok(strategy.status)
    }

    pub fn retire(&self, strategy_name: &str) -> Result<()> {
        self.store.set_status(strategy_name, StrategyStatus::Retired)
    }

    pub fn is_approved(&self, strategy_name: &str) -> Result<bool> {
        Ok(self
            .store
            .get_strategy(strategy_name)?
            .map(|s| s.status == StrategyStatus::Approved)
            .unwrap_or(false))
    }

    pub fn get(&self, strategy_name: &str) -> Result<Option<Strategy>> {
        self.store.get_strategy(strategy_name)
    }

    pub fn history(&self, strategy_name: &str, limit: i64) -> Result<Vec<GovernanceRecord>> {
        self.store.history(strategy_name, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gov() -> StrategyGovernance {
        let file = tempfile::NamedTempFile::new().unwrap();
        StrategyGovernance::new(StrategyGovStore::new(file.path().to_str().unwrap()).unwrap())
    }

    #[test]
    fn approval_requires_all_required_roles_and_quorum() {
        let gov = gov();
        gov.register_draft("trend_follow", &["risk".to_string(), "quant".to_string()], 2)
            .unwrap();
        gov.submit_review("trend_follow").unwrap();

        let status = gov
            .decide("trend_follow", "risk", "alice", GovernanceDecision::Approve, "ok")
            .unwrap();
        assert_eq!(status, StrategyStatus::InReview);

        let status = gov
            .decide("trend_follow", "quant", "bob", GovernanceDecision::Approve, "ok")
            .unwrap();
        assert_eq!(status, StrategyStatus::Approved);
        assert!(gov.is_approved("trend_follow").unwrap());
    }

    #[test]
    fn a_reject_in_the_latest_set_rejects_the_strategy() {
        let gov = gov();
        gov.register_draft("trend_follow", &["risk".to_string()], 1).unwrap();
        gov.submit_review("trend_follow").unwrap();
        let status = gov
            .decide("trend_follow", "risk", "alice", GovernanceDecision::Reject, "no")
            .unwrap();
        assert_eq!(status, StrategyStatus::Rejected);
    }

    #[test]
    fn rejected_strategy_can_be_resubmitted() {
        let gov = gov();
        gov.register_draft("trend_follow", &["risk".to_string()], 1).unwrap();
        gov.submit_review("trend_follow").unwrap();
        gov.decide("trend_follow", "risk", "alice", GovernanceDecision::Reject, "no").unwrap();
        gov.submit_review("trend_follow").unwrap();
        assert_eq!(gov.get("trend_follow").unwrap().unwrap().status, StrategyStatus::InReview);
    }
}
