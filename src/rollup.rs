//! The `rollup` module folds every successfully processed project into the
//! cross-project totals and, per configured organization, the wallet
//! balance and runway figures. A failed balance or rate lookup degrades
//! that figure to zero; the rollup itself never fails.

use config::Organization;
use ledger::LedgerClient;
use records::{GlobalFinancials, OrganizationFinancials, ProjectAggregate};
use result::Result;

/// Balance and rate lookups, separated from the arithmetic so the rollup
/// is testable without a network.
pub trait BalanceSource {
    fn balance(&self, wallet: &str) -> Result<f64>;
    fn spot_rate(&self, asset_id: &str, vs_currency: &str) -> Result<f64>;
}

impl BalanceSource for LedgerClient {
    fn balance(&self, wallet: &str) -> Result<f64> {
        LedgerClient::balance(self, wallet)
    }

    fn spot_rate(&self, asset_id: &str, vs_currency: &str) -> Result<f64> {
        LedgerClient::spot_rate(self, asset_id, vs_currency)
    }
}

pub fn build_global<B: BalanceSource>(
    source: &B,
    processed: &[ProjectAggregate],
    organizations: &[Organization],
) -> GlobalFinancials {
    let total_budget: f64 = processed.iter().map(|p| p.proposal.budget).sum();
    let total_received: f64 = processed.iter().map(|p| p.total_received).sum();

    let mut organization_financials = Vec::with_capacity(organizations.len());
    for org in organizations {
        let balance = match source.balance(&org.wallet) {
            Ok(balance) => balance,
            Err(err) => {
                warn!("organization {}: balance degraded to 0: {}", org.name, err);
                0.0
            }
        };
        let rate = match source.spot_rate(&org.asset_id, &org.vs_currency) {
            Ok(rate) => rate,
            Err(err) => {
                warn!(
                    "organization {}: {}/{} rate degraded to 0: {}",
                    org.name, org.asset_id, org.vs_currency, err
                );
                0.0
            }
        };
        organization_financials.push(OrganizationFinancials {
            name: org.name.clone(),
            real_monthly_budget: org.real_monthly_budget,
            months_real: runway_months(balance, org.real_monthly_budget),
            max_monthly_budget: org.max_monthly_budget,
            months_max: runway_months(balance, org.max_monthly_budget),
            wallet_balance: balance,
            converted_balance: balance * rate,
            rate,
        });
    }

    GlobalFinancials {
        total_budget,
        total_received,
        remaining_funds: total_budget - total_received,
        organizations: organization_financials,
    }
}

/// Months of runway at a monthly spend, rounded to the nearest whole month.
/// A non-positive monthly rate yields zero runway.
pub fn runway_months(balance: f64, monthly: f64) -> i64 {
    if monthly <= 0.0 {
        return 0;
    }
    (balance / monthly).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use records::{Proposal, ProjectFinancials};
    use result::Error;

    struct FixtureBalances {
        balance: Option<f64>,
        rate: Option<f64>,
    }

    impl BalanceSource for FixtureBalances {
        fn balance(&self, _wallet: &str) -> Result<f64> {
            self.balance
                .ok_or_else(|| Error::UpstreamFetch("balance down".to_string()))
        }

        fn spot_rate(&self, _asset_id: &str, _vs_currency: &str) -> Result<f64> {
            self.rate
                .ok_or_else(|| Error::UpstreamFetch("rates down".to_string()))
        }
    }

    fn organization() -> Organization {
        Organization {
            name: "Treasury".to_string(),
            wallet: "addr1treasury".to_string(),
            asset_id: "cardano".to_string(),
            vs_currency: "usd".to_string(),
            real_monthly_budget: 10_000.0,
            max_monthly_budget: 15_000.0,
        }
    }

    fn aggregate(id: u64, budget: f64, received: f64) -> ProjectAggregate {
        ProjectAggregate {
            id,
            name: format!("Project {}", id),
            wallet: format!("addr1project{}", id),
            proposal: Proposal {
                project_id: id,
                title: format!("Project {}", id),
                budget,
                funds_distributed: 0.0,
                milestones_qty: 0,
            },
            financials: ProjectFinancials {
                total_budget: budget,
                monthly_budget: budget,
                duration_months: 0,
                start_date: None,
                end_date: None,
                collaborators: vec![],
                organization_funds: budget,
            },
            milestones: vec![],
            transactions: vec![],
            total_received: received,
            remaining_funds: budget - received,
        }
    }

    #[test]
    fn test_totals_sum_over_processed_projects() {
        let source = FixtureBalances {
            balance: Some(25_000.0),
            rate: Some(0.4),
        };
        let processed = vec![aggregate(1, 120_000.0, 30_000.0), aggregate(2, 80_000.0, 80_000.0)];
        let global = build_global(&source, &processed, &[organization()]);

        assert_eq!(global.total_budget, 200_000.0);
        assert_eq!(global.total_received, 110_000.0);
        assert_eq!(global.remaining_funds, 90_000.0);

        let org = &global.organizations[0];
        assert_eq!(org.wallet_balance, 25_000.0);
        assert_eq!(org.converted_balance, 10_000.0);
        assert_eq!(org.months_real, 3);
        assert_eq!(org.months_max, 2);
    }

    #[test]
    fn test_totals_are_order_independent() {
        let source = FixtureBalances {
            balance: Some(0.0),
            rate: Some(0.0),
        };
        let forward = vec![aggregate(1, 10.0, 1.0), aggregate(2, 20.0, 2.0), aggregate(3, 40.0, 4.0)];
        let reversed: Vec<ProjectAggregate> = forward.iter().rev().cloned().collect();

        let a = build_global(&source, &forward, &[]);
        let b = build_global(&source, &reversed, &[]);
        assert_eq!(a.total_budget, b.total_budget);
        assert_eq!(a.total_received, b.total_received);
        assert_eq!(a.remaining_funds, b.remaining_funds);
    }

    #[test]
    fn test_runway_rounding() {
        assert_eq!(runway_months(25_000.0, 10_000.0), 3);
        assert_eq!(runway_months(24_999.0, 10_000.0), 2);
        assert_eq!(runway_months(100.0, 0.0), 0);
        assert_eq!(runway_months(100.0, -5.0), 0);
    }

    #[test]
    fn test_rate_failure_degrades_to_zero() {
        let source = FixtureBalances {
            balance: Some(5_000.0),
            rate: None,
        };
        let global = build_global(&source, &[], &[organization()]);
        let org = &global.organizations[0];
        assert_eq!(org.wallet_balance, 5_000.0);
        assert_eq!(org.rate, 0.0);
        assert_eq!(org.converted_balance, 0.0);
    }

    #[test]
    fn test_balance_failure_degrades_to_zero() {
        let source = FixtureBalances {
            balance: None,
            rate: Some(0.5),
        };
        let global = build_global(&source, &[], &[organization()]);
        let org = &global.organizations[0];
        assert_eq!(org.wallet_balance, 0.0);
        assert_eq!(org.months_real, 0);
        assert_eq!(org.months_max, 0);
    }
}
