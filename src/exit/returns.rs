//! Investor returns on the exit waterfall

use super::irr::annual_irr;
use super::waterfall::WaterfallResult;
use crate::assumptions::FinancingAssumptions;
use serde::{Deserialize, Serialize};

/// Cash put in by one holder for one class
#[derive(Debug, Clone, PartialEq)]
struct Investment {
    holder: String,
    class_name: String,
    year: i32,
    amount: f64,
}

fn investments(financing: &FinancingAssumptions) -> Vec<Investment> {
    let mut out = vec![Investment {
        holder: financing.founder.holder.clone(),
        class_name: "Common".to_string(),
        year: financing.founder.year,
        amount: financing.founder.investment,
    }];

    out.extend(financing.priced_rounds.iter().map(|r| Investment {
        holder: r.name.clone(),
        class_name: r.name.clone(),
        year: r.year,
        amount: r.investment,
    }));

    let c = &financing.series_c;
    // Converted notes sit in the Series C class but the cash went in when they were drawn
    out.extend(financing.converting_notes().map(|n| Investment {
        holder: n.holder.clone(),
        class_name: c.investor.clone(),
        year: n.year,
        amount: n.principal,
    }));
    out.push(Investment {
        holder: c.investor.clone(),
        class_name: c.investor.clone(),
        year: c.close_year(),
        amount: c.equity_amount(),
    });
    out
}

/// Money multiple and IRR for one cap table line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderReturn {
    pub holder: String,
    pub class_name: String,
    pub invested: f64,
    pub proceeds: f64,
    pub moic: f64,
    /// None when the cash flows have no IRR
    pub irr: Option<f64>,
}

/// Returns for every invested line, with cash flows dated by fiscal year
pub fn holder_returns(
    financing: &FinancingAssumptions,
    waterfall: &WaterfallResult,
    exit_year: i32,
) -> Vec<HolderReturn> {
    let investments = investments(financing);

    waterfall
        .payouts
        .iter()
        .filter_map(|payout| {
            let flows: Vec<&Investment> = investments
                .iter()
                .filter(|i| i.holder == payout.holder && i.class_name == payout.class_name)
                .filter(|i| i.year <= exit_year)
                .collect();
            let invested: f64 = flows.iter().map(|i| i.amount).sum();
            if flows.is_empty() || invested <= 0.0 {
                return None;
            }

            let first_year = flows.iter().map(|i| i.year).min().unwrap_or(exit_year);
            let mut cashflows = vec![0.0; (exit_year - first_year + 1) as usize];
            for i in &flows {
                cashflows[(i.year - first_year) as usize] -= i.amount;
            }
            if let Some(last) = cashflows.last_mut() {
                *last += payout.total;
            }

            Some(HolderReturn {
                holder: payout.holder.clone(),
                class_name: payout.class_name.clone(),
                invested,
                proceeds: payout.total,
                moic: payout.total / invested,
                irr: annual_irr(&cashflows),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::waterfall::{Payout, PayoutStatus};
    use approx::assert_relative_eq;

    fn payout(holder: &str, class_name: &str, total: f64) -> Payout {
        Payout {
            holder: holder.to_string(),
            class_name: class_name.to_string(),
            shares: 1.0,
            ownership: 0.0,
            preference_claim: 0.0,
            preference_paid: 0.0,
            residual_paid: total,
            total,
            status: PayoutStatus::AsConverted,
        }
    }

    fn waterfall(payouts: Vec<Payout>) -> WaterfallResult {
        WaterfallResult {
            proceeds: payouts.iter().map(|p| p.total).sum(),
            payouts,
            total_preference_claims: 0.0,
            total_distributed: 0.0,
            undistributed: 0.0,
            shortfalls: Vec::new(),
        }
    }

    #[test]
    fn test_moic_and_irr_for_series_c() {
        let financing = FinancingAssumptions::default();
        // 9M in 2026, 18M back in 2030
        let result = holder_returns(&financing, &waterfall(vec![payout("Series C", "Series C", 18_000_000.0)]), 2030);
        assert_eq!(result.len(), 1);
        assert_relative_eq!(result[0].moic, 2.0, epsilon = 1e-9);
        let expected = 2.0_f64.powf(0.25) - 1.0;
        assert!((result[0].irr.unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_note_holder_cash_dated_at_drawdown() {
        let financing = FinancingAssumptions::default();
        let result = holder_returns(&financing, &waterfall(vec![payout("CLN Holder", "Series C", 20_000_000.0)]), 2030);
        assert_relative_eq!(result[0].invested, 10_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(result[0].moic, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uninvested_lines_skipped() {
        let financing = FinancingAssumptions::default();
        let result = holder_returns(&financing, &waterfall(vec![payout("Option Pool", "Options", 5_000_000.0)]), 2030);
        assert!(result.is_empty());
    }
}
