//! Balance sheet: opening position from the base year, roll-forward and identity check

use super::debt::DebtSchedule;
use super::records::{BalanceSheet, CashFlowStatement, DebtBalance, ProfitAndLoss};
use crate::assumptions::{Assumptions, WorkingCapitalAssumptions};
use crate::error::{ModelError, ModelResult};
use crate::history::HistoricalYear;

/// Working capital balances implied by a year's trading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingCapitalPosition {
    pub receivables: f64,
    pub inventory: f64,
    pub payables: f64,
}

impl WorkingCapitalPosition {
    pub fn new(
        wc: &WorkingCapitalAssumptions,
        revenue: f64,
        cost_of_sales: f64,
        opex_total: f64,
    ) -> Self {
        Self {
            receivables: wc.receivables(revenue),
            inventory: wc.inventory(cost_of_sales),
            payables: wc.payables(cost_of_sales + opex_total),
        }
    }

    pub fn for_period(wc: &WorkingCapitalAssumptions, pl: &ProfitAndLoss) -> Self {
        Self::new(wc, pl.revenue, pl.cost_of_sales, pl.opex_total)
    }
}

fn debt_lines(debt: &DebtSchedule, year: i32) -> (Vec<DebtBalance>, f64) {
    let lines: Vec<DebtBalance> = debt
        .closing_balances(year)
        .into_iter()
        .map(|(name, balance)| DebtBalance { name, balance })
        .collect();
    let total = lines.iter().map(|d| d.balance).sum();
    (lines, total)
}

/// Fail when assets differ from liabilities plus equity by more than `tolerance`
pub fn check_identity(bs: &BalanceSheet, tolerance: f64) -> ModelResult<()> {
    let liabilities_and_equity = bs.total_liabilities + bs.total_equity;
    let residual = bs.total_assets - liabilities_and_equity;
    if residual.abs() > tolerance || !residual.is_finite() {
        return Err(ModelError::BalanceSheetImbalance {
            year: bs.year,
            assets: bs.total_assets,
            liabilities_and_equity,
            residual,
            tolerance,
        });
    }
    Ok(())
}

/// Split the base year's reported totals into the lines the projection rolls forward.
///
/// Working capital comes from the days assumptions, debt from the schedule and the
/// settlement liability from its run-off. Fixed assets and other liabilities take
/// whatever remains of the reported totals, so the opening position reconciles to
/// reported net assets by construction.
pub fn opening_balance_sheet(
    base: &HistoricalYear,
    assumptions: &Assumptions,
    debt: &DebtSchedule,
) -> ModelResult<BalanceSheet> {
    let wc = WorkingCapitalPosition::new(
        &assumptions.working_capital,
        base.revenue,
        base.cost_of_sales(),
        base.opex_total,
    );

    let cash = base.cash_cf;
    let fixed_assets = base.total_assets - cash - wc.receivables - wc.inventory;
    if fixed_assets < 0.0 {
        log::warn!(
            "{}: reported assets are below cash plus working capital; fixed assets opened at {:.0}",
            base.year,
            fixed_assets
        );
    }

    let (debt_lines, total_debt) = debt_lines(debt, base.year);
    let exceptional_liability = assumptions.exceptional_settlement.outstanding(base.year);
    let other_liabilities = base.total_liabilities - wc.payables - total_debt - exceptional_liability;
    if other_liabilities < 0.0 {
        log::warn!(
            "{}: reported liabilities are below payables, debt and settlement; other liabilities opened at {:.0}",
            base.year,
            other_liabilities
        );
    }

    let share_capital = assumptions.financing.historical_equity_raised();
    let total_equity = base.total_assets - base.total_liabilities;
    if (total_equity - base.net_assets).abs() > assumptions.balance_tolerance {
        return Err(ModelError::MalformedHistory(format!(
            "{}: total assets less total liabilities ({:.0}) does not match reported net assets ({:.0})",
            base.year, total_equity, base.net_assets
        )));
    }

    let bs = BalanceSheet {
        year: base.year,
        cash,
        receivables: wc.receivables,
        inventory: wc.inventory,
        fixed_assets,
        total_assets: base.total_assets,
        payables: wc.payables,
        debt: debt_lines,
        total_debt,
        exceptional_liability,
        other_liabilities,
        total_liabilities: base.total_liabilities,
        share_capital,
        retained_earnings: total_equity - share_capital,
        total_equity,
        rounding_residual: 0.0,
    };
    check_identity(&bs, assumptions.balance_tolerance)?;
    Ok(bs)
}

/// Roll the prior balance sheet forward through one year's P&L and cash flows
pub fn project_balance_sheet(
    assumptions: &Assumptions,
    prior: &BalanceSheet,
    pl: &ProfitAndLoss,
    cash_flow: &CashFlowStatement,
    working_capital: &WorkingCapitalPosition,
    debt: &DebtSchedule,
) -> ModelResult<BalanceSheet> {
    let year = pl.year;

    let cash = cash_flow.cash_cf;
    let fixed_assets = prior.fixed_assets - cash_flow.capex - cash_flow.da_addback;
    let total_assets = cash + working_capital.receivables + working_capital.inventory + fixed_assets;

    let (debt_lines, total_debt) = debt_lines(debt, year);
    let exceptional_liability = assumptions.exceptional_settlement.outstanding(year);
    let other_liabilities = prior.other_liabilities;
    let total_liabilities =
        working_capital.payables + total_debt + exceptional_liability + other_liabilities;

    let share_capital = prior.share_capital + cash_flow.equity_raised + cash_flow.notes_converted;
    let retained_earnings = prior.retained_earnings + pl.net_income;
    let total_equity = share_capital + retained_earnings;

    let bs = BalanceSheet {
        year,
        cash,
        receivables: working_capital.receivables,
        inventory: working_capital.inventory,
        fixed_assets,
        total_assets,
        payables: working_capital.payables,
        debt: debt_lines,
        total_debt,
        exceptional_liability,
        other_liabilities,
        total_liabilities,
        share_capital,
        retained_earnings,
        total_equity,
        rounding_residual: total_assets - total_liabilities - total_equity,
    };
    check_identity(&bs, assumptions.balance_tolerance)?;
    Ok(bs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::load_history_from_reader;
    use crate::history::loader::tests::SAMPLE_CSV;
    use approx::assert_relative_eq;

    fn opening() -> BalanceSheet {
        let history = load_history_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let assumptions = Assumptions::default_plan();
        let debt = DebtSchedule::from_assumptions(&assumptions);
        opening_balance_sheet(history.base_year(), &assumptions, &debt).unwrap()
    }

    #[test]
    fn test_opening_reconciles_to_reported_net_assets() {
        let bs = opening();
        assert_eq!(bs.year, 2024);
        assert_eq!(bs.cash, 7_117_200.0);
        assert_relative_eq!(bs.net_assets(), -5_900_000.0, epsilon = 1e-6);
        assert_relative_eq!(bs.total_equity, -5_900_000.0, epsilon = 1e-6);
        assert_relative_eq!(bs.share_capital, 51_361_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_opening_carries_note_and_settlement() {
        let bs = opening();
        assert_eq!(bs.debt.len(), 1);
        assert_eq!(bs.debt[0].name, "CLN 2024");
        assert_relative_eq!(bs.total_debt, 6_480_000.0, epsilon = 1e-6);
        assert_eq!(bs.exceptional_liability, 9_300_000.0);
        assert!(bs.other_liabilities > 0.0);
        assert!(bs.fixed_assets > 0.0);
    }

    #[test]
    fn test_receivables_from_days() {
        let bs = opening();
        assert_relative_eq!(bs.receivables, 6_590_000.0 * 45.0 / 365.0, epsilon = 1e-6);
        assert_eq!(bs.inventory, 0.0);
    }

    #[test]
    fn test_identity_check_rejects_gap() {
        let mut bs = opening();
        bs.total_assets += 5.0;
        match check_identity(&bs, 1.0) {
            Err(ModelError::BalanceSheetImbalance { year, residual, .. }) => {
                assert_eq!(year, 2024);
                assert_relative_eq!(residual, 5.0, epsilon = 1e-6);
            }
            other => panic!("expected imbalance, got {:?}", other),
        }
        assert!(check_identity(&bs, 10.0).is_ok());
    }

    #[test]
    fn test_net_assets_mismatch_fails_load() {
        let csv = SAMPLE_CSV.replace("Net Assets,-300000,-5900000", "Net Assets,-300000,-5000000");
        let history = load_history_from_reader(csv.as_bytes()).unwrap();
        let assumptions = Assumptions::default_plan();
        let debt = DebtSchedule::from_assumptions(&assumptions);
        assert!(matches!(
            opening_balance_sheet(history.base_year(), &assumptions, &debt),
            Err(ModelError::MalformedHistory(_))
        ));
    }
}
