//! Cash flow statement (indirect method)

use super::balance_sheet::WorkingCapitalPosition;
use super::debt::DebtPosition;
use super::records::{BalanceSheet, CashFlowStatement, ProfitAndLoss};
use crate::assumptions::Assumptions;

/// Derive one year's cash flows from its P&L and the prior closing balance sheet
pub fn project_cash_flow(
    assumptions: &Assumptions,
    prior: &BalanceSheet,
    pl: &ProfitAndLoss,
    debt: &DebtPosition,
    working_capital: &WorkingCapitalPosition,
) -> CashFlowStatement {
    let year = pl.year;

    let da_addback = -pl.da;
    let non_cash_interest = debt.total.interest_accrued;
    let change_in_receivables = prior.receivables - working_capital.receivables;
    let change_in_inventory = prior.inventory - working_capital.inventory;
    let change_in_payables = working_capital.payables - prior.payables;
    let exceptional_payment = -assumptions.exceptional_settlement.payment(year);
    let operating_cf = pl.net_income
        + da_addback
        + non_cash_interest
        + change_in_receivables
        + change_in_inventory
        + change_in_payables
        + exceptional_payment;

    let capex = -pl.revenue * assumptions.capex_pct_of_revenue;
    let investing_cf = capex;

    let series_c = &assumptions.financing.series_c;
    let equity_raised = if year == series_c.close_year() {
        series_c.equity_amount()
    } else {
        0.0
    };
    let debt_drawdowns = debt.total.drawdown;
    let debt_repayments = -debt.total.repayment;
    let financing_cf = debt_drawdowns + debt_repayments + equity_raised;

    let net_change_in_cash = operating_cf + investing_cf + financing_cf;

    CashFlowStatement {
        year,
        net_income: pl.net_income,
        da_addback,
        non_cash_interest,
        change_in_receivables,
        change_in_inventory,
        change_in_payables,
        exceptional_payment,
        operating_cf,
        capex,
        investing_cf,
        debt_drawdowns,
        debt_repayments,
        equity_raised,
        financing_cf,
        net_change_in_cash,
        cash_bf: prior.cash,
        cash_cf: prior.cash + net_change_in_cash,
        notes_converted: debt.total.converted,
    }
}
