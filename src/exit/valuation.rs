//! Exit valuation and the debt repaid ahead of equity

use crate::assumptions::{ExitAssumptions, ValuationBasis};
use crate::projection::{DebtBalance, DebtSchedule, ProfitAndLoss};
use serde::{Deserialize, Serialize};

/// Enterprise value at exit and what is left for shareholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitValuation {
    pub year: i32,
    pub arr: f64,
    pub ebitda: f64,
    pub arr_valuation: f64,
    pub ebitda_valuation: f64,
    pub basis: ValuationBasis,
    pub enterprise_value: f64,
    /// Instruments outstanding at exit, repaid in full before equity
    pub debt_repaid: Vec<DebtBalance>,
    pub total_debt: f64,
    pub equity_proceeds: f64,
}

/// Value the company on the exit year's ARR and EBITDA.
///
/// Negative EBITDA is worth nothing. Debt is taken at the exit year's closing
/// balance, which already excludes notes converted into equity.
pub fn value_exit(exit: &ExitAssumptions, pl: &ProfitAndLoss, debt: &DebtSchedule) -> ExitValuation {
    let arr_valuation = pl.arr.max(0.0) * exit.arr_multiple;
    let ebitda_valuation = pl.ebitda.max(0.0) * exit.ebitda_multiple;
    let enterprise_value = match exit.valuation_basis {
        ValuationBasis::Arr => arr_valuation,
        ValuationBasis::Ebitda => ebitda_valuation,
        ValuationBasis::HigherOfArrOrEbitda => arr_valuation.max(ebitda_valuation),
    };

    let debt_repaid: Vec<DebtBalance> = debt
        .closing_balances(pl.year)
        .into_iter()
        .map(|(name, balance)| DebtBalance { name, balance })
        .collect();
    let total_debt: f64 = debt_repaid.iter().map(|d| d.balance).sum();

    ExitValuation {
        year: pl.year,
        arr: pl.arr,
        ebitda: pl.ebitda,
        arr_valuation,
        ebitda_valuation,
        basis: exit.valuation_basis,
        enterprise_value,
        debt_repaid,
        total_debt,
        equity_proceeds: (enterprise_value - total_debt).max(0.0),
    }
}
