//! Carried state between projected years

use super::balance_sheet::opening_balance_sheet;
use super::debt::DebtSchedule;
use super::records::{BalanceSheet, PeriodRecord};
use crate::assumptions::Assumptions;
use crate::error::ModelResult;
use crate::history::HistoricalData;

/// Everything a projected year needs from the year before it
#[derive(Debug, Clone)]
pub struct ProjectionState {
    /// Last completed fiscal year
    pub year: i32,

    pub revenue: f64,

    /// Negative, as reported
    pub opex_total: f64,

    /// ARR at the end of the last completed year, if known
    pub arr: Option<f64>,

    /// Closing balance sheet of the last completed year
    pub balance_sheet: BalanceSheet,
}

impl ProjectionState {
    /// Seed from the base (latest) historical year
    pub fn from_history(
        history: &HistoricalData,
        assumptions: &Assumptions,
        debt: &DebtSchedule,
    ) -> ModelResult<Self> {
        let base = history.base_year();
        Ok(Self {
            year: base.year,
            revenue: base.revenue,
            opex_total: base.opex_total,
            arr: base.arr,
            balance_sheet: opening_balance_sheet(base, assumptions, debt)?,
        })
    }

    /// Roll forward once a year's statements are final
    pub fn advance(&mut self, record: &PeriodRecord) {
        self.year = record.year;
        self.revenue = record.pl.revenue;
        self.opex_total = record.pl.opex_total;
        self.arr = Some(record.pl.arr);
        self.balance_sheet = record.balance_sheet.clone();
    }
}
