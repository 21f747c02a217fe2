//! Historical actuals in the same shape the projection produces

use serde::{Deserialize, Serialize};

/// One fiscal year of reported actuals.
///
/// P&L cost lines and cash outflows keep the reported (negative) sign;
/// balance sheet totals are positive magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalYear {
    pub year: i32,

    // P&L
    pub revenue: f64,
    pub gross_profit: f64,
    pub gross_margin: f64,
    pub product_dev: f64,
    pub sales_marketing: f64,
    pub customer_success: f64,
    pub ga: f64,
    pub opex_total: f64,
    pub ebitda: f64,
    pub interest: f64,
    pub da: f64,
    pub exceptional_items: f64,
    pub tax: f64,
    pub net_income: f64,

    // Cash flow
    pub operating_cf: f64,
    pub investing_cf: f64,
    pub financing_cf: f64,
    pub net_change_in_cash: f64,
    pub cash_bf: f64,
    pub cash_cf: f64,

    // Balance sheet
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub net_assets: f64,

    // Operating metrics
    pub employees: f64,
    /// Not reported for the earliest years
    pub arr: Option<f64>,
    pub revenue_per_employee: f64,
    pub opex_per_employee: f64,
}

impl HistoricalYear {
    pub fn cost_of_sales(&self) -> f64 {
        -(self.revenue - self.gross_profit)
    }

    pub fn profit_before_tax(&self) -> f64 {
        self.ebitda + self.interest + self.da + self.exceptional_items
    }

    pub fn ebitda_margin(&self) -> f64 {
        if self.revenue > 0.0 {
            self.ebitda / self.revenue
        } else {
            0.0
        }
    }
}

/// All loaded historical years, ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalData {
    years: Vec<HistoricalYear>,
}

impl HistoricalData {
    /// Wrap loaded years. Callers go through the loader, which guarantees at least one year.
    pub(crate) fn new(mut years: Vec<HistoricalYear>) -> Self {
        years.sort_by_key(|y| y.year);
        Self { years }
    }

    pub fn years(&self) -> &[HistoricalYear] {
        &self.years
    }

    pub fn get(&self, year: i32) -> Option<&HistoricalYear> {
        self.years.iter().find(|y| y.year == year)
    }

    /// The latest reported year, which seeds the projection
    pub fn base_year(&self) -> &HistoricalYear {
        // The loader and FinancialModel::new both reject empty tables.
        &self.years[self.years.len() - 1]
    }

    /// Revenue growth for a reported year, if the prior year is also reported
    pub fn revenue_growth(&self, year: i32) -> Option<f64> {
        let current = self.get(year)?;
        let prior = self.get(year - 1)?;
        if prior.revenue > 0.0 {
            Some(current.revenue / prior.revenue - 1.0)
        } else {
            None
        }
    }
}
