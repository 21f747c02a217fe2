//! Output structures for the projected statements

use serde::{Deserialize, Serialize};

/// Projected income statement for one fiscal year. Costs are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub year: i32,

    pub revenue: f64,
    pub revenue_growth: f64,
    pub arr: f64,
    pub cost_of_sales: f64,
    pub gross_profit: f64,
    pub gross_margin: f64,

    // Operating expenses by function
    pub product_dev: f64,
    pub sales_marketing: f64,
    pub customer_success: f64,
    pub ga: f64,
    pub opex_total: f64,

    pub ebitda: f64,
    pub ebitda_margin: f64,
    pub da: f64,
    pub interest: f64,
    pub exceptional_items: f64,
    pub profit_before_tax: f64,
    pub tax: f64,
    pub net_income: f64,
}

/// Projected cash flow statement (indirect method). Outflows are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub year: i32,

    // Operating
    pub net_income: f64,
    pub da_addback: f64,
    pub non_cash_interest: f64,
    pub change_in_receivables: f64,
    pub change_in_inventory: f64,
    pub change_in_payables: f64,
    pub exceptional_payment: f64,
    pub operating_cf: f64,

    // Investing
    pub capex: f64,
    pub investing_cf: f64,

    // Financing
    pub debt_drawdowns: f64,
    pub debt_repayments: f64,
    pub equity_raised: f64,
    pub financing_cf: f64,

    pub net_change_in_cash: f64,
    pub cash_bf: f64,
    pub cash_cf: f64,

    /// Non-cash: note balances converted into share capital
    pub notes_converted: f64,
}

impl CashFlowStatement {
    /// Operating plus investing cash flow (negative when burning cash)
    pub fn free_cash_flow(&self) -> f64 {
        self.operating_cf + self.investing_cf
    }
}

/// Closing balance of one debt instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtBalance {
    pub name: String,
    pub balance: f64,
}

/// Balance sheet at the end of a fiscal year. All lines are positive magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub year: i32,

    // Assets
    pub cash: f64,
    pub receivables: f64,
    pub inventory: f64,
    /// Fixed and other non-current assets, net of depreciation
    pub fixed_assets: f64,
    pub total_assets: f64,

    // Liabilities
    pub payables: f64,
    pub debt: Vec<DebtBalance>,
    pub total_debt: f64,
    pub exceptional_liability: f64,
    /// Liabilities carried at the base-year amount
    pub other_liabilities: f64,
    pub total_liabilities: f64,

    // Equity
    pub share_capital: f64,
    pub retained_earnings: f64,
    pub total_equity: f64,

    /// assets - (liabilities + equity), within the configured tolerance
    pub rounding_residual: f64,
}

impl BalanceSheet {
    pub fn net_assets(&self) -> f64 {
        self.total_assets - self.total_liabilities
    }
}

/// Operating ratios for one fiscal year (historical or projected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingMetrics {
    pub year: i32,
    pub employees: f64,
    pub arr: Option<f64>,
    pub net_new_arr: Option<f64>,
    pub gross_margin: f64,
    pub ebitda_margin: f64,
    /// Revenue growth % plus EBITDA margin %, in percentage points
    pub rule_of_40: Option<f64>,
    pub revenue_per_employee: f64,
    pub opex_per_employee: f64,
    /// Net cash burn / net new ARR, only while burning cash and growing ARR
    pub burn_multiple: Option<f64>,
    /// Months of cash at the current burn rate, only while burning cash
    pub runway_months: Option<f64>,
}

/// All three statements for one projected fiscal year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub year: i32,
    pub pl: ProfitAndLoss,
    pub cash_flow: CashFlowStatement,
    pub balance_sheet: BalanceSheet,
}

/// Complete projection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    /// Balance sheet derived from the base historical year
    pub opening_balance_sheet: BalanceSheet,

    /// Projected periods in chronological order
    pub periods: Vec<PeriodRecord>,

    /// Operating metrics for each projected period
    pub metrics: Vec<OperatingMetrics>,
}

impl ProjectionResult {
    pub fn period(&self, year: i32) -> Option<&PeriodRecord> {
        self.periods.iter().find(|p| p.year == year)
    }

    pub fn metrics_for(&self, year: i32) -> Option<&OperatingMetrics> {
        self.metrics.iter().find(|m| m.year == year)
    }

    /// Get summary statistics
    pub fn summary(&self) -> ProjectionSummary {
        let total_revenue: f64 = self.periods.iter().map(|p| p.pl.revenue).sum();
        let total_net_income: f64 = self.periods.iter().map(|p| p.pl.net_income).sum();
        let cumulative_free_cash_flow: f64 =
            self.periods.iter().map(|p| p.cash_flow.free_cash_flow()).sum();

        let first_ebitda_positive_year = self
            .periods
            .iter()
            .find(|p| p.pl.ebitda > 0.0)
            .map(|p| p.year);
        let minimum_cash = self
            .periods
            .iter()
            .map(|p| p.balance_sheet.cash)
            .fold(f64::INFINITY, f64::min);
        let last = self.periods.last();

        ProjectionSummary {
            total_years: self.periods.len() as u32,
            total_revenue,
            total_net_income,
            cumulative_free_cash_flow,
            first_ebitda_positive_year,
            minimum_cash: if minimum_cash.is_finite() { minimum_cash } else { 0.0 },
            final_revenue: last.map(|p| p.pl.revenue).unwrap_or(0.0),
            final_arr: last.map(|p| p.pl.arr).unwrap_or(0.0),
            final_cash: last.map(|p| p.balance_sheet.cash).unwrap_or(0.0),
        }
    }
}

/// Summary statistics for a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub total_years: u32,
    pub total_revenue: f64,
    pub total_net_income: f64,
    pub cumulative_free_cash_flow: f64,
    pub first_ebitda_positive_year: Option<i32>,
    pub minimum_cash: f64,
    pub final_revenue: f64,
    pub final_arr: f64,
    pub final_cash: f64,
}
