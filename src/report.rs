//! Tabular views of model output for the CLI and the JSON endpoint
//!
//! A `StatementTable` is a title, a list of column headers and labelled rows of
//! values. Blank cells are `None` (e.g. an ARR figure missing from early history).
//! Tables know how to write themselves as CSV and as fixed-width text.

use crate::cap_table::{CapTable, RoundSnapshot};
use crate::error::ModelResult;
use crate::exit::{HolderReturn, WaterfallResult};
use crate::history::HistoricalData;
use crate::projection::{BalanceSheet, CashFlowStatement, OperatingMetrics, ProjectionResult};
use crate::scenario::SensitivityTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl StatementTable {
    pub fn new(title: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            title: title.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, values: Vec<Option<f64>>) {
        self.rows.push(TableRow {
            label: label.into(),
            values,
        });
    }

    pub fn row(&self, label: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    /// Value at (row label, column header)
    pub fn value(&self, label: &str, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.row(label).and_then(|r| r.values.get(col).copied().flatten())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> ModelResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec![self.title.clone()];
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.label.clone()];
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|x| format!("{:.4}", x)).unwrap_or_default()),
            );
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> ModelResult<()> {
        let file = File::create(path)?;
        self.write_csv(file)
    }

    /// File-friendly version of the title, e.g. "Income Statement" -> "income_statement"
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.title.len());
        for c in self.title.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('_') {
                slug.push('_');
            }
        }
        slug.trim_matches('_').to_string()
    }
}

/// Large numbers with thousands separators; ratios (|x| < 10) with four decimals
fn format_cell(value: Option<f64>) -> String {
    let Some(v) = value else {
        return "-".to_string();
    };
    if v.abs() < 10.0 {
        return format!("{:.4}", v);
    }
    let rounded = format!("{:.0}", v.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, c) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if v < 0.0 {
        format!("({})", grouped)
    } else {
        grouped
    }
}

impl fmt::Display for StatementTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self
            .rows
            .iter()
            .map(|r| r.label.len())
            .chain(std::iter::once(self.title.len()))
            .max()
            .unwrap_or(0);
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.values.iter().map(|v| format_cell(*v)).collect())
            .collect();
        let col_width = cells
            .iter()
            .flatten()
            .map(|c| c.len())
            .chain(self.columns.iter().map(|c| c.len()))
            .max()
            .unwrap_or(0)
            .max(8);

        write!(f, "{:<width$}", self.title, width = label_width)?;
        for c in &self.columns {
            write!(f, " {:>width$}", c, width = col_width)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(label_width + (col_width + 1) * self.columns.len()))?;

        for (row, values) in self.rows.iter().zip(&cells) {
            write!(f, "{:<width$}", row.label, width = label_width)?;
            for v in values {
                write!(f, " {:>width$}", v, width = col_width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn year_columns(years: &[i32]) -> Vec<String> {
    years.iter().map(|y| y.to_string()).collect()
}

/// Historical actuals followed by projected years
pub fn income_statement(history: &HistoricalData, projection: &ProjectionResult) -> StatementTable {
    let hist = history.years();
    let years: Vec<i32> = hist
        .iter()
        .map(|h| h.year)
        .chain(projection.periods.iter().map(|p| p.year))
        .collect();
    let mut table = StatementTable::new("Income Statement", year_columns(&years));

    macro_rules! pl_line {
        ($label:expr, $h:expr, $p:expr) => {{
            let values = hist
                .iter()
                .map($h)
                .chain(projection.periods.iter().map(|p| &p.pl).map($p))
                .collect();
            table.push($label, values);
        }};
    }

    pl_line!("Revenue", |h| Some(h.revenue), |pl| Some(pl.revenue));
    pl_line!(
        "Revenue Growth %",
        |h| history.revenue_growth(h.year),
        |pl| Some(pl.revenue_growth)
    );
    pl_line!("ARR", |h| h.arr, |pl| Some(pl.arr));
    pl_line!("Cost of Sales", |h| Some(h.cost_of_sales()), |pl| Some(pl.cost_of_sales));
    pl_line!("Gross Profit", |h| Some(h.gross_profit), |pl| Some(pl.gross_profit));
    pl_line!("Gross Margin %", |h| Some(h.gross_margin), |pl| Some(pl.gross_margin));
    pl_line!("Product Development", |h| Some(h.product_dev), |pl| Some(pl.product_dev));
    pl_line!("Sales & Marketing", |h| Some(h.sales_marketing), |pl| Some(pl.sales_marketing));
    pl_line!("Customer Success", |h| Some(h.customer_success), |pl| Some(pl.customer_success));
    pl_line!("G&A", |h| Some(h.ga), |pl| Some(pl.ga));
    pl_line!("Operating Expenses", |h| Some(h.opex_total), |pl| Some(pl.opex_total));
    pl_line!("EBITDA", |h| Some(h.ebitda), |pl| Some(pl.ebitda));
    pl_line!("EBITDA Margin %", |h| Some(h.ebitda_margin()), |pl| Some(pl.ebitda_margin));
    pl_line!("DA", |h| Some(h.da), |pl| Some(pl.da));
    pl_line!("Interest", |h| Some(h.interest), |pl| Some(pl.interest));
    pl_line!("Exceptional Items", |h| Some(h.exceptional_items), |pl| Some(pl.exceptional_items));
    pl_line!("Profit Before Tax", |h| Some(h.profit_before_tax()), |pl| Some(pl.profit_before_tax));
    pl_line!("Tax", |h| Some(h.tax), |pl| Some(pl.tax));
    pl_line!("Net Income", |h| Some(h.net_income), |pl| Some(pl.net_income));

    table
}

pub fn cash_flow_statement(projection: &ProjectionResult) -> StatementTable {
    let years: Vec<i32> = projection.periods.iter().map(|p| p.year).collect();
    let mut table = StatementTable::new("Cash Flow Statement", year_columns(&years));
    let cfs: Vec<_> = projection.periods.iter().map(|p| &p.cash_flow).collect();

    let mut line = |label: &str, f: fn(&CashFlowStatement) -> f64| {
        table.push(label, cfs.iter().map(|cf| Some(f(cf))).collect());
    };
    line("Net Income", |cf| cf.net_income);
    line("DA Add-back", |cf| cf.da_addback);
    line("Non-cash Interest", |cf| cf.non_cash_interest);
    line("Change in Receivables", |cf| cf.change_in_receivables);
    line("Change in Inventory", |cf| cf.change_in_inventory);
    line("Change in Payables", |cf| cf.change_in_payables);
    line("Exceptional Payment", |cf| cf.exceptional_payment);
    line("Operating Cash Flow", |cf| cf.operating_cf);
    line("Capex", |cf| cf.capex);
    line("Investing Cash Flow", |cf| cf.investing_cf);
    line("Debt Drawdowns", |cf| cf.debt_drawdowns);
    line("Debt Repayments", |cf| cf.debt_repayments);
    line("Equity Raised", |cf| cf.equity_raised);
    line("Financing Cash Flow", |cf| cf.financing_cf);
    line("Net Change in Cash", |cf| cf.net_change_in_cash);
    line("Cash Balance b/f", |cf| cf.cash_bf);
    line("Cash Balance c/f", |cf| cf.cash_cf);
    line("Free Cash Flow", |cf| cf.free_cash_flow());
    line("Notes Converted (non-cash)", |cf| cf.notes_converted);

    table
}

/// Opening balance sheet followed by each projected year
pub fn balance_sheet(projection: &ProjectionResult) -> StatementTable {
    let sheets: Vec<&BalanceSheet> = std::iter::once(&projection.opening_balance_sheet)
        .chain(projection.periods.iter().map(|p| &p.balance_sheet))
        .collect();
    let years: Vec<i32> = sheets.iter().map(|bs| bs.year).collect();
    let mut table = StatementTable::new("Balance Sheet", year_columns(&years));

    let mut line = |label: &str, f: &dyn Fn(&BalanceSheet) -> f64| {
        table.push(label, sheets.iter().map(|bs| Some(f(bs))).collect());
    };
    line("Cash", &|bs| bs.cash);
    line("Receivables", &|bs| bs.receivables);
    line("Inventory", &|bs| bs.inventory);
    line("Fixed Assets", &|bs| bs.fixed_assets);
    line("Total Assets", &|bs| bs.total_assets);
    line("Payables", &|bs| bs.payables);

    // One row per instrument, in the order they first appear
    let mut names: Vec<&str> = Vec::new();
    for bs in &sheets {
        for d in &bs.debt {
            if !names.contains(&d.name.as_str()) {
                names.push(d.name.as_str());
            }
        }
    }
    for name in names {
        let values = sheets
            .iter()
            .map(|bs| {
                Some(
                    bs.debt
                        .iter()
                        .filter(|d| d.name == name)
                        .map(|d| d.balance)
                        .sum(),
                )
            })
            .collect();
        table.push(format!("  {}", name), values);
    }

    let mut line = |label: &str, f: &dyn Fn(&BalanceSheet) -> f64| {
        table.push(label, sheets.iter().map(|bs| Some(f(bs))).collect());
    };
    line("Total Debt", &|bs| bs.total_debt);
    line("Exceptional Liability", &|bs| bs.exceptional_liability);
    line("Other Liabilities", &|bs| bs.other_liabilities);
    line("Total Liabilities", &|bs| bs.total_liabilities);
    line("Share Capital", &|bs| bs.share_capital);
    line("Retained Earnings", &|bs| bs.retained_earnings);
    line("Total Equity", &|bs| bs.total_equity);
    line("Net Assets", &|bs| bs.net_assets());
    line("Rounding Residual", &|bs| bs.rounding_residual);

    table
}

/// Historical and projected operating metrics side by side
pub fn metrics_table(historical: &[OperatingMetrics], projected: &[OperatingMetrics]) -> StatementTable {
    let all: Vec<&OperatingMetrics> = historical.iter().chain(projected).collect();
    let years: Vec<i32> = all.iter().map(|m| m.year).collect();
    let mut table = StatementTable::new("Operating Metrics", year_columns(&years));

    let mut line = |label: &str, f: fn(&OperatingMetrics) -> Option<f64>| {
        table.push(label, all.iter().map(|m| f(m)).collect());
    };
    line("Employees", |m| Some(m.employees));
    line("ARR", |m| m.arr);
    line("Net New ARR", |m| m.net_new_arr);
    line("Gross Margin %", |m| Some(m.gross_margin));
    line("EBITDA Margin %", |m| Some(m.ebitda_margin));
    line("Rule of 40", |m| m.rule_of_40);
    line("Revenue per Employee", |m| Some(m.revenue_per_employee));
    line("Opex per Employee", |m| Some(m.opex_per_employee));
    line("Burn Multiple", |m| m.burn_multiple);
    line("Runway (months)", |m| m.runway_months);

    table
}

/// Holders after one round
pub fn cap_table_snapshot(snapshot: &RoundSnapshot) -> StatementTable {
    let columns = ["Shares", "Invested", "Ownership %", "Preference"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let mut table = StatementTable::new(format!("Cap Table after {}", snapshot.round), columns);
    for e in &snapshot.entries {
        table.push(
            format!("{} ({})", e.holder, e.class_name),
            vec![
                Some(e.shares),
                Some(e.invested),
                Some(e.ownership),
                Some(e.preference_amount()),
            ],
        );
    }
    table.push(
        "Total",
        vec![
            Some(snapshot.total_shares),
            Some(snapshot.entries.iter().map(|e| e.invested).sum()),
            Some(snapshot.entries.iter().map(|e| e.ownership).sum()),
            Some(snapshot.entries.iter().map(|e| e.preference_amount()).sum()),
        ],
    );
    table
}

/// Pricing of each round in order
pub fn round_summary(cap_table: &CapTable) -> StatementTable {
    let columns = cap_table.rounds.iter().map(|r| r.round.clone()).collect();
    let mut table = StatementTable::new("Financing Rounds", columns);

    let mut line = |label: &str, f: fn(&RoundSnapshot) -> f64| {
        table.push(label, cap_table.rounds.iter().map(|r| Some(f(r))).collect());
    };
    line("Year", |r| r.year as f64);
    line("Investment", |r| r.investment);
    line("Price per Share", |r| r.price_per_share);
    line("Pre-money", |r| r.pre_money);
    line("Post-money", |r| r.post_money);
    line("Pool Top-up Shares", |r| r.pool_top_up_shares);
    line("Converted Note Shares", |r| r.converted_note_shares);
    line("New Investor Shares", |r| r.new_investor_shares);
    line("Total Shares", |r| r.total_shares);
    line("Notes Outstanding", |r| r.notes_outstanding);

    let founder = &cap_table.founder_holder;
    let pool = &cap_table.pool_holder;
    table.push(
        format!("{} Ownership %", founder),
        cap_table.rounds.iter().map(|r| Some(r.ownership_of(founder))).collect(),
    );
    table.push(
        format!("{} Ownership %", pool),
        cap_table.rounds.iter().map(|r| Some(r.ownership_of(pool))).collect(),
    );
    table
}

/// Exit payouts with returns where the holder put cash in
pub fn waterfall_table(waterfall: &WaterfallResult, returns: &[HolderReturn]) -> StatementTable {
    let columns = [
        "Shares",
        "Preference Claim",
        "Preference Paid",
        "Residual Paid",
        "Total",
        "MoIC",
        "IRR",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    let mut table = StatementTable::new("Exit Waterfall", columns);

    for p in &waterfall.payouts {
        let ret = returns
            .iter()
            .find(|r| r.holder == p.holder && r.class_name == p.class_name);
        table.push(
            format!("{} ({}, {:?})", p.holder, p.class_name, p.status),
            vec![
                Some(p.shares),
                Some(p.preference_claim),
                Some(p.preference_paid),
                Some(p.residual_paid),
                Some(p.total),
                ret.map(|r| r.moic),
                ret.and_then(|r| r.irr),
            ],
        );
    }
    table.push(
        "Total",
        vec![
            None,
            Some(waterfall.total_preference_claims),
            Some(waterfall.payouts.iter().map(|p| p.preference_paid).sum()),
            Some(waterfall.payouts.iter().map(|p| p.residual_paid).sum()),
            Some(waterfall.total_distributed),
            None,
            None,
        ],
    );
    if waterfall.undistributed > 0.0 {
        table.push(
            "Undistributed",
            vec![None, None, None, None, Some(waterfall.undistributed), None, None],
        );
    }
    table
}

pub fn sensitivity_table(suite: &SensitivityTable) -> StatementTable {
    let columns = [
        "Profitability Year",
        "Series C Pre-money",
        "Exit ARR",
        "Exit EBITDA",
        "Exit EBITDA Margin",
        "Exit Valuation",
        "Equity Proceeds",
        "Final Cash",
        "Rule of 40",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    let mut table = StatementTable::new(format!("Sensitivity - {}", suite.name), columns);
    for row in &suite.rows {
        table.push(
            row.scenario.clone(),
            vec![
                row.profitability_year.map(f64::from),
                Some(row.series_c_pre_money),
                Some(row.exit_arr),
                Some(row.exit_ebitda),
                Some(row.exit_ebitda_margin),
                Some(row.exit_valuation),
                Some(row.equity_proceeds),
                Some(row.final_cash),
                row.rule_of_40_at_exit,
            ],
        );
    }
    table
}
