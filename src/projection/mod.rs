//! Annual three-statement projection: P&L, cash flow and balance sheet

mod balance_sheet;
mod cash_flow;
mod debt;
mod engine;
mod metrics;
mod pl;
mod records;
mod state;

pub use balance_sheet::{check_identity, opening_balance_sheet, WorkingCapitalPosition};
pub use debt::{DebtInstrument, DebtMovement, DebtPosition, DebtSchedule};
pub use engine::ProjectionEngine;
pub use metrics::historical_metrics;
pub use records::{
    BalanceSheet, CashFlowStatement, DebtBalance, OperatingMetrics, PeriodRecord, ProfitAndLoss,
    ProjectionResult, ProjectionSummary,
};
pub use state::ProjectionState;
