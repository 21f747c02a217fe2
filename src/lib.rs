//! Financial model for a venture-backed SaaS company
//!
//! This library provides:
//! - Historical actuals loaded from the finance team's CSV export
//! - Three-statement projection (P&L, cash flow, balance sheet) with operating metrics
//! - Debt schedule for convertible notes and venture debt
//! - Cap table through each financing round, including note conversion and pool top-ups
//! - Exit valuation, liquidation waterfall and investor returns
//! - Scenario sensitivity analysis

pub mod assumptions;
pub mod cap_table;
pub mod error;
pub mod exit;
pub mod history;
pub mod model;
pub mod projection;
pub mod report;
pub mod scenario;

// Re-export commonly used types
pub use assumptions::Assumptions;
pub use cap_table::{CapTable, CapTableEngine};
pub use error::{ModelError, ModelResult};
pub use exit::{run_waterfall, ExitAnalysis, WaterfallResult};
pub use history::HistoricalData;
pub use model::{FinancialModel, ModelOutput};
pub use projection::{ProjectionEngine, ProjectionResult};
pub use report::StatementTable;
pub use scenario::{Scenario, SensitivityAnalyzer};
