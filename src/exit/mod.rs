//! Exit analysis: valuation, debt payoff, liquidation waterfall and returns

mod irr;
mod returns;
mod valuation;
mod waterfall;

pub use irr::annual_irr;
pub use returns::{holder_returns, HolderReturn};
pub use valuation::{value_exit, ExitValuation};
pub use waterfall::{run_waterfall, Payout, PayoutStatus, PreferenceShortfall, WaterfallResult};

use crate::assumptions::Assumptions;
use crate::cap_table::CapTable;
use crate::error::{ModelError, ModelResult};
use crate::projection::{DebtSchedule, ProjectionResult};
use serde::{Deserialize, Serialize};

/// Everything that happens at the exit date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitAnalysis {
    pub valuation: ExitValuation,
    pub waterfall: WaterfallResult,
    pub returns: Vec<HolderReturn>,
}

/// Value the exit year, repay debt and run the waterfall over the cap table as of that year
pub fn analyze_exit(
    assumptions: &Assumptions,
    projection: &ProjectionResult,
    debt: &DebtSchedule,
    cap_table: &CapTable,
) -> ModelResult<ExitAnalysis> {
    let exit_year = assumptions.exit.exit_year;
    let period = projection.period(exit_year).ok_or_else(|| {
        ModelError::InvalidInput(format!("exit year {} was not projected", exit_year))
    })?;
    let entries = cap_table
        .as_of(exit_year)
        .map(|s| s.entries.as_slice())
        .ok_or_else(|| ModelError::InvalidInput(format!("no cap table round closed by {}", exit_year)))?;

    let valuation = value_exit(&assumptions.exit, &period.pl, debt);
    let waterfall = run_waterfall(entries, valuation.equity_proceeds)?;
    let returns = holder_returns(&assumptions.financing, &waterfall, exit_year);

    log::info!(
        "Exit {}: enterprise value {:.0}, debt repaid {:.0}, equity proceeds {:.0}",
        exit_year,
        valuation.enterprise_value,
        valuation.total_debt,
        valuation.equity_proceeds
    );

    Ok(ExitAnalysis {
        valuation,
        waterfall,
        returns,
    })
}
