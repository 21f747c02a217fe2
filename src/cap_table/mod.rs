//! Capitalization table: share issuance, dilution and conversion across rounds

mod engine;
mod round;

pub use engine::{
    pool_top_up_shares, CapTable, CapTableEngine, CapTableEntry, CapTableSummary, RoundSnapshot,
};
pub use round::{rounds_from_assumptions, FinancingRound, RoundKind, SecurityClass};

use crate::assumptions::Assumptions;
use crate::error::ModelResult;

/// Run the company's full financing history, closing with the Series C at `series_c_pre_money`
pub fn build_cap_table(assumptions: &Assumptions, series_c_pre_money: f64) -> ModelResult<CapTable> {
    let financing = &assumptions.financing;
    let rounds = rounds_from_assumptions(financing, series_c_pre_money);

    let mut engine = CapTableEngine::new(&financing.option_pool_holder, assumptions.ownership_tolerance);
    engine.apply_all(&rounds)?;
    let table = engine.finish();

    if let Some(latest) = table.latest() {
        log::info!(
            "Cap table: {} rounds, {:.0} shares, post-money {:.0}",
            table.rounds.len(),
            latest.total_shares,
            latest.post_money
        );
    }
    Ok(table)
}
