//! Core projection engine for the annual three-statement model

use super::balance_sheet::{project_balance_sheet, WorkingCapitalPosition};
use super::cash_flow::project_cash_flow;
use super::debt::DebtSchedule;
use super::metrics::project_metrics;
use super::pl::project_pl;
use super::records::{PeriodRecord, ProjectionResult};
use super::state::ProjectionState;
use crate::assumptions::Assumptions;
use crate::error::{ModelError, ModelResult};
use crate::history::HistoricalData;

/// Main projection engine
pub struct ProjectionEngine<'a> {
    assumptions: &'a Assumptions,
    debt: DebtSchedule,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(assumptions: &'a Assumptions) -> Self {
        Self {
            assumptions,
            debt: DebtSchedule::from_assumptions(assumptions),
        }
    }

    pub fn debt_schedule(&self) -> &DebtSchedule {
        &self.debt
    }

    /// Project every year of the horizon.
    ///
    /// Years are processed strictly in order: each year's P&L, then cash flow, then
    /// balance sheet, so the closing balance sheet of year N is final before year
    /// N+1's cash flow reads it.
    pub fn project(&self, history: &HistoricalData) -> ModelResult<ProjectionResult> {
        let horizon = self.assumptions.projection;
        if history.years().is_empty() {
            return Err(ModelError::MalformedHistory("no historical years".to_string()));
        }
        let base_year = history.base_year().year;
        if horizon.first_year != base_year + 1 {
            return Err(ModelError::assumption(
                "projection.first_year",
                format!("must follow the base historical year {}", base_year),
            ));
        }

        let mut state = ProjectionState::from_history(history, self.assumptions, &self.debt)?;
        let opening_balance_sheet = state.balance_sheet.clone();
        let mut periods = Vec::with_capacity(horizon.len());

        for year in horizon.years() {
            let record = self.project_year(&state, year)?;
            log::debug!(
                "{}: revenue {:.0}, EBITDA {:.0}, closing cash {:.0}",
                year,
                record.pl.revenue,
                record.pl.ebitda,
                record.balance_sheet.cash
            );
            state.advance(&record);
            periods.push(record);
        }

        let metrics = project_metrics(self.assumptions, history, &periods);
        Ok(ProjectionResult {
            opening_balance_sheet,
            periods,
            metrics,
        })
    }

    fn project_year(&self, state: &ProjectionState, year: i32) -> ModelResult<PeriodRecord> {
        let a = self.assumptions;
        let debt = self.debt.position(year);

        let pl = project_pl(a, state, &debt, year);
        let wc = WorkingCapitalPosition::for_period(&a.working_capital, &pl);
        let cash_flow = project_cash_flow(a, &state.balance_sheet, &pl, &debt, &wc);
        let balance_sheet =
            project_balance_sheet(a, &state.balance_sheet, &pl, &cash_flow, &wc, &self.debt)?;

        Ok(PeriodRecord {
            year,
            pl,
            cash_flow,
            balance_sheet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::load_history_from_reader;
    use crate::history::loader::tests::SAMPLE_CSV;
    use approx::assert_relative_eq;

    fn sample_history() -> HistoricalData {
        load_history_from_reader(SAMPLE_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_projects_full_horizon() {
        let assumptions = Assumptions::default_plan();
        let result = ProjectionEngine::new(&assumptions).project(&sample_history()).unwrap();
        assert_eq!(result.periods.len(), 6);
        assert_eq!(result.metrics.len(), 6);
        assert_eq!(result.periods[0].year, 2025);
        assert_relative_eq!(result.periods[0].pl.revenue, 6_590_000.0 * 1.32, epsilon = 1e-6);
    }

    #[test]
    fn test_balance_sheet_balances_every_year() {
        let assumptions = Assumptions::default_plan();
        let result = ProjectionEngine::new(&assumptions).project(&sample_history()).unwrap();
        for p in &result.periods {
            let bs = &p.balance_sheet;
            assert!(
                (bs.total_assets - bs.total_liabilities - bs.total_equity).abs() <= 1.0,
                "{} does not balance",
                p.year
            );
        }
    }

    #[test]
    fn test_cash_links_across_years() {
        let assumptions = Assumptions::default_plan();
        let result = ProjectionEngine::new(&assumptions).project(&sample_history()).unwrap();

        assert_eq!(result.periods[0].cash_flow.cash_bf, result.opening_balance_sheet.cash);
        for pair in result.periods.windows(2) {
            assert_eq!(pair[1].cash_flow.cash_bf, pair[0].balance_sheet.cash);
        }
        for p in &result.periods {
            assert_eq!(p.cash_flow.cash_cf, p.balance_sheet.cash);
        }
    }

    #[test]
    fn test_series_c_close_year_financing() {
        let assumptions = Assumptions::default_plan();
        let result = ProjectionEngine::new(&assumptions).project(&sample_history()).unwrap();

        let close = result.period(2026).unwrap();
        assert_relative_eq!(close.cash_flow.equity_raised, 9_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(close.cash_flow.debt_drawdowns, 6_000_000.0, epsilon = 1e-6);
        assert!(close.cash_flow.notes_converted > 10_000_000.0);
        // Notes are gone; only the Series C tranches remain
        assert_eq!(close.balance_sheet.debt.len(), 2);

        let prior = result.period(2025).unwrap();
        assert_relative_eq!(
            close.balance_sheet.share_capital,
            prior.balance_sheet.share_capital + 9_000_000.0 + close.cash_flow.notes_converted,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_rerun_is_identical() {
        let assumptions = Assumptions::default_plan();
        let history = sample_history();
        let first = ProjectionEngine::new(&assumptions).project(&history).unwrap();
        let second = ProjectionEngine::new(&assumptions).project(&history).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_horizon_must_follow_base_year() {
        let assumptions = Assumptions::default_plan()
            .with_override("projection.first_year", 2026.0)
            .unwrap();
        let result = ProjectionEngine::new(&assumptions).project(&sample_history());
        assert!(matches!(result, Err(ModelError::InvalidAssumption { .. })));
    }

    #[test]
    fn test_headcount_compounds_from_base() {
        let assumptions = Assumptions::default_plan();
        let result = ProjectionEngine::new(&assumptions).project(&sample_history()).unwrap();
        assert_relative_eq!(result.metrics[0].employees, 112.0 * 0.98, epsilon = 1e-9);
        assert_relative_eq!(result.metrics[1].employees, 112.0 * 0.98 * 1.03, epsilon = 1e-9);
    }
}
