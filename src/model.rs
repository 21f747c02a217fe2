//! End-to-end model run: projection, cap table and exit

use crate::assumptions::{loader, Assumptions};
use crate::cap_table::{build_cap_table, CapTable};
use crate::error::{ModelError, ModelResult};
use crate::exit::{analyze_exit, ExitAnalysis};
use crate::history::{load_history, HistoricalData};
use crate::projection::{historical_metrics, OperatingMetrics, ProjectionEngine, ProjectionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Results of one model run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub history: HistoricalData,
    pub historical_metrics: Vec<OperatingMetrics>,
    pub projection: ProjectionResult,
    /// Series C pre-money, from projected ARR in the close year
    pub series_c_pre_money: f64,
    pub cap_table: CapTable,
    pub exit: ExitAnalysis,
}

/// Historical actuals plus assumptions, ready to run
#[derive(Debug, Clone)]
pub struct FinancialModel {
    assumptions: Assumptions,
    history: HistoricalData,
}

impl FinancialModel {
    pub fn new(assumptions: Assumptions, history: HistoricalData) -> ModelResult<Self> {
        assumptions.validate()?;
        // History can also arrive deserialized, bypassing the CSV loader's checks
        if history.years().is_empty() {
            return Err(ModelError::MalformedHistory("no historical years".to_string()));
        }
        Ok(Self {
            assumptions,
            history,
        })
    }

    /// Load history from CSV and, optionally, assumptions from JSON (default plan otherwise)
    pub fn load(history_path: &Path, assumptions_path: Option<&Path>) -> ModelResult<Self> {
        let history = load_history(history_path)?;
        let assumptions = match assumptions_path {
            Some(path) => loader::load_assumptions(path)?,
            None => Assumptions::default_plan(),
        };
        Self::new(assumptions, history)
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn history(&self) -> &HistoricalData {
        &self.history
    }

    /// Same history, different assumptions
    pub fn with_assumptions(&self, assumptions: Assumptions) -> ModelResult<Self> {
        Self::new(assumptions, self.history.clone())
    }

    /// Run the whole model. Pure: the same inputs always give the same output.
    pub fn run(&self) -> ModelResult<ModelOutput> {
        let a = &self.assumptions;
        let engine = ProjectionEngine::new(a);
        let projection = engine.project(&self.history)?;

        let close_year = a.financing.series_c.close_year();
        let arr_at_close = projection
            .period(close_year)
            .map(|p| p.pl.arr)
            .ok_or_else(|| ModelError::InvalidInput(format!("Series C year {} was not projected", close_year)))?;
        let series_c_pre_money = a.financing.series_c.pre_money(arr_at_close);

        let cap_table = build_cap_table(a, series_c_pre_money)?;
        let exit = analyze_exit(a, &projection, engine.debt_schedule(), &cap_table)?;

        Ok(ModelOutput {
            history: self.history.clone(),
            historical_metrics: historical_metrics(&self.history),
            projection,
            series_c_pre_money,
            cap_table,
            exit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::load_history_from_reader;
    use crate::history::loader::tests::SAMPLE_CSV;
    use approx::assert_relative_eq;

    fn model(assumptions: Assumptions) -> FinancialModel {
        let history = load_history_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        FinancialModel::new(assumptions, history).unwrap()
    }

    #[test]
    fn test_full_run_holds_invariants() {
        let output = model(Assumptions::default_plan()).run().unwrap();

        for p in &output.projection.periods {
            let bs = &p.balance_sheet;
            assert!((bs.total_assets - bs.total_liabilities - bs.total_equity).abs() <= 1.0);
        }
        for snap in &output.cap_table.rounds {
            let total: f64 = snap.entries.iter().map(|e| e.ownership).sum();
            assert!((total - 1.0).abs() <= 1e-4);
        }

        let w = &output.exit.waterfall;
        assert_relative_eq!(w.total_distributed, w.proceeds, epsilon = 1e-3);
        assert_eq!(w.undistributed, 0.0);
    }

    #[test]
    fn test_empty_history_is_rejected() {
        let history: HistoricalData = serde_json::from_str(r#"{"years":[]}"#).unwrap();
        let result = FinancialModel::new(Assumptions::default_plan(), history);
        assert!(matches!(result, Err(ModelError::MalformedHistory(_))));
    }

    #[test]
    fn test_zero_base_year_arr_uses_fallback_ratio() {
        let csv = SAMPLE_CSV.replace("ARR,5360000,8100000", "ARR,5360000,0");
        let history = load_history_from_reader(csv.as_bytes()).unwrap();
        let a = Assumptions::default_plan();
        let output = FinancialModel::new(a.clone(), history).unwrap().run().unwrap();

        let first = &output.projection.periods[0].pl;
        assert_eq!(first.year, 2025);
        assert_relative_eq!(first.arr, first.revenue * a.arr_fallback_ratio, epsilon = 1e-6);
        assert!(output.series_c_pre_money > 0.0);
    }

    #[test]
    fn test_exit_before_series_c_close_is_rejected() {
        let result = Assumptions::default_plan().with_override("exit.exit_year", 2025.0);
        assert!(matches!(result, Err(ModelError::InvalidAssumption { .. })));
    }

    #[test]
    fn test_series_c_priced_off_close_year_arr() {
        let output = model(Assumptions::default_plan()).run().unwrap();
        let arr_2026 = output.projection.period(2026).unwrap().pl.arr;
        assert_relative_eq!(output.series_c_pre_money, arr_2026 * 6.0, epsilon = 1e-6);
        assert_relative_eq!(arr_2026, 8_100_000.0 * 1.32 * 1.38, epsilon = 1e-6);

        let snap = output.cap_table.round("Series C").unwrap();
        assert_relative_eq!(snap.pre_money, output.series_c_pre_money, epsilon = 1e-6);
    }

    #[test]
    fn test_exit_repays_only_unconverted_debt() {
        let output = model(Assumptions::default_plan()).run().unwrap();
        let names: Vec<&str> = output
            .exit
            .valuation
            .debt_repaid
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["Series C Debt", "Series C Convertible"]);
        assert_relative_eq!(
            output.exit.valuation.total_debt,
            3_000_000.0 * 1.10f64.powi(5) + 3_000_000.0 * 1.08f64.powi(5),
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_run_is_idempotent() {
        let m = model(Assumptions::default_plan());
        assert_eq!(m.run().unwrap(), m.run().unwrap());
    }

    #[test]
    fn test_twenty_percent_growth_from_ten_million() {
        let history = load_history_from_reader(SAMPLE_CSV.replace("\"6,590,000\"", "10000000").as_bytes()).unwrap();
        let assumptions = Assumptions::default_plan()
            .with_override("revenue_growth.rates.2025", 0.20)
            .unwrap();
        let output = FinancialModel::new(assumptions, history).unwrap().run().unwrap();
        assert_relative_eq!(output.projection.periods[0].pl.revenue, 12_000_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_overrides_flow_through() {
        let base = model(Assumptions::default_plan());
        let bull = base
            .with_assumptions(
                Assumptions::default_plan()
                    .with_override("exit.arr_multiple", 12.0)
                    .unwrap(),
            )
            .unwrap();
        let base_out = base.run().unwrap();
        let bull_out = bull.run().unwrap();
        assert!(bull_out.exit.valuation.enterprise_value >= base_out.exit.valuation.enterprise_value);
        assert_eq!(base_out.projection, bull_out.projection);
    }
}
