//! Sensitivity analysis: rerun the model under named sets of assumption overrides
//!
//! History is loaded once and shared; each scenario copies the base assumptions,
//! applies its overrides and runs independently, so suites fan out over rayon.

use crate::assumptions::Assumptions;
use crate::error::ModelResult;
use crate::model::{FinancialModel, ModelOutput};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A named set of dotted-path overrides, e.g. `revenue_growth.rates.2025 = 0.45`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub overrides: Vec<(String, f64)>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: Vec::new(),
        }
    }

    pub fn with(mut self, path: impl Into<String>, value: f64) -> Self {
        self.overrides.push((path.into(), value));
        self
    }

    /// One override per year on a `YearSchedule` field, starting at `first_year`
    pub fn with_yearly(mut self, schedule: &str, first_year: i32, values: &[f64]) -> Self {
        for (offset, &value) in values.iter().enumerate() {
            let year = first_year + offset as i32;
            self.overrides.push((format!("{}.rates.{}", schedule, year), value));
        }
        self
    }

    pub fn apply(&self, base: &Assumptions) -> ModelResult<Assumptions> {
        base.with_overrides(self.overrides.iter().map(|(p, v)| (p.as_str(), *v)))
    }
}

/// Headline results of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: String,
    /// First projected year with positive EBITDA
    pub profitability_year: Option<i32>,
    pub series_c_pre_money: f64,
    pub exit_arr: f64,
    pub exit_ebitda: f64,
    pub exit_ebitda_margin: f64,
    pub exit_valuation: f64,
    pub equity_proceeds: f64,
    pub final_cash: f64,
    pub rule_of_40_at_exit: Option<f64>,
}

impl ScenarioSummary {
    pub fn from_output(scenario: &str, output: &ModelOutput, exit_year: i32) -> Self {
        let projection = &output.projection;
        let exit_pl = projection.period(exit_year).map(|p| &p.pl);
        let summary = projection.summary();

        Self {
            scenario: scenario.to_string(),
            profitability_year: summary.first_ebitda_positive_year,
            series_c_pre_money: output.series_c_pre_money,
            exit_arr: exit_pl.map(|pl| pl.arr).unwrap_or(0.0),
            exit_ebitda: exit_pl.map(|pl| pl.ebitda).unwrap_or(0.0),
            exit_ebitda_margin: exit_pl.map(|pl| pl.ebitda_margin).unwrap_or(0.0),
            exit_valuation: output.exit.valuation.enterprise_value,
            equity_proceeds: output.exit.valuation.equity_proceeds,
            final_cash: summary.final_cash,
            rule_of_40_at_exit: projection.metrics_for(exit_year).and_then(|m| m.rule_of_40),
        }
    }
}

/// One suite of related scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    pub name: String,
    pub rows: Vec<ScenarioSummary>,
}

/// Runs scenario suites against a loaded model
#[derive(Debug, Clone)]
pub struct SensitivityAnalyzer {
    base: FinancialModel,
}

impl SensitivityAnalyzer {
    pub fn new(base: FinancialModel) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &FinancialModel {
        &self.base
    }

    /// Run a single scenario
    pub fn run_scenario(&self, scenario: &Scenario) -> ModelResult<ScenarioSummary> {
        let assumptions = scenario.apply(self.base.assumptions())?;
        let exit_year = assumptions.exit.exit_year;
        let output = self.base.with_assumptions(assumptions)?.run()?;
        Ok(ScenarioSummary::from_output(&scenario.name, &output, exit_year))
    }

    /// Run scenarios in parallel; results keep the input order
    pub fn run_scenarios(&self, scenarios: &[Scenario]) -> ModelResult<Vec<ScenarioSummary>> {
        scenarios
            .par_iter()
            .map(|s| self.run_scenario(s))
            .collect()
    }

    fn first_year(&self) -> i32 {
        self.base.assumptions().projection.first_year
    }

    pub fn revenue_growth_suite(&self) -> Vec<Scenario> {
        let y = self.first_year();
        vec![
            Scenario::new("Base Case"),
            Scenario::new("Bull Case (High Growth)")
                .with_yearly("revenue_growth", y, &[0.45, 0.50, 0.45, 0.40, 0.35, 0.30]),
            Scenario::new("Bear Case (Low Growth)")
                .with_yearly("revenue_growth", y, &[0.25, 0.30, 0.25, 0.20, 0.15, 0.10]),
        ]
    }

    pub fn margin_suite(&self) -> Vec<Scenario> {
        let y = self.first_year();
        vec![
            Scenario::new("Base Case"),
            Scenario::new("High Margins")
                .with_yearly("gross_margin", y, &[0.97, 0.98, 0.98, 0.99, 0.99, 0.99]),
            Scenario::new("Low Margins")
                .with_yearly("gross_margin", y, &[0.94, 0.94, 0.95, 0.95, 0.96, 0.96]),
        ]
    }

    pub fn opex_efficiency_suite(&self) -> Vec<Scenario> {
        let y = self.first_year();
        vec![
            Scenario::new("Base Case"),
            Scenario::new("High Efficiency")
                .with_yearly("opex_growth", y, &[0.00, 0.10, 0.15, 0.15, 0.12, 0.10]),
            Scenario::new("Low Efficiency")
                .with_yearly("opex_growth", y, &[0.10, 0.30, 0.35, 0.30, 0.25, 0.20]),
        ]
    }

    pub fn exit_multiple_suite(&self) -> Vec<Scenario> {
        [15.0, 20.0, 25.0, 30.0, 35.0]
            .iter()
            .map(|&m| Scenario::new(format!("{}x EBITDA", m)).with("exit.ebitda_multiple", m))
            .collect()
    }

    /// Every built-in suite
    pub fn run_all(&self) -> ModelResult<Vec<SensitivityTable>> {
        let suites = [
            ("Revenue Growth", self.revenue_growth_suite()),
            ("Gross Margin", self.margin_suite()),
            ("Opex Efficiency", self.opex_efficiency_suite()),
            ("Exit Multiples", self.exit_multiple_suite()),
        ];
        suites
            .into_iter()
            .map(|(name, scenarios)| {
                let rows = self.run_scenarios(&scenarios)?;
                log::info!("Sensitivity suite '{}': {} scenarios", name, rows.len());
                Ok(SensitivityTable {
                    name: name.to_string(),
                    rows,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::history::load_history_from_reader;
    use crate::history::loader::tests::SAMPLE_CSV;

    fn analyzer() -> SensitivityAnalyzer {
        let history = load_history_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        SensitivityAnalyzer::new(FinancialModel::new(Assumptions::default_plan(), history).unwrap())
    }

    #[test]
    fn test_bull_case_beats_bear_case() {
        let a = analyzer();
        let rows = a.run_scenarios(&a.revenue_growth_suite()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].scenario, "Base Case");
        assert!(rows[1].exit_arr > rows[0].exit_arr);
        assert!(rows[2].exit_arr < rows[0].exit_arr);
        assert!(rows[1].series_c_pre_money > rows[2].series_c_pre_money);
    }

    #[test]
    fn test_exit_multiples_scale_ebitda_valuation() {
        let a = analyzer();
        let rows = a.run_scenarios(&a.exit_multiple_suite()).unwrap();
        assert_eq!(rows.len(), 5);
        for pair in rows.windows(2) {
            assert!(pair[1].exit_valuation >= pair[0].exit_valuation);
            assert_eq!(pair[1].exit_ebitda, pair[0].exit_ebitda);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = analyzer();
        let scenarios = a.opex_efficiency_suite();
        let parallel = a.run_scenarios(&scenarios).unwrap();
        let sequential: Vec<_> = scenarios.iter().map(|s| a.run_scenario(s).unwrap()).collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_bad_override_is_reported() {
        let a = analyzer();
        let result = a.run_scenario(&Scenario::new("Typo").with("revenue_grwth.rates.2025", 0.5));
        assert!(matches!(result, Err(ModelError::InvalidOverride { .. })));
    }

    #[test]
    fn test_run_all_suites() {
        let tables = analyzer().run_all().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Revenue Growth", "Gross Margin", "Opex Efficiency", "Exit Multiples"]);
    }
}
