//! Model assumptions: growth, margins, headcount, financing and exit terms

mod exit;
mod financing;
mod operating;
mod schedule;
pub mod loader;

pub use exit::{ExitAssumptions, ValuationBasis};
pub use financing::{
    ConvertibleNoteTerms, DebtTerms, FinancingAssumptions, FounderIssuance, PoolTopUp,
    PreferenceTerms, PricedRoundTerms, RepaymentProfile, SeriesCTerms,
};
pub use operating::{ExceptionalSettlement, ProjectionHorizon, WorkingCapitalAssumptions};
pub use schedule::{OpexMix, OpexMixSchedule, YearSchedule};

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container for all projection assumptions.
///
/// Built once per session and passed by reference; nothing in the model mutates it.
/// Scenario variants are new values produced by [`Assumptions::with_override`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    pub projection: ProjectionHorizon,

    pub revenue_growth: YearSchedule,
    pub gross_margin: YearSchedule,
    pub opex_growth: YearSchedule,
    pub opex_mix: OpexMixSchedule,
    pub employee_growth: YearSchedule,

    /// Corporation tax on positive profit before tax
    pub tax_rate: f64,
    pub da_pct_of_revenue: f64,
    pub capex_pct_of_revenue: f64,
    /// ARR as a share of revenue when no prior ARR is available
    pub arr_fallback_ratio: f64,

    pub working_capital: WorkingCapitalAssumptions,
    pub exceptional_settlement: ExceptionalSettlement,

    pub financing: FinancingAssumptions,
    pub exit: ExitAssumptions,

    /// Largest |assets - (liabilities + equity)| accepted as rounding
    pub balance_tolerance: f64,
    /// Largest |sum of ownership - 1| accepted as rounding
    pub ownership_tolerance: f64,
}

impl Assumptions {
    /// The base-case operating plan
    pub fn default_plan() -> Self {
        Self {
            projection: ProjectionHorizon::default(),
            revenue_growth: YearSchedule::from_years(2025, &[0.32, 0.38, 0.35, 0.30, 0.25, 0.22], 0.0),
            gross_margin: YearSchedule::from_years(2025, &[0.95; 6], 0.98),
            opex_growth: YearSchedule::from_years(2025, &[-0.05, 0.05, 0.18, 0.16, 0.14, 0.12], 0.15),
            opex_mix: OpexMixSchedule::default(),
            employee_growth: YearSchedule::from_years(2025, &[-0.02, 0.03, 0.12, 0.10, 0.08, 0.06], 0.10),
            tax_rate: 0.19,
            da_pct_of_revenue: 0.02,
            capex_pct_of_revenue: 0.02,
            arr_fallback_ratio: 0.80,
            working_capital: WorkingCapitalAssumptions::default(),
            exceptional_settlement: ExceptionalSettlement::default(),
            financing: FinancingAssumptions::default(),
            exit: ExitAssumptions::default(),
            balance_tolerance: 1.0,
            ownership_tolerance: 0.0001,
        }
    }

    /// Load and validate assumptions from a JSON file
    pub fn from_json_path(path: &Path) -> ModelResult<Self> {
        loader::load_assumptions(path)
    }

    /// Return a copy with one numeric assumption replaced.
    ///
    /// `path` is dotted, following the serialized field names, e.g.
    /// `revenue_growth.rates.2025` or `exit.ebitda_multiple`.
    pub fn with_override(&self, path: &str, value: f64) -> ModelResult<Self> {
        let invalid = |reason: &str| ModelError::InvalidOverride {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let mut tree = serde_json::to_value(self)?;
        let mut node = &mut tree;
        for key in path.split('.') {
            node = node
                .as_object_mut()
                .and_then(|obj| obj.get_mut(key))
                .ok_or_else(|| invalid(&format!("no assumption named '{}'", key)))?;
        }
        if !node.is_number() {
            return Err(invalid("target is not a numeric assumption"));
        }
        *node = if node.is_i64() || node.is_u64() {
            // Years and terms are integers in the serialized form
            if value.fract() != 0.0 || !value.is_finite() {
                return Err(invalid("target takes a whole number"));
            }
            serde_json::Value::from(value as i64)
        } else {
            serde_json::Number::from_f64(value)
                .map(serde_json::Value::Number)
                .ok_or_else(|| invalid("value must be finite"))?
        };

        // Typed fields (unsigned counts, seniority ranks) reject values the tree accepted
        let updated: Assumptions = serde_json::from_value(tree).map_err(|e| invalid(&e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }

    /// Apply several overrides in order
    pub fn with_overrides<'a, I>(&self, overrides: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        overrides
            .into_iter()
            .try_fold(self.clone(), |acc, (path, value)| acc.with_override(path, value))
    }

    /// Reject values that would make the projection meaningless
    pub fn validate(&self) -> ModelResult<()> {
        if self.projection.is_empty() {
            return Err(ModelError::assumption("projection", "last_year is before first_year"));
        }

        check_schedule("revenue_growth", &self.revenue_growth, |r| r > -1.0, "growth must be above -100%")?;
        check_schedule("opex_growth", &self.opex_growth, |r| r > -1.0, "growth must be above -100%")?;
        check_schedule("employee_growth", &self.employee_growth, |r| r > -1.0, "headcount cannot fall below zero")?;
        check_schedule("gross_margin", &self.gross_margin, |m| (-1.0..=1.0).contains(&m), "margin must be within [-100%, 100%]")?;

        for (year, mix) in &self.opex_mix.mix {
            if mix.shares().iter().any(|s| !(0.0..=1.0).contains(s)) {
                return Err(ModelError::assumption(format!("opex_mix.{}", year), "shares must be within [0, 1]"));
            }
            if (mix.total() - 1.0).abs() > 1e-6 {
                return Err(ModelError::assumption(
                    format!("opex_mix.{}", year),
                    format!("shares sum to {:.4}, expected 1", mix.total()),
                ));
            }
        }

        check_unit("tax_rate", self.tax_rate)?;
        check_unit("da_pct_of_revenue", self.da_pct_of_revenue)?;
        check_unit("capex_pct_of_revenue", self.capex_pct_of_revenue)?;
        check_non_negative("arr_fallback_ratio", self.arr_fallback_ratio)?;

        let wc = &self.working_capital;
        check_non_negative("working_capital.receivable_days", wc.receivable_days)?;
        check_non_negative("working_capital.inventory_days", wc.inventory_days)?;
        check_non_negative("working_capital.payable_days", wc.payable_days)?;
        check_non_negative("exceptional_settlement.total", self.exceptional_settlement.total)?;

        self.validate_financing()?;

        let exit = &self.exit;
        check_non_negative("exit.arr_multiple", exit.arr_multiple)?;
        check_non_negative("exit.ebitda_multiple", exit.ebitda_multiple)?;
        if !self.projection.contains(exit.exit_year) {
            return Err(ModelError::assumption("exit.exit_year", "must fall inside the projection horizon"));
        }
        // The exit cap table includes the notes converted at the Series C close
        if exit.exit_year < self.financing.series_c.close_year() {
            return Err(ModelError::assumption("exit.exit_year", "must be on or after the Series C close"));
        }

        check_non_negative("balance_tolerance", self.balance_tolerance)?;
        check_non_negative("ownership_tolerance", self.ownership_tolerance)?;
        Ok(())
    }

    fn validate_financing(&self) -> ModelResult<()> {
        let f = &self.financing;
        if f.founder.shares <= 0.0 {
            return Err(ModelError::assumption("financing.founder.shares", "must be positive"));
        }
        check_non_negative("financing.founder.investment", f.founder.investment)?;

        let mut last_year = f.founder.year;
        for round in &f.priced_rounds {
            let field = format!("financing.priced_rounds.{}", round.name);
            if round.year < last_year {
                return Err(ModelError::assumption(field, "rounds must be in chronological order"));
            }
            last_year = round.year;
            if round.investment < 0.0 || round.pre_money() <= 0.0 {
                return Err(ModelError::assumption(field, "needs a non-negative investment below post-money"));
            }
            check_preference(&field, &round.preference)?;
            check_pool(&field, round.pool_top_up)?;
        }

        for note in &f.notes {
            let field = format!("financing.notes.{}", note.name);
            check_non_negative(&field, note.principal)?;
            check_unit(&format!("{}.discount", field), note.discount)?;
            if note.discount >= 1.0 {
                return Err(ModelError::assumption(field, "discount must be below 100%"));
            }
            if note.maturity_year < note.year {
                return Err(ModelError::assumption(field, "matures before it is drawn"));
            }
        }

        let c = &f.series_c;
        check_non_negative("financing.series_c.amount", c.amount)?;
        for (name, pct) in [("equity_pct", c.equity_pct), ("debt_pct", c.debt_pct), ("convertible_pct", c.convertible_pct)] {
            check_unit(&format!("financing.series_c.{}", name), pct)?;
        }
        let split = c.equity_pct + c.debt_pct + c.convertible_pct;
        if (split - 1.0).abs() > 1e-6 {
            return Err(ModelError::assumption(
                "financing.series_c",
                format!("equity/debt/convertible split sums to {:.4}, expected 1", split),
            ));
        }
        if c.pre_money_arr_multiple <= 0.0 {
            return Err(ModelError::assumption("financing.series_c.pre_money_arr_multiple", "must be positive"));
        }
        if !self.projection.contains(c.close_year()) {
            return Err(ModelError::assumption("financing.series_c.close_date", "must fall inside the projection horizon"));
        }
        check_preference("financing.series_c", &c.preference)?;
        check_pool("financing.series_c", c.pool_top_up)?;
        Ok(())
    }
}

impl Default for Assumptions {
    fn default() -> Self {
        Self::default_plan()
    }
}

fn check_schedule(
    field: &str,
    schedule: &YearSchedule,
    ok: impl Fn(f64) -> bool,
    reason: &str,
) -> ModelResult<()> {
    match schedule.values().find(|&v| !v.is_finite() || !ok(v)) {
        Some(bad) => Err(ModelError::assumption(field, format!("{} (got {})", reason, bad))),
        None => Ok(()),
    }
}

fn check_unit(field: &str, value: f64) -> ModelResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::assumption(field, format!("must be within [0, 1] (got {})", value)))
    }
}

fn check_non_negative(field: &str, value: f64) -> ModelResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::assumption(field, format!("must be non-negative (got {})", value)))
    }
}

fn check_preference(field: &str, pref: &PreferenceTerms) -> ModelResult<()> {
    check_non_negative(&format!("{}.preference.multiple", field), pref.multiple)?;
    if pref.seniority == 0 {
        return Err(ModelError::assumption(format!("{}.preference.seniority", field), "ranks start at 1"));
    }
    Ok(())
}

fn check_pool(field: &str, top_up: Option<PoolTopUp>) -> ModelResult<()> {
    match top_up {
        Some(t) if !(0.0..1.0).contains(&t.pct()) => Err(ModelError::assumption(
            format!("{}.pool_top_up", field),
            "pool percentage must be within [0, 1)",
        )),
        _ => Ok(()),
    }
}
