//! Exit (liquidity event) assumptions

use serde::{Deserialize, Serialize};

/// Which metric the exit valuation is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationBasis {
    Arr,
    Ebitda,
    /// Value on both and take the higher
    HigherOfArrOrEbitda,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitAssumptions {
    pub exit_year: i32,
    pub valuation_basis: ValuationBasis,
    pub arr_multiple: f64,
    pub ebitda_multiple: f64,
}

impl Default for ExitAssumptions {
    fn default() -> Self {
        Self {
            exit_year: 2030,
            valuation_basis: ValuationBasis::HigherOfArrOrEbitda,
            arr_multiple: 8.5,
            ebitda_multiple: 20.0,
        }
    }
}
