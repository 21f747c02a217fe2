//! Per-year rate schedules (growth, margins, opex mix)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A rate keyed by fiscal year, with a fallback for years not listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSchedule {
    /// Rates by fiscal year
    pub rates: BTreeMap<i32, f64>,

    /// Rate used for any year missing from `rates`
    pub fallback: f64,
}

impl YearSchedule {
    /// Build a schedule from consecutive years starting at `first_year`
    pub fn from_years(first_year: i32, rates: &[f64], fallback: f64) -> Self {
        Self {
            rates: rates
                .iter()
                .enumerate()
                .map(|(i, &rate)| (first_year + i as i32, rate))
                .collect(),
            fallback,
        }
    }

    /// Rate for a given year
    pub fn get(&self, year: i32) -> f64 {
        self.rates.get(&year).copied().unwrap_or(self.fallback)
    }

    /// All configured rates plus the fallback, for validation
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rates.values().copied().chain(std::iter::once(self.fallback))
    }
}

/// Split of total operating expenses across functions (fractions of total)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpexMix {
    pub product_dev: f64,
    pub sales_marketing: f64,
    pub customer_success: f64,
    pub ga: f64,
}

impl OpexMix {
    pub fn new(product_dev: f64, sales_marketing: f64, customer_success: f64, ga: f64) -> Self {
        Self {
            product_dev,
            sales_marketing,
            customer_success,
            ga,
        }
    }

    pub fn total(&self) -> f64 {
        self.product_dev + self.sales_marketing + self.customer_success + self.ga
    }

    pub fn shares(&self) -> [f64; 4] {
        [self.product_dev, self.sales_marketing, self.customer_success, self.ga]
    }
}

/// Opex mix by fiscal year. Years after the last configured year reuse it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpexMixSchedule {
    pub mix: BTreeMap<i32, OpexMix>,
}

impl OpexMixSchedule {
    /// Mix for a year: exact match, else the latest configured year at or before it,
    /// else the last configured year.
    pub fn get(&self, year: i32) -> OpexMix {
        if let Some(mix) = self.mix.get(&year) {
            return *mix;
        }
        self.mix
            .range(..=year)
            .next_back()
            .or_else(|| self.mix.iter().next_back())
            .map(|(_, mix)| *mix)
            .unwrap_or(OpexMix::new(0.25, 0.25, 0.25, 0.25))
    }
}

impl Default for OpexMixSchedule {
    /// Shift from product-heavy spend toward sales & marketing as the company scales
    fn default() -> Self {
        let rows = [
            (2025, OpexMix::new(0.48, 0.27, 0.10, 0.15)),
            (2026, OpexMix::new(0.45, 0.30, 0.11, 0.14)),
            (2027, OpexMix::new(0.42, 0.34, 0.11, 0.13)),
            (2028, OpexMix::new(0.40, 0.36, 0.12, 0.12)),
            (2029, OpexMix::new(0.38, 0.37, 0.12, 0.13)),
            (2030, OpexMix::new(0.37, 0.38, 0.12, 0.13)),
        ];
        Self {
            mix: rows.into_iter().collect(),
        }
    }
}
