//! Operating assumptions that are not per-year schedules

use serde::{Deserialize, Serialize};

/// Projection horizon (inclusive fiscal years)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionHorizon {
    pub first_year: i32,
    pub last_year: i32,
}

impl ProjectionHorizon {
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.first_year..=self.last_year
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.first_year..=self.last_year).contains(&year)
    }

    pub fn len(&self) -> usize {
        (self.last_year - self.first_year + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProjectionHorizon {
    fn default() -> Self {
        Self {
            first_year: 2025,
            last_year: 2030,
        }
    }
}

/// Working capital days, each measured against a full 365-day year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingCapitalAssumptions {
    /// Receivables as days of revenue
    pub receivable_days: f64,
    /// Inventory as days of cost of sales
    pub inventory_days: f64,
    /// Payables as days of cost of sales plus operating expenses
    pub payable_days: f64,
}

impl WorkingCapitalAssumptions {
    pub const DAYS_PER_YEAR: f64 = 365.0;

    pub fn receivables(&self, revenue: f64) -> f64 {
        revenue * self.receivable_days / Self::DAYS_PER_YEAR
    }

    pub fn inventory(&self, cost_of_sales: f64) -> f64 {
        cost_of_sales.abs() * self.inventory_days / Self::DAYS_PER_YEAR
    }

    pub fn payables(&self, cash_costs: f64) -> f64 {
        cash_costs.abs() * self.payable_days / Self::DAYS_PER_YEAR
    }
}

impl Default for WorkingCapitalAssumptions {
    fn default() -> Self {
        Self {
            receivable_days: 45.0,
            inventory_days: 0.0,
            payable_days: 30.0,
        }
    }
}

/// A provision recognised before the projection and settled in equal cash instalments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExceptionalSettlement {
    pub total: f64,
    pub first_payment_year: i32,
    pub last_payment_year: i32,
}

impl ExceptionalSettlement {
    fn payment_years(&self) -> i32 {
        (self.last_payment_year - self.first_payment_year + 1).max(0)
    }

    /// Cash paid in `year` (positive magnitude)
    pub fn payment(&self, year: i32) -> f64 {
        let years = self.payment_years();
        if years == 0 || year < self.first_payment_year || year > self.last_payment_year {
            return 0.0;
        }
        self.total / years as f64
    }

    /// Liability outstanding at the end of `year`
    pub fn outstanding(&self, year: i32) -> f64 {
        let years = self.payment_years();
        if years == 0 || year < self.first_payment_year {
            return self.total;
        }
        let paid_years = (year - self.first_payment_year + 1).min(years);
        (self.total - self.total / years as f64 * paid_years as f64).max(0.0)
    }
}

impl Default for ExceptionalSettlement {
    fn default() -> Self {
        Self {
            total: 9_300_000.0,
            first_payment_year: 2025,
            last_payment_year: 2029,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_runs_off_in_equal_instalments() {
        let s = ExceptionalSettlement::default();
        assert_eq!(s.outstanding(2024), 9_300_000.0);
        approx::assert_relative_eq!(s.payment(2025), 1_860_000.0, epsilon = 1e-6);
        approx::assert_relative_eq!(s.outstanding(2025), 7_440_000.0, epsilon = 1e-6);
        assert_eq!(s.outstanding(2029), 0.0);
        assert_eq!(s.payment(2030), 0.0);
    }

    #[test]
    fn test_horizon_years() {
        let h = ProjectionHorizon::default();
        assert_eq!(h.years().collect::<Vec<_>>(), vec![2025, 2026, 2027, 2028, 2029, 2030]);
        assert_eq!(h.len(), 6);
        assert!(h.contains(2030));
        assert!(!h.contains(2024));
    }
}
