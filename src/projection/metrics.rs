//! Operating metrics: headcount, Rule of 40, efficiency, burn and runway

use super::records::{OperatingMetrics, PeriodRecord};
use crate::assumptions::Assumptions;
use crate::history::HistoricalData;

struct MetricInputs {
    year: i32,
    employees: f64,
    revenue: f64,
    revenue_growth: Option<f64>,
    opex_total: f64,
    gross_margin: f64,
    ebitda_margin: f64,
    arr: Option<f64>,
    prior_arr: Option<f64>,
    free_cash_flow: f64,
    closing_cash: f64,
}

fn build(inputs: MetricInputs) -> OperatingMetrics {
    let per_employee = |total: f64| {
        if inputs.employees > 0.0 {
            total / inputs.employees
        } else {
            0.0
        }
    };

    let net_new_arr = match (inputs.arr, inputs.prior_arr) {
        (Some(arr), Some(prior)) => Some(arr - prior),
        _ => None,
    };

    let burn = (-inputs.free_cash_flow).max(0.0);
    let burn_multiple = match net_new_arr {
        Some(added) if burn > 0.0 && added > 0.0 => Some(burn / added),
        _ => None,
    };
    let runway_months = (burn > 0.0).then(|| inputs.closing_cash.max(0.0) / (burn / 12.0));

    OperatingMetrics {
        year: inputs.year,
        employees: inputs.employees,
        arr: inputs.arr,
        net_new_arr,
        gross_margin: inputs.gross_margin,
        ebitda_margin: inputs.ebitda_margin,
        rule_of_40: inputs
            .revenue_growth
            .map(|g| (g + inputs.ebitda_margin) * 100.0),
        revenue_per_employee: per_employee(inputs.revenue),
        opex_per_employee: per_employee(inputs.opex_total),
        burn_multiple,
        runway_months,
    }
}

/// Metrics for each projected period. Headcount compounds from the base year.
pub fn project_metrics(
    assumptions: &Assumptions,
    history: &HistoricalData,
    periods: &[PeriodRecord],
) -> Vec<OperatingMetrics> {
    let base = history.base_year();
    let mut employees = base.employees;
    let mut prior_arr = base.arr;

    periods
        .iter()
        .map(|p| {
            employees *= 1.0 + assumptions.employee_growth.get(p.year);
            let metrics = build(MetricInputs {
                year: p.year,
                employees,
                revenue: p.pl.revenue,
                revenue_growth: Some(p.pl.revenue_growth),
                opex_total: p.pl.opex_total,
                gross_margin: p.pl.gross_margin,
                ebitda_margin: p.pl.ebitda_margin,
                arr: Some(p.pl.arr),
                prior_arr,
                free_cash_flow: p.cash_flow.free_cash_flow(),
                closing_cash: p.balance_sheet.cash,
            });
            prior_arr = Some(p.pl.arr);
            metrics
        })
        .collect()
}

/// The same metrics computed from reported actuals
pub fn historical_metrics(history: &HistoricalData) -> Vec<OperatingMetrics> {
    let mut prior_arr = None;
    history
        .years()
        .iter()
        .map(|y| {
            let mut metrics = build(MetricInputs {
                year: y.year,
                employees: y.employees,
                revenue: y.revenue,
                revenue_growth: history.revenue_growth(y.year),
                opex_total: y.opex_total,
                gross_margin: y.gross_margin,
                ebitda_margin: y.ebitda_margin(),
                arr: y.arr,
                prior_arr,
                free_cash_flow: y.operating_cf + y.investing_cf,
                closing_cash: y.cash_cf,
            });
            // Reported ratios take precedence over recomputed ones
            metrics.revenue_per_employee = y.revenue_per_employee;
            metrics.opex_per_employee = y.opex_per_employee;
            prior_arr = y.arr;
            metrics
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::load_history_from_reader;
    use crate::history::loader::tests::SAMPLE_CSV;
    use approx::assert_relative_eq;

    fn inputs() -> MetricInputs {
        MetricInputs {
            year: 2027,
            employees: 100.0,
            revenue: 20_000_000.0,
            revenue_growth: Some(0.30),
            opex_total: -15_000_000.0,
            gross_margin: 0.95,
            ebitda_margin: 0.15,
            arr: Some(24_000_000.0),
            prior_arr: Some(18_000_000.0),
            free_cash_flow: -3_000_000.0,
            closing_cash: 9_000_000.0,
        }
    }

    #[test]
    fn test_rule_of_40_in_percentage_points() {
        let m = build(inputs());
        assert_relative_eq!(m.rule_of_40.unwrap(), 45.0, epsilon = 1e-9);
        assert_relative_eq!(m.revenue_per_employee, 200_000.0, epsilon = 1e-9);
        assert_relative_eq!(m.opex_per_employee, -150_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_burn_multiple_and_runway_while_burning() {
        let m = build(inputs());
        assert_relative_eq!(m.net_new_arr.unwrap(), 6_000_000.0, epsilon = 1e-9);
        assert_relative_eq!(m.burn_multiple.unwrap(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(m.runway_months.unwrap(), 36.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_burn_metrics_when_cash_generative() {
        let m = build(MetricInputs {
            free_cash_flow: 1_000_000.0,
            ..inputs()
        });
        assert_eq!(m.burn_multiple, None);
        assert_eq!(m.runway_months, None);
    }

    #[test]
    fn test_burn_multiple_undefined_when_arr_shrinks() {
        let m = build(MetricInputs {
            prior_arr: Some(30_000_000.0),
            ..inputs()
        });
        assert_eq!(m.burn_multiple, None);
        assert!(m.runway_months.is_some());
    }

    #[test]
    fn test_historical_metrics_use_reported_ratios() {
        let history = load_history_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let metrics = historical_metrics(&history);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].rule_of_40, None);
        assert_eq!(metrics[1].revenue_per_employee, 58_839.0);
        assert_relative_eq!(metrics[1].net_new_arr.unwrap(), 2_740_000.0, epsilon = 1e-6);
    }
}
