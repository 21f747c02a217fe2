//! Internal Rate of Return (IRR) calculation
//!
//! Used for investor returns on the exit waterfall

/// IRR of annual cash flows using Newton-Raphson, falling back to bisection.
///
/// `cashflows[t]` is the flow at the end of year `t` (negative = investment).
/// Returns the IRR as a decimal (0.25 for 25%), or None when no rate solves it.
pub fn annual_irr(cashflows: &[f64]) -> Option<f64> {
    if cashflows.is_empty() {
        return None;
    }

    if cashflows.iter().all(|&cf| cf.abs() < 1e-10) {
        return Some(0.0);
    }

    // An IRR needs at least one sign change
    let has_positive = cashflows.iter().any(|&cf| cf > 1e-10);
    let has_negative = cashflows.iter().any(|&cf| cf < -1e-10);
    if !has_positive || !has_negative {
        return None;
    }

    let mut rate = 0.10;
    let tolerance = 1e-10;
    let max_iterations = 1000;

    for _ in 0..max_iterations {
        let (npv, dnpv) = npv_and_derivative(cashflows, rate);

        if dnpv.abs() < 1e-20 {
            return irr_bisection(cashflows);
        }

        let new_rate = (rate - npv / dnpv).clamp(-0.99, 10.0);

        if (new_rate - rate).abs() < tolerance {
            return Some(new_rate);
        }

        rate = new_rate;
    }

    irr_bisection(cashflows)
}

/// NPV and its derivative with respect to rate
fn npv_and_derivative(cashflows: &[f64], rate: f64) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;

    for (t, &cf) in cashflows.iter().enumerate() {
        npv += cf / (1.0 + rate).powi(t as i32);
        if t > 0 {
            dnpv -= (t as f64) * cf / (1.0 + rate).powi(t as i32 + 1);
        }
    }

    (npv, dnpv)
}

/// Fallback using bisection between -99% and 1000% a year
fn irr_bisection(cashflows: &[f64]) -> Option<f64> {
    let mut low = -0.99_f64;
    let mut high = 10.0_f64;
    let tolerance = 1e-10;

    let npv_low = npv_at_rate(cashflows, low);
    let npv_high = npv_at_rate(cashflows, high);
    if npv_low * npv_high > 0.0 {
        return None;
    }

    for _ in 0..1000 {
        let mid = (low + high) / 2.0;
        let npv_mid = npv_at_rate(cashflows, mid);

        if npv_mid.abs() < tolerance || (high - low) / 2.0 < tolerance {
            return Some(mid);
        }

        if npv_mid * npv_at_rate(cashflows, low) < 0.0 {
            high = mid;
        } else {
            low = mid;
        }
    }

    None
}

fn npv_at_rate(cashflows: &[f64], rate: f64) -> f64 {
    cashflows
        .iter()
        .enumerate()
        .map(|(t, &cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_in_one_year() {
        let irr = annual_irr(&[-1000.0, 2000.0]).unwrap();
        assert!((irr - 1.0).abs() < 1e-6, "Expected 100% IRR, got {}", irr);
    }

    #[test]
    fn test_multi_year_hold() {
        // 2x over three years
        let irr = annual_irr(&[-1000.0, 0.0, 0.0, 2000.0]).unwrap();
        let expected = 2.0_f64.powf(1.0 / 3.0) - 1.0;
        assert!((irr - expected).abs() < 1e-6, "Expected {}, got {}", expected, irr);
    }

    #[test]
    fn test_total_loss_has_irr_near_floor() {
        let irr = annual_irr(&[-1000.0, 0.0, 10.0]).unwrap();
        assert!(irr < -0.8);
    }

    #[test]
    fn test_no_sign_change() {
        assert_eq!(annual_irr(&[-1000.0, -10.0]), None);
        assert_eq!(annual_irr(&[]), None);
    }
}
