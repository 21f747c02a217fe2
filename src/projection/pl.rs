//! Income statement projection

use super::debt::DebtPosition;
use super::records::ProfitAndLoss;
use super::state::ProjectionState;
use crate::assumptions::Assumptions;

/// Project one year's P&L from the prior year's state.
///
/// Revenue and ARR compound at the year's growth rate; opex compounds from the
/// prior year's total and is split by the year's functional mix.
pub fn project_pl(
    assumptions: &Assumptions,
    state: &ProjectionState,
    debt: &DebtPosition,
    year: i32,
) -> ProfitAndLoss {
    let growth = assumptions.revenue_growth.get(year);
    let revenue = state.revenue * (1.0 + growth);
    // ARR only compounds from a usable prior figure
    let arr = match state.arr {
        Some(prior) if prior > 0.0 && state.revenue > 0.0 => prior * (1.0 + growth),
        _ => revenue * assumptions.arr_fallback_ratio,
    };

    let margin = assumptions.gross_margin.get(year);
    let gross_profit = revenue * margin;
    let cost_of_sales = gross_profit - revenue;

    let opex_total = state.opex_total * (1.0 + assumptions.opex_growth.get(year));
    let mix = assumptions.opex_mix.get(year);

    let ebitda = gross_profit + opex_total;
    let da = -revenue * assumptions.da_pct_of_revenue;
    let interest = -debt.total.interest_expense();
    // The settlement provision was expensed before the projection; only its cash runs off
    let exceptional_items = 0.0;

    let profit_before_tax = ebitda + da + interest + exceptional_items;
    let tax = if profit_before_tax > 0.0 {
        -profit_before_tax * assumptions.tax_rate
    } else {
        0.0
    };

    let ratio = |value: f64| if revenue > 0.0 { value / revenue } else { 0.0 };

    ProfitAndLoss {
        year,
        revenue,
        revenue_growth: growth,
        arr,
        cost_of_sales,
        gross_profit,
        gross_margin: if revenue > 0.0 { gross_profit / revenue } else { margin },
        product_dev: opex_total * mix.product_dev,
        sales_marketing: opex_total * mix.sales_marketing,
        customer_success: opex_total * mix.customer_success,
        ga: opex_total * mix.ga,
        opex_total,
        ebitda,
        ebitda_margin: ratio(ebitda),
        da,
        interest,
        exceptional_items,
        profit_before_tax,
        tax,
        net_income: profit_before_tax + tax,
    }
}
