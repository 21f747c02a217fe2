//! Financing assumptions: historical rounds, convertible notes and the Series C raise

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How a debt instrument's interest and principal are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentProfile {
    /// Interest accrues into the balance; everything is repaid at maturity
    RolledUp,
    /// Interest paid in cash each year; principal repaid at maturity
    InterestOnly,
    /// Interest paid in cash; principal repaid in equal annual instalments
    Amortizing,
}

/// Debt terms for a loan-like instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebtTerms {
    /// Annual interest rate
    pub interest_rate: f64,
    /// Term in years from drawdown
    pub term_years: u32,
    pub repayment: RepaymentProfile,
}

/// Liquidation preference attached to a preferred security
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreferenceTerms {
    /// Preference as a multiple of the amount invested
    pub multiple: f64,
    /// Seniority rank, 1 = most senior
    pub seniority: u32,
    /// Participating preferred also share the residual after preferences
    #[serde(default)]
    pub participating: bool,
}

impl PreferenceTerms {
    /// 1x non-participating at the given seniority
    pub fn standard(seniority: u32) -> Self {
        Self {
            multiple: 1.0,
            seniority,
            participating: false,
        }
    }
}

/// Option pool adjustment made before new investor shares are priced
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pct", rename_all = "snake_case")]
pub enum PoolTopUp {
    /// Issue new pool shares equal to this fraction of the post-top-up share count,
    /// diluting every existing holder by exactly that fraction
    Increase(f64),
    /// Top the pool up until it is this fraction of the post-top-up share count
    TargetTotal(f64),
}

impl PoolTopUp {
    pub fn pct(&self) -> f64 {
        match self {
            PoolTopUp::Increase(pct) | PoolTopUp::TargetTotal(pct) => *pct,
        }
    }
}

/// The founding share issuance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FounderIssuance {
    pub holder: String,
    pub year: i32,
    pub shares: f64,
    pub investment: f64,
}

/// A historical priced equity round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedRoundTerms {
    /// Round (and holder) name, e.g. "Series A"
    pub name: String,
    pub year: i32,
    pub investment: f64,
    /// Post-money valuation; pre-money is post-money less the investment
    pub post_money: f64,
    pub preference: PreferenceTerms,
    #[serde(default)]
    pub pool_top_up: Option<PoolTopUp>,
}

impl PricedRoundTerms {
    pub fn pre_money(&self) -> f64 {
        self.post_money - self.investment
    }
}

/// A convertible loan note: rolled-up interest, converts at the next priced round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertibleNoteTerms {
    pub name: String,
    /// Holder name the converted shares are recorded under
    pub holder: String,
    /// Year the note is drawn
    pub year: i32,
    pub principal: f64,
    pub interest_rate: f64,
    /// Discount to the conversion round price
    pub discount: f64,
    pub maturity_year: i32,
}

impl ConvertibleNoteTerms {
    /// Principal plus rolled-up interest at the start of `year`.
    /// A note accrues a full year of interest in its drawdown year.
    pub fn accrued_balance(&self, year: i32) -> f64 {
        if year <= self.year {
            return self.principal;
        }
        self.principal * (1.0 + self.interest_rate).powi(year - self.year)
    }

    /// Whether the note is still outstanding when a round closes in `close_year`
    pub fn converts_at(&self, close_year: i32) -> bool {
        self.year < close_year && close_year <= self.maturity_year
    }

    pub fn as_debt_terms(&self) -> DebtTerms {
        DebtTerms {
            interest_rate: self.interest_rate,
            term_years: (self.maturity_year - self.year).max(0) as u32,
            repayment: RepaymentProfile::RolledUp,
        }
    }
}

/// The Series C raise: an equity tranche plus debt and convertible tranches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesCTerms {
    pub investor: String,
    pub amount: f64,
    pub close_date: NaiveDate,

    /// Split of `amount` across tranches (must sum to 1)
    pub equity_pct: f64,
    pub debt_pct: f64,
    pub convertible_pct: f64,

    pub debt: DebtTerms,
    pub convertible: DebtTerms,

    /// Pre-money valuation as a multiple of ARR in the close year
    pub pre_money_arr_multiple: f64,

    pub preference: PreferenceTerms,
    #[serde(default)]
    pub pool_top_up: Option<PoolTopUp>,
}

impl SeriesCTerms {
    pub fn close_year(&self) -> i32 {
        self.close_date.year()
    }

    pub fn equity_amount(&self) -> f64 {
        self.amount * self.equity_pct
    }

    pub fn debt_amount(&self) -> f64 {
        self.amount * self.debt_pct
    }

    pub fn convertible_amount(&self) -> f64 {
        self.amount * self.convertible_pct
    }

    pub fn pre_money(&self, arr_at_close: f64) -> f64 {
        arr_at_close * self.pre_money_arr_multiple
    }
}

/// All financing assumptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingAssumptions {
    pub founder: FounderIssuance,
    /// Historical priced rounds in chronological order
    pub priced_rounds: Vec<PricedRoundTerms>,
    pub notes: Vec<ConvertibleNoteTerms>,
    pub series_c: SeriesCTerms,
    /// Name the option pool is recorded under
    pub option_pool_holder: String,
}

impl FinancingAssumptions {
    /// Equity raised before the projection starts (founder plus priced rounds)
    pub fn historical_equity_raised(&self) -> f64 {
        self.founder.investment + self.priced_rounds.iter().map(|r| r.investment).sum::<f64>()
    }

    /// Notes that convert into Series C shares
    pub fn converting_notes(&self) -> impl Iterator<Item = &ConvertibleNoteTerms> {
        let close_year = self.series_c.close_year();
        self.notes.iter().filter(move |n| n.converts_at(close_year))
    }
}

impl Default for FinancingAssumptions {
    fn default() -> Self {
        let pool = Some(PoolTopUp::TargetTotal(0.15));
        Self {
            founder: FounderIssuance {
                holder: "Founder".to_string(),
                year: 2018,
                shares: 10_000_000.0,
                investment: 661_000.0,
            },
            priced_rounds: vec![
                PricedRoundTerms {
                    name: "Seed".to_string(),
                    year: 2019,
                    investment: 3_500_000.0,
                    post_money: 20_000_000.0,
                    preference: PreferenceTerms::standard(4),
                    pool_top_up: pool,
                },
                PricedRoundTerms {
                    name: "Series A".to_string(),
                    year: 2020,
                    investment: 10_300_000.0,
                    post_money: 50_000_000.0,
                    preference: PreferenceTerms::standard(3),
                    pool_top_up: pool,
                },
                PricedRoundTerms {
                    name: "Series B".to_string(),
                    year: 2021,
                    investment: 36_900_000.0,
                    post_money: 166_000_000.0,
                    preference: PreferenceTerms::standard(2),
                    pool_top_up: pool,
                },
            ],
            notes: vec![
                ConvertibleNoteTerms {
                    name: "CLN 2024".to_string(),
                    holder: "CLN Holder".to_string(),
                    year: 2024,
                    principal: 6_000_000.0,
                    interest_rate: 0.08,
                    discount: 0.20,
                    maturity_year: 2029,
                },
                ConvertibleNoteTerms {
                    name: "CLN 2025".to_string(),
                    holder: "CLN Holder".to_string(),
                    year: 2025,
                    principal: 4_000_000.0,
                    interest_rate: 0.08,
                    discount: 0.20,
                    maturity_year: 2030,
                },
            ],
            series_c: SeriesCTerms {
                investor: "Series C".to_string(),
                amount: 15_000_000.0,
                close_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap_or_default(),
                equity_pct: 0.60,
                debt_pct: 0.20,
                convertible_pct: 0.20,
                debt: DebtTerms {
                    interest_rate: 0.10,
                    term_years: 5,
                    repayment: RepaymentProfile::RolledUp,
                },
                convertible: DebtTerms {
                    interest_rate: 0.08,
                    term_years: 5,
                    repayment: RepaymentProfile::RolledUp,
                },
                pre_money_arr_multiple: 6.0,
                preference: PreferenceTerms::standard(1),
                pool_top_up: pool,
            },
            option_pool_holder: "Option Pool".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_accrues_rolled_up_interest() {
        let financing = FinancingAssumptions::default();
        let cln = &financing.notes[0];
        assert_eq!(cln.accrued_balance(2024), 6_000_000.0);
        approx::assert_relative_eq!(cln.accrued_balance(2026), 6_000_000.0 * 1.08 * 1.08, epsilon = 1e-6);
    }

    #[test]
    fn test_both_notes_convert_at_series_c() {
        let financing = FinancingAssumptions::default();
        assert_eq!(financing.series_c.close_year(), 2026);
        assert_eq!(financing.converting_notes().count(), 2);
    }

    #[test]
    fn test_series_c_tranches_cover_amount() {
        let c = FinancingAssumptions::default().series_c;
        let total = c.equity_amount() + c.debt_amount() + c.convertible_amount();
        approx::assert_relative_eq!(total, c.amount, epsilon = 1e-6);
    }

    #[test]
    fn test_historical_equity_raised() {
        let financing = FinancingAssumptions::default();
        approx::assert_relative_eq!(
            financing.historical_equity_raised(),
            661_000.0 + 3_500_000.0 + 10_300_000.0 + 36_900_000.0,
            epsilon = 1e-6
        );
    }
}
