//! Debt schedule: convertible notes and the Series C debt tranches
//!
//! Every instrument accrues a full year of interest in its drawdown year. Notes
//! that convert at Series C leave the schedule at the start of the close year at
//! their accrued balance; whatever has not converted is repaid at maturity.

use crate::assumptions::{Assumptions, DebtTerms, RepaymentProfile};
use serde::{Deserialize, Serialize};

/// One loan-like instrument
#[derive(Debug, Clone, PartialEq)]
pub struct DebtInstrument {
    pub name: String,
    pub drawdown_year: i32,
    pub principal: f64,
    pub terms: DebtTerms,
    /// Year at whose start the balance converts into equity
    pub converts_in: Option<i32>,
}

/// Movements on one instrument within a fiscal year (positive magnitudes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DebtMovement {
    pub opening: f64,
    pub drawdown: f64,
    /// Interest added to the balance (non-cash)
    pub interest_accrued: f64,
    /// Interest settled in cash
    pub interest_paid: f64,
    pub repayment: f64,
    /// Balance converted into equity
    pub converted: f64,
    pub closing: f64,
}

impl DebtMovement {
    pub fn interest_expense(&self) -> f64 {
        self.interest_accrued + self.interest_paid
    }

    fn accumulate(&mut self, other: &DebtMovement) {
        self.opening += other.opening;
        self.drawdown += other.drawdown;
        self.interest_accrued += other.interest_accrued;
        self.interest_paid += other.interest_paid;
        self.repayment += other.repayment;
        self.converted += other.converted;
        self.closing += other.closing;
    }
}

impl DebtInstrument {
    pub fn maturity_year(&self) -> i32 {
        self.drawdown_year + self.terms.term_years as i32
    }

    /// Movements for `year`, rolled forward from drawdown
    pub fn movement(&self, year: i32) -> DebtMovement {
        let mut closing = 0.0;
        let mut current = DebtMovement::default();
        for y in self.drawdown_year..=year {
            current = self.step(y, closing);
            closing = current.closing;
        }
        current
    }

    fn step(&self, year: i32, opening: f64) -> DebtMovement {
        let mut m = DebtMovement {
            opening,
            ..Default::default()
        };

        if self.converts_in == Some(year) {
            m.converted = opening;
            return m;
        }
        if matches!(self.converts_in, Some(c) if year > c) || year > self.maturity_year() {
            return m;
        }

        if year == self.drawdown_year {
            m.drawdown = self.principal;
        }
        let mut balance = opening + m.drawdown;
        let interest = balance * self.terms.interest_rate;

        match self.terms.repayment {
            RepaymentProfile::RolledUp => {
                m.interest_accrued = interest;
                balance += interest;
            }
            RepaymentProfile::InterestOnly => m.interest_paid = interest,
            RepaymentProfile::Amortizing => {
                m.interest_paid = interest;
                if year > self.drawdown_year && self.terms.term_years > 0 {
                    let instalment = self.principal / self.terms.term_years as f64;
                    m.repayment = instalment.min(balance);
                    balance -= m.repayment;
                }
            }
        }

        if year == self.maturity_year() {
            m.repayment += balance;
            balance = 0.0;
        }
        m.closing = balance;
        m
    }
}

/// Movements for every instrument in one year
#[derive(Debug, Clone, PartialEq)]
pub struct DebtPosition {
    pub year: i32,
    pub by_instrument: Vec<(String, DebtMovement)>,
    pub total: DebtMovement,
}

/// All debt instruments the model carries
#[derive(Debug, Clone, PartialEq)]
pub struct DebtSchedule {
    instruments: Vec<DebtInstrument>,
}

impl DebtSchedule {
    pub fn new(instruments: Vec<DebtInstrument>) -> Self {
        Self { instruments }
    }

    /// Notes plus the Series C debt and convertible tranches
    pub fn from_assumptions(assumptions: &Assumptions) -> Self {
        let financing = &assumptions.financing;
        let series_c = &financing.series_c;
        let close_year = series_c.close_year();

        let mut instruments: Vec<DebtInstrument> = financing
            .notes
            .iter()
            .map(|note| DebtInstrument {
                name: note.name.clone(),
                drawdown_year: note.year,
                principal: note.principal,
                terms: note.as_debt_terms(),
                converts_in: note.converts_at(close_year).then_some(close_year),
            })
            .collect();

        for (suffix, principal, terms) in [
            ("Debt", series_c.debt_amount(), series_c.debt),
            ("Convertible", series_c.convertible_amount(), series_c.convertible),
        ] {
            if principal > 0.0 {
                instruments.push(DebtInstrument {
                    name: format!("{} {}", series_c.investor, suffix),
                    drawdown_year: close_year,
                    principal,
                    terms,
                    converts_in: None,
                });
            }
        }

        Self { instruments }
    }

    pub fn instruments(&self) -> &[DebtInstrument] {
        &self.instruments
    }

    pub fn position(&self, year: i32) -> DebtPosition {
        let mut total = DebtMovement::default();
        let by_instrument = self
            .instruments
            .iter()
            .map(|inst| {
                let m = inst.movement(year);
                total.accumulate(&m);
                (inst.name.clone(), m)
            })
            .collect();
        DebtPosition {
            year,
            by_instrument,
            total,
        }
    }

    /// Closing balances at the end of `year`, instruments with nothing outstanding omitted
    pub fn closing_balances(&self, year: i32) -> Vec<(String, f64)> {
        self.position(year)
            .by_instrument
            .into_iter()
            .filter(|(_, m)| m.closing > 0.0)
            .map(|(name, m)| (name, m.closing))
            .collect()
    }
}
