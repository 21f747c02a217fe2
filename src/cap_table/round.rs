//! Financing rounds and the securities they issue

use crate::assumptions::{ConvertibleNoteTerms, FinancingAssumptions, PoolTopUp, PreferenceTerms};
use serde::{Deserialize, Serialize};

/// Class of security held by a cap table line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityClass {
    Common,
    Preferred(PreferenceTerms),
}

impl SecurityClass {
    pub fn preference(&self) -> Option<&PreferenceTerms> {
        match self {
            SecurityClass::Common => None,
            SecurityClass::Preferred(terms) => Some(terms),
        }
    }
}

/// What a round does to the cap table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundKind {
    /// Initial issuance of common shares
    Founding { shares: f64 },
    /// Priced equity round; outstanding notes convert into its class
    Priced {
        pre_money: f64,
        pool_top_up: Option<PoolTopUp>,
        preference: PreferenceTerms,
    },
    /// Note issuance: no shares until the next priced round
    ConvertibleNote(ConvertibleNoteTerms),
}

/// One financing event applied to the cap table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingRound {
    pub name: String,
    pub year: i32,
    /// Holder the new shares are recorded under
    pub investor: String,
    pub investment: f64,
    pub kind: RoundKind,
}

/// The company's financing history plus the Series C, in chronological order.
///
/// The Series C pre-money depends on projected ARR, so the caller passes it in.
pub fn rounds_from_assumptions(
    financing: &FinancingAssumptions,
    series_c_pre_money: f64,
) -> Vec<FinancingRound> {
    let founder = &financing.founder;
    let mut rounds = vec![FinancingRound {
        name: "Founding".to_string(),
        year: founder.year,
        investor: founder.holder.clone(),
        investment: founder.investment,
        kind: RoundKind::Founding {
            shares: founder.shares,
        },
    }];

    rounds.extend(financing.priced_rounds.iter().map(|r| FinancingRound {
        name: r.name.clone(),
        year: r.year,
        investor: r.name.clone(),
        investment: r.investment,
        kind: RoundKind::Priced {
            pre_money: r.pre_money(),
            pool_top_up: r.pool_top_up,
            preference: r.preference,
        },
    }));

    rounds.extend(financing.notes.iter().map(|n| FinancingRound {
        name: n.name.clone(),
        year: n.year,
        investor: n.holder.clone(),
        investment: n.principal,
        kind: RoundKind::ConvertibleNote(n.clone()),
    }));

    let c = &financing.series_c;
    rounds.push(FinancingRound {
        name: c.investor.clone(),
        year: c.close_year(),
        investor: c.investor.clone(),
        investment: c.equity_amount(),
        kind: RoundKind::Priced {
            pre_money: series_c_pre_money,
            pool_top_up: c.pool_top_up,
            preference: c.preference,
        },
    });

    // Stable, so same-year events keep their listed order
    rounds.sort_by_key(|r| r.year);
    rounds
}
