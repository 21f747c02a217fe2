//! Applies financing rounds in order and records ownership after each one

use super::round::{FinancingRound, RoundKind, SecurityClass};
use crate::assumptions::{ConvertibleNoteTerms, PoolTopUp, PreferenceTerms};
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// One holder's position in one security class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTableEntry {
    pub holder: String,
    /// Round or class label, e.g. "Series B" or "Common"
    pub class_name: String,
    pub security: SecurityClass,
    pub shares: f64,
    /// Cash invested, or note balance converted
    pub invested: f64,
    /// Fraction of total shares outstanding
    pub ownership: f64,
}

impl CapTableEntry {
    pub fn preference_amount(&self) -> f64 {
        self.security
            .preference()
            .map(|p| self.invested * p.multiple)
            .unwrap_or(0.0)
    }
}

/// Cap table state after a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: String,
    pub year: i32,
    pub investment: f64,
    /// Zero for note issuances
    pub price_per_share: f64,
    pub pre_money: f64,
    pub post_money: f64,
    pub pool_top_up_shares: f64,
    pub converted_note_shares: f64,
    pub new_investor_shares: f64,
    pub total_shares: f64,
    /// Notes issued but not yet converted (principal)
    pub notes_outstanding: f64,
    pub entries: Vec<CapTableEntry>,
}

impl RoundSnapshot {
    pub fn ownership_of(&self, holder: &str) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.holder == holder)
            .map(|e| e.ownership)
            .sum()
    }

    pub fn shares_of(&self, holder: &str) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.holder == holder)
            .map(|e| e.shares)
            .sum()
    }
}

/// Headline figures for the final cap table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTableSummary {
    pub rounds: usize,
    pub total_invested: f64,
    pub total_shares: f64,
    pub final_post_money: f64,
    pub founder_ownership: f64,
    pub pool_ownership: f64,
}

/// Full round-by-round history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTable {
    pub rounds: Vec<RoundSnapshot>,
    pub founder_holder: String,
    pub pool_holder: String,
}

impl CapTable {
    pub fn latest(&self) -> Option<&RoundSnapshot> {
        self.rounds.last()
    }

    /// The last snapshot closed on or before `year`
    pub fn as_of(&self, year: i32) -> Option<&RoundSnapshot> {
        self.rounds.iter().rev().find(|r| r.year <= year)
    }

    pub fn round(&self, name: &str) -> Option<&RoundSnapshot> {
        self.rounds.iter().find(|r| r.round == name)
    }

    pub fn summary(&self) -> CapTableSummary {
        let latest = self.latest();
        let entries = latest.map(|s| s.entries.as_slice()).unwrap_or_default();
        CapTableSummary {
            rounds: self.rounds.len(),
            total_invested: entries.iter().map(|e| e.invested).sum(),
            total_shares: latest.map(|s| s.total_shares).unwrap_or(0.0),
            final_post_money: latest.map(|s| s.post_money).unwrap_or(0.0),
            founder_ownership: latest.map(|s| s.ownership_of(&self.founder_holder)).unwrap_or(0.0),
            pool_ownership: latest.map(|s| s.ownership_of(&self.pool_holder)).unwrap_or(0.0),
        }
    }
}

/// Shares issued to top the pool up before a round is priced.
///
/// `Increase(p)` issues p of the post-top-up count, so every existing holder is
/// diluted by exactly p. `TargetTotal(p)` tops up only as far as needed for the
/// pool to reach p of the post-top-up count.
pub fn pool_top_up_shares(top_up: PoolTopUp, total_shares: f64, pool_shares: f64) -> f64 {
    match top_up {
        PoolTopUp::Increase(p) => total_shares * p / (1.0 - p),
        PoolTopUp::TargetTotal(p) => ((p * total_shares - pool_shares) / (1.0 - p)).max(0.0),
    }
}

/// Applies rounds one at a time
#[derive(Debug, Clone)]
pub struct CapTableEngine {
    entries: Vec<CapTableEntry>,
    pending_notes: Vec<ConvertibleNoteTerms>,
    snapshots: Vec<RoundSnapshot>,
    founder_holder: Option<String>,
    pool_holder: String,
    tolerance: f64,
}

impl CapTableEngine {
    pub fn new(pool_holder: impl Into<String>, tolerance: f64) -> Self {
        Self {
            entries: Vec::new(),
            pending_notes: Vec::new(),
            snapshots: Vec::new(),
            founder_holder: None,
            pool_holder: pool_holder.into(),
            tolerance,
        }
    }

    pub fn total_shares(&self) -> f64 {
        self.entries.iter().map(|e| e.shares).sum()
    }

    fn pool_shares(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.holder == self.pool_holder)
            .map(|e| e.shares)
            .sum()
    }

    fn issue(&mut self, holder: &str, class_name: &str, security: SecurityClass, shares: f64, invested: f64) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.holder == holder && e.class_name == class_name)
        {
            Some(entry) => {
                entry.shares += shares;
                entry.invested += invested;
            }
            None => self.entries.push(CapTableEntry {
                holder: holder.to_string(),
                class_name: class_name.to_string(),
                security,
                shares,
                invested,
                ownership: 0.0,
            }),
        }
    }

    /// Apply one round and return the resulting snapshot
    pub fn apply(&mut self, round: &FinancingRound) -> ModelResult<&RoundSnapshot> {
        if !round.investment.is_finite() || round.investment < 0.0 {
            return Err(ModelError::InvalidInput(format!(
                "{}: investment must be non-negative",
                round.name
            )));
        }

        let mut snapshot = RoundSnapshot {
            round: round.name.clone(),
            year: round.year,
            investment: round.investment,
            price_per_share: 0.0,
            pre_money: 0.0,
            post_money: 0.0,
            pool_top_up_shares: 0.0,
            converted_note_shares: 0.0,
            new_investor_shares: 0.0,
            total_shares: 0.0,
            notes_outstanding: 0.0,
            entries: Vec::new(),
        };

        match &round.kind {
            RoundKind::Founding { shares } => {
                if *shares <= 0.0 {
                    return Err(ModelError::InvalidInput(format!(
                        "{}: founding share count must be positive",
                        round.name
                    )));
                }
                self.issue(&round.investor, "Common", SecurityClass::Common, *shares, round.investment);
                self.founder_holder.get_or_insert_with(|| round.investor.clone());
                snapshot.price_per_share = round.investment / shares;
                snapshot.new_investor_shares = *shares;
                snapshot.post_money = round.investment;
            }
            RoundKind::ConvertibleNote(terms) => {
                self.pending_notes.push(terms.clone());
                snapshot.post_money = self.snapshots.last().map(|s| s.post_money).unwrap_or(0.0);
            }
            RoundKind::Priced {
                pre_money,
                pool_top_up,
                preference,
            } => {
                self.apply_priced(round, *pre_money, *pool_top_up, *preference, &mut snapshot)?;
            }
        }

        let total = self.total_shares();
        for entry in &mut self.entries {
            entry.ownership = if total > 0.0 { entry.shares / total } else { 0.0 };
        }
        let ownership_total: f64 = self.entries.iter().map(|e| e.ownership).sum();
        if (ownership_total - 1.0).abs() > self.tolerance {
            return Err(ModelError::OwnershipMismatch {
                round: round.name.clone(),
                total_pct: ownership_total * 100.0,
            });
        }

        snapshot.total_shares = total;
        snapshot.notes_outstanding = self.pending_notes.iter().map(|n| n.principal).sum();
        snapshot.entries = self.entries.clone();
        log::debug!(
            "{} ({}): {:.0} shares outstanding, post-money {:.0}",
            round.name,
            round.year,
            total,
            snapshot.post_money
        );
        self.snapshots.push(snapshot);
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }

    fn apply_priced(
        &mut self,
        round: &FinancingRound,
        pre_money: f64,
        pool_top_up: Option<PoolTopUp>,
        preference: PreferenceTerms,
        snapshot: &mut RoundSnapshot,
    ) -> ModelResult<()> {
        if !pre_money.is_finite() || pre_money <= 0.0 {
            return Err(ModelError::InvalidInput(format!(
                "{}: pre-money valuation must be positive",
                round.name
            )));
        }
        let existing = self.total_shares();
        if existing <= 0.0 {
            return Err(ModelError::InvalidInput(format!(
                "{}: priced round needs existing shares",
                round.name
            )));
        }

        // 1. Top up the pool before pricing
        if let Some(top_up) = pool_top_up {
            let pool = pool_top_up_shares(top_up, existing, self.pool_shares());
            if pool > 0.0 {
                let holder = self.pool_holder.clone();
                self.issue(&holder, "Options", SecurityClass::Common, pool, 0.0);
            }
            snapshot.pool_top_up_shares = pool;
        }

        // 2. Price on the fully diluted pre-money count
        let price = pre_money / self.total_shares();

        // 3. Convert outstanding notes at a discount to the round price
        let security = SecurityClass::Preferred(preference);
        let (converting, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_notes)
            .into_iter()
            .partition(|n| n.converts_at(round.year));
        for note in remaining {
            if note.maturity_year < round.year {
                log::info!("{} matured in {} before {}; not converted", note.name, note.maturity_year, round.name);
            } else {
                self.pending_notes.push(note);
            }
        }
        for note in &converting {
            let amount = note.accrued_balance(round.year);
            let shares = amount / (price * (1.0 - note.discount));
            self.issue(&note.holder, &round.name, security, shares, amount);
            snapshot.converted_note_shares += shares;
        }

        // 4. New money at the round price
        let new_shares = round.investment / price;
        if new_shares > 0.0 {
            self.issue(&round.investor, &round.name, security, new_shares, round.investment);
        }

        snapshot.price_per_share = price;
        snapshot.pre_money = pre_money;
        snapshot.new_investor_shares = new_shares;
        snapshot.post_money = price * self.total_shares();
        Ok(())
    }

    /// Apply every round in order
    pub fn apply_all<'r, I>(&mut self, rounds: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = &'r FinancingRound>,
    {
        for round in rounds {
            self.apply(round)?;
        }
        Ok(())
    }

    pub fn snapshots(&self) -> &[RoundSnapshot] {
        &self.snapshots
    }

    pub fn finish(self) -> CapTable {
        CapTable {
            rounds: self.snapshots,
            founder_holder: self.founder_holder.unwrap_or_default(),
            pool_holder: self.pool_holder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::{Assumptions, PreferenceTerms};
    use crate::cap_table::round::rounds_from_assumptions;
    use approx::assert_relative_eq;

    fn founding(shares: f64) -> FinancingRound {
        FinancingRound {
            name: "Founding".to_string(),
            year: 2018,
            investor: "Founder".to_string(),
            investment: 1_000.0,
            kind: RoundKind::Founding { shares },
        }
    }

    fn priced(name: &str, year: i32, investment: f64, pre_money: f64, pool: Option<PoolTopUp>) -> FinancingRound {
        FinancingRound {
            name: name.to_string(),
            year,
            investor: name.to_string(),
            investment,
            kind: RoundKind::Priced {
                pre_money,
                pool_top_up: pool,
                preference: PreferenceTerms::standard(1),
            },
        }
    }

    #[test]
    fn test_priced_round_dilution() {
        let mut engine = CapTableEngine::new("Option Pool", 1e-4);
        engine.apply(&founding(1_000_000.0)).unwrap();
        let snap = engine.apply(&priced("Seed", 2019, 1_000_000.0, 4_000_000.0, None)).unwrap();

        assert_relative_eq!(snap.price_per_share, 4.0, epsilon = 1e-12);
        assert_relative_eq!(snap.new_investor_shares, 250_000.0, epsilon = 1e-6);
        assert_relative_eq!(snap.post_money, 5_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(snap.ownership_of("Founder"), 0.8, epsilon = 1e-12);
        assert_relative_eq!(snap.ownership_of("Seed"), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_pool_increase_dilutes_existing_by_exactly_its_size() {
        let mut engine = CapTableEngine::new("Option Pool", 1e-4);
        engine.apply(&founding(9_000_000.0)).unwrap();
        let snap = engine
            .apply(&priced("Series A", 2020, 2_000_000.0, 8_000_000.0, Some(PoolTopUp::Increase(0.10))))
            .unwrap();

        assert_relative_eq!(snap.pool_top_up_shares, 1_000_000.0, epsilon = 1e-6);

        // Priced on the post-top-up count of 10M shares
        let post_top_up = 9_000_000.0 + snap.pool_top_up_shares;
        assert_relative_eq!(snap.price_per_share, 8_000_000.0 / post_top_up, epsilon = 1e-12);
        assert_relative_eq!(snap.new_investor_shares, 2_000_000.0 / (8_000_000.0 / post_top_up), epsilon = 1e-6);
        assert_relative_eq!(snap.total_shares, 12_500_000.0, epsilon = 1e-6);

        // Founder loses the pool's 10% first, then the new money's share of post-money
        let new_money_share = 2_000_000.0 / (8_000_000.0 + 2_000_000.0);
        assert_relative_eq!(snap.ownership_of("Founder"), 0.90 * (1.0 - new_money_share), epsilon = 1e-12);
        assert_relative_eq!(snap.ownership_of("Option Pool"), 0.10 * (1.0 - new_money_share), epsilon = 1e-12);
        assert_relative_eq!(snap.ownership_of("Series A"), new_money_share, epsilon = 1e-12);
    }

    #[test]
    fn test_target_total_tops_up_only_the_gap() {
        assert_relative_eq!(
            pool_top_up_shares(PoolTopUp::TargetTotal(0.15), 1_000_000.0, 0.0),
            150_000.0 / 0.85,
            epsilon = 1e-6
        );
        // Already above target
        assert_eq!(pool_top_up_shares(PoolTopUp::TargetTotal(0.10), 1_000_000.0, 200_000.0), 0.0);
    }

    #[test]
    fn test_note_converts_at_discount_on_accrued_balance() {
        let mut engine = CapTableEngine::new("Option Pool", 1e-4);
        engine.apply(&founding(1_000_000.0)).unwrap();
        engine
            .apply(&FinancingRound {
                name: "Note".to_string(),
                year: 2020,
                investor: "Noteholder".to_string(),
                investment: 100_000.0,
                kind: RoundKind::ConvertibleNote(ConvertibleNoteTerms {
                    name: "Note".to_string(),
                    holder: "Noteholder".to_string(),
                    year: 2020,
                    principal: 100_000.0,
                    interest_rate: 0.10,
                    discount: 0.20,
                    maturity_year: 2025,
                }),
            })
            .unwrap();
        let snap = engine.apply(&priced("Series A", 2022, 0.0, 10_000_000.0, None)).unwrap();

        // Price 10.00, conversion price 8.00, balance 121,000
        assert_relative_eq!(snap.converted_note_shares, 121_000.0 / 8.0, epsilon = 1e-6);
        assert_eq!(snap.notes_outstanding, 0.0);
        let entry = snap.entries.iter().find(|e| e.holder == "Noteholder").unwrap();
        assert_eq!(entry.class_name, "Series A");
        assert_relative_eq!(entry.invested, 121_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_priced_round_requires_positive_pre_money() {
        let mut engine = CapTableEngine::new("Option Pool", 1e-4);
        engine.apply(&founding(1_000_000.0)).unwrap();
        let result = engine.apply(&priced("Seed", 2019, 1_000_000.0, 0.0, None));
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn test_default_history_ownership_sums_to_one() {
        let assumptions = Assumptions::default_plan();
        let rounds = rounds_from_assumptions(&assumptions.financing, 60_000_000.0);
        let mut engine = CapTableEngine::new(&assumptions.financing.option_pool_holder, 1e-4);
        engine.apply_all(&rounds).unwrap();
        let table = engine.finish();

        assert_eq!(table.rounds.len(), 7);
        for snap in &table.rounds {
            let total: f64 = snap.entries.iter().map(|e| e.ownership).sum();
            assert!((total - 1.0).abs() <= 1e-4, "{} sums to {}", snap.round, total);
        }

        // Before the Series C close the notes are still outstanding
        let pre_close = table.as_of(2025).unwrap();
        assert_ne!(pre_close.round, "Series C");
        assert!(pre_close.notes_outstanding > 0.0);
        assert_eq!(table.as_of(2026).unwrap().round, "Series C");
        assert!(table.as_of(2017).is_none());

        let series_c = table.round("Series C").unwrap();
        assert!(series_c.ownership_of("CLN Holder") > 0.0);
        let summary = table.summary();
        assert!(summary.pool_ownership > 0.0 && summary.pool_ownership < 0.15);
        assert!(summary.founder_ownership > 0.0 && summary.founder_ownership < 1.0);
    }
}
