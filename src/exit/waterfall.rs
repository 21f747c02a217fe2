//! Liquidation waterfall: preferences by seniority, conversion decisions, residual split
//!
//! Non-participating preferred either take their preference or convert to common,
//! whichever pays more. Conversion choices are settled by a fixed point: lines are
//! tested in order of lowest preference per share, a line converts only when that
//! pays strictly more than staying preferred, and a converted line never reverts.

use crate::cap_table::CapTableEntry;
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// How a line was paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Preference paid in full
    Preference,
    /// Converted to common and shared the residual
    AsConverted,
    /// Preference paid in full plus a share of the residual
    Participating,
    /// Common share of the residual
    Common,
    /// Preference only partly paid
    Impaired,
    /// Nothing paid
    Zeroed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub holder: String,
    pub class_name: String,
    pub shares: f64,
    pub ownership: f64,
    pub preference_claim: f64,
    pub preference_paid: f64,
    pub residual_paid: f64,
    pub total: f64,
    pub status: PayoutStatus,
}

/// A preference claim the proceeds could not cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceShortfall {
    pub holder: String,
    pub class_name: String,
    pub seniority: u32,
    pub claim: f64,
    pub paid: f64,
    pub shortfall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub proceeds: f64,
    pub payouts: Vec<Payout>,
    pub total_preference_claims: f64,
    pub total_distributed: f64,
    /// Left over when nobody is entitled to the residual
    pub undistributed: f64,
    pub shortfalls: Vec<PreferenceShortfall>,
}

impl WaterfallResult {
    pub fn payout_to(&self, holder: &str) -> f64 {
        self.payouts
            .iter()
            .filter(|p| p.holder == holder)
            .map(|p| p.total)
            .sum()
    }
}

/// A cap table line as the waterfall sees it
struct Line {
    shares: f64,
    claim: f64,
    seniority: u32,
    preferred: bool,
    participating: bool,
}

impl Line {
    fn from_entry(entry: &CapTableEntry) -> Self {
        match entry.security.preference() {
            Some(terms) => Line {
                shares: entry.shares,
                claim: entry.preference_amount(),
                seniority: terms.seniority,
                preferred: true,
                participating: terms.participating,
            },
            None => Line {
                shares: entry.shares,
                claim: 0.0,
                seniority: 0,
                preferred: false,
                participating: false,
            },
        }
    }

    fn takes_preference(&self, converted: bool) -> bool {
        self.preferred && !converted
    }

    fn shares_residual(&self, converted: bool) -> bool {
        !self.preferred || converted || self.participating
    }

    fn preference_per_share(&self) -> f64 {
        if self.shares > 0.0 {
            self.claim / self.shares
        } else {
            f64::INFINITY
        }
    }
}

struct Allocation {
    preference_paid: Vec<f64>,
    residual_paid: Vec<f64>,
    undistributed: f64,
}

impl Allocation {
    fn total(&self, i: usize) -> f64 {
        self.preference_paid[i] + self.residual_paid[i]
    }
}

/// Distribute proceeds for a fixed set of conversion choices
fn allocate(lines: &[Line], converted: &[bool], proceeds: f64) -> Allocation {
    let mut preference_paid = vec![0.0; lines.len()];
    let mut remaining = proceeds;

    let mut ranks: Vec<u32> = lines
        .iter()
        .zip(converted)
        .filter(|&(l, &c)| l.takes_preference(c))
        .map(|(l, _)| l.seniority)
        .collect();
    ranks.sort_unstable();
    ranks.dedup();

    for rank in ranks {
        let tier: Vec<usize> = (0..lines.len())
            .filter(|&i| lines[i].takes_preference(converted[i]) && lines[i].seniority == rank)
            .collect();
        let tier_claim: f64 = tier.iter().map(|&i| lines[i].claim).sum();
        if tier_claim <= 0.0 {
            continue;
        }
        let paid = remaining.min(tier_claim);
        for &i in &tier {
            preference_paid[i] = paid * lines[i].claim / tier_claim;
        }
        remaining -= paid;
    }

    let mut residual_paid = vec![0.0; lines.len()];
    let participating_shares: f64 = lines
        .iter()
        .zip(converted)
        .filter(|&(l, &c)| l.shares_residual(c))
        .map(|(l, _)| l.shares)
        .sum();

    let undistributed = if participating_shares > 0.0 {
        for (i, line) in lines.iter().enumerate() {
            if line.shares_residual(converted[i]) {
                residual_paid[i] = remaining * line.shares / participating_shares;
            }
        }
        0.0
    } else {
        remaining
    };

    Allocation {
        preference_paid,
        residual_paid,
        undistributed,
    }
}

/// Settle conversion choices for non-participating preferred
fn conversion_choices(lines: &[Line], proceeds: f64) -> Vec<bool> {
    let mut order: Vec<usize> = (0..lines.len())
        .filter(|&i| lines[i].preferred && !lines[i].participating)
        .collect();
    order.sort_by(|&a, &b| lines[a].preference_per_share().total_cmp(&lines[b].preference_per_share()));

    let mut converted = vec![false; lines.len()];
    loop {
        let current = allocate(lines, &converted, proceeds);
        let next = order.iter().copied().find(|&i| {
            if converted[i] {
                return false;
            }
            let mut trial = converted.clone();
            trial[i] = true;
            allocate(lines, &trial, proceeds).total(i) > current.total(i)
        });
        match next {
            Some(i) => converted[i] = true,
            None => return converted,
        }
    }
}

/// Distribute exit proceeds to equity holders
pub fn run_waterfall(entries: &[CapTableEntry], proceeds: f64) -> ModelResult<WaterfallResult> {
    if !proceeds.is_finite() || proceeds < 0.0 {
        return Err(ModelError::InvalidInput(format!(
            "exit proceeds must be a non-negative amount (got {})",
            proceeds
        )));
    }

    let lines: Vec<Line> = entries.iter().map(Line::from_entry).collect();
    let converted = conversion_choices(&lines, proceeds);
    let allocation = allocate(&lines, &converted, proceeds);

    let mut shortfalls = Vec::new();
    let payouts: Vec<Payout> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let line = &lines[i];
            let preference_paid = allocation.preference_paid[i];
            let residual_paid = allocation.residual_paid[i];
            let total = preference_paid + residual_paid;
            let short = line.takes_preference(converted[i]) && preference_paid < line.claim - 1e-6;

            if short {
                shortfalls.push(PreferenceShortfall {
                    holder: entry.holder.clone(),
                    class_name: entry.class_name.clone(),
                    seniority: line.seniority,
                    claim: line.claim,
                    paid: preference_paid,
                    shortfall: line.claim - preference_paid,
                });
            }

            let status = if total <= 0.0 {
                PayoutStatus::Zeroed
            } else if short {
                PayoutStatus::Impaired
            } else if !line.preferred {
                PayoutStatus::Common
            } else if converted[i] {
                PayoutStatus::AsConverted
            } else if line.participating {
                PayoutStatus::Participating
            } else {
                PayoutStatus::Preference
            };

            Payout {
                holder: entry.holder.clone(),
                class_name: entry.class_name.clone(),
                shares: entry.shares,
                ownership: entry.ownership,
                preference_claim: if converted[i] { 0.0 } else { line.claim },
                preference_paid,
                residual_paid,
                total,
                status,
            }
        })
        .collect();

    let total_distributed = payouts.iter().map(|p| p.total).sum();
    if !shortfalls.is_empty() {
        log::warn!(
            "Exit proceeds of {:.0} leave {} preference claim(s) short",
            proceeds,
            shortfalls.len()
        );
    }

    Ok(WaterfallResult {
        proceeds,
        payouts,
        total_preference_claims: lines.iter().map(|l| l.claim).sum(),
        total_distributed,
        undistributed: allocation.undistributed,
        shortfalls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::PreferenceTerms;
    use crate::cap_table::SecurityClass;
    use approx::assert_relative_eq;

    fn common(holder: &str, shares: f64) -> CapTableEntry {
        CapTableEntry {
            holder: holder.to_string(),
            class_name: "Common".to_string(),
            security: SecurityClass::Common,
            shares,
            invested: 0.0,
            ownership: 0.0,
        }
    }

    fn preferred(holder: &str, shares: f64, invested: f64, seniority: u32, participating: bool) -> CapTableEntry {
        CapTableEntry {
            holder: holder.to_string(),
            class_name: holder.to_string(),
            security: SecurityClass::Preferred(PreferenceTerms {
                multiple: 1.0,
                seniority,
                participating,
            }),
            shares,
            invested,
            ownership: 0.0,
        }
    }

    fn stack() -> Vec<CapTableEntry> {
        vec![
            common("Founder", 5_000_000.0),
            preferred("Senior", 1_000_000.0, 2_000_000.0, 1, false),
            preferred("Junior", 2_000_000.0, 3_000_000.0, 2, false),
        ]
    }

    #[test]
    fn test_senior_paid_first_then_junior() {
        let result = run_waterfall(&stack(), 4_000_000.0).unwrap();
        assert_relative_eq!(result.payout_to("Senior"), 2_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.payout_to("Junior"), 2_000_000.0, epsilon = 1e-6);
        assert_eq!(result.payout_to("Founder"), 0.0);

        assert_eq!(result.payouts[0].status, PayoutStatus::Zeroed);
        assert_eq!(result.payouts[1].status, PayoutStatus::Preference);
        assert_eq!(result.payouts[2].status, PayoutStatus::Impaired);

        assert_eq!(result.shortfalls.len(), 1);
        assert_relative_eq!(result.shortfalls[0].shortfall, 1_000_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_large_exit_converts_preferred() {
        // 8M shares at 100M: 12.50 per share beats every preference
        let result = run_waterfall(&stack(), 100_000_000.0).unwrap();
        assert!(result.payouts.iter().all(|p| p.status != PayoutStatus::Preference));
        assert_relative_eq!(result.payout_to("Senior"), 12_500_000.0, epsilon = 1e-4);
        assert_relative_eq!(result.payout_to("Founder"), 62_500_000.0, epsilon = 1e-4);
        assert!(result.shortfalls.is_empty());
    }

    #[test]
    fn test_partial_conversion() {
        // At 12M: junior's preference is 1.50/share, senior's 2.00/share.
        // Junior converting: senior 2M, residual 10M over 7M shares -> junior 2.857M < 3M, stays.
        let result = run_waterfall(&stack(), 12_000_000.0).unwrap();
        assert_eq!(result.payouts[2].status, PayoutStatus::Preference);
        assert_eq!(result.payouts[1].status, PayoutStatus::Preference);
        assert_relative_eq!(result.payout_to("Founder"), 7_000_000.0, epsilon = 1e-6);

        // At 30M: junior converting gets 28M * 2/7 = 8M > 3M
        let result = run_waterfall(&stack(), 30_000_000.0).unwrap();
        assert_eq!(result.payouts[2].status, PayoutStatus::AsConverted);
    }

    #[test]
    fn test_participating_takes_preference_and_residual() {
        let entries = vec![
            common("Founder", 3_000_000.0),
            preferred("Investor", 1_000_000.0, 2_000_000.0, 1, true),
        ];
        let result = run_waterfall(&entries, 10_000_000.0).unwrap();
        let investor = &result.payouts[1];
        assert_eq!(investor.status, PayoutStatus::Participating);
        assert_relative_eq!(investor.preference_paid, 2_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(investor.residual_paid, 2_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.payout_to("Founder"), 6_000_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_same_rank_shares_pro_rata() {
        let entries = vec![
            preferred("A", 1_000_000.0, 1_000_000.0, 1, false),
            preferred("B", 1_000_000.0, 3_000_000.0, 1, false),
        ];
        let result = run_waterfall(&entries, 2_000_000.0).unwrap();
        assert_relative_eq!(result.payout_to("A"), 500_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.payout_to("B"), 1_500_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_total_is_min_of_proceeds_and_claims() {
        let entries = vec![preferred("Only", 1_000_000.0, 2_000_000.0, 1, false)];
        // Converting gives the whole 5M, so it converts
        let result = run_waterfall(&entries, 5_000_000.0).unwrap();
        assert_relative_eq!(result.total_distributed, 5_000_000.0, epsilon = 1e-6);

        for proceeds in [0.0, 1_000_000.0, 4_000_000.0, 50_000_000.0] {
            let result = run_waterfall(&stack(), proceeds).unwrap();
            assert_relative_eq!(
                result.total_distributed + result.undistributed,
                proceeds,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_payouts_monotone_in_proceeds() {
        let mut prior: Option<WaterfallResult> = None;
        for step in 0..40 {
            let result = run_waterfall(&stack(), step as f64 * 1_000_000.0).unwrap();
            if let Some(prev) = &prior {
                for (a, b) in prev.payouts.iter().zip(&result.payouts) {
                    assert!(b.total + 1e-6 >= a.total, "{} fell at step {}", b.holder, step);
                }
            }
            prior = Some(result);
        }
    }

    #[test]
    fn test_rejects_negative_or_nan_proceeds() {
        assert!(matches!(run_waterfall(&stack(), -1.0), Err(ModelError::InvalidInput(_))));
        assert!(matches!(run_waterfall(&stack(), f64::NAN), Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_proceeds_zero_everyone() {
        let result = run_waterfall(&stack(), 0.0).unwrap();
        assert!(result.payouts.iter().all(|p| p.status == PayoutStatus::Zeroed));
        assert_eq!(result.total_distributed, 0.0);
    }
}
