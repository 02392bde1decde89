//! Amortization profiles: Bullet or a user-edited Ad-hoc table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MarginError;
use crate::loan::params::{LoanParameters, ProfileKind};
use crate::types::{Money, Rate};
use crate::MarginResult;

/// How an entry's `value` is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Share of the original principal (0.05 = 5%).
    #[default]
    Fraction,
    /// Currency amount, converted to a share by dividing by the principal.
    Amount,
}

/// One row of an Ad-hoc amortization table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationEntry {
    /// Month offset from the disbursement date.
    pub month: u32,
    pub value: Decimal,
    #[serde(default)]
    pub kind: EntryKind,
}

impl AmortizationEntry {
    pub fn fraction(month: u32, value: Rate) -> Self {
        AmortizationEntry {
            month,
            value,
            kind: EntryKind::Fraction,
        }
    }

    pub fn amount(month: u32, value: Money) -> Self {
        AmortizationEntry {
            month,
            value,
            kind: EntryKind::Amount,
        }
    }

    /// Share of `principal` this row repays per period.
    pub fn fraction_of(&self, principal: Money) -> MarginResult<Rate> {
        match self.kind {
            EntryKind::Fraction => Ok(self.value),
            EntryKind::Amount => {
                if principal.is_zero() {
                    return Err(MarginError::DivisionByZero {
                        context: format!("amortization amount at month {}", self.month),
                    });
                }
                Ok(self.value / principal)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Editable table
// ---------------------------------------------------------------------------

/// Ad-hoc table as edited by the user before a calculation. Rows stay sorted
/// by month and months stay unique; the fraction total is not enforced here
/// (see `validation::table_issues`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AmortizationEntry>", into = "Vec<AmortizationEntry>")]
pub struct AdHocTable {
    entries: Vec<AmortizationEntry>,
}

impl AdHocTable {
    pub fn new(entries: Vec<AmortizationEntry>) -> MarginResult<Self> {
        let mut table = AdHocTable::default();
        for entry in entries {
            table.insert(entry)?;
        }
        Ok(table)
    }

    pub fn entries(&self) -> &[AmortizationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Add a row; its month must not already be present.
    pub fn insert(&mut self, entry: AmortizationEntry) -> MarginResult<()> {
        check_entry_value(&entry)?;
        match self.entries.binary_search_by_key(&entry.month, |e| e.month) {
            Ok(_) => Err(duplicate_month(entry.month)),
            Err(pos) => {
                self.entries.insert(pos, entry);
                Ok(())
            }
        }
    }

    /// Replace the row at `month`. The replacement may move to another month
    /// as long as that month is free.
    pub fn update(&mut self, month: u32, entry: AmortizationEntry) -> MarginResult<()> {
        let pos = self.position(month)?;
        check_entry_value(&entry)?;
        if entry.month != month && self.position(entry.month).is_ok() {
            return Err(duplicate_month(entry.month));
        }
        self.entries.remove(pos);
        self.insert(entry)
    }

    /// Delete the row at `month`.
    pub fn remove(&mut self, month: u32) -> MarginResult<AmortizationEntry> {
        let pos = self.position(month)?;
        Ok(self.entries.remove(pos))
    }

    /// Sum of all row fractions relative to `principal`.
    pub fn total_fraction(&self, principal: Money) -> MarginResult<Rate> {
        self.entries
            .iter()
            .try_fold(Decimal::ZERO, |acc, e| Ok(acc + e.fraction_of(principal)?))
    }

    fn position(&self, month: u32) -> MarginResult<usize> {
        self.entries
            .binary_search_by_key(&month, |e| e.month)
            .map_err(|_| MarginError::InvalidInput {
                field: "amortization_table".into(),
                reason: format!("No row at month {month}"),
            })
    }
}

impl TryFrom<Vec<AmortizationEntry>> for AdHocTable {
    type Error = MarginError;

    fn try_from(entries: Vec<AmortizationEntry>) -> Result<Self, Self::Error> {
        AdHocTable::new(entries)
    }
}

impl From<AdHocTable> for Vec<AmortizationEntry> {
    fn from(table: AdHocTable) -> Self {
        table.entries
    }
}

fn duplicate_month(month: u32) -> MarginError {
    MarginError::InvalidInput {
        field: "amortization_table".into(),
        reason: format!("Duplicate row for month {month}"),
    }
}

fn check_entry_value(entry: &AmortizationEntry) -> MarginResult<()> {
    if entry.value < Decimal::ZERO {
        return Err(MarginError::InvalidInput {
            field: "amortization_table".into(),
            reason: format!("Negative repayment at month {}", entry.month),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Principal repayment rule for a run, resolved from the loan parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum AmortizationProfile {
    /// Whole remaining balance at `final_period`.
    Bullet { final_period: u32 },
    /// `(month, fraction of original principal)`, sorted by month.
    AdHoc { steps: Vec<(u32, Rate)> },
}

impl AmortizationProfile {
    pub fn from_parameters(
        params: &LoanParameters,
        table: &[AmortizationEntry],
    ) -> MarginResult<Self> {
        match params.amortization_profile {
            ProfileKind::Bullet => Ok(AmortizationProfile::Bullet {
                final_period: params.num_periods,
            }),
            ProfileKind::AdHoc => {
                if table.is_empty() {
                    return Err(MarginError::EmptyAmortizationTable);
                }
                let table = AdHocTable::new(table.to_vec())?;
                let steps = table
                    .entries()
                    .iter()
                    .map(|e| Ok((e.month, e.fraction_of(params.principal)?)))
                    .collect::<MarginResult<Vec<_>>>()?;
                Ok(AmortizationProfile::AdHoc { steps })
            }
        }
    }

    /// Share of principal drawn in `period`: everything at disbursement.
    pub fn draw_fraction(&self, period: u32) -> Rate {
        if period == 0 {
            Decimal::ONE
        } else {
            Decimal::ZERO
        }
    }

    /// Repayment fraction for a period.
    ///
    /// Bullet: share of the remaining balance (1 at the final period).
    /// Ad-hoc: share of original principal from the row with the greatest
    /// month not after `month_offset`; 0 before the first row.
    pub fn fraction(&self, period: u32, month_offset: u32) -> Rate {
        match self {
            AmortizationProfile::Bullet { final_period } => {
                if period == *final_period {
                    Decimal::ONE
                } else {
                    Decimal::ZERO
                }
            }
            AmortizationProfile::AdHoc { steps } => {
                let idx = steps.partition_point(|(month, _)| *month <= month_offset);
                if idx == 0 {
                    Decimal::ZERO
                } else {
                    steps[idx - 1].1
                }
            }
        }
    }

    /// Scheduled repayment before any cap against the beginning balance.
    pub fn scheduled_payment(
        &self,
        period: u32,
        month_offset: u32,
        principal: Money,
        beginning_balance: Money,
    ) -> Money {
        let fraction = self.fraction(period, month_offset);
        match self {
            AmortizationProfile::Bullet { .. } => fraction * beginning_balance,
            AmortizationProfile::AdHoc { .. } => fraction * principal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::params::PaymentFrequency;
    use crate::time_value::SolverConfig;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn params(kind: ProfileKind) -> LoanParameters {
        LoanParameters {
            principal: dec!(2_000_000),
            num_periods: 20,
            draw_period: 1,
            grace_periods: None,
            frequency: PaymentFrequency::Semiannual,
            amortization_profile: kind,
            margin_during_draw: dec!(0.015),
            margin_after_draw: dec!(0.015),
            step_up: None,
            upfront_fee_rate: Decimal::ZERO,
            commitment_fee_rate: Decimal::ZERO,
            closing_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            disbursement_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            reserves: None,
            solver: SolverConfig::default(),
        }
    }

    #[test]
    fn test_bullet_pays_everything_at_final_period() {
        let profile =
            AmortizationProfile::from_parameters(&params(ProfileKind::Bullet), &[]).unwrap();
        assert_eq!(profile.fraction(19, 114), Decimal::ZERO);
        assert_eq!(profile.fraction(20, 120), Decimal::ONE);
        assert_eq!(
            profile.scheduled_payment(20, 120, dec!(2_000_000), dec!(1_750_000)),
            dec!(1_750_000)
        );
    }

    #[test]
    fn test_adhoc_closest_below_lookup() {
        let table = vec![
            AmortizationEntry::fraction(60, dec!(0.05)),
            AmortizationEntry::fraction(12, dec!(0.02)),
        ];
        let profile =
            AmortizationProfile::from_parameters(&params(ProfileKind::AdHoc), &table).unwrap();
        assert_eq!(profile.fraction(1, 6), Decimal::ZERO);
        assert_eq!(profile.fraction(2, 12), dec!(0.02));
        assert_eq!(profile.fraction(9, 54), dec!(0.02));
        assert_eq!(profile.fraction(10, 60), dec!(0.05));
        assert_eq!(profile.fraction(20, 120), dec!(0.05));
    }

    #[test]
    fn test_adhoc_amount_rows_become_fractions() {
        let table = vec![AmortizationEntry::amount(6, dec!(100_000))];
        let profile =
            AmortizationProfile::from_parameters(&params(ProfileKind::AdHoc), &table).unwrap();
        assert_eq!(profile.fraction(1, 6), dec!(0.05));
        assert_eq!(
            profile.scheduled_payment(1, 6, dec!(2_000_000), dec!(2_000_000)),
            dec!(100_000)
        );
    }

    #[test]
    fn test_empty_adhoc_table_is_configuration_error() {
        let err =
            AmortizationProfile::from_parameters(&params(ProfileKind::AdHoc), &[]).unwrap_err();
        assert!(matches!(err, MarginError::EmptyAmortizationTable));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_draw_fraction_only_at_disbursement() {
        let profile = AmortizationProfile::Bullet { final_period: 4 };
        assert_eq!(profile.draw_fraction(0), Decimal::ONE);
        assert_eq!(profile.draw_fraction(1), Decimal::ZERO);
    }

    #[test]
    fn test_table_keeps_rows_sorted_and_unique() {
        let mut table = AdHocTable::new(vec![
            AmortizationEntry::fraction(24, dec!(0.10)),
            AmortizationEntry::fraction(6, dec!(0.05)),
        ])
        .unwrap();
        assert_eq!(table.entries()[0].month, 6);

        let err = table.insert(AmortizationEntry::fraction(24, dec!(0.2))).unwrap_err();
        assert!(matches!(err, MarginError::InvalidInput { .. }));

        table.insert(AmortizationEntry::fraction(12, dec!(0.07))).unwrap();
        let months: Vec<u32> = table.entries().iter().map(|e| e.month).collect();
        assert_eq!(months, vec![6, 12, 24]);
    }

    #[test]
    fn test_table_update_and_remove() {
        let mut table = AdHocTable::new(vec![
            AmortizationEntry::fraction(6, dec!(0.05)),
            AmortizationEntry::fraction(12, dec!(0.05)),
        ])
        .unwrap();

        table.update(6, AmortizationEntry::fraction(18, dec!(0.10))).unwrap();
        let months: Vec<u32> = table.entries().iter().map(|e| e.month).collect();
        assert_eq!(months, vec![12, 18]);

        assert!(table.update(12, AmortizationEntry::fraction(18, dec!(0.1))).is_err());

        let removed = table.remove(12).unwrap();
        assert_eq!(removed.value, dec!(0.05));
        assert_eq!(table.len(), 1);
        assert!(table.remove(99).is_err());
    }

    #[test]
    fn test_negative_row_rejected() {
        let mut table = AdHocTable::default();
        assert!(table.insert(AmortizationEntry::fraction(6, dec!(-0.01))).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_total_fraction_mixes_kinds() {
        let table = AdHocTable::new(vec![
            AmortizationEntry::fraction(6, dec!(0.25)),
            AmortizationEntry::amount(12, dec!(500_000)),
        ])
        .unwrap();
        assert_eq!(table.total_fraction(dec!(2_000_000)).unwrap(), dec!(0.5));
    }

    #[test]
    fn test_table_deserialize_rejects_duplicates() {
        let json = r#"[{"month": 6, "value": "0.1"}, {"month": 6, "value": "0.2"}]"#;
        assert!(serde_json::from_str::<AdHocTable>(json).is_err());
    }
}
