use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarginError;
use crate::time_value::SolverConfig;
use crate::types::{Money, Rate};
use crate::MarginResult;

/// Longest supported schedule, in periods.
pub const MAX_PERIODS: u32 = 360;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Payment frequency. Determines the month step between periods and the
/// multiplier that turns a periodic IRR into an annual rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    #[serde(alias = "Monthly")]
    Monthly,
    #[serde(alias = "Quarterly")]
    Quarterly,
    #[serde(alias = "Semiannual", alias = "Semiannually", alias = "semiannually")]
    Semiannual,
}

impl PaymentFrequency {
    /// Calendar months between consecutive periods.
    pub fn months(self) -> u32 {
        match self {
            PaymentFrequency::Monthly => 1,
            PaymentFrequency::Quarterly => 3,
            PaymentFrequency::Semiannual => 6,
        }
    }

    /// Periods per year.
    pub fn multiplier(self) -> Decimal {
        match self {
            PaymentFrequency::Monthly => dec!(12),
            PaymentFrequency::Quarterly => dec!(4),
            PaymentFrequency::Semiannual => dec!(2),
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentFrequency::Monthly => "monthly",
            PaymentFrequency::Quarterly => "quarterly",
            PaymentFrequency::Semiannual => "semiannual",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymentFrequency {
    type Err = MarginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "m" => Ok(PaymentFrequency::Monthly),
            "quarterly" | "q" => Ok(PaymentFrequency::Quarterly),
            "semiannual" | "semiannually" | "semi-annual" | "s" => {
                Ok(PaymentFrequency::Semiannual)
            }
            other => Err(MarginError::InvalidInput {
                field: "frequency".into(),
                reason: format!("Unknown payment frequency '{other}'"),
            }),
        }
    }
}

/// Which amortization profile drives principal repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Full repayment of the outstanding balance at the last period.
    #[serde(alias = "Bullet")]
    Bullet,
    /// User-edited table of month offsets to repayment fractions.
    #[serde(alias = "Ad-hoc", alias = "AdHoc", alias = "adhoc")]
    AdHoc,
}

impl FromStr for ProfileKind {
    type Err = MarginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullet" => Ok(ProfileKind::Bullet),
            "ad-hoc" | "adhoc" | "ad_hoc" => Ok(ProfileKind::AdHoc),
            other => Err(MarginError::InvalidInput {
                field: "amortization_profile".into(),
                reason: format!("Unknown amortization profile '{other}'"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Input Types
// ---------------------------------------------------------------------------

/// Margin increment applied once the period index passes `after_period`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUp {
    pub rate: Rate,
    pub after_period: u32,
}

/// Expected-loss inputs for the net-of-reserves cash-flow array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveInputs {
    pub probability_of_default: Rate,
    pub loss_given_default: Rate,
}

impl ReserveInputs {
    /// PD x LGD, applied to each period's ending balance.
    pub fn loss_rate(&self) -> Rate {
        self.probability_of_default * self.loss_given_default
    }
}

/// Immutable inputs for one all-in margin calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    /// Facility amount, fully drawn at disbursement.
    pub principal: Money,
    /// Number of periods after disbursement (1..=360).
    pub num_periods: u32,
    /// Last period in which draws and commitment fees apply.
    pub draw_period: u32,
    /// Last period in which interest accrues. Defaults to `num_periods`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_periods: Option<u32>,
    pub frequency: PaymentFrequency,
    pub amortization_profile: ProfileKind,
    /// Margin while the period index is within the draw period.
    pub margin_during_draw: Rate,
    /// Margin once the draw period has passed.
    pub margin_after_draw: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_up: Option<StepUp>,
    #[serde(default)]
    pub upfront_fee_rate: Rate,
    #[serde(default)]
    pub commitment_fee_rate: Rate,
    pub closing_date: NaiveDate,
    pub disbursement_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserves: Option<ReserveInputs>,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl LoanParameters {
    /// Interest accrues through this period index.
    pub fn grace_period_count(&self) -> u32 {
        self.grace_periods.unwrap_or(self.num_periods)
    }

    /// Margin for period `period`, including any step-up.
    pub fn applicable_margin(&self, period: u32) -> Rate {
        let base = if period <= self.draw_period {
            self.margin_during_draw
        } else {
            self.margin_after_draw
        };
        match &self.step_up {
            Some(step) if period > step.after_period => base + step.rate,
            _ => base,
        }
    }

    /// Reject inputs the schedule generator cannot run on.
    pub fn validate(&self) -> MarginResult<()> {
        if self.principal.is_zero() {
            return Err(MarginError::DivisionByZero {
                context: "principal (amortization fractions and draw checks divide by it)".into(),
            });
        }
        if self.principal < Decimal::ZERO {
            return Err(MarginError::InvalidInput {
                field: "principal".into(),
                reason: "Principal must be positive".into(),
            });
        }
        if self.num_periods == 0 || self.num_periods > MAX_PERIODS {
            return Err(MarginError::InvalidInput {
                field: "num_periods".into(),
                reason: format!("Number of periods must be between 1 and {MAX_PERIODS}"),
            });
        }
        if self.draw_period > self.num_periods {
            return Err(MarginError::InvalidInput {
                field: "draw_period".into(),
                reason: "Draw period cannot exceed the number of periods".into(),
            });
        }
        if let Some(grace) = self.grace_periods {
            if grace > self.num_periods {
                return Err(MarginError::InvalidInput {
                    field: "grace_periods".into(),
                    reason: "Grace periods cannot exceed the number of periods".into(),
                });
            }
        }
        check_rate("margin_during_draw", self.margin_during_draw)?;
        check_rate("margin_after_draw", self.margin_after_draw)?;
        check_rate("upfront_fee_rate", self.upfront_fee_rate)?;
        check_rate("commitment_fee_rate", self.commitment_fee_rate)?;
        if let Some(step) = &self.step_up {
            check_rate("step_up.rate", step.rate)?;
            if step.after_period > self.num_periods {
                return Err(MarginError::InvalidInput {
                    field: "step_up.after_period".into(),
                    reason: "Step-up period cannot exceed the number of periods".into(),
                });
            }
        }
        if let Some(reserves) = &self.reserves {
            check_probability("reserves.probability_of_default", reserves.probability_of_default)?;
            check_probability("reserves.loss_given_default", reserves.loss_given_default)?;
        }
        if self.disbursement_date < self.closing_date {
            return Err(MarginError::InvalidInput {
                field: "disbursement_date".into(),
                reason: format!(
                    "Disbursement date {} precedes closing date {}",
                    self.disbursement_date, self.closing_date
                ),
            });
        }
        if self.solver.max_iterations == 0 {
            return Err(MarginError::InvalidInput {
                field: "solver.max_iterations".into(),
                reason: "Solver needs at least one iteration".into(),
            });
        }
        if self.solver.tolerance <= Decimal::ZERO {
            return Err(MarginError::InvalidInput {
                field: "solver.tolerance".into(),
                reason: "Solver tolerance must be positive".into(),
            });
        }
        let (low, high) = (self.solver.lower_bound, self.solver.upper_bound);
        if low <= dec!(-1) || low >= high {
            return Err(MarginError::InvalidInput {
                field: "solver.lower_bound".into(),
                reason: format!(
                    "Bounds must satisfy -1 < lower_bound < upper_bound (got {low} and {high})"
                ),
            });
        }
        Ok(())
    }
}

/// Rates are decimals: 0.0158 is 1.58%. Anything at or above 1 is almost
/// certainly a percentage typed by mistake.
fn check_rate(field: &str, rate: Rate) -> MarginResult<()> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(MarginError::InvalidInput {
            field: field.into(),
            reason: format!("Rate {rate} must be a decimal in [0, 1) (0.0158 = 1.58%)"),
        });
    }
    Ok(())
}

fn check_probability(field: &str, value: Rate) -> MarginResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(MarginError::InvalidInput {
            field: field.into(),
            reason: "Must be between 0 and 1".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bullet_loan() -> LoanParameters {
        LoanParameters {
            principal: dec!(1_000_000),
            num_periods: 10,
            draw_period: 2,
            grace_periods: None,
            frequency: PaymentFrequency::Quarterly,
            amortization_profile: ProfileKind::Bullet,
            margin_during_draw: dec!(0.02),
            margin_after_draw: dec!(0.025),
            step_up: None,
            upfront_fee_rate: dec!(0.01),
            commitment_fee_rate: dec!(0.005),
            closing_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            disbursement_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            reserves: None,
            solver: SolverConfig::default(),
        }
    }

    #[test]
    fn test_frequency_months_and_multiplier() {
        assert_eq!(PaymentFrequency::Monthly.months(), 1);
        assert_eq!(PaymentFrequency::Quarterly.months(), 3);
        assert_eq!(PaymentFrequency::Semiannual.months(), 6);
        assert_eq!(PaymentFrequency::Monthly.multiplier(), dec!(12));
        assert_eq!(PaymentFrequency::Quarterly.multiplier(), dec!(4));
        assert_eq!(PaymentFrequency::Semiannual.multiplier(), dec!(2));
    }

    #[test]
    fn test_frequency_accepts_spreadsheet_spelling() {
        let f: PaymentFrequency = serde_json::from_str("\"Semiannually\"").unwrap();
        assert_eq!(f, PaymentFrequency::Semiannual);
        assert_eq!("Quarterly".parse::<PaymentFrequency>().unwrap(), PaymentFrequency::Quarterly);
        assert!("weekly".parse::<PaymentFrequency>().is_err());
    }

    #[test]
    fn test_profile_kind_accepts_ad_hoc_spelling() {
        let p: ProfileKind = serde_json::from_str("\"Ad-hoc\"").unwrap();
        assert_eq!(p, ProfileKind::AdHoc);
        assert_eq!("bullet".parse::<ProfileKind>().unwrap(), ProfileKind::Bullet);
    }

    #[test]
    fn test_grace_defaults_to_period_count() {
        let mut loan = bullet_loan();
        assert_eq!(loan.grace_period_count(), 10);
        loan.grace_periods = Some(4);
        assert_eq!(loan.grace_period_count(), 4);
    }

    #[test]
    fn test_applicable_margin_switches_after_draw_period() {
        let loan = bullet_loan();
        assert_eq!(loan.applicable_margin(1), dec!(0.02));
        assert_eq!(loan.applicable_margin(2), dec!(0.02));
        assert_eq!(loan.applicable_margin(3), dec!(0.025));
    }

    #[test]
    fn test_step_up_applies_once_period_exceeds_threshold() {
        let mut loan = bullet_loan();
        loan.step_up = Some(StepUp {
            rate: dec!(0.0025),
            after_period: 5,
        });
        assert_eq!(loan.applicable_margin(5), dec!(0.025));
        assert_eq!(loan.applicable_margin(6), dec!(0.0275));
    }

    #[test]
    fn test_validate_accepts_standard_loan() {
        assert!(bullet_loan().validate().is_ok());
    }

    #[test]
    fn test_zero_principal_is_configuration_error() {
        let mut loan = bullet_loan();
        loan.principal = Decimal::ZERO;
        let err = loan.validate().unwrap_err();
        assert!(matches!(err, MarginError::DivisionByZero { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_period_count_bounds() {
        let mut loan = bullet_loan();
        loan.num_periods = 0;
        assert!(loan.validate().is_err());
        loan.num_periods = 361;
        loan.draw_period = 0;
        assert!(loan.validate().is_err());
        loan.num_periods = 360;
        assert!(loan.validate().is_ok());
    }

    #[test]
    fn test_percentage_rate_rejected() {
        let mut loan = bullet_loan();
        loan.margin_during_draw = dec!(1.58);
        match loan.validate().unwrap_err() {
            MarginError::InvalidInput { field, .. } => assert_eq!(field, "margin_during_draw"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inverted_solver_bounds_are_configuration_error() {
        let mut loan = bullet_loan();
        loan.solver.lower_bound = dec!(5);
        loan.solver.upper_bound = dec!(1);
        let err = loan.validate().unwrap_err();
        assert!(err.is_configuration());
        match err {
            MarginError::InvalidInput { field, .. } => assert_eq!(field, "solver.lower_bound"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lower_bound_at_minus_one_rejected() {
        let mut loan = bullet_loan();
        loan.solver.lower_bound = dec!(-1);
        assert!(loan.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_disbursement_before_closing_rejected() {
        let mut loan = bullet_loan();
        loan.disbursement_date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(loan.validate().is_err());
    }

    #[test]
    fn test_reserve_loss_rate() {
        let reserves = ReserveInputs {
            probability_of_default: dec!(0.02),
            loss_given_default: dec!(0.45),
        };
        assert_eq!(reserves.loss_rate(), dec!(0.009));
    }
}
