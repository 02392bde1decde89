//! Period-by-period amortization schedule.
//!
//! The engine is a fold over the period dates: a small state value (balance,
//! cumulative draws, whether the upfront fee has been taken) is threaded
//! through a pure step function that emits one immutable `PeriodRecord` per
//! period.

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::loan::dates::{DateSequencer, PeriodDate};
use crate::loan::params::LoanParameters;
use crate::loan::profile::{AmortizationEntry, AmortizationProfile};
use crate::loan::validation::ScheduleIssue;
use crate::types::{Money, Rate};
use crate::MarginResult;

/// Actual/360 day-count denominator.
const DAY_COUNT_BASIS: Decimal = dec!(360);

/// One row of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub period: u32,
    pub date: NaiveDate,
    pub days: i64,
    /// Margin in force for the period (draw/after-draw plus step-up).
    pub margin: Rate,
    pub beginning_balance: Money,
    pub draw: Money,
    pub interest: Money,
    pub upfront_fee: Money,
    pub commitment_fee: Money,
    pub amortization: Money,
    pub ending_balance: Money,
}

/// A generated schedule plus the issues raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub records: Vec<PeriodRecord>,
    pub issues: Vec<ScheduleIssue>,
}

#[derive(Debug, Clone, Copy, Default)]
struct EngineState {
    balance: Money,
    cumulative_draws: Money,
    upfront_recognized: bool,
}

/// Walks periods 0..=N for one loan.
pub struct PeriodEngine<'a> {
    params: &'a LoanParameters,
    profile: &'a AmortizationProfile,
    grace_periods: u32,
}

impl<'a> PeriodEngine<'a> {
    pub fn new(params: &'a LoanParameters, profile: &'a AmortizationProfile) -> Self {
        PeriodEngine {
            params,
            profile,
            grace_periods: params.grace_period_count(),
        }
    }

    /// Run the fold over `dates` (as produced by `DateSequencer::dates`).
    pub fn run(&self, dates: &[PeriodDate]) -> Schedule {
        let mut records = Vec::with_capacity(dates.len());
        let mut issues = Vec::new();
        let mut state = EngineState::default();

        for period_date in dates {
            let (record, next, issue) = self.step(state, period_date);
            records.push(record);
            issues.extend(issue);
            state = next;
        }

        debug!(
            "Built {} periods, final balance {}, {} amortization caps",
            records.len(),
            state.balance,
            issues.len()
        );
        Schedule { records, issues }
    }

    fn step(
        &self,
        state: EngineState,
        pd: &PeriodDate,
    ) -> (PeriodRecord, EngineState, Option<ScheduleIssue>) {
        let params = self.params;
        let principal = params.principal;
        let i = pd.period;
        let days = Decimal::from(pd.days);
        let beginning_balance = state.balance;
        let undrawn = principal - state.cumulative_draws;

        let draw = if i <= params.draw_period {
            (principal * self.profile.draw_fraction(i))
                .min(undrawn)
                .max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        let margin = params.applicable_margin(i);
        let interest = if i > 0 && i <= self.grace_periods {
            margin * beginning_balance * days / DAY_COUNT_BASIS
        } else {
            Decimal::ZERO
        };

        let takes_upfront = !state.upfront_recognized
            && i <= params.draw_period
            && i < self.grace_periods
            && pd.date == params.disbursement_date;
        let upfront_fee = if takes_upfront {
            principal * params.upfront_fee_rate
        } else {
            Decimal::ZERO
        };

        let commitment_fee = if i > 0 && i <= params.draw_period {
            undrawn * params.commitment_fee_rate * days / DAY_COUNT_BASIS
        } else {
            Decimal::ZERO
        };

        let (amortization, issue) = if i == 0 {
            (Decimal::ZERO, None)
        } else {
            let scheduled = self.profile.scheduled_payment(
                i,
                pd.month_offset,
                principal,
                beginning_balance,
            );
            let available = beginning_balance.max(Decimal::ZERO);
            if scheduled > available {
                (
                    available,
                    Some(ScheduleIssue::AmortizationCapped {
                        period: i,
                        scheduled,
                        applied: available,
                    }),
                )
            } else {
                (scheduled, None)
            }
        };

        let ending_balance = beginning_balance + draw - amortization;

        let record = PeriodRecord {
            period: i,
            date: pd.date,
            days: pd.days,
            margin,
            beginning_balance,
            draw,
            interest,
            upfront_fee,
            commitment_fee,
            amortization,
            ending_balance,
        };
        let next = EngineState {
            balance: ending_balance,
            cumulative_draws: state.cumulative_draws + draw,
            upfront_recognized: state.upfront_recognized || takes_upfront,
        };
        (record, next, issue)
    }
}

/// Build the schedule for validated parameters and an Ad-hoc table (ignored
/// for Bullet loans).
pub fn build_schedule(
    params: &LoanParameters,
    table: &[AmortizationEntry],
) -> MarginResult<Schedule> {
    params.validate()?;
    let profile = AmortizationProfile::from_parameters(params, table)?;
    let dates =
        DateSequencer::new(params.disbursement_date, params.frequency, params.num_periods)
            .dates()?;
    Ok(PeriodEngine::new(params, &profile).run(&dates))
}
