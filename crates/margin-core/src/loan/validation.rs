//! Post-calculation checks. Nothing here aborts a run: every finding is
//! attached to the result next to the numbers it qualifies.

use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::loan::cashflows::CashflowArray;
use crate::loan::profile::AmortizationEntry;
use crate::loan::rates::ArrayIrr;
use crate::loan::schedule::PeriodRecord;
use crate::types::{Money, Rate};

/// Allowed gap between total draws and principal.
pub const DRAW_TOLERANCE: Money = dec!(1.0);
/// Ending balances above `-BALANCE_TOLERANCE` count as non-negative, and
/// balances below it at maturity count as repaid.
pub const BALANCE_TOLERANCE: Money = dec!(0.01);

/// A non-fatal finding about a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleIssue {
    DrawMismatch { drawn: Money, principal: Money },
    NegativeBalance { period: u32, ending_balance: Money },
    AmortizationCapped { period: u32, scheduled: Money, applied: Money },
    TableOverAllocated { total_fraction: Rate },
    OutstandingAtMaturity { balance: Money },
    SolverFailure { array: CashflowArray, reason: String },
}

impl ScheduleIssue {
    /// Issues that turn the overall status to `Fail`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ScheduleIssue::DrawMismatch { .. }
                | ScheduleIssue::NegativeBalance { .. }
                | ScheduleIssue::SolverFailure { .. }
        )
    }
}

impl fmt::Display for ScheduleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleIssue::DrawMismatch { drawn, principal } => {
                write!(f, "Review Draw: total draws {drawn} differ from principal {principal}")
            }
            ScheduleIssue::NegativeBalance {
                period,
                ending_balance,
            } => write!(f, "Negative ending balance {ending_balance} at period {period}"),
            ScheduleIssue::AmortizationCapped {
                period,
                scheduled,
                applied,
            } => write!(
                f,
                "Amortization at period {period} capped from {scheduled} \
                 to beginning balance {applied}"
            ),
            ScheduleIssue::TableOverAllocated { total_fraction } => write!(
                f,
                "Ad-hoc table rows total {}% of principal (over 100%)",
                (total_fraction * dec!(100)).normalize()
            ),
            ScheduleIssue::OutstandingAtMaturity { balance } => {
                write!(f, "Balance of {balance} remains outstanding at the final period")
            }
            ScheduleIssue::SolverFailure { array, reason } => {
                write!(f, "IRR for {array} cash flows unavailable: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Review Draw")]
    ReviewDraw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub draw_status: DrawStatus,
    pub draws_total: Money,
    pub amortization_total: Money,
    pub final_balance: Money,
    pub balance_ok: bool,
    pub solver_ok: bool,
    pub issues: Vec<ScheduleIssue>,
}

impl ValidationReport {
    pub fn warnings(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// Flag an Ad-hoc table whose rows add up to more than the principal.
pub fn table_issues(table: &[AmortizationEntry], principal: Money) -> Vec<ScheduleIssue> {
    if principal.is_zero() {
        return Vec::new();
    }
    let total_fraction: Rate = table
        .iter()
        .filter_map(|e| e.fraction_of(principal).ok())
        .sum();
    if total_fraction > Decimal::ONE {
        vec![ScheduleIssue::TableOverAllocated { total_fraction }]
    } else {
        Vec::new()
    }
}

/// Run the draw, balance and solver checks and merge them with the issues
/// collected upstream (amortization caps, table checks).
pub fn validate(
    principal: Money,
    records: &[PeriodRecord],
    irrs: &[ArrayIrr],
    upstream: Vec<ScheduleIssue>,
) -> ValidationReport {
    let mut issues = upstream;

    let draws_total: Money = records.iter().map(|r| r.draw).sum();
    let amortization_total: Money = records.iter().map(|r| r.amortization).sum();
    let final_balance = records
        .last()
        .map(|r| r.ending_balance)
        .unwrap_or(Decimal::ZERO);

    let draw_status = if (draws_total - principal).abs() <= DRAW_TOLERANCE {
        DrawStatus::Ok
    } else {
        issues.push(ScheduleIssue::DrawMismatch {
            drawn: draws_total,
            principal,
        });
        DrawStatus::ReviewDraw
    };

    let mut balance_ok = true;
    for r in records.iter().filter(|r| r.ending_balance < -BALANCE_TOLERANCE) {
        balance_ok = false;
        issues.push(ScheduleIssue::NegativeBalance {
            period: r.period,
            ending_balance: r.ending_balance,
        });
    }

    if final_balance > BALANCE_TOLERANCE {
        issues.push(ScheduleIssue::OutstandingAtMaturity {
            balance: final_balance,
        });
    }

    let mut solver_ok = true;
    for result in irrs {
        if let Some(reason) = &result.failure {
            solver_ok = false;
            issues.push(ScheduleIssue::SolverFailure {
                array: result.array,
                reason: reason.clone(),
            });
        }
    }

    for issue in &issues {
        warn!("{issue}");
    }

    let status = if issues.iter().any(ScheduleIssue::is_failure) {
        ValidationStatus::Fail
    } else {
        ValidationStatus::Pass
    };

    ValidationReport {
        status,
        draw_status,
        draws_total,
        amortization_total,
        final_balance,
        balance_ok,
        solver_ok,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row(period: u32, draw: Money, amortization: Money, ending: Money) -> PeriodRecord {
        PeriodRecord {
            period,
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            days: 0,
            margin: Decimal::ZERO,
            beginning_balance: ending + amortization - draw,
            draw,
            interest: Decimal::ZERO,
            upfront_fee: Decimal::ZERO,
            commitment_fee: Decimal::ZERO,
            amortization,
            ending_balance: ending,
        }
    }

    fn converged(array: CashflowArray) -> ArrayIrr {
        ArrayIrr {
            array,
            periodic: Some(dec!(0.01)),
            annualized: Some(dec!(0.02)),
            failure: None,
        }
    }

    #[test]
    fn test_clean_schedule_passes() {
        let records = vec![
            row(0, dec!(500), dec!(0), dec!(500)),
            row(1, dec!(0), dec!(500), dec!(0)),
        ];
        let report = validate(dec!(500), &records, &[converged(CashflowArray::Spread)], vec![]);
        assert_eq!(report.status, ValidationStatus::Pass);
        assert_eq!(report.draw_status, DrawStatus::Ok);
        assert_eq!(report.draws_total, dec!(500));
        assert_eq!(report.amortization_total, dec!(500));
        assert!(report.balance_ok && report.solver_ok);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_draw_mismatch_needs_review() {
        let records = vec![
            row(0, dec!(480), dec!(0), dec!(480)),
            row(1, dec!(0), dec!(480), dec!(0)),
        ];
        let report = validate(dec!(500), &records, &[], vec![]);
        assert_eq!(report.draw_status, DrawStatus::ReviewDraw);
        assert_eq!(report.status, ValidationStatus::Fail);
        assert_eq!(
            serde_json::to_value(report.draw_status).unwrap(),
            serde_json::json!("Review Draw")
        );
    }

    #[test]
    fn test_negative_balance_flagged() {
        let records = vec![
            row(0, dec!(500), dec!(0), dec!(500)),
            row(1, dec!(0), dec!(600), dec!(-100)),
        ];
        let report = validate(dec!(500), &records, &[], vec![]);
        assert!(!report.balance_ok);
        assert!(report
            .issues
            .contains(&ScheduleIssue::NegativeBalance { period: 1, ending_balance: dec!(-100) }));
    }

    #[test]
    fn test_solver_failure_recorded() {
        let records = vec![
            row(0, dec!(500), dec!(0), dec!(500)),
            row(1, dec!(0), dec!(500), dec!(0)),
        ];
        let failed = ArrayIrr {
            array: CashflowArray::AllFees,
            periodic: None,
            annualized: None,
            failure: Some("did not converge".into()),
        };
        let report = validate(dec!(500), &records, &[failed], vec![]);
        assert!(!report.solver_ok);
        assert_eq!(report.status, ValidationStatus::Fail);
    }

    #[test]
    fn test_caps_and_outstanding_are_warnings_only() {
        let records = vec![
            row(0, dec!(500), dec!(0), dec!(500)),
            row(1, dec!(0), dec!(100), dec!(400)),
        ];
        let cap = ScheduleIssue::AmortizationCapped {
            period: 1,
            scheduled: dec!(600),
            applied: dec!(500),
        };
        let report = validate(dec!(500), &records, &[], vec![cap]);
        assert_eq!(report.status, ValidationStatus::Pass);
        assert_eq!(report.issues.len(), 2);
        assert!(report.warnings()[1].contains("400"));
    }

    #[test]
    fn test_table_over_allocation() {
        let table = vec![
            AmortizationEntry::fraction(6, dec!(0.6)),
            AmortizationEntry::amount(12, dec!(500)),
        ];
        let issues = table_issues(&table, dec!(1000));
        assert_eq!(
            issues,
            vec![ScheduleIssue::TableOverAllocated { total_fraction: dec!(1.1) }]
        );
        assert!(issues[0].to_string().contains("110%"));
        assert!(table_issues(&table[..1], dec!(1000)).is_empty());
    }
}
