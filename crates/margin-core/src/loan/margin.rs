//! All-in margin calculation: the single entry point consumed by request
//! layers.

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::loan::cashflows::{build_cashflows, CashflowSet};
use crate::loan::params::{LoanParameters, ProfileKind};
use crate::loan::profile::AmortizationEntry;
use crate::loan::rates::{
    margin_breakdown, solve_arrays, weighted_average_life, ArrayIrr, MarginBreakdown,
};
use crate::loan::schedule::{build_schedule, PeriodRecord};
use crate::loan::validation::{table_issues, validate, ValidationReport};
use crate::types::{with_metadata, ComputationOutput, Rate, Years};
use crate::MarginResult;

/// Loan parameters and Ad-hoc table in one document, as read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginRequest {
    #[serde(flatten)]
    pub loan: LoanParameters,
    #[serde(default)]
    pub amortization_table: Vec<AmortizationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// Annualised IRR of the all-fees array (net of reserves when supplied).
    /// `None` when the solver failed; see `validation.issues`.
    pub all_in_margin: Option<Rate>,
    /// Weighted average life in years, `None` when nothing amortizes.
    pub wal_years: Option<Years>,
    pub breakdown: MarginBreakdown,
    pub irrs: Vec<ArrayIrr>,
    pub validation: ValidationReport,
    pub schedule: Vec<PeriodRecord>,
    pub cashflows: CashflowSet,
}

/// Pure calculation: same inputs, same result.
pub fn run_calculation(
    params: &LoanParameters,
    table: &[AmortizationEntry],
) -> MarginResult<CalculationResult> {
    let schedule = build_schedule(params, table)?;
    let cashflows = build_cashflows(&schedule.records, params.reserves.as_ref());
    let irrs = solve_arrays(&cashflows, params.frequency, &params.solver);
    let breakdown = margin_breakdown(&irrs, cashflows.reserves_applied);
    let wal_years = weighted_average_life(&schedule.records, params.frequency);

    let mut upstream = schedule.issues;
    if params.amortization_profile == ProfileKind::AdHoc {
        upstream.extend(table_issues(table, params.principal));
    }
    let validation = validate(params.principal, &schedule.records, &irrs, upstream);

    debug!(
        "All-in margin {:?}, WAL {:?}, status {:?}",
        breakdown.all_in, wal_years, validation.status
    );

    Ok(CalculationResult {
        all_in_margin: breakdown.all_in,
        wal_years,
        breakdown,
        irrs,
        validation,
        schedule: schedule.records,
        cashflows,
    })
}

/// Calculate the all-in margin, WAL and schedule for a loan, wrapped in the
/// standard output envelope. Configuration errors are returned as `Err`;
/// everything else is reported in `validation` and `warnings`.
pub fn calculate_all_in_margin(
    params: &LoanParameters,
    table: &[AmortizationEntry],
) -> MarginResult<ComputationOutput<CalculationResult>> {
    let start = Instant::now();
    let result = run_calculation(params, table)?;
    let warnings = result.validation.warnings();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "All-in margin: annualised IRR of lender cash flows (Act/360 accrual), \
         WAL from amortization",
        &serde_json::json!({
            "principal": params.principal.to_string(),
            "num_periods": params.num_periods,
            "draw_period": params.draw_period,
            "grace_periods": params.grace_period_count(),
            "frequency": params.frequency.to_string(),
            "multiplier": params.frequency.multiplier().to_string(),
            "amortization_profile": params.amortization_profile,
            "table_rows": table.len(),
            "reserves_applied": params.reserves.is_some(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Convenience wrapper for a combined request document.
pub fn calculate_request(
    request: &MarginRequest,
) -> MarginResult<ComputationOutput<CalculationResult>> {
    calculate_all_in_margin(&request.loan, &request.amortization_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarginError;
    use crate::loan::cashflows::CashflowArray;
    use crate::loan::params::{PaymentFrequency, ReserveInputs};
    use crate::loan::validation::ValidationStatus;
    use crate::time_value::SolverConfig;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn loan() -> LoanParameters {
        LoanParameters {
            principal: dec!(10_000_000),
            num_periods: 20,
            draw_period: 1,
            grace_periods: None,
            frequency: PaymentFrequency::Quarterly,
            amortization_profile: ProfileKind::Bullet,
            margin_during_draw: dec!(0.02),
            margin_after_draw: dec!(0.02),
            step_up: None,
            upfront_fee_rate: dec!(0.01),
            commitment_fee_rate: dec!(0.004),
            closing_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            disbursement_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            reserves: None,
            solver: SolverConfig::default(),
        }
    }

    #[test]
    fn test_upfront_fee_raises_all_in_margin() {
        let out = calculate_all_in_margin(&loan(), &[]).unwrap();
        let r = &out.result;
        let spread = r.breakdown.spread.unwrap();
        let all_in = r.all_in_margin.unwrap();
        // Act/360 on a 2% margin annualises slightly above 2%
        assert!(spread > dec!(0.02) && spread < dec!(0.0205), "spread {spread}");
        // 1% upfront over a 5-year bullet adds roughly 20bp
        let upfront = r.breakdown.upfront_impact.unwrap();
        assert!(upfront > dec!(0.0018) && upfront < dec!(0.0025), "upfront {upfront}");
        assert!(all_in > spread);
        assert_eq!(r.validation.status, ValidationStatus::Pass);
        assert_eq!(r.wal_years, Some(dec!(5)));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_reserves_lower_all_in_margin() {
        let mut params = loan();
        params.reserves = Some(ReserveInputs {
            probability_of_default: dec!(0.01),
            loss_given_default: dec!(0.4),
        });
        let r = run_calculation(&params, &[]).unwrap();
        let impact = r.breakdown.reserve_impact.unwrap();
        assert!(impact < Decimal::ZERO, "reserve impact {impact}");
        let net = r
            .irrs
            .iter()
            .find(|a| a.array == CashflowArray::NetOfReserves)
            .and_then(|a| a.annualized);
        assert_eq!(r.all_in_margin, net);
    }

    #[test]
    fn test_configuration_error_surfaces_immediately() {
        let mut params = loan();
        params.amortization_profile = ProfileKind::AdHoc;
        let err = calculate_all_in_margin(&params, &[]).unwrap_err();
        assert!(matches!(err, MarginError::EmptyAmortizationTable));
    }

    #[test]
    fn test_request_document_parses_flat_json() {
        let json = r#"{
            "principal": "1300000",
            "num_periods": 50,
            "draw_period": 1,
            "frequency": "Semiannually",
            "amortization_profile": "Ad-hoc",
            "margin_during_draw": "0.0158",
            "margin_after_draw": "0.0158",
            "closing_date": "2026-04-01",
            "disbursement_date": "2026-04-01",
            "amortization_table": [
                {"month": 114, "value": "0.05"},
                {"month": 216, "value": "0.01"}
            ]
        }"#;
        let request: MarginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.loan.frequency, PaymentFrequency::Semiannual);
        assert_eq!(request.amortization_table.len(), 2);
        assert_eq!(request.loan.solver, SolverConfig::default());
        let out = calculate_request(&request).unwrap();
        assert_eq!(out.result.schedule.len(), 51);
    }
}
