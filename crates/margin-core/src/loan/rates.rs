//! Annualised IRRs, the margin component breakdown and weighted average life.

use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::loan::cashflows::{CashflowArray, CashflowSet};
use crate::loan::params::PaymentFrequency;
use crate::loan::schedule::PeriodRecord;
use crate::time_value::{irr, SolverConfig};
use crate::types::{Rate, Years};

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Solver outcome for one cash-flow array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayIrr {
    pub array: CashflowArray,
    /// Periodic IRR, `None` when the solver failed.
    pub periodic: Option<Rate>,
    /// Periodic IRR x frequency multiplier.
    pub annualized: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ArrayIrr {
    pub fn converged(&self) -> bool {
        self.failure.is_none()
    }
}

/// Incremental contributions to the all-in margin, each annualised.
/// A component is `None` when any IRR it depends on failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginBreakdown {
    pub spread: Option<Rate>,
    pub upfront_impact: Option<Rate>,
    pub commitment_impact: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_impact: Option<Rate>,
    pub all_in: Option<Rate>,
}

/// Nominal annual rate from a periodic rate.
pub fn annualize(periodic: Rate, frequency: PaymentFrequency) -> Rate {
    periodic * frequency.multiplier()
}

/// Solve every array that carries its own cash flows. Without reserves the
/// net-of-reserves array equals the all-fees array and gets no entry.
pub fn solve_arrays(
    set: &CashflowSet,
    frequency: PaymentFrequency,
    config: &SolverConfig,
) -> Vec<ArrayIrr> {
    let mut out: Vec<ArrayIrr> = Vec::with_capacity(4);
    for array in CashflowArray::ALL {
        if array == CashflowArray::NetOfReserves && !set.reserves_applied {
            continue;
        }
        let solved = match irr(set.get(array), config) {
            Ok(periodic) => {
                debug!("IRR[{array}] = {periodic} per period");
                ArrayIrr {
                    array,
                    periodic: Some(periodic),
                    annualized: Some(annualize(periodic, frequency)),
                    failure: None,
                }
            }
            Err(e) => {
                warn!("IRR[{array}] unavailable: {e}");
                ArrayIrr {
                    array,
                    periodic: None,
                    annualized: None,
                    failure: Some(e.to_string()),
                }
            }
        };
        out.push(solved);
    }
    out
}

fn annualized_of(irrs: &[ArrayIrr], array: CashflowArray) -> Option<Rate> {
    irrs.iter().find(|a| a.array == array).and_then(|a| a.annualized)
}

/// Spread, upfront and commitment impacts plus the all-in margin. The
/// all-in margin is the net-of-reserves rate when reserves were applied.
pub fn margin_breakdown(irrs: &[ArrayIrr], reserves_applied: bool) -> MarginBreakdown {
    let spread = annualized_of(irrs, CashflowArray::Spread);
    let with_upfront = annualized_of(irrs, CashflowArray::WithUpfront);
    let all_fees = annualized_of(irrs, CashflowArray::AllFees);
    let net = annualized_of(irrs, CashflowArray::NetOfReserves);

    let diff = |a: Option<Rate>, b: Option<Rate>| Some(a? - b?);

    MarginBreakdown {
        spread,
        upfront_impact: diff(with_upfront, spread),
        commitment_impact: diff(all_fees, with_upfront),
        reserve_impact: if reserves_applied {
            diff(net, all_fees)
        } else {
            None
        },
        all_in: if reserves_applied { net } else { all_fees },
    }
}

/// Weighted average life in years: amortization-weighted month offset of
/// each repayment, divided by 12. `None` when nothing is repaid.
pub fn weighted_average_life(
    records: &[PeriodRecord],
    frequency: PaymentFrequency,
) -> Option<Years> {
    let months_per_period = Decimal::from(frequency.months());
    let (weighted, total) = records
        .iter()
        .filter(|r| r.amortization > Decimal::ZERO)
        .fold((Decimal::ZERO, Decimal::ZERO), |(w, t), r| {
            let months = Decimal::from(r.period) * months_per_period;
            (w + months * r.amortization, t + r.amortization)
        });
    if total.is_zero() {
        return None;
    }
    Some(weighted / total / MONTHS_PER_YEAR)
}
