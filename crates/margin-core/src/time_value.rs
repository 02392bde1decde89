use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::MarginError;
use crate::types::{Money, Rate};
use crate::MarginResult;

const NEWTON_MAX_ITERATIONS: u32 = 50;
/// Attempts at pulling an unusable lower bracket towards zero.
const BRACKET_SHRINK_LIMIT: u32 = 64;

/// Root-finding settings for a single IRR call.
///
/// The solver holds no state between calls, so one config can be shared by
/// any number of concurrent calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Hard cap on NPV evaluations, Newton and bisection combined.
    pub max_iterations: u32,
    /// Convergence threshold on the absolute NPV residual.
    pub tolerance: Decimal,
    /// Starting periodic rate for Newton-Raphson.
    pub guess: Rate,
    /// Lowest periodic rate considered (must be > -1).
    pub lower_bound: Rate,
    /// Highest periodic rate considered.
    pub upper_bound: Rate,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iterations: 200,
            tolerance: dec!(0.0000001),
            guess: dec!(0.01),
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10),
        }
    }
}

/// Net Present Value of a series of periodic cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> MarginResult<Money> {
    if rate <= dec!(-1) {
        return Err(MarginError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_and_derivative(cash_flows, rate)
        .map(|(value, _)| value)
        .ok_or_else(|| MarginError::DivisionByZero {
            context: format!("NPV discount factors overflow at rate {rate}"),
        })
}

/// Internal Rate of Return: the periodic rate at which NPV is zero.
///
/// Newton-Raphson from `config.guess`, falling back to bisection over
/// `[lower_bound, upper_bound]` when Newton stalls, overflows or runs out of
/// its share of the iteration budget.
pub fn irr(cash_flows: &[Money], config: &SolverConfig) -> MarginResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(MarginError::UndefinedIrr(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    if !has_negative || !has_positive {
        return Err(MarginError::UndefinedIrr(
            "cash flows need at least one negative and one positive entry".into(),
        ));
    }
    if config.lower_bound <= dec!(-1) || config.lower_bound >= config.upper_bound {
        return Err(MarginError::InvalidInput {
            field: "solver.lower_bound".into(),
            reason: "Bounds must satisfy -1 < lower_bound < upper_bound".into(),
        });
    }

    let newton_budget = NEWTON_MAX_ITERATIONS.min(config.max_iterations);
    let mut rate = config.guess.max(config.lower_bound).min(config.upper_bound);
    let mut used = 0;

    while used < newton_budget {
        used += 1;
        let Some((value, slope)) = npv_and_derivative(cash_flows, rate) else {
            break;
        };
        if value.abs() < config.tolerance {
            debug!("IRR converged by Newton-Raphson after {used} iterations: {rate}");
            return Ok(rate);
        }
        let Some(step) = value.checked_div(slope) else {
            break;
        };
        let next = (rate - step).max(config.lower_bound).min(config.upper_bound);
        if next == rate {
            break;
        }
        rate = next;
    }

    bisect(cash_flows, config, config.max_iterations.saturating_sub(used), used)
}

fn bisect(
    cash_flows: &[Money],
    config: &SolverConfig,
    budget: u32,
    already_used: u32,
) -> MarginResult<Rate> {
    let failure = |iterations: u32, last_delta: Decimal| MarginError::ConvergenceFailure {
        function: "IRR".into(),
        iterations,
        last_delta,
    };

    let mut low = config.lower_bound;
    let mut high = config.upper_bound;

    // Very negative rates blow the discount factors past Decimal range.
    let mut npv_low = None;
    for _ in 0..BRACKET_SHRINK_LIMIT {
        npv_low = npv_and_derivative(cash_flows, low).map(|(v, _)| v);
        if npv_low.is_some() {
            break;
        }
        low /= dec!(2);
    }
    let npv_high = npv_and_derivative(cash_flows, high).map(|(v, _)| v);

    let (Some(mut npv_low), Some(npv_high)) = (npv_low, npv_high) else {
        return Err(failure(already_used, Decimal::MAX));
    };
    if npv_low.abs() < config.tolerance {
        return Ok(low);
    }
    if npv_high.abs() < config.tolerance {
        return Ok(high);
    }
    if npv_low.is_sign_negative() == npv_high.is_sign_negative() {
        return Err(failure(already_used, npv_low));
    }

    let mut last_delta = npv_low;
    for i in 0..budget {
        let mid = (low + high) / dec!(2);
        let Some((npv_mid, _)) = npv_and_derivative(cash_flows, mid) else {
            return Err(failure(already_used + i, last_delta));
        };
        last_delta = npv_mid;
        if npv_mid.abs() < config.tolerance {
            debug!(
                "IRR converged by bisection after {} iterations: {mid}",
                already_used + i + 1
            );
            return Ok(mid);
        }
        if npv_mid.is_sign_negative() == npv_low.is_sign_negative() {
            low = mid;
            npv_low = npv_mid;
        } else {
            high = mid;
        }
    }

    Err(failure(already_used + budget, last_delta))
}

/// NPV and dNPV/dr, or `None` when a discount factor leaves Decimal range.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let v = Decimal::ONE.checked_div(Decimal::ONE + rate)?;
    let mut factor = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            factor = factor.checked_mul(v)?;
        }
        value = value.checked_add(cf.checked_mul(factor)?)?;
        if t > 0 {
            // d/dr of cf * v^t is -t * cf * v^(t+1)
            let term = Decimal::from(t as i64)
                .checked_mul(*cf)?
                .checked_mul(factor)?
                .checked_mul(v)?;
            slope = slope.checked_sub(term)?;
        }
    }

    Some((value, slope))
}
