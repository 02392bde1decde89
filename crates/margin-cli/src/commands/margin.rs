use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use margin_core::export::ScheduleRow;
use margin_core::loan::margin::{self, MarginRequest};
use margin_core::loan::params::{
    LoanParameters, PaymentFrequency, ProfileKind, ReserveInputs, StepUp,
};
use margin_core::loan::profile::AmortizationEntry;
use margin_core::loan::rates::annualize;
use margin_core::time_value::{self, SolverConfig};

use crate::input;

/// Loan inputs, from a JSON file, piped stdin, or individual flags
#[derive(Args)]
pub struct CalculateArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Facility amount
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Number of periods after disbursement (1-360)
    #[arg(long)]
    pub periods: Option<u32>,

    /// Last period with draws and commitment fees
    #[arg(long, default_value_t = 1)]
    pub draw_period: u32,

    /// Last period with interest accrual (defaults to --periods)
    #[arg(long)]
    pub grace_periods: Option<u32>,

    /// monthly, quarterly or semiannual
    #[arg(long, default_value = "semiannual")]
    pub frequency: PaymentFrequency,

    /// bullet or ad-hoc
    #[arg(long, default_value = "bullet")]
    pub profile: ProfileKind,

    /// Ad-hoc rows as month=fraction or month=$amount (e.g. "114=0.05,216=$13000")
    #[arg(long, value_delimiter = ',', value_parser = parse_table_entry)]
    pub table: Vec<AmortizationEntry>,

    /// Margin during the draw period (decimal, 0.0158 = 1.58%)
    #[arg(long)]
    pub margin_draw: Option<Decimal>,

    /// Margin after the draw period (defaults to --margin-draw)
    #[arg(long)]
    pub margin_after: Option<Decimal>,

    /// Step-up increment added after --step-up-period
    #[arg(long, requires = "step_up_period")]
    pub step_up: Option<Decimal>,

    #[arg(long)]
    pub step_up_period: Option<u32>,

    /// Upfront fee rate on principal
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub upfront_fee: Decimal,

    /// Commitment fee rate on the undrawn amount
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub commitment_fee: Decimal,

    /// Disbursement date (YYYY-MM-DD)
    #[arg(long)]
    pub disbursement_date: Option<NaiveDate>,

    /// Closing date (YYYY-MM-DD, defaults to the disbursement date)
    #[arg(long)]
    pub closing_date: Option<NaiveDate>,

    /// Probability of default for the net-of-reserves array
    #[arg(long, requires = "lgd")]
    pub pd: Option<Decimal>,

    /// Loss given default for the net-of-reserves array
    #[arg(long, requires = "pd")]
    pub lgd: Option<Decimal>,
}

/// Arguments for a raw IRR calculation
#[derive(Args)]
pub struct IrrArgs {
    /// Periodic cash flows (comma-separated, e.g. "-1000,10,10,1010")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,

    /// Frequency used to annualise the periodic rate
    #[arg(long, default_value = "semiannual")]
    pub frequency: PaymentFrequency,

    /// Maximum solver iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

fn parse_table_entry(s: &str) -> Result<AmortizationEntry, String> {
    let (month, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected month=value, got '{s}'"))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|e| format!("bad month '{month}': {e}"))?;
    let value = value.trim();
    if let Some(amount) = value.strip_prefix('$') {
        let amount: Decimal = amount.parse().map_err(|e| format!("bad amount '{amount}': {e}"))?;
        Ok(AmortizationEntry::amount(month, amount))
    } else {
        let fraction: Decimal = value.parse().map_err(|e| format!("bad fraction '{value}': {e}"))?;
        Ok(AmortizationEntry::fraction(month, fraction))
    }
}

fn read_request(args: CalculateArgs) -> Result<MarginRequest, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_json(path);
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }

    let principal = args
        .principal
        .ok_or("--principal is required (or provide --input)")?;
    let num_periods = args
        .periods
        .ok_or("--periods is required (or provide --input)")?;
    let margin_during_draw = args
        .margin_draw
        .ok_or("--margin-draw is required (or provide --input)")?;
    let disbursement_date = args
        .disbursement_date
        .ok_or("--disbursement-date is required (or provide --input)")?;

    let step_up = match (args.step_up, args.step_up_period) {
        (Some(rate), Some(after_period)) => Some(StepUp { rate, after_period }),
        _ => None,
    };
    let reserves = match (args.pd, args.lgd) {
        (Some(probability_of_default), Some(loss_given_default)) => Some(ReserveInputs {
            probability_of_default,
            loss_given_default,
        }),
        _ => None,
    };

    Ok(MarginRequest {
        loan: LoanParameters {
            principal,
            num_periods,
            draw_period: args.draw_period,
            grace_periods: args.grace_periods,
            frequency: args.frequency,
            amortization_profile: args.profile,
            margin_during_draw,
            margin_after_draw: args.margin_after.unwrap_or(margin_during_draw),
            step_up,
            upfront_fee_rate: args.upfront_fee,
            commitment_fee_rate: args.commitment_fee,
            closing_date: args.closing_date.unwrap_or(disbursement_date),
            disbursement_date,
            reserves,
            solver: SolverConfig::default(),
        },
        amortization_table: args.table,
    })
}

pub fn run_calculate(args: CalculateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args)?;
    let result = margin::calculate_request(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_schedule(args: CalculateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args)?;
    let result = margin::run_calculation(&request.loan, &request.amortization_table)?;
    let rows: Vec<ScheduleRow> = result.schedule.iter().map(ScheduleRow::from).collect();
    Ok(serde_json::to_value(rows)?)
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut config = SolverConfig::default();
    if let Some(max) = args.max_iterations {
        config.max_iterations = max;
    }
    let periodic = time_value::irr(&args.cash_flows, &config)?;
    Ok(serde_json::json!({
        "irr": annualize(periodic, args.frequency).to_string(),
        "periodic_irr": periodic.to_string(),
        "frequency": args.frequency.to_string(),
        "multiplier": args.frequency.multiplier().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use margin_core::loan::profile::EntryKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_fraction_entry() {
        let entry = parse_table_entry("114=0.05").unwrap();
        assert_eq!(entry.month, 114);
        assert_eq!(entry.value, dec!(0.05));
        assert_eq!(entry.kind, EntryKind::Fraction);
    }

    #[test]
    fn test_parse_amount_entry() {
        let entry = parse_table_entry("216=$13000").unwrap();
        assert_eq!(entry.value, dec!(13000));
        assert_eq!(entry.kind, EntryKind::Amount);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_table_entry("twelve=0.1").is_err());
        assert!(parse_table_entry("12").is_err());
    }
}
