//! Schedule export as a CSV table that can be read back in.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io;

use crate::loan::schedule::PeriodRecord;
use crate::types::Money;
use crate::MarginResult;

/// Decimal places used for currency columns.
pub const CURRENCY_DP: u32 = 2;

/// One exported schedule row, columns in export order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    #[serde(rename = "Period")]
    pub period: u32,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Draws", with = "rust_decimal::serde::str")]
    pub draws: Money,
    #[serde(rename = "Interest", with = "rust_decimal::serde::str")]
    pub interest: Money,
    #[serde(rename = "Upfront Fee", with = "rust_decimal::serde::str")]
    pub upfront_fee: Money,
    #[serde(rename = "Commitment Fee", with = "rust_decimal::serde::str")]
    pub commitment_fee: Money,
    #[serde(rename = "Amortization", with = "rust_decimal::serde::str")]
    pub amortization: Money,
    #[serde(rename = "Ending Balance", with = "rust_decimal::serde::str")]
    pub ending_balance: Money,
}

impl From<&PeriodRecord> for ScheduleRow {
    fn from(r: &PeriodRecord) -> Self {
        ScheduleRow {
            period: r.period,
            date: r.date,
            draws: currency(r.draw),
            interest: currency(r.interest),
            upfront_fee: currency(r.upfront_fee),
            commitment_fee: currency(r.commitment_fee),
            amortization: currency(r.amortization),
            ending_balance: currency(r.ending_balance),
        }
    }
}

fn currency(value: Money) -> Money {
    let mut rounded = value.round_dp(CURRENCY_DP);
    rounded.rescale(CURRENCY_DP);
    rounded
}

/// Write the schedule, ordered by period, with a header row.
pub fn write_schedule_csv<W: io::Write>(records: &[PeriodRecord], writer: W) -> MarginResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut sorted: Vec<&PeriodRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.period);
    for record in sorted {
        wtr.serialize(ScheduleRow::from(record))?;
    }
    wtr.flush().map_err(|e| crate::MarginError::Export(e.to_string()))?;
    Ok(())
}

pub fn schedule_to_csv_string(records: &[PeriodRecord]) -> MarginResult<String> {
    let mut buf = Vec::new();
    write_schedule_csv(records, &mut buf)?;
    String::from_utf8(buf).map_err(|e| crate::MarginError::Export(e.to_string()))
}

/// Read a table produced by `write_schedule_csv`.
pub fn read_schedule_csv<R: io::Read>(reader: R) -> MarginResult<Vec<ScheduleRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize::<ScheduleRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Column sums of an exported table, for reconciling a re-import.
pub fn totals(rows: &[ScheduleRow]) -> (Money, Money) {
    rows.iter().fold((Decimal::ZERO, Decimal::ZERO), |(d, a), r| {
        (d + r.draws, a + r.amortization)
    })
}
