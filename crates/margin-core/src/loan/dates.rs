//! Period date generation.
//!
//! Dates step from the disbursement date by the payment frequency using
//! calendar-month arithmetic: the day of month is kept when the target month
//! has it and clamped to month end otherwise (EOMONTH behaviour). Every date
//! is anchored on the disbursement date, so a clamp in February does not
//! drag later periods off the 31st.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::MarginError;
use crate::loan::params::PaymentFrequency;
use crate::MarginResult;

/// Date and actual day count of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDate {
    pub period: u32,
    pub date: NaiveDate,
    /// Actual calendar days since the previous period (0 for period 0).
    pub days: i64,
    /// Month offset from the disbursement date.
    pub month_offset: u32,
}

/// Generates the N+1 period dates of a schedule. Cheap to clone and
/// restartable: `dates()` can be called any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSequencer {
    start: NaiveDate,
    frequency: PaymentFrequency,
    num_periods: u32,
}

impl DateSequencer {
    pub fn new(start: NaiveDate, frequency: PaymentFrequency, num_periods: u32) -> Self {
        DateSequencer {
            start,
            frequency,
            num_periods,
        }
    }

    /// Month offset of `period` from the start date.
    pub fn month_offset(&self, period: u32) -> u32 {
        period * self.frequency.months()
    }

    /// Date of `period`; period 0 is the start date.
    pub fn date(&self, period: u32) -> MarginResult<NaiveDate> {
        add_months(self.start, self.month_offset(period))
    }

    /// All periods 0..=N with their actual day counts.
    pub fn dates(&self) -> MarginResult<Vec<PeriodDate>> {
        let mut out = Vec::with_capacity(self.num_periods as usize + 1);
        let mut previous = self.start;
        for period in 0..=self.num_periods {
            let date = self.date(period)?;
            out.push(PeriodDate {
                period,
                date,
                days: (date - previous).num_days(),
                month_offset: self.month_offset(period),
            });
            previous = date;
        }
        Ok(out)
    }
}

/// Add calendar months, clamping the day to the end of a shorter month.
pub fn add_months(date: NaiveDate, months: u32) -> MarginResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| MarginError::DateError(format!("{date} + {months} months is out of range")))
}
