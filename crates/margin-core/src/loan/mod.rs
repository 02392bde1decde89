//! Infrastructure loan schedule and all-in margin.
//!
//! Leaf-first: `dates` and `profile` feed `schedule`; the schedule feeds
//! `cashflows`; the cash-flow arrays feed `rates` and `validation`;
//! `margin` ties them together behind a single function call.

pub mod cashflows;
pub mod dates;
pub mod margin;
pub mod params;
pub mod profile;
pub mod rates;
pub mod schedule;
pub mod validation;
