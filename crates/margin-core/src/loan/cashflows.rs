//! Lender cash-flow arrays derived from the schedule.
//!
//! Sign convention: funding is negative, receipts are positive. All four
//! arrays are index-aligned with the schedule records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::loan::params::ReserveInputs;
use crate::loan::schedule::PeriodRecord;
use crate::types::Money;

/// Identifies one of the four cash-flow arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashflowArray {
    /// Interest and principal only.
    Spread,
    /// Spread plus the upfront fee.
    WithUpfront,
    /// Spread plus upfront and commitment fees.
    AllFees,
    /// All fees less expected loss on the outstanding balance.
    NetOfReserves,
}

impl CashflowArray {
    pub const ALL: [CashflowArray; 4] = [
        CashflowArray::Spread,
        CashflowArray::WithUpfront,
        CashflowArray::AllFees,
        CashflowArray::NetOfReserves,
    ];
}

impl fmt::Display for CashflowArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CashflowArray::Spread => "spread",
            CashflowArray::WithUpfront => "spread + upfront fee",
            CashflowArray::AllFees => "all fees",
            CashflowArray::NetOfReserves => "net of reserves",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowSet {
    pub spread: Vec<Money>,
    pub with_upfront: Vec<Money>,
    pub all_fees: Vec<Money>,
    /// Equal to `all_fees` when no reserve inputs were supplied.
    pub net_of_reserves: Vec<Money>,
    pub reserves_applied: bool,
}

impl CashflowSet {
    pub fn get(&self, array: CashflowArray) -> &[Money] {
        match array {
            CashflowArray::Spread => &self.spread,
            CashflowArray::WithUpfront => &self.with_upfront,
            CashflowArray::AllFees => &self.all_fees,
            CashflowArray::NetOfReserves => &self.net_of_reserves,
        }
    }

    pub fn len(&self) -> usize {
        self.spread.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spread.is_empty()
    }
}

/// Build the arrays for every period of the schedule.
pub fn build_cashflows(
    records: &[PeriodRecord],
    reserves: Option<&ReserveInputs>,
) -> CashflowSet {
    let n = records.len();
    let mut set = CashflowSet {
        spread: Vec::with_capacity(n),
        with_upfront: Vec::with_capacity(n),
        all_fees: Vec::with_capacity(n),
        net_of_reserves: Vec::with_capacity(n),
        reserves_applied: reserves.is_some(),
    };
    let loss_rate = reserves.map(ReserveInputs::loss_rate).unwrap_or(Decimal::ZERO);

    for r in records {
        let t = r.interest - r.draw + r.amortization;
        let u = t + r.upfront_fee;
        let v = u + r.commitment_fee;
        let z = if reserves.is_some() {
            v - r.ending_balance * loss_rate
        } else {
            v
        };
        set.spread.push(t);
        set.with_upfront.push(u);
        set.all_fees.push(v);
        set.net_of_reserves.push(z);
    }
    set
}
