//! Installment schedule computation.
//!
//! An installment plan splits a total amount into N monthly rows. The split
//! is exact: the installment amounts always sum back to the requested total,
//! with any leftover cents front-loaded onto the earliest installments.

use chrono::{DateTime, Months, Utc};

use crate::{LedgerError, LedgerResult};

/// One computed installment of a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Installment {
    /// Amount of this installment, in minor units.
    pub amount_minor: i64,
    /// Due date: the plan start advanced by `number - 1` calendar months.
    pub occurred_at: DateTime<Utc>,
    /// 1-based position within the plan.
    pub number: u32,
}

/// Splits `total_minor` into `installments` monthly parts.
///
/// `base = total / n` (floor); the first `total - base * n` installments get
/// one extra cent, so the sum is exact and the distribution deterministic.
/// Dates use calendar-month arithmetic (the day of month is clamped when the
/// target month is shorter, e.g. Jan 31 + 1 month = Feb 28/29).
///
/// A single installment reproduces the original amount and date unchanged.
pub fn installment_schedule(
    total_minor: i64,
    installments: u32,
    start: DateTime<Utc>,
) -> LedgerResult<Vec<Installment>> {
    if total_minor <= 0 {
        return Err(LedgerError::InvalidAmount(
            "amount_minor must be > 0".to_string(),
        ));
    }
    if installments == 0 {
        return Err(LedgerError::InvalidAmount(
            "installments must be >= 1".to_string(),
        ));
    }

    let count = i64::from(installments);
    let base = total_minor / count;
    let remainder = total_minor - base * count;

    (0..installments)
        .map(|index| {
            let amount_minor = base + i64::from(i64::from(index) < remainder);
            let occurred_at = start.checked_add_months(Months::new(index)).ok_or_else(|| {
                LedgerError::InvalidAmount("installment date out of range".to_string())
            })?;
            Ok(Installment {
                amount_minor,
                occurred_at,
                number: index + 1,
            })
        })
        .collect()
}
