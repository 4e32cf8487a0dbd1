//! Exact decimal amounts.
//!
//! Amounts stay [`Decimal`] through every sum and are converted to a JSON number only
//! when written into a payload.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Number, Value};

use crate::models::is_blank;

/// Parse a cell as a decimal. Blank or malformed cells yield `None`.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    if is_blank(raw) {
        return None;
    }
    let s = raw.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Convert a decimal to a JSON number.
///
/// Goes through the decimal's text form so the result is the float closest to the
/// exact value.
pub fn to_json_number(amount: Decimal) -> Option<Value> {
    amount
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Running net/tax/gross sums of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    pub net: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
    /// Whether at least one line declared a parseable gross amount.
    pub has_gross: bool,
}

/// A running sum left the range of [`Decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

fn checked_accumulate(total: &mut Decimal, amount: Decimal) -> Result<(), Overflow> {
    *total = total.checked_add(amount).ok_or(Overflow)?;
    Ok(())
}

impl Totals {
    /// Add a line net amount. On overflow the total is left unchanged.
    pub fn add_net(&mut self, amount: Decimal) -> Result<(), Overflow> {
        checked_accumulate(&mut self.net, amount)
    }

    pub fn add_tax(&mut self, amount: Decimal) -> Result<(), Overflow> {
        checked_accumulate(&mut self.tax, amount)
    }

    pub fn add_gross(&mut self, amount: Decimal) -> Result<(), Overflow> {
        checked_accumulate(&mut self.gross, amount)?;
        self.has_gross = true;
        Ok(())
    }

    /// Document gross: the line sum if any line declared one, otherwise
    /// `net + tax + freight + other`.
    pub fn gross_total(&self, tax: Decimal, freight: Decimal, other: Decimal) -> Result<Decimal, Overflow> {
        if self.has_gross {
            return Ok(self.gross);
        }
        [tax, freight, other]
            .into_iter()
            .try_fold(self.net, |sum, part| sum.checked_add(part))
            .ok_or(Overflow)
    }
}
