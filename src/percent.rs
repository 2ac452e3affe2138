use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal places kept from the feed's proportions before scaling.
pub const SHARE_DECIMALS: u32 = 4;

/// Result of reading one share field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Share {
    Value(f64),
    Missing,
    Malformed,
}

/// Turn a textual proportion into a percentage.
///
/// The null token or an empty field is `Missing`. Anything else is parsed as
/// an exact decimal (plain or scientific notation), rounded to four places
/// half-to-even, then scaled by 100. Unparseable input is `Malformed`; the
/// caller decides whether that is fatal.
pub fn normalize_share(raw: &str, null_token: &str) -> Share {
    let s = raw.trim();
    if s.is_empty() || s == null_token {
        return Share::Missing;
    }
    let parsed = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s));
    let Ok(dec) = parsed else {
        return Share::Malformed;
    };
    let Some(scaled) = dec
        .round_dp_with_strategy(SHARE_DECIMALS, RoundingStrategy::MidpointNearestEven)
        .checked_mul(Decimal::ONE_HUNDRED)
    else {
        return Share::Malformed;
    };
    // via text so the f64 is the one nearest the exact decimal
    match scaled.to_string().parse::<f64>() {
        Ok(v) => Share::Value(v),
        Err(_) => Share::Malformed,
    }
}
