//! Resource quantity arithmetic.
//!
//! The API server stores quantities in canonical form (`0.5` comes back as
//! `500m`, `1e3` as `1k`), so comparing the strings a user wrote against the
//! live object reports drift that is not there. Quantities are compared by
//! value instead, in nano units, rounding finer values up the way the API
//! server does.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

const NANO_EXPONENT: i32 = 9;

fn suffix_scale(suffix: &str) -> Option<(i32, u32)> {
    // (decimal exponent, binary exponent)
    let scale = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            (exponent.parse().ok()?, 0)
        }
    };
    Some(scale)
}

/// Value of a quantity string in nano units, or `None` when it does not parse
/// or does not fit
pub fn quantity_nanos(quantity: &str) -> Option<i128> {
    let quantity = quantity.trim();
    let (negative, unsigned) = match quantity.as_bytes().first()? {
        b'-' => (true, &quantity[1..]),
        b'+' => (false, &quantity[1..]),
        _ => (false, quantity),
    };

    let number_len = unsigned
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let (decimal, binary) = suffix_scale(suffix)?;

    let mut mantissa: i128 = 0;
    for digit in whole.bytes().chain(fraction.bytes()) {
        if digit == b'.' {
            return None;
        }
        mantissa = mantissa
            .checked_mul(10)?
            .checked_add(i128::from(digit - b'0'))?;
    }
    mantissa = mantissa.checked_mul(1i128.checked_shl(binary)?)?;

    let exponent = decimal
        .checked_add(NANO_EXPONENT)?
        .checked_sub(i32::try_from(fraction.len()).ok()?)?;
    let nanos = if exponent >= 0 {
        mantissa.checked_mul(10i128.checked_pow(u32::try_from(exponent).ok()?)?)?
    } else {
        let divisor = 10i128.checked_pow(exponent.unsigned_abs())?;
        (mantissa + divisor - 1) / divisor
    };

    Some(if negative { -nanos } else { nanos })
}

/// Whether two quantities denote the same amount
///
/// Strings that do not parse only equal themselves.
pub fn quantities_equal(a: &Quantity, b: &Quantity) -> bool {
    match (quantity_nanos(&a.0), quantity_nanos(&b.0)) {
        (Some(x), Some(y)) => x == y,
        _ => a.0 == b.0,
    }
}

/// Whether two resource maps hold the same names with equal quantities
pub fn quantity_maps_equal(a: &BTreeMap<String, Quantity>, b: &BTreeMap<String, Quantity>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, qa)| b.get(name).is_some_and(|qb| quantities_equal(qa, qb)))
}
