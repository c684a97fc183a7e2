//! Readable rendering of model values and type bounds.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;

/// Render a number the way a person wants to read it: small values in
/// decimal, values within a small distance of a power of two as `2**n +- d`,
/// anything else as (possibly shortened) hex.
pub fn format_number_readable(value: &BigInt) -> String {
    let negative = value.sign() == Sign::Minus;
    let magnitude = value.magnitude().clone();
    if magnitude < BigUint::from(1_000_000u32) {
        return value.to_string();
    }

    let prefix = if negative { "-" } else { "" };
    if let Some(formatted) = near_power_of_two(&magnitude) {
        return format!("{prefix}{formatted}");
    }

    let hex = format!("{magnitude:x}");
    if hex.len() > 32 {
        let head = &hex[..8];
        let tail = &hex[hex.len() - 8..];
        format!("{prefix}0x{head}...{tail}")
    } else {
        format!("{prefix}0x{hex}")
    }
}

fn near_power_of_two(magnitude: &BigUint) -> Option<String> {
    let bits = magnitude.bits();
    for exp in [bits.saturating_sub(1), bits] {
        if exp < 8 {
            continue;
        }
        let power = BigUint::one() << exp;
        let (diff, sign) = if *magnitude >= power {
            (magnitude - &power, "+")
        } else {
            (&power - magnitude, "-")
        };
        if diff == BigUint::from(0u32) {
            return Some(format!("2**{exp}"));
        }
        if diff <= BigUint::from(10u32) {
            return Some(format!("2**{exp} {sign} {diff}"));
        }
    }
    None
}
