//! Content-octet encodings for the primitive universal types.

use bytes::{BufMut, BytesMut};

use crate::error::{BerError, Result};

/// Number of content octets the minimal two's-complement encoding of `value` needs.
///
/// Equals `ceil((bitlength(value) + 1) / 8)`.
pub fn integer_len(value: i64) -> usize {
    let magnitude = if value < 0 { !value } else { value };
    let bits = 64 - magnitude.leading_zeros() as usize;
    bits / 8 + 1
}

/// Append the minimal big-endian two's-complement encoding of `value`.
pub fn encode_integer(value: i64, dst: &mut BytesMut) {
    let len = integer_len(value);
    dst.put_slice(&value.to_be_bytes()[8 - len..]);
}

/// Decode two's-complement content octets, accepting redundant sign extension.
pub fn decode_integer(contents: &[u8]) -> Result<i64> {
    let (first, _) = contents.split_first().ok_or(BerError::EmptyInteger)?;
    let mut value: i64 = if first & 0x80 != 0 { -1 } else { 0 };

    for octet in contents {
        let top = value >> 55;
        if top != 0 && top != -1 {
            return Err(BerError::IntegerOverflow { bits: 64 });
        }
        value = (value << 8) | i64::from(*octet);
    }

    Ok(value)
}

pub fn decode_boolean(contents: &[u8]) -> Result<bool> {
    match contents {
        [octet] => Ok(*octet != 0),
        _ => Err(BerError::InvalidBoolean),
    }
}

const REAL_PLUS_INFINITY: u8 = 0x40;
const REAL_MINUS_INFINITY: u8 = 0x41;
const REAL_NOT_A_NUMBER: u8 = 0x42;
const REAL_MINUS_ZERO: u8 = 0x43;

/// Append the X.690 binary (base 2) encoding of `value`.
///
/// The mantissa is normalized to an odd number so that equal values always encode identically.
pub fn encode_real(value: f64, dst: &mut BytesMut) {
    if value == 0.0 {
        if value.is_sign_negative() {
            dst.put_u8(REAL_MINUS_ZERO);
        }
        return;
    }
    if value.is_nan() {
        dst.put_u8(REAL_NOT_A_NUMBER);
        return;
    }
    if value.is_infinite() {
        let marker = if value > 0.0 {
            REAL_PLUS_INFINITY
        } else {
            REAL_MINUS_INFINITY
        };
        dst.put_u8(marker);
        return;
    }

    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7FF) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mut mantissa, mut exponent) = if biased == 0 {
        (fraction, -1074i64)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    let shift = mantissa.trailing_zeros();
    mantissa >>= shift;
    exponent += i64::from(shift);

    let exponent_len = integer_len(exponent);
    let mut first = 0x80u8;
    if value.is_sign_negative() {
        first |= 0x40;
    }
    first |= (exponent_len - 1) as u8;
    dst.put_u8(first);
    dst.put_slice(&exponent.to_be_bytes()[8 - exponent_len..]);

    let mantissa_bytes = mantissa.to_be_bytes();
    let skip = mantissa_bytes.iter().take_while(|b| **b == 0).count();
    dst.put_slice(&mantissa_bytes[skip..]);
}

/// Decode REAL content octets (binary, special and ISO 6093 decimal forms).
pub fn decode_real(contents: &[u8]) -> Result<f64> {
    let Some((&first, rest)) = contents.split_first() else {
        return Ok(0.0);
    };

    if first & 0x80 == 0 {
        if first & 0x40 == 0 {
            return decode_decimal_real(rest);
        }
        return match first {
            REAL_PLUS_INFINITY => Ok(f64::INFINITY),
            REAL_MINUS_INFINITY => Ok(f64::NEG_INFINITY),
            REAL_NOT_A_NUMBER => Ok(f64::NAN),
            REAL_MINUS_ZERO => Ok(-0.0),
            _ => Err(BerError::InvalidReal("unknown special value")),
        };
    }

    let negative = first & 0x40 != 0;
    let base_log2: i64 = match (first >> 4) & 0x03 {
        0 => 1,
        1 => 3,
        2 => 4,
        _ => return Err(BerError::InvalidReal("reserved base")),
    };
    let scale = i64::from((first >> 2) & 0x03);

    let (exponent_len, rest) = match first & 0x03 {
        3 => {
            let (len, rest) = rest
                .split_first()
                .ok_or(BerError::InvalidReal("missing exponent length"))?;
            (usize::from(*len), rest)
        }
        format => (usize::from(format) + 1, rest),
    };
    if exponent_len == 0 || rest.len() < exponent_len {
        return Err(BerError::InvalidReal("truncated exponent"));
    }
    let (exponent_octets, mantissa_octets) = rest.split_at(exponent_len);
    let exponent = decode_integer(exponent_octets)
        .map_err(|_| BerError::InvalidReal("exponent out of range"))?;

    let mantissa = mantissa_octets
        .iter()
        .fold(0f64, |acc, octet| acc * 256.0 + f64::from(*octet));
    let power = exponent
        .saturating_mul(base_log2)
        .saturating_add(scale)
        .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    let magnitude = scale_by_power_of_two(mantissa, power);

    Ok(if negative { -magnitude } else { magnitude })
}

// Steps through large exponents so intermediate powers stay representable.
fn scale_by_power_of_two(mut value: f64, mut power: i32) -> f64 {
    while power > 1000 && value.is_finite() {
        value *= 2f64.powi(1000);
        power -= 1000;
    }
    while power < -1000 && value != 0.0 {
        value *= 2f64.powi(-1000);
        power += 1000;
    }
    value * 2f64.powi(power)
}

fn decode_decimal_real(text: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(text)?;
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| BerError::InvalidReal("malformed decimal form"))
}

/// Append base-128 subidentifiers.
pub fn encode_relative_oid(path: &[u32], dst: &mut BytesMut) {
    for &component in path {
        let mut groups = [0u8; 5];
        let mut count = 0;
        let mut rest = component;
        loop {
            groups[count] = (rest & 0x7F) as u8;
            count += 1;
            rest >>= 7;
            if rest == 0 {
                break;
            }
        }
        for index in (0..count).rev() {
            let more = if index == 0 { 0x00 } else { 0x80 };
            dst.put_u8(groups[index] | more);
        }
    }
}

pub fn decode_relative_oid(contents: &[u8]) -> Result<Vec<u32>> {
    let mut path = Vec::new();
    let mut component: u32 = 0;
    let mut pending = false;

    for octet in contents {
        if component > (u32::MAX >> 7) {
            return Err(BerError::InvalidRelativeOid);
        }
        component = (component << 7) | u32::from(octet & 0x7F);
        pending = octet & 0x80 != 0;
        if !pending {
            path.push(component);
            component = 0;
        }
    }

    if pending {
        return Err(BerError::InvalidRelativeOid);
    }
    Ok(path)
}
