//! Literal parsing shared by all element kinds: integers, booleans, floats, names,
//! ranges and hex octet strings.

/// Parse a signed or unsigned integer literal (decimal, `0x` hex, `0b` binary, `0` octal).
///
/// The result is an `i128` so the full `i64` and `u64` domains fit without casts.
pub fn parse_int(s: &str) -> Option<i128> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.is_empty() || digits.starts_with(|c: char| c == '-' || c == '+') {
        return None;
    }
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        u128::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u128::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<u128>().ok()?
    };
    let magnitude = i128::try_from(magnitude).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

pub fn parse_unsigned(s: &str) -> Option<u32> {
    parse_int(s).and_then(|v| u32::try_from(v).ok())
}

pub fn parse_usize(s: &str) -> Option<usize> {
    parse_int(s).and_then(|v| usize::try_from(v).ok())
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Floating point literal including the `nan`, `inf` and `-inf` sentinels.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "nan" => return Some(f64::NAN),
        "inf" | "+inf" => return Some(f64::INFINITY),
        "-inf" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if let Some(i) = parse_int(s) {
        return Some(i as f64);
    }
    s.parse::<f64>().ok()
}

/// Identifier: starts with a letter or `_`, continues with alphanumerics or `_`.
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Dotted reference such as `ns.sub.Field`: every segment is a valid name.
pub fn is_valid_ref(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_valid_name)
}

/// `[min, max]` range, also accepted without brackets.
pub fn parse_range(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    let inner = s
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(s);
    let (min, max) = inner.split_once(',')?;
    let (min, max) = (min.trim(), max.trim());
    if min.is_empty() || max.is_empty() {
        return None;
    }
    Some((min, max))
}

/// `num/den` scaling ratio.
pub fn parse_scaling(s: &str) -> Option<(i128, i128)> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (parse_int(n)?, parse_int(d)?),
        None => (parse_int(s)?, 1),
    };
    if den == 0 {
        return None;
    }
    Some((num, den))
}

/// Hex octets such as `ab cd 01` or `abcd01`.
pub fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    let hex: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|chunk| {
            let pair = std::str::from_utf8(chunk).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Split on the first `.`: `("ns", Some("rest"))` or `("name", None)`.
pub fn split_first_segment(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_in_all_bases() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-42"), Some(-42));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("18446744073709551615"), Some(u64::MAX as i128));
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn floats_with_sentinels() {
        assert!(parse_float("nan").is_some_and(f64::is_nan));
        assert_eq!(parse_float("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("0x10"), Some(16.0));
    }

    #[test]
    fn names_and_refs() {
        assert!(is_valid_name("Msg_1"));
        assert!(!is_valid_name("1Msg"));
        assert!(!is_valid_name(""));
        assert!(is_valid_ref("ns.sub.Field"));
        assert!(!is_valid_ref("ns..Field"));
    }

    #[test]
    fn ranges_and_hex() {
        assert_eq!(parse_range("[0, 10]"), Some(("0", "10")));
        assert_eq!(parse_range("-5,5"), Some(("-5", "5")));
        assert_eq!(parse_range("[5]"), None);
        assert_eq!(parse_hex_bytes("ab 01"), Some(vec![0xab, 0x01]));
        assert_eq!(parse_hex_bytes("abc"), None);
        assert_eq!(parse_scaling("1/256"), Some((1, 256)));
        assert_eq!(parse_scaling("1/0"), None);
    }
}
