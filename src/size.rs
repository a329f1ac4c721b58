use crate::Error;
use std::{fmt, str::FromStr};

const UNITS: [(&str, u64); 3] = [("kb", 1024), ("mb", 1024 * 1024), ("gb", 1024 * 1024 * 1024)];

/// A byte count parsed from strings such as `500`, `50kB`, `200MB` or `1GB`.
///
/// Units are powers of 1024. A value without a suffix is taken as raw bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidSize(s.to_owned());
        let trimmed = s.trim();

        let (digits, multiplier) = match trimmed.len().checked_sub(2) {
            Some(split) if trimmed.is_char_boundary(split) => {
                let (number, unit) = trimmed.split_at(split);
                match UNITS
                    .iter()
                    .find(|(name, _)| unit.eq_ignore_ascii_case(name))
                {
                    Some(&(_, multiplier)) => (number.trim_end(), multiplier),
                    None => (trimmed, 1),
                }
            }
            _ => (trimmed, 1),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .map(ByteSize)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Option<u64> {
        s.parse::<ByteSize>().ok().map(ByteSize::bytes)
    }

    #[test]
    fn plain_numbers_are_bytes() {
        assert_eq!(parse("500"), Some(500));
        assert_eq!(parse(" 42 "), Some(42));
    }

    #[test]
    fn units_are_binary() {
        assert_eq!(parse("50kB"), Some(50 * 1024));
        assert_eq!(parse("200MB"), Some(200 * 1024 * 1024));
        assert_eq!(parse("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse("3 mb"), Some(3 * 1024 * 1024));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("kB"), None);
        assert_eq!(parse("-5"), None);
        assert_eq!(parse("1.5MB"), None);
        assert_eq!(parse("12TB"), None);
        assert_eq!(parse("99999999999999999999GB"), None);
    }

    #[test]
    fn error_keeps_the_input() {
        match "lots".parse::<ByteSize>() {
            Err(Error::InvalidSize(s)) => assert_eq!(s, "lots"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
