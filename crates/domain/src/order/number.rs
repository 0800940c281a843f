//! Human-readable order numbers.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PREFIX: &str = "ORD-";

/// Errors raised when building or parsing an order number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderNumberError {
    #[error("Malformed order number: {0}")]
    Malformed(String),

    #[error("Order sequence {0} out of range 1..={max}", max = OrderNumber::MAX_SEQUENCE)]
    SequenceOutOfRange(u32),
}

/// Order number of the form `ORD-<YYYYMMDD>-<NNNNN>`.
///
/// The date is the calendar day the order was placed on and the sequence is
/// the order's position within that day, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber {
    date: NaiveDate,
    sequence: u32,
}

impl OrderNumber {
    /// Largest sequence a five-digit suffix can hold.
    pub const MAX_SEQUENCE: u32 = 99_999;

    pub fn new(date: NaiveDate, sequence: u32) -> Result<Self, OrderNumberError> {
        if sequence == 0 || sequence > Self::MAX_SEQUENCE {
            return Err(OrderNumberError::SequenceOutOfRange(sequence));
        }
        Ok(Self { date, sequence })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{PREFIX}{}-{:05}",
            self.date.format("%Y%m%d"),
            self.sequence
        )
    }
}

impl FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || OrderNumberError::Malformed(s.to_string());

        let rest = s.strip_prefix(PREFIX).ok_or_else(malformed)?;
        let (date, sequence) = rest.split_once('-').ok_or_else(malformed)?;

        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !all_digits(date, 8) || !all_digits(sequence, 5) {
            return Err(malformed());
        }

        let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| malformed())?;
        let sequence = sequence.parse::<u32>().map_err(|_| malformed())?;
        Self::new(date, sequence)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn test_format_is_zero_padded() {
        let number = OrderNumber::new(day(), 42).unwrap();
        assert_eq!(number.to_string(), "ORD-20240307-00042");
    }

    #[test]
    fn test_parse() {
        let number: OrderNumber = "ORD-20240307-99999".parse().unwrap();
        assert_eq!(number.date(), day());
        assert_eq!(number.sequence(), 99_999);
    }

    #[test]
    fn test_sequence_bounds() {
        assert_eq!(
            OrderNumber::new(day(), 0),
            Err(OrderNumberError::SequenceOutOfRange(0))
        );
        assert_eq!(
            OrderNumber::new(day(), 100_000),
            Err(OrderNumberError::SequenceOutOfRange(100_000))
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "ORD-2024037-00001",
            "ORD-20240307-1",
            "ord-20240307-00001",
            "ORD-20241307-00001",
            "ORD-20240307-00000",
            "ORD-20240307-0000a",
        ] {
            assert!(bad.parse::<OrderNumber>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let number = OrderNumber::new(day(), 1).unwrap();
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "\"ORD-20240307-00001\"");
        let back: OrderNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, number);
    }

    #[test]
    fn test_ordering_follows_date_then_sequence() {
        let a = OrderNumber::new(day(), 2).unwrap();
        let b = OrderNumber::new(day().succ_opt().unwrap(), 1).unwrap();
        assert!(a < b);
    }
}
