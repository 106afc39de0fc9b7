//! Order number codec.
//!
//! Order numbers have the form `ORD-<YYYY>-<NNNN>`: the calendar year the
//! order was created in and a four-digit, zero-padded sequence that restarts
//! at 1 every year. The sequence itself is allocated by the database; this
//! module only formats and parses.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building or parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    /// The input does not follow `ORD-<YYYY>-<NNNN>`.
    #[error("order number must look like ORD-2025-0001, got {0:?}")]
    Malformed(String),
    /// The year is outside 1000..=9999.
    #[error("order number year {0} is out of range")]
    YearOutOfRange(i32),
    /// The yearly sequence has run past four digits (or is zero).
    #[error("order number sequence {0} is outside 1..=9999")]
    SequenceOutOfRange(i64),
}

/// A generated order number such as `ORD-2025-0001`.
///
/// Ordering compares year first, then sequence.
///
/// ```
/// use eco_prom_core::OrderNumber;
///
/// let number = OrderNumber::new(2025, 1).unwrap();
/// assert_eq!(number.to_string(), "ORD-2025-0001");
/// assert_eq!("ORD-2025-0001".parse::<OrderNumber>().unwrap(), number);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber {
    year: i32,
    sequence: u16,
}

impl OrderNumber {
    /// Literal prefix of every order number.
    pub const PREFIX: &'static str = "ORD";

    /// Largest sequence that still fits in four digits.
    pub const MAX_SEQUENCE: u16 = 9999;

    /// Build an order number from a year and a sequence allocated for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the year is not four digits or the sequence is
    /// outside `1..=9999`.
    pub fn new(year: i32, sequence: i64) -> Result<Self, OrderNumberError> {
        if !(1000..=9999).contains(&year) {
            return Err(OrderNumberError::YearOutOfRange(year));
        }
        let sequence = u16::try_from(sequence)
            .ok()
            .filter(|s| (1..=Self::MAX_SEQUENCE).contains(s))
            .ok_or(OrderNumberError::SequenceOutOfRange(sequence))?;
        Ok(Self { year, sequence })
    }

    /// Calendar year the order was numbered in.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Position of the order within its year.
    #[must_use]
    pub const fn sequence(&self) -> u16 {
        self.sequence
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}-{:04}", Self::PREFIX, self.year, self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || OrderNumberError::Malformed(s.to_owned());

        let mut parts = s.split('-');
        let (Some(prefix), Some(year), Some(sequence), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let all_digits = |p: &str, len: usize| p.len() == len && p.bytes().all(|b| b.is_ascii_digit());
        if prefix != Self::PREFIX || !all_digits(year, 4) || !all_digits(sequence, 4) {
            return Err(malformed());
        }

        let year = year.parse().map_err(|_| malformed())?;
        let sequence = sequence.parse().map_err(|_| malformed())?;
        Self::new(year, sequence)
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
