//! Batch codes for incoming stock.
//!
//! Every IN journal entry carries a batch code of the form `ABC-1F9C0E`: a
//! three-letter prefix taken from the material name and six random uppercase
//! hex digits. Uniqueness is enforced by the database; callers regenerate on
//! collision.

use core::fmt;
use core::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`BatchCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchCodeError {
    /// The input does not follow `AAA-HHHHHH`.
    #[error("batch code must look like STE-1F9C0E, got {0:?}")]
    Malformed(String),
}

/// A batch code such as `STE-1F9C0E`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchCode(String);

impl BatchCode {
    /// Number of characters in the prefix.
    pub const PREFIX_LEN: usize = 3;

    /// Number of hex digits in the suffix.
    pub const SUFFIX_LEN: usize = 6;

    const PAD: char = 'X';

    /// Derive the prefix for a material name.
    ///
    /// Takes the first three ASCII letters or digits, uppercased. Short or
    /// non-Latin names are padded with `X`.
    ///
    /// ```
    /// use eco_prom_core::BatchCode;
    ///
    /// assert_eq!(BatchCode::prefix_for("steel sheet 0.5"), "STE");
    /// assert_eq!(BatchCode::prefix_for("Zn"), "ZNX");
    /// ```
    #[must_use]
    pub fn prefix_for(material_name: &str) -> String {
        let mut prefix: String = material_name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(Self::PREFIX_LEN)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        while prefix.len() < Self::PREFIX_LEN {
            prefix.push(Self::PAD);
        }
        prefix
    }

    /// Generate a fresh code for a material using the given random source.
    #[must_use]
    pub fn generate<R: Rng + ?Sized>(material_name: &str, rng: &mut R) -> Self {
        let suffix: u32 = rng.random_range(0..=0x00FF_FFFF);
        Self(format!("{}-{suffix:06X}", Self::prefix_for(material_name)))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix part (before the dash).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..Self::PREFIX_LEN]
    }
}

impl fmt::Display for BatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BatchCode {
    type Err = BatchCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BatchCodeError::Malformed(s.to_owned());
        let (prefix, suffix) = s.split_once('-').ok_or_else(malformed)?;

        let prefix_ok = prefix.len() == Self::PREFIX_LEN
            && prefix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        let suffix_ok = suffix.len() == Self::SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b));

        if prefix_ok && suffix_ok {
            Ok(Self(s.to_owned()))
        } else {
            Err(malformed())
        }
    }
}

impl TryFrom<String> for BatchCode {
    type Error = BatchCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BatchCode> for String {
    fn from(code: BatchCode) -> Self {
        code.0
    }
}

impl AsRef<str> for BatchCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
