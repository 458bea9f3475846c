//! Redemption codes: the opaque token printed on a ticket.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of characters in a generated code.
pub const CODE_LEN: usize = 16;

/// Shortest code accepted from a scanner.
const MIN_LEN: usize = 6;

/// Longest code accepted from a scanner.
const MAX_LEN: usize = 64;

/// Opaque, globally unique ticket token.
///
/// Generated once when a sale is created and never changed. Codes are
/// upper-case alphanumeric so they survive QR payloads and manual entry.
/// Uniqueness is enforced by the store on insert, not by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RedemptionCode(String);

/// A scanned string that cannot be a redemption code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed redemption code")]
pub struct MalformedCode;

impl RedemptionCode {
    /// Generates a fresh random code from a UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        let mut raw = uuid::Uuid::new_v4().simple().to_string();
        raw.truncate(CODE_LEN);
        Self(raw.to_ascii_uppercase())
    }

    /// Validates and normalizes a scanned code. Surrounding whitespace is
    /// trimmed and letters are upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedCode`] when the input has the wrong length or
    /// contains characters other than ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self, MalformedCode> {
        let trimmed = raw.trim();
        if !(MIN_LEN..=MAX_LEN).contains(&trimmed.len())
            || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(MalformedCode);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedemptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RedemptionCode {
    type Err = MalformedCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RedemptionCode {
    type Error = MalformedCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RedemptionCode> for String {
    fn from(code: RedemptionCode) -> Self {
        code.0
    }
}
