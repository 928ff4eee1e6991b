//! Validated parts of a US shipping address.
//!
//! These types are checked in a fixed order by the address resolver: state
//! first, then ZIP code, then street number. Each parser accepts exactly what
//! the storefront API has always accepted so stored addresses stay comparable.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an address part.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressPartError {
    /// Not one of the 50 states or DC.
    #[error("state must be a valid 2-letter U.S. abbreviation (e.g. NY, CA)")]
    InvalidState,
    /// Not exactly five ASCII digits.
    #[error("ZIP code is invalid. It must be 5 digits (e.g. 12345)")]
    InvalidZip,
    /// Empty, or contains something other than ASCII digits.
    #[error("street number must contain only digits (0-9)")]
    InvalidStreetNumber,
}

/// USPS two-letter codes for the 50 states plus the District of Columbia.
const STATE_CODES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY", "DC",
];

/// A US state (or DC) code.
///
/// Parsing is case-insensitive; the stored code is always upper case.
///
/// ```
/// use cartwheel_core::UsState;
///
/// assert_eq!(UsState::parse("tx").unwrap().as_str(), "TX");
/// assert!(UsState::parse("XX").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsState(&'static str);

impl UsState {
    /// Parse a state code.
    ///
    /// # Errors
    ///
    /// Returns [`AddressPartError::InvalidState`] for anything that is not a
    /// USPS state or DC code.
    pub fn parse(s: &str) -> Result<Self, AddressPartError> {
        STATE_CODES
            .iter()
            .copied()
            .find(|code| code.eq_ignore_ascii_case(s))
            .map(Self)
            .ok_or(AddressPartError::InvalidState)
    }

    /// The upper-case two-letter code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for UsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl TryFrom<String> for UsState {
    type Error = AddressPartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UsState> for String {
    fn from(state: UsState) -> Self {
        state.0.to_owned()
    }
}

/// A five-digit US ZIP code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Parse a ZIP code. ZIP+4 and surrounding whitespace are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`AddressPartError::InvalidZip`] unless `s` is exactly five
    /// ASCII digits.
    pub fn parse(s: &str) -> Result<Self, AddressPartError> {
        if s.len() == 5 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(AddressPartError::InvalidZip)
        }
    }

    /// The ZIP code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = AddressPartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

/// A house number: a non-negative integer written with digits only.
///
/// The original text is kept so `"007"` is stored as entered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreetNumber(String);

impl StreetNumber {
    /// Parse a street number.
    ///
    /// # Errors
    ///
    /// Returns [`AddressPartError::InvalidStreetNumber`] if `s` is empty,
    /// contains a sign or any non-digit, or does not fit in a `u64`.
    pub fn parse(s: &str) -> Result<Self, AddressPartError> {
        // u64::from_str alone would accept a leading '+'.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressPartError::InvalidStreetNumber);
        }
        s.parse::<u64>()
            .map_err(|_| AddressPartError::InvalidStreetNumber)?;
        Ok(Self(s.to_owned()))
    }

    /// The street number as entered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreetNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StreetNumber {
    type Error = AddressPartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StreetNumber> for String {
    fn from(number: StreetNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_fifty_one_codes() {
        assert_eq!(STATE_CODES.len(), 51);
        assert!(UsState::parse("DC").is_ok());
    }

    #[rstest]
    #[case("TX", "TX")]
    #[case("tx", "TX")]
    #[case("Ny", "NY")]
    #[case("dc", "DC")]
    fn test_state_case_insensitive(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(UsState::parse(input).map(|s| s.as_str()), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("XX")]
    #[case("PR")]
    #[case("Texas")]
    #[case(" TX")]
    fn test_state_rejects(#[case] input: &str) {
        assert_eq!(UsState::parse(input), Err(AddressPartError::InvalidState));
    }

    #[rstest]
    #[case("73301", true)]
    #[case("00000", true)]
    #[case("7330", false)]
    #[case("733011", false)]
    #[case("7330a", false)]
    #[case("73301-1234", false)]
    #[case(" 73301", false)]
    #[case("７３３０１", false)]
    fn test_zip_code(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(ZipCode::parse(input).is_ok(), valid);
    }

    #[rstest]
    #[case("0", true)]
    #[case("1600", true)]
    #[case("007", true)]
    #[case("", false)]
    #[case("-5", false)]
    #[case("+5", false)]
    #[case("12B", false)]
    #[case("99999999999999999999999", false)]
    fn test_street_number(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(StreetNumber::parse(input).is_ok(), valid);
    }

    #[test]
    fn test_error_messages_are_stable() {
        assert_eq!(
            AddressPartError::InvalidZip.to_string(),
            "ZIP code is invalid. It must be 5 digits (e.g. 12345)"
        );
    }
}
