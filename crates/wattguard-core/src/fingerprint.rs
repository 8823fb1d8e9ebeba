//! Device fingerprint (MAC address) normalization.
//!
//! A fingerprint is the stable identifier a [`crate::domain::Machine`] is
//! looked up by. Input may use either `:` or `-` as the octet separator (both
//! forms occur in the wild depending on platform); it is always normalized to
//! uppercase, colon-separated form before storage or lookup so that a single
//! machine cannot register twice under two spellings of the same address.

use crate::error::FingerprintError;

/// A normalized fingerprint: six uppercase hex octets joined by `:`.
///
/// Construction always goes through [`Fingerprint::parse`], so a value of
/// this type is guaranteed to match `^[0-9A-F]{2}(:[0-9A-F]{2}){5}$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse and normalize a raw MAC-address string.
    ///
    /// Accepts `:` or `-` separators on input; rejects anything else,
    /// including addresses with the wrong number of octets.
    pub fn parse(raw: &str) -> Result<Self, FingerprintError> {
        let candidate = raw.trim();
        let octets: Vec<&str> = candidate.split(|c| c == ':' || c == '-').collect();

        if octets.len() != 6 {
            return Err(FingerprintError::Malformed {
                input: raw.to_owned(),
            });
        }

        let mut normalized = String::with_capacity(17);
        for (i, octet) in octets.iter().enumerate() {
            if octet.len() != 2 || !octet.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(FingerprintError::Malformed {
                    input: raw.to_owned(),
                });
            }
            if i > 0 {
                normalized.push(':');
            }
            normalized.push_str(&octet.to_ascii_uppercase());
        }

        Ok(Self(normalized))
    }

    /// The normalized `AA:BB:CC:DD:EE:FF` representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_lowercase_colon_form() {
        let fp = Fingerprint::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(fp.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn normalizes_dash_form() {
        let fp = Fingerprint::parse("AA-BB-CC-DD-EE-FF").unwrap();
        assert_eq!(fp.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn two_spellings_normalize_to_the_same_fingerprint() {
        let a = Fingerprint::parse("aa:bb:cc:dd:ee:ff").unwrap();
        let b = Fingerprint::parse("AA-BB-CC-DD-EE-FF").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_octet_count() {
        assert!(Fingerprint::parse("AA:BB:CC:DD:EE").is_err());
        assert!(Fingerprint::parse("AA:BB:CC:DD:EE:FF:00").is_err());
    }

    #[test]
    fn rejects_non_hex_octets() {
        assert!(Fingerprint::parse("ZZ:BB:CC:DD:EE:FF").is_err());
    }

    #[test]
    fn rejects_mixed_separators_with_wrong_width() {
        assert!(Fingerprint::parse("AA:B:CC:DD:EE:FF").is_err());
    }
}
