use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RegistryError;

const MAX_PROVIDER_ID_LEN: usize = 64;

/// Stable identifier a provider is registered and audited under.
///
/// Lowercase ASCII letters, digits and underscores, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    pub fn parse(value: &str) -> Result<Self, RegistryError> {
        let value = value.trim();
        let invalid = |reason| RegistryError::InvalidProviderId {
            value: value.to_owned(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("identifier cannot be empty"));
        }
        if value.len() > MAX_PROVIDER_ID_LEN {
            return Err(invalid("identifier is longer than 64 characters"));
        }
        if !value.starts_with(|ch: char| ch.is_ascii_lowercase()) {
            return Err(invalid("identifier must start with a lowercase letter"));
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
        {
            return Err(invalid(
                "identifier may only contain lowercase letters, digits and '_'",
            ));
        }

        Ok(Self(value.to_owned()))
    }

    /// Identifier fixed at compile time, such as a provider's `NAME`.
    pub fn from_static(value: &'static str) -> Self {
        debug_assert!(
            Self::parse(value).is_ok(),
            "invalid static provider id '{value}'"
        );
        Self(value.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProviderId {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_trims_identifier() {
        let id = ProviderId::parse("  kakao_profile ").expect("must parse");
        assert_eq!(id.as_str(), "kakao_profile");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for value in ["", "Kakao", "1kakao", "kakao-profile", "kakao profile"] {
            let err = ProviderId::parse(value).expect_err("must fail");
            assert!(matches!(err, RegistryError::InvalidProviderId { .. }), "{value}");
        }
    }

    #[test]
    fn deserializes_through_validation() {
        let id: ProviderId = serde_json::from_str("\"kakao_message\"").expect("valid id");
        assert_eq!(id.to_string(), "kakao_message");

        let err = serde_json::from_str::<ProviderId>("\"Kakao!\"");
        assert!(err.is_err());
    }
}
