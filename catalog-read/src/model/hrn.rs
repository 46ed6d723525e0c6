//! HERE Resource Name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::client::ApiError;

const HRN_PREFIX: &str = "hrn";
const HRN_FIELDS: usize = 6;

/// Identifier of a catalog.
///
/// Format: `hrn:{partition}:{service}:{region}:{account}:{resource}`, where the
/// region and account may be empty, e.g. `hrn:here:data::olp-here:rib-2`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Hrn {
    value: String,
}

impl Hrn {
    /// Parses and validates an HRN string.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidRequest` error if the string is malformed.
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        let fields: Vec<&str> = input.split(':').collect();
        if fields.len() != HRN_FIELDS || fields[0] != HRN_PREFIX {
            return Err(ApiError::invalid_request(format!(
                "Malformed HRN '{}': expected hrn:partition:service:region:account:resource",
                input
            )));
        }
        for (name, index) in [("partition", 1), ("service", 2), ("resource", 5)] {
            if fields[index].is_empty() {
                return Err(ApiError::invalid_request(format!(
                    "Malformed HRN '{}': empty {}",
                    input, name
                )));
            }
        }
        Ok(Self {
            value: input.to_string(),
        })
    }

    fn field(&self, index: usize) -> &str {
        self.value.split(':').nth(index).unwrap_or_default()
    }

    /// The partition field (e.g. `here`).
    pub fn partition(&self) -> &str {
        self.field(1)
    }

    /// The service field (e.g. `data`).
    pub fn service(&self) -> &str {
        self.field(2)
    }

    /// The account field, possibly empty.
    pub fn account(&self) -> &str {
        self.field(4)
    }

    /// The resource field, i.e. the catalog id.
    pub fn resource(&self) -> &str {
        self.field(5)
    }

    /// The full HRN string.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Hrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Hrn {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Hrn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for Hrn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Hrn::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ErrorKind;

    #[test]
    fn test_parse_valid_hrn() {
        let hrn = Hrn::parse("hrn:here:data::olp-here:rib-2").unwrap();
        assert_eq!(hrn.partition(), "here");
        assert_eq!(hrn.service(), "data");
        assert_eq!(hrn.account(), "olp-here");
        assert_eq!(hrn.resource(), "rib-2");
        assert_eq!(hrn.to_string(), "hrn:here:data::olp-here:rib-2");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "here:data::olp-here:rib-2",
            "urn:here:data::olp-here:rib-2",
            "hrn:here:data::olp-here",
            "hrn::data::olp-here:rib-2",
            "hrn:here:data::olp-here:",
        ] {
            let err = Hrn::parse(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "input: {}", input);
        }
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let hrn: Hrn = serde_json::from_str("\"hrn:here:data::olp-here:rib-2\"").unwrap();
        assert_eq!(hrn.resource(), "rib-2");
        assert!(serde_json::from_str::<Hrn>("\"not-an-hrn\"").is_err());
    }
}
