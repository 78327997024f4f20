use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire protocol version.
///
/// "2.0" is the default. "1.0" selects the legacy response shape where
/// `result` and `error` are both present (one of them null) and the
/// `jsonrpc` field is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    #[default]
    V2,
    V1,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2 => "2.0",
            ProtocolVersion::V1 => "1.0",
        }
    }

    pub fn is_v2(&self) -> bool {
        matches!(self, ProtocolVersion::V2)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "2.0" => Ok(ProtocolVersion::V2),
            "1.0" => Ok(ProtocolVersion::V1),
            _ => Err(serde::de::Error::custom(format!(
                "invalid JSON-RPC version: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_strings() {
        assert_eq!(ProtocolVersion::V2.as_str(), "2.0");
        assert_eq!(ProtocolVersion::V1.as_str(), "1.0");
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::V2);
    }

    #[test]
    fn test_version_serde() {
        assert_eq!(
            serde_json::to_string(&ProtocolVersion::V2).unwrap(),
            r#""2.0""#
        );
        let parsed: ProtocolVersion = serde_json::from_str(r#""1.0""#).unwrap();
        assert_eq!(parsed, ProtocolVersion::V1);
        assert!(serde_json::from_str::<ProtocolVersion>(r#""3.0""#).is_err());
    }
}
