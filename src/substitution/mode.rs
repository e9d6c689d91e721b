//! Post-processing applied to replacement values before substitution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StringSubsError;

/// Path separator token understood by Java policy files.
const POLICY_SEPARATOR: &str = "${/}";

/// How backslashes in a replacement value are rewritten.
///
/// Replacement values are frequently filesystem paths, and each target file
/// format wants separators spelled differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeType {
    /// `\` becomes `/`.
    Forward,
    /// `\` becomes `\\`, for formats that treat backslash as an escape.
    Double,
    /// Any path separator becomes `${/}`.
    Policy,
}

impl ModeType {
    pub fn apply(self, value: &str) -> String {
        match self {
            ModeType::Forward => value.replace('\\', "/"),
            ModeType::Double => value.replace('\\', "\\\\"),
            ModeType::Policy => value.replace(['\\', '/'], POLICY_SEPARATOR),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModeType::Forward => "forward",
            ModeType::Double => "double",
            ModeType::Policy => "policy",
        }
    }
}

impl fmt::Display for ModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeType {
    type Err = StringSubsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(ModeType::Forward),
            "double" => Ok(ModeType::Double),
            "policy" => Ok(ModeType::Policy),
            other => Err(StringSubsError::invalid_argument(format!(
                "Unknown mode type '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward() {
        assert_eq!(ModeType::Forward.apply(r"C:\glassfish\domains"), "C:/glassfish/domains");
    }

    #[test]
    fn test_double() {
        assert_eq!(ModeType::Double.apply(r"C:\glassfish"), r"C:\\glassfish");
        assert_eq!(ModeType::Double.apply("/opt/glassfish"), "/opt/glassfish");
    }

    #[test]
    fn test_policy() {
        assert_eq!(ModeType::Policy.apply(r"C:\a/b"), "C:${/}a${/}b");
    }

    #[test]
    fn test_parse() {
        assert_eq!("FORWARD".parse::<ModeType>().unwrap(), ModeType::Forward);
        assert_eq!(" policy ".parse::<ModeType>().unwrap(), ModeType::Policy);
        assert!("sideways".parse::<ModeType>().is_err());
        assert_eq!(ModeType::Double.to_string(), "double");
    }
}
