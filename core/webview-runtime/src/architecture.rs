//! Target architectures for fixed-version runtime packages.
//!
//! The vendor publishes one package per version and architecture. The set is
//! closed: anything outside it is rejected when parsed.
//!
//! ## Supported Architectures
//!
//! - ARM64 (`arm64`)
//! - `x86_64` (`x64`)
//! - 32-bit x86 (`x86`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A processor architecture a runtime package can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// 64-bit ARM.
    Arm64,
    /// 64-bit x86.
    X64,
    /// 32-bit x86.
    X86,
}

impl Architecture {
    /// Every supported architecture, in the order the vendor usually lists them.
    pub const ALL: [Self; 3] = [Self::Arm64, Self::X64, Self::X86];

    /// Returns the identifier used in vendor metadata and directory names.
    #[must_use = "returns the architecture string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X64 => "x64",
            Self::X86 => "x86",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown architecture name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported architecture '{0}' (expected one of: arm64, x64, x86)")]
pub struct UnknownArchitecture(pub String);

impl FromStr for Architecture {
    type Err = UnknownArchitecture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| UnknownArchitecture(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_returns_vendor_identifiers() {
        assert_eq!(Architecture::Arm64.as_str(), "arm64");
        assert_eq!(Architecture::X64.as_str(), "x64");
        assert_eq!(Architecture::X86.as_str(), "x86");
    }

    #[test]
    fn display_matches_as_str() {
        for arch in Architecture::ALL {
            assert_eq!(arch.to_string(), arch.as_str());
        }
    }

    #[test]
    fn from_str_round_trips_all_variants() {
        for arch in Architecture::ALL {
            assert_eq!(arch.as_str().parse::<Architecture>(), Ok(arch));
        }
    }

    #[test]
    fn from_str_is_case_sensitive() {
        let err = "X64".parse::<Architecture>().unwrap_err();
        assert_eq!(err, UnknownArchitecture("X64".to_string()));
    }

    #[test]
    fn from_str_rejects_unknown_names() {
        assert!("amd64".parse::<Architecture>().is_err());
        assert!("".parse::<Architecture>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Architecture::Arm64).unwrap();
        assert_eq!(json, "\"arm64\"");
        let parsed: Architecture = serde_json::from_str("\"x86\"").unwrap();
        assert_eq!(parsed, Architecture::X86);
    }
}
