//! Runtime versions and version selectors.
//!
//! Fixed-version runtimes use four-part versions (`major.minor.build.patch`).
//! A [`VersionSelector`] is what the user asks for: either the newest
//! published version or one exact version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Token that selects the newest published runtime.
pub const LATEST: &str = "latest";

/// An exact four-part runtime version such as `120.0.2210.91`.
///
/// Components are compared left to right, so ordering follows release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion([u32; 4]);

impl RuntimeVersion {
    /// Creates a version from its four components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, build: u32, patch: u32) -> Self {
        Self([major, minor, build, patch])
    }

    /// Returns the four components.
    #[must_use]
    pub const fn parts(&self) -> [u32; 4] {
        self.0
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

/// Error returned for strings that are neither `latest` nor `N.N.N.N`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{input}': expected \"latest\" or four dot-separated integers (e.g. 120.0.2210.91)")]
pub struct SelectorError {
    input: String,
}

impl SelectorError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

impl FromStr for RuntimeVersion {
    type Err = SelectorError;

    /// Parses `N.N.N.N`. Components are canonical decimal: digits only, no
    /// sign, no leading zeros, each fitting in a `u32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u32; 4];
        let mut count = 0;

        for component in s.split('.') {
            if count == 4 || !is_canonical_integer(component) {
                return Err(SelectorError::new(s));
            }
            parts[count] = component.parse().map_err(|_| SelectorError::new(s))?;
            count += 1;
        }

        if count == 4 {
            Ok(Self(parts))
        } else {
            Err(SelectorError::new(s))
        }
    }
}

fn is_canonical_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'))
}

impl Serialize for RuntimeVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RuntimeVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Which runtime version to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    /// The newest version the vendor publishes.
    Latest,
    /// One exact version.
    Exact(RuntimeVersion),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Exact(version) => version.fmt(f),
        }
    }
}

impl FromStr for VersionSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LATEST {
            Ok(Self::Latest)
        } else {
            s.parse().map(Self::Exact)
        }
    }
}
