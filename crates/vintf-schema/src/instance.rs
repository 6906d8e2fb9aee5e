//! Instance identity: fully-qualified instances on the provided side and
//! instance patterns on the required side.

use crate::error::ParseError;
use crate::types::{HalFormat, TransportArch};
use crate::version::{Version, VersionRange};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// `package@major.minor::IInterface/instance`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FqInstance {
    pub package: String,
    pub version: Version,
    pub interface: String,
    pub instance: String,
}

impl FqInstance {
    pub fn new(
        package: impl Into<String>,
        version: Version,
        interface: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version,
            interface: interface.into(),
            instance: instance.into(),
        }
    }

    /// Parse the package-less `@1.0::IFoo/default` form used inside a HAL
    /// entry whose package is already known.
    pub fn parse_in_package(package: &str, s: &str) -> Result<Self, ParseError> {
        let tail = s
            .strip_prefix('@')
            .ok_or_else(|| ParseError::FqInstance(s.to_owned()))?;
        let (version, interface, instance) =
            split_tail(tail).ok_or_else(|| ParseError::FqInstance(s.to_owned()))?;
        Ok(Self::new(package, version, interface, instance))
    }

    /// The package-less form, `@1.0::IFoo/default`.
    pub fn simple_form(&self) -> String {
        format!("@{}::{}/{}", self.version, self.interface, self.instance)
    }
}

fn split_tail(s: &str) -> Option<(Version, &str, &str)> {
    let (version, rest) = s.split_once("::")?;
    let (interface, instance) = rest.split_once('/')?;
    if interface.is_empty() || instance.is_empty() {
        return None;
    }
    Some((version.parse().ok()?, interface, instance))
}

impl fmt::Display for FqInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.package, self.simple_form())
    }
}

impl FromStr for FqInstance {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::FqInstance(s.to_owned());
        let (package, tail) = s.split_once('@').ok_or_else(err)?;
        if package.is_empty() {
            return Err(err());
        }
        let (version, interface, instance) = split_tail(tail).ok_or_else(err)?;
        Ok(Self::new(package, version, interface, instance))
    }
}

/// A compiled instance pattern. Matches whole instance names only.
#[derive(Clone)]
pub struct RegexInstance {
    source: String,
    regex: Regex,
}

impl RegexInstance {
    pub fn new(pattern: &str) -> Result<Self, ParseError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ParseError::Regex {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl fmt::Debug for RegexInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegexInstance").field(&self.source).finish()
    }
}

impl PartialEq for RegexInstance {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegexInstance {}

impl PartialOrd for RegexInstance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RegexInstance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source.cmp(&other.source)
    }
}

impl Hash for RegexInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

/// An instance name as a matrix requires it: a literal or a pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstancePattern {
    Exact(String),
    Regex(RegexInstance),
}

impl InstancePattern {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, ParseError> {
        RegexInstance::new(pattern).map(Self::Regex)
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Regex(regex) => regex.is_match(name),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex(_))
    }

    /// The literal name, if this is not a pattern.
    pub fn exact_name(&self) -> Option<&str> {
        match self {
            Self::Exact(exact) => Some(exact),
            Self::Regex(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(exact) => exact,
            Self::Regex(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for InstancePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Regex(regex) => write!(f, "{{{}}}", regex.as_str()),
        }
    }
}

/// One provided instance, flattened out of a manifest HAL entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInstance {
    pub fq: FqInstance,
    pub format: HalFormat,
    pub transport_arch: TransportArch,
}

/// One required instance, flattened out of a matrix HAL entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixInstance {
    pub format: HalFormat,
    pub package: String,
    pub range: VersionRange,
    pub interface: String,
    pub instance: InstancePattern,
    pub optional: bool,
}

impl MatrixInstance {
    pub fn is_satisfied_by(&self, provided: &FqInstance) -> bool {
        self.package == provided.package
            && self.interface == provided.interface
            && self.range.supported_by(provided.version)
            && self.instance.matches(&provided.instance)
    }
}

impl fmt::Display for MatrixInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}::{}/{}",
            self.package, self.range, self.interface, self.instance
        )
    }
}
