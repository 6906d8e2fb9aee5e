use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// A `major.minor` interface version, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::Version(s.to_owned());
        let (major, minor) = s.split_once('.').ok_or_else(err)?;
        Ok(Self {
            major: parse_number(major).ok_or_else(err)?,
            minor: parse_number(minor).ok_or_else(err)?,
        })
    }
}

/// All versions sharing `major` whose minor lies in `[min_minor, max_minor]`.
///
/// The upper bound is informational when checking a provided version: see
/// [`VersionRange::supported_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionRange {
    major: u64,
    min_minor: u64,
    max_minor: u64,
}

impl VersionRange {
    pub fn new(major: u64, min_minor: u64, max_minor: u64) -> Result<Self, ParseError> {
        if min_minor > max_minor {
            return Err(ParseError::VersionRange(format!(
                "{major}.{min_minor}-{max_minor}"
            )));
        }
        Ok(Self {
            major,
            min_minor,
            max_minor,
        })
    }

    /// A range holding exactly one version.
    pub const fn exact(major: u64, minor: u64) -> Self {
        Self {
            major,
            min_minor: minor,
            max_minor: minor,
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn min_minor(&self) -> u64 {
        self.min_minor
    }

    pub fn max_minor(&self) -> u64 {
        self.max_minor
    }

    pub fn min_ver(&self) -> Version {
        Version::new(self.major, self.min_minor)
    }

    pub fn max_ver(&self) -> Version {
        Version::new(self.major, self.max_minor)
    }

    pub fn is_single_version(&self) -> bool {
        self.min_minor == self.max_minor
    }

    pub fn contains(&self, v: Version) -> bool {
        v.major == self.major && self.min_minor <= v.minor && v.minor <= self.max_minor
    }

    /// Whether a provided version satisfies this required range. Any minor at
    /// or above the floor does.
    pub fn supported_by(&self, v: Version) -> bool {
        v.major == self.major && v.minor >= self.min_minor
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.major == other.major
            && self.min_minor <= other.max_minor
            && other.min_minor <= self.max_minor
    }

    /// Raise the ceiling to `max_minor`. Never lowers it.
    pub fn raise_max_minor(&mut self, max_minor: u64) {
        self.max_minor = self.max_minor.max(max_minor);
    }
}

impl From<Version> for VersionRange {
    fn from(v: Version) -> Self {
        Self::exact(v.major, v.minor)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.min_minor)?;
        if !self.is_single_version() {
            write!(f, "-{}", self.max_minor)?;
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::VersionRange(s.to_owned());
        match s.split_once('-') {
            None => s.parse::<Version>().map(Self::from).map_err(|_| err()),
            Some((low, high)) => {
                let low: Version = low.parse().map_err(|_| err())?;
                let max_minor = parse_number(high).ok_or_else(err)?;
                Self::new(low.major, low.minor, max_minor).map_err(|_| err())
            }
        }
    }
}

/// A kernel release triple such as `4.4.107`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KernelVersion {
    pub version: u64,
    pub major_rev: u64,
    pub minor_rev: u64,
}

impl KernelVersion {
    pub const fn new(version: u64, major_rev: u64, minor_rev: u64) -> Self {
        Self {
            version,
            major_rev,
            minor_rev,
        }
    }

    /// Same `version.major_rev` series.
    pub fn same_series(&self, other: &Self) -> bool {
        self.version == other.version && self.major_rev == other.major_rev
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.version, self.major_rev, self.minor_rev)
    }
}

impl FromStr for KernelVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::KernelVersion(s.to_owned());
        let mut parts = s.split('.');
        let mut next = || parts.next().and_then(parse_number).ok_or_else(err);
        let parsed = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(parsed)
    }
}

string_serde!(Version);
string_serde!(VersionRange);
string_serde!(KernelVersion);

/// Strict unsigned decimal: digits only, no sign, no whitespace.
pub(crate) fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
