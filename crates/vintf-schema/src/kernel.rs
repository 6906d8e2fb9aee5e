//! Kernel requirements: typed config values and per-version matrix entries.

use crate::error::ParseError;
use crate::version::KernelVersion;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tristate {
    Yes,
    No,
    Module,
}

impl Tristate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "y",
            Self::No => "n",
            Self::Module => "m",
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tristate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "y" => Ok(Self::Yes),
            "n" => Ok(Self::No),
            "m" => Ok(Self::Module),
            _ => Err(ParseError::Token {
                kind: "tristate",
                text: s.to_owned(),
            }),
        }
    }
}

/// The `type` attribute of a matrix `<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelConfigType {
    String,
    Integer,
    Range,
    Tristate,
}

impl KernelConfigType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "int",
            Self::Range => "range",
            Self::Tristate => "tristate",
        }
    }
}

impl FromStr for KernelConfigType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Integer),
            "range" => Ok(Self::Range),
            "tristate" => Ok(Self::Tristate),
            _ => Err(ParseError::Token {
                kind: "kernel config type",
                text: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KernelConfigTypedValue {
    Tristate(Tristate),
    String(String),
    Integer(i64),
    /// Inclusive.
    Range(u64, u64),
}

impl KernelConfigTypedValue {
    /// What an absent config is taken to be.
    pub const MISSING: Self = Self::Tristate(Tristate::No);

    pub fn kind(&self) -> KernelConfigType {
        match self {
            Self::Tristate(_) => KernelConfigType::Tristate,
            Self::String(_) => KernelConfigType::String,
            Self::Integer(_) => KernelConfigType::Integer,
            Self::Range(..) => KernelConfigType::Range,
        }
    }

    /// Parse matrix `<value>` text of a declared type.
    pub fn parse_as(kind: KernelConfigType, text: &str) -> Result<Self, ParseError> {
        let err = || ParseError::KernelConfigValue(text.to_owned());
        match kind {
            KernelConfigType::Tristate => text.parse().map(Self::Tristate).map_err(|_| err()),
            KernelConfigType::String => Ok(Self::String(text.to_owned())),
            KernelConfigType::Integer => parse_kernel_config_int(text)
                .map(Self::Integer)
                .ok_or_else(err),
            KernelConfigType::Range => {
                let (low, high) = text.split_once('-').ok_or_else(err)?;
                let low = parse_kernel_config_u64(low).ok_or_else(err)?;
                let high = parse_kernel_config_u64(high).ok_or_else(err)?;
                if low > high {
                    return Err(err());
                }
                Ok(Self::Range(low, high))
            }
        }
    }

    /// Infer the type of a raw config file value: tristate, then integer,
    /// then a quoted or bare string.
    pub fn infer(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::KernelConfigValue(raw.to_owned()));
        }
        if let Ok(tristate) = raw.parse() {
            return Ok(Self::Tristate(tristate));
        }
        if let Some(n) = parse_kernel_config_int(raw) {
            return Ok(Self::Integer(n));
        }
        if let Some(inner) = raw.strip_prefix('"') {
            return inner
                .strip_suffix('"')
                .map(|s| Self::String(s.to_owned()))
                .ok_or_else(|| ParseError::KernelConfigValue(raw.to_owned()));
        }
        if raw.ends_with('"') {
            return Err(ParseError::KernelConfigValue(raw.to_owned()));
        }
        Ok(Self::String(raw.to_owned()))
    }

    /// The `<value>` text for this value.
    pub fn value_text(&self) -> String {
        match self {
            Self::Tristate(t) => t.as_str().to_owned(),
            Self::String(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Range(low, high) => format!("{low}-{high}"),
        }
    }

    /// Whether a running kernel's raw config value satisfies this requirement.
    /// `None` means the config is absent, which only satisfies tristate `n`.
    pub fn matches_runtime(&self, raw: Option<&str>) -> bool {
        let Some(raw) = raw else {
            return *self == Self::MISSING;
        };
        match self {
            Self::Tristate(want) => raw.parse::<Tristate>().is_ok_and(|t| t == *want),
            Self::String(want) => {
                let unquoted = raw
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(raw);
                unquoted == want
            }
            Self::Integer(want) => parse_kernel_config_int(raw) == Some(*want),
            Self::Range(low, high) => {
                parse_kernel_config_u64(raw).is_some_and(|n| (*low..=*high).contains(&n))
            }
        }
    }
}

impl fmt::Display for KernelConfigTypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            other => f.write_str(&other.value_text()),
        }
    }
}

/// Unsigned decimal or `0x`/`0X` hexadecimal.
pub fn parse_kernel_config_u64(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok();
    }
    crate::version::parse_number(s)
}

/// A config integer: an optional `-` before an unsigned 64-bit value, read as
/// two's complement. `18446744073709551615` is `-1`.
pub fn parse_kernel_config_int(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = parse_kernel_config_u64(digits)? as i64;
    Some(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    pub key: String,
    pub value: KernelConfigTypedValue,
}

impl KernelConfig {
    pub fn new(key: impl Into<String>, value: KernelConfigTypedValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Requirements for one kernel LTS series. Entries with `conditions` apply
/// only when every condition holds on the running kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixKernel {
    pub min_lts: KernelVersion,
    pub configs: Vec<KernelConfig>,
    pub conditions: Vec<KernelConfig>,
}

impl MatrixKernel {
    pub fn new(min_lts: KernelVersion, configs: Vec<KernelConfig>) -> Self {
        Self {
            min_lts,
            configs,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Vec<KernelConfig>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn conditions_met(&self, running: &BTreeMap<String, String>) -> bool {
        self.conditions.iter().all(|condition| {
            condition
                .value
                .matches_runtime(running.get(&condition.key).map(String::as_str))
        })
    }
}
