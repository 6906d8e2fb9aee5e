use crate::types::{Level, SchemaType};
use crate::version::Version;
use thiserror::Error;

/// A malformed token. Always carries the offending raw text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid version '{0}': expected <major>.<minor>")]
    Version(String),
    #[error("invalid version range '{0}': expected <major>.<minor>[-<max-minor>]")]
    VersionRange(String),
    #[error("invalid kernel version '{0}': expected <version>.<major-rev>.<minor-rev>")]
    KernelVersion(String),
    #[error("invalid level '{0}'")]
    Level(String),
    #[error("invalid {kind} '{text}'")]
    Token { kind: &'static str, text: String },
    #[error("invalid fully-qualified instance '{0}'")]
    FqInstance(String),
    #[error("invalid regex instance '{pattern}': {reason}")]
    Regex { pattern: String, reason: String },
    #[error("invalid kernel config value '{0}'")]
    KernelConfigValue(String),
}

/// A structural rule of the model was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{entity} is of type {actual}, but this operation requires {expected}")]
    WrongSchemaType {
        entity: &'static str,
        expected: SchemaType,
        actual: SchemaType,
    },
    #[error("HAL '{name}' is invalid: {reason}")]
    InvalidHal { name: String, reason: String },
    #[error("HAL '{name}' conflicts with an existing entry of the same major version")]
    DuplicateMajor { name: String },
    #[error("xmlfile '{name}' conflicts with an existing entry of the same major version")]
    DuplicateXmlFile { name: String },
    #[error("kernel version {version} with the same conditions is already present")]
    DuplicateKernel { version: String },
    #[error(
        "HAL {name}@{version} is a required HAL, but fully qualified instance names don't match \
         (at FCM version {level} and {donor_level})"
    )]
    RequiredInstanceMismatch {
        name: String,
        version: Version,
        level: Level,
        donor_level: Level,
    },
}
