//! Schema layer for vintf: the manifest and compatibility matrix model.
//!
//! This crate defines the version algebra (`Version`, `VersionRange`,
//! `KernelVersion`), instance identity and patterns, the name-indexed
//! `HalGroup` container, the device and framework variants of `HalManifest`
//! and `CompatibilityMatrix` with their merge rules, the kernel config file
//! parser, and the XML codec (`XmlSchema`) with its `SerializeFlags` presets.

/// Serialize a `Display + FromStr` type as its string form.
macro_rules! string_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = <String as serde::Deserialize>::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub mod codec;
pub mod error;
pub mod flags;
pub mod hal_group;
pub mod instance;
pub mod kernel;
pub mod kernel_parser;
pub mod manifest;
pub mod manifest_hal;
pub mod matrix;
pub mod matrix_hal;
pub mod sepolicy;
pub mod types;
pub mod version;
pub mod vndk;
pub mod xml;
pub mod xml_file;

pub use codec::{CodecError, XmlSchema};
pub use error::{ParseError, SchemaError};
pub use flags::{get_preset, list_presets, FlagPreset, SerializeFlags, BUILTIN_PRESETS};
pub use hal_group::{ContainsVersion, HalGroup, HasName};
pub use instance::{FqInstance, InstancePattern, ManifestInstance, MatrixInstance, RegexInstance};
pub use kernel::{
    KernelConfig, KernelConfigType, KernelConfigTypedValue, MatrixKernel, Tristate,
};
pub use kernel_parser::{KernelConfigError, KernelConfigErrors, KernelConfigParser, ParserOptions};
pub use manifest::{DeviceManifest, FrameworkManifest, HalManifest, ManifestVariant};
pub use manifest_hal::ManifestHal;
pub use matrix::{CompatibilityMatrix, DeviceMatrix, FrameworkMatrix, MatrixVariant};
pub use matrix_hal::MatrixHal;
pub use sepolicy::Sepolicy;
pub use types::{Arch, HalFormat, Level, SchemaType, Transport, TransportArch, XmlSchemaFormat};
pub use version::{KernelVersion, Version, VersionRange};
pub use vndk::{SystemSdk, VendorNdk};
pub use xml_file::{ManifestXmlFile, MatrixXmlFile};
