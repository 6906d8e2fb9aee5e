//! Folding fragments into single documents: HAL manifests, and kernel config
//! files into kernel requirement entries.

use crate::combine::Named;
use thiserror::Error;
use tracing::debug;
use vintf_schema::{
    HalManifest, KernelConfig, KernelConfigErrors, KernelConfigParser, KernelConfigTypedValue,
    KernelVersion, Level, MatrixKernel, ParseError, ParserOptions, SchemaError, SchemaType,
    Tristate,
};

const BASE_CONFIG: &str = "android-base.cfg";
const CONFIG_PREFIX: &str = "android-base-";
const CONFIG_SUFFIX: &str = ".cfg";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("no manifest fragments to assemble")]
    NoFragments,
    #[error("'{name}' is a {actual} manifest, but '{first}' is a {expected} manifest")]
    TypeMismatch {
        first: String,
        name: String,
        expected: SchemaType,
        actual: SchemaType,
    },
    #[error("inconsistent FCM version in HAL manifests: '{first}' has level {level}, '{name}' has level {other}")]
    LevelConflict {
        first: String,
        level: Level,
        name: String,
        other: Level,
    },
    #[error("'{name}' cannot be added: {source}")]
    Conflict {
        name: String,
        #[source]
        source: SchemaError,
    },
    #[error("no android-base.cfg among the kernel config files for {version}")]
    MissingBaseConfig { version: KernelVersion },
    #[error("unexpected kernel config file name '{0}': expected android-base(-<condition>)?.cfg")]
    UnexpectedConfigFile(String),
    #[error("'{name}' is not a valid kernel config file: {source}")]
    KernelConfig {
        name: String,
        #[source]
        source: KernelConfigErrors,
    },
    #[error("'{name}': {key} has an untypeable value: {source}")]
    ConfigValue {
        name: String,
        key: String,
        #[source]
        source: ParseError,
    },
}

/// Fold manifest fragments into the first one.
///
/// Every fragment must have the first fragment's type. Levels must agree where
/// specified; the first specified level is adopted. Stops at the first
/// conflict.
pub fn assemble_manifest(fragments: Vec<Named<HalManifest>>) -> Result<HalManifest, AssembleError> {
    let mut fragments = fragments.into_iter();
    let Named {
        name: first,
        object: mut manifest,
    } = fragments.next().ok_or(AssembleError::NoFragments)?;

    for Named { name, object } in fragments {
        if object.schema_type() != manifest.schema_type() {
            return Err(AssembleError::TypeMismatch {
                first,
                name,
                expected: manifest.schema_type(),
                actual: object.schema_type(),
            });
        }
        if object.level.is_specified() {
            if !manifest.level.is_specified() {
                manifest.level = object.level;
            } else if manifest.level != object.level {
                return Err(AssembleError::LevelConflict {
                    first,
                    level: manifest.level,
                    name,
                    other: object.level,
                });
            }
        }
        debug!("adding {} HALs from {name}", object.hals().len());
        if let Err(source) = manifest.add_all_hals(object) {
            return Err(AssembleError::Conflict { name, source });
        }
    }
    Ok(manifest)
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// `android-base-foo-bar.cfg` is conditional on `CONFIG_FOO_BAR=y`.
fn condition_for(name: &str) -> Result<Option<KernelConfig>, AssembleError> {
    let file = file_name(name);
    if file == BASE_CONFIG {
        return Ok(None);
    }
    let condition = file
        .strip_prefix(CONFIG_PREFIX)
        .and_then(|rest| rest.strip_suffix(CONFIG_SUFFIX))
        .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-'))
        .ok_or_else(|| AssembleError::UnexpectedConfigFile(name.to_owned()))?;
    let key = format!("CONFIG_{}", condition.to_ascii_uppercase().replace('-', "_"));
    Ok(Some(KernelConfig::new(
        key,
        KernelConfigTypedValue::Tristate(Tristate::Yes),
    )))
}

fn parse_config_file(name: &str, content: &str) -> Result<Vec<KernelConfig>, AssembleError> {
    let mut parser = KernelConfigParser::new(ParserOptions {
        process_comments: true,
        relaxed_format: true,
    });
    // Errors are collected by the parser and reported by `finish`.
    let _ = parser.process(content);
    let raw = parser.finish().map_err(|source| AssembleError::KernelConfig {
        name: name.to_owned(),
        source,
    })?;
    raw.into_iter()
        .map(|(key, value)| match KernelConfigTypedValue::infer(&value) {
            Ok(typed) => Ok(KernelConfig::new(key, typed)),
            Err(source) => Err(AssembleError::ConfigValue {
                name: name.to_owned(),
                key,
                source,
            }),
        })
        .collect()
}

/// Build the kernel requirement entries for `version` from its config files.
///
/// `android-base.cfg` is required and yields the unconditional entry, which
/// comes first. Every `android-base-<condition>.cfg` yields an entry that only
/// applies when `CONFIG_<CONDITION>=y`.
pub fn assemble_kernel(
    version: KernelVersion,
    files: &[Named<String>],
) -> Result<Vec<MatrixKernel>, AssembleError> {
    let mut base = None;
    let mut conditional = Vec::new();
    for file in files {
        let configs = parse_config_file(&file.name, &file.object)?;
        match condition_for(&file.name)? {
            None => base = Some(MatrixKernel::new(version, configs)),
            Some(condition) => {
                conditional.push(MatrixKernel::new(version, configs).with_conditions(vec![condition]));
            }
        }
    }
    let base = base.ok_or(AssembleError::MissingBaseConfig { version })?;
    let mut kernels = Vec::with_capacity(conditional.len() + 1);
    kernels.push(base);
    kernels.extend(conditional);
    Ok(kernels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vintf_schema::{Arch, HalFormat, ManifestHal, Transport, TransportArch, Version};

    fn nfc(version: Version) -> ManifestHal {
        ManifestHal::new(HalFormat::Hidl, "android.hardware.nfc")
            .with_transport(TransportArch::new(Transport::Hwbinder, Arch::Empty))
            .with_version(version)
            .with_instance("INfc", "default")
    }

    fn device(level: Level, hals: Vec<ManifestHal>) -> HalManifest {
        let mut manifest = HalManifest::device(Version::new(27, 0)).with_level(level);
        for hal in hals {
            manifest.add_hal(hal).unwrap();
        }
        manifest
    }

    #[test]
    fn fragments_fold_and_adopt_level() {
        let assembled = assemble_manifest(vec![
            Named::new("manifest.xml", device(Level::UNSPECIFIED, vec![nfc(Version::new(1, 0))])),
            Named::new("fragment.xml", device(Level::new(3), vec![nfc(Version::new(2, 0))])),
        ])
        .unwrap();
        assert_eq!(assembled.level, Level::new(3));
        assert_eq!(assembled.hals().get_all("android.hardware.nfc").len(), 2);
    }

    #[test]
    fn conflicting_levels_are_rejected() {
        let err = assemble_manifest(vec![
            Named::new("a.xml", device(Level::new(2), Vec::new())),
            Named::new("b.xml", device(Level::new(3), Vec::new())),
        ])
        .unwrap_err();
        assert!(matches!(err, AssembleError::LevelConflict { .. }));
        assert!(err.to_string().contains("'b.xml' has level 3"));
    }

    #[test]
    fn duplicate_major_names_the_fragment() {
        let err = assemble_manifest(vec![
            Named::new("a.xml", device(Level::UNSPECIFIED, vec![nfc(Version::new(1, 0))])),
            Named::new("b.xml", device(Level::UNSPECIFIED, vec![nfc(Version::new(1, 1))])),
        ])
        .unwrap_err();
        assert!(matches!(err, AssembleError::Conflict { ref name, .. } if name == "b.xml"));
    }

    #[test]
    fn mixed_types_are_rejected() {
        let err = assemble_manifest(vec![
            Named::new("a.xml", HalManifest::framework()),
            Named::new("b.xml", device(Level::UNSPECIFIED, Vec::new())),
        ])
        .unwrap_err();
        assert!(matches!(err, AssembleError::TypeMismatch { .. }));
        assert_eq!(assemble_manifest(Vec::new()), Err(AssembleError::NoFragments));
    }

    #[test]
    fn kernel_files_become_base_and_conditional_entries() {
        let files = vec![
            Named::new(
                "kernel/4.9/android-base-arm64.cfg",
                "CONFIG_ARM64_SW_TTBR0_PAN=y\n".to_owned(),
            ),
            Named::new(
                "kernel/4.9/android-base.cfg",
                "# this is a comment\nCONFIG_HZ=250\n# CONFIG_DEVMEM is not set\nCONFIG_DEFAULT_SECURITY=\"selinux\"\n"
                    .to_owned(),
            ),
        ];
        let version = KernelVersion::new(4, 9, 0);
        let kernels = assemble_kernel(version, &files).unwrap();
        assert_eq!(kernels.len(), 2);
        assert!(kernels[0].conditions.is_empty());
        assert!(kernels[0].configs.contains(&KernelConfig::new(
            "CONFIG_DEVMEM",
            KernelConfigTypedValue::Tristate(Tristate::No)
        )));
        assert!(kernels[0].configs.contains(&KernelConfig::new(
            "CONFIG_HZ",
            KernelConfigTypedValue::Integer(250)
        )));
        assert!(kernels[0].configs.contains(&KernelConfig::new(
            "CONFIG_DEFAULT_SECURITY",
            KernelConfigTypedValue::String("selinux".to_owned())
        )));
        assert_eq!(
            kernels[1].conditions,
            vec![KernelConfig::new(
                "CONFIG_ARM64",
                KernelConfigTypedValue::Tristate(Tristate::Yes)
            )]
        );
    }

    #[test]
    fn condition_names_are_normalized() {
        let condition = condition_for("android-base-low-ram.cfg").unwrap().unwrap();
        assert_eq!(condition.key, "CONFIG_LOW_RAM");
        assert!(matches!(
            condition_for("android-recommended.cfg"),
            Err(AssembleError::UnexpectedConfigFile(_))
        ));
    }

    #[test]
    fn kernel_assembly_errors() {
        let version = KernelVersion::new(4, 4, 0);
        let only_conditional = vec![Named::new("android-base-x86.cfg", "CONFIG_X86=y\n".to_owned())];
        assert_eq!(
            assemble_kernel(version, &only_conditional),
            Err(AssembleError::MissingBaseConfig { version })
        );

        let duplicate = vec![Named::new(
            "android-base.cfg",
            "CONFIG_A=y\nCONFIG_A=m\n".to_owned(),
        )];
        assert!(matches!(
            assemble_kernel(version, &duplicate),
            Err(AssembleError::KernelConfig { .. })
        ));

        let untypeable = vec![Named::new("android-base.cfg", "CONFIG_A=\"open\n".to_owned())];
        assert!(matches!(
            assemble_kernel(version, &untypeable),
            Err(AssembleError::ConfigValue { ref key, .. }) if key == "CONFIG_A"
        ));
    }
}
