//! The running kernel and its check against a framework matrix.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};
use vintf_schema::{CompatibilityMatrix, KernelConfigParser, KernelVersion, ParserOptions, SchemaError};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KernelInfo {
    pub version: KernelVersion,
    /// Raw values as they appear in the kernel config.
    pub configs: BTreeMap<String, String>,
    pub kernel_sepolicy_version: u64,
}

impl KernelInfo {
    pub fn new(
        version: KernelVersion,
        configs: BTreeMap<String, String>,
        kernel_sepolicy_version: u64,
    ) -> Self {
        Self {
            version,
            configs,
            kernel_sepolicy_version,
        }
    }

    /// Build from decompressed `/proc/config.gz` text. Bad lines are logged
    /// and skipped.
    pub fn from_config_text(version: KernelVersion, text: &str, kernel_sepolicy_version: u64) -> Self {
        let mut parser = KernelConfigParser::new(ParserOptions {
            process_comments: false,
            relaxed_format: true,
        });
        let _ = parser.process(text);
        let _ = parser.process("\n");
        for e in parser.errors() {
            warn!("ignoring kernel config line: {e}");
        }
        Self::new(version, parser.configs().clone(), kernel_sepolicy_version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum KernelMismatch {
    NoMatchingKernel {
        running: KernelVersion,
        required: Vec<KernelVersion>,
    },
    Config {
        key: String,
        required: String,
        actual: Option<String>,
    },
    SepolicyVersion {
        running: u64,
        required: u64,
    },
}

impl fmt::Display for KernelMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingKernel { running, required } => {
                let required: Vec<String> = required.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "kernel {running} is not compatible; compatible kernel versions are [{}]",
                    required.join(", ")
                )
            }
            Self::Config {
                key,
                required,
                actual: Some(actual),
            } => write!(f, "{key} is {actual}, but {required} is required"),
            Self::Config {
                key,
                required,
                actual: None,
            } => write!(f, "{key} is missing, but {required} is required"),
            Self::SepolicyVersion { running, required } => write!(
                f,
                "kernel sepolicy version {running} does not match required {required}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KernelCheckReport {
    pub mismatches: Vec<KernelMismatch>,
}

impl KernelCheckReport {
    pub fn is_compatible(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn to_json(&self) -> Result<String, crate::CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Check the running kernel against a framework matrix.
///
/// Every entry of the running kernel's series whose minimum minor revision is
/// reached and whose conditions hold contributes its configs. A matrix with no
/// kernel entries places no kernel requirement.
pub fn check_kernel(
    info: &KernelInfo,
    matrix: &CompatibilityMatrix,
) -> Result<KernelCheckReport, SchemaError> {
    let framework = matrix.framework_info()?;
    let mut report = KernelCheckReport::default();

    let applicable = matrix.kernels_for(info.version);
    if !framework.kernels.is_empty() && applicable.is_empty() {
        let mut required: Vec<KernelVersion> = framework.kernels.iter().map(|k| k.min_lts).collect();
        required.dedup();
        report.mismatches.push(KernelMismatch::NoMatchingKernel {
            running: info.version,
            required,
        });
    }

    for kernel in applicable {
        if !kernel.conditions_met(&info.configs) {
            debug!(
                "skipping conditional kernel {} entry: conditions not met",
                kernel.min_lts
            );
            continue;
        }
        for config in &kernel.configs {
            let actual = info.configs.get(&config.key);
            if !config.value.matches_runtime(actual.map(String::as_str)) {
                report.mismatches.push(KernelMismatch::Config {
                    key: config.key.clone(),
                    required: config.value.to_string(),
                    actual: actual.cloned(),
                });
            }
        }
    }

    if info.kernel_sepolicy_version != framework.sepolicy.kernel_sepolicy_version {
        report.mismatches.push(KernelMismatch::SepolicyVersion {
            running: info.kernel_sepolicy_version,
            required: framework.sepolicy.kernel_sepolicy_version,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vintf_schema::{KernelConfig, KernelConfigTypedValue, MatrixKernel, Sepolicy, Tristate};

    fn config(key: &str, value: KernelConfigTypedValue) -> KernelConfig {
        KernelConfig::new(key, value)
    }

    fn matrix() -> CompatibilityMatrix {
        let mut matrix = CompatibilityMatrix::framework();
        matrix.framework_info_mut().unwrap().sepolicy = Sepolicy::new(30, Vec::new());
        matrix
            .add_kernel(MatrixKernel::new(
                KernelVersion::new(4, 4, 107),
                vec![
                    config("CONFIG_ANDROID", KernelConfigTypedValue::Tristate(Tristate::Yes)),
                    config("CONFIG_DEVMEM", KernelConfigTypedValue::Tristate(Tristate::No)),
                    config("CONFIG_HZ", KernelConfigTypedValue::Integer(250)),
                    config("CONFIG_ARCH_MMAP_RND_BITS", KernelConfigTypedValue::Range(24, 32)),
                    config(
                        "CONFIG_DEFAULT_SECURITY",
                        KernelConfigTypedValue::String("selinux".to_owned()),
                    ),
                ],
            ))
            .unwrap();
        matrix
            .add_kernel(
                MatrixKernel::new(
                    KernelVersion::new(4, 4, 107),
                    vec![config("CONFIG_ARM64_PAN", KernelConfigTypedValue::Tristate(Tristate::Yes))],
                )
                .with_conditions(vec![config(
                    "CONFIG_ARM64",
                    KernelConfigTypedValue::Tristate(Tristate::Yes),
                )]),
            )
            .unwrap();
        matrix
            .add_kernel(MatrixKernel::new(KernelVersion::new(4, 9, 0), Vec::new()))
            .unwrap();
        matrix
    }

    const CONFIG: &str = "\
# Automatically generated file; DO NOT EDIT.
CONFIG_ANDROID=y
CONFIG_HZ=0xfa
CONFIG_ARCH_MMAP_RND_BITS=24
CONFIG_DEFAULT_SECURITY=\"selinux\"
CONFIG_X86=y
";

    #[test]
    fn from_config_text_reads_raw_values() {
        let info = KernelInfo::from_config_text(KernelVersion::new(4, 4, 120), CONFIG, 30);
        assert_eq!(info.configs["CONFIG_HZ"], "0xfa");
        assert_eq!(info.configs["CONFIG_DEFAULT_SECURITY"], "\"selinux\"");
        assert!(!info.configs.contains_key("CONFIG_DEVMEM"));
    }

    #[test]
    fn matching_kernel_is_compatible() {
        let info = KernelInfo::from_config_text(KernelVersion::new(4, 4, 120), CONFIG, 30);
        let report = check_kernel(&info, &matrix()).unwrap();
        assert!(report.is_compatible(), "{:?}", report.mismatches);
    }

    #[test]
    fn conditional_entries_apply_when_conditions_hold() {
        let text = format!("{CONFIG}CONFIG_ARM64=y\n");
        let info = KernelInfo::from_config_text(KernelVersion::new(4, 4, 120), &text, 30);
        let report = check_kernel(&info, &matrix()).unwrap();
        assert_eq!(
            report.mismatches,
            vec![KernelMismatch::Config {
                key: "CONFIG_ARM64_PAN".to_owned(),
                required: "y".to_owned(),
                actual: None,
            }]
        );
    }

    #[test]
    fn older_minor_revision_has_no_matching_kernel() {
        let info = KernelInfo::from_config_text(KernelVersion::new(4, 4, 100), CONFIG, 30);
        let report = check_kernel(&info, &matrix()).unwrap();
        assert!(matches!(
            report.mismatches[..],
            [KernelMismatch::NoMatchingKernel { .. }]
        ));
        assert!(report.mismatches[0].to_string().contains("4.4.107, 4.9.0"));
    }

    #[test]
    fn wrong_values_and_sepolicy_are_reported() {
        let text = CONFIG.replace("CONFIG_HZ=0xfa", "CONFIG_HZ=100") + "CONFIG_DEVMEM=y\n";
        let info = KernelInfo::from_config_text(KernelVersion::new(4, 4, 107), &text, 29);
        let report = check_kernel(&info, &matrix()).unwrap();
        assert_eq!(report.mismatches.len(), 3);
        assert!(report
            .mismatches
            .iter()
            .any(|m| matches!(m, KernelMismatch::SepolicyVersion { running: 29, required: 30 })));

        let json = report.to_json().unwrap();
        assert!(json.contains(r#""kind": "sepolicy-version""#), "{json}");
        assert!(json.contains(r#""key": "CONFIG_DEVMEM""#), "{json}");
    }

    #[test]
    fn device_matrix_is_rejected() {
        let info = KernelInfo::default();
        assert!(check_kernel(&info, &CompatibilityMatrix::device()).is_err());
    }
}
