//! Checking a manifest against the opposite side's compatibility matrix.
//!
//! Every unmet requirement is collected into a [`CompatibilityReport`]; the
//! check never stops at the first mismatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use vintf_schema::{
    CompatibilityMatrix, HalManifest, ManifestHal, MatrixHal, SchemaType, Version, VersionRange,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckOptions {
    /// Also report optional HALs and xmlfiles. Diagnostics only.
    pub include_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("cannot check a {manifest} manifest against a {matrix} matrix; their types must differ")]
    SameType {
        manifest: SchemaType,
        matrix: SchemaType,
    },
}

/// One unmet requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Mismatch {
    Hal {
        name: String,
        ranges: Vec<VersionRange>,
        optional: bool,
        /// Versions the manifest declares for this HAL.
        provided: Vec<Version>,
        /// Required instances the closest manifest version lacks.
        missing_instances: Vec<String>,
    },
    Sepolicy {
        device: Version,
        accepted: Vec<VersionRange>,
    },
    VendorNdkLibraries {
        version: String,
        missing: Vec<String>,
    },
    VendorNdkVersion {
        required: String,
        provided: Vec<String>,
    },
    SystemSdk {
        missing: Vec<String>,
    },
    XmlFile {
        name: String,
        range: VersionRange,
        provided: Vec<Version>,
    },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hal {
                name,
                ranges,
                optional,
                provided,
                missing_instances,
            } => {
                let kind = if *optional { "optional" } else { "required" };
                write!(f, "{kind} HAL {name} @ [{}] ", join(ranges))?;
                if provided.is_empty() {
                    f.write_str("is not provided")
                } else if missing_instances.is_empty() {
                    write!(f, "is not satisfied by provided versions [{}]", join(provided))
                } else {
                    write!(f, "is missing instances: {}", missing_instances.join(", "))
                }
            }
            Self::Sepolicy { device, accepted } => write!(
                f,
                "sepolicy version {device} is not accepted by [{}]",
                join(accepted)
            ),
            Self::VendorNdkLibraries { version, missing } => write!(
                f,
                "vendor NDK {version} lacks libraries: {}",
                missing.join(", ")
            ),
            Self::VendorNdkVersion { required, provided } => write!(
                f,
                "vendor NDK {required} is required, but only [{}] are provided",
                provided.join(", ")
            ),
            Self::SystemSdk { missing } => {
                write!(f, "system SDK versions not provided: {}", missing.join(", "))
            }
            Self::XmlFile {
                name,
                range,
                provided,
            } => write!(
                f,
                "xmlfile {name} @ {range} is not satisfied by provided versions [{}]",
                join(provided)
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    pub mismatches: Vec<Mismatch>,
}

impl CompatibilityReport {
    pub fn is_compatible(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn to_json(&self) -> Result<String, crate::CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn push(&mut self, mismatch: Mismatch) {
        debug!("incompatible: {mismatch}");
        self.mismatches.push(mismatch);
    }
}

impl fmt::Display for CompatibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compatible() {
            return f.write_str("compatible");
        }
        for (i, mismatch) in self.mismatches.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{mismatch}")?;
        }
        Ok(())
    }
}

/// Required instances of `hal` that `provided` does not serve at `version`,
/// or `None` when no range of `hal` is supported by `version`.
fn missing_instances(hal: &MatrixHal, provided: &ManifestHal, version: Version) -> Option<Vec<String>> {
    let range = hal.version_ranges.iter().find(|r| r.supported_by(version))?;
    Some(
        hal.interface_instances()
            .filter(|(interface, pattern)| !provided.instances_of(interface).any(|i| pattern.matches(i)))
            .map(|(interface, pattern)| format!("{}@{range}::{interface}/{pattern}", hal.name))
            .collect(),
    )
}

fn check_hal(manifest: &HalManifest, hal: &MatrixHal) -> Option<Mismatch> {
    let candidates: Vec<&ManifestHal> = manifest
        .hals()
        .get_all(&hal.name)
        .iter()
        .filter(|m| m.format == hal.format)
        .collect();

    let mut closest: Option<Vec<String>> = None;
    for provided in &candidates {
        for &version in &provided.versions {
            let Some(missing) = missing_instances(hal, provided, version) else {
                continue;
            };
            if missing.is_empty() {
                return None;
            }
            if closest.as_ref().map_or(true, |c| missing.len() < c.len()) {
                closest = Some(missing);
            }
        }
    }
    Some(Mismatch::Hal {
        name: hal.name.clone(),
        ranges: hal.version_ranges.clone(),
        optional: hal.optional,
        provided: candidates.iter().flat_map(|m| m.versions.iter().copied()).collect(),
        missing_instances: closest.unwrap_or_default(),
    })
}

fn check_hals(manifest: &HalManifest, matrix: &CompatibilityMatrix, options: CheckOptions, report: &mut CompatibilityReport) {
    for hal in matrix.hals().iter() {
        if hal.optional && !options.include_optional {
            continue;
        }
        if let Some(mismatch) = check_hal(manifest, hal) {
            report.push(mismatch);
        }
    }
}

fn check_xml_files(manifest: &HalManifest, matrix: &CompatibilityMatrix, options: CheckOptions, report: &mut CompatibilityReport) {
    for file in matrix.xml_files().iter() {
        if file.optional && !options.include_optional {
            continue;
        }
        let provided: Vec<Version> = manifest
            .xml_files()
            .get_all(&file.name)
            .iter()
            .map(|f| f.version)
            .collect();
        if !provided.iter().any(|&v| file.version_range.supported_by(v)) {
            report.push(Mismatch::XmlFile {
                name: file.name.clone(),
                range: file.version_range,
                provided,
            });
        }
    }
}

/// Device manifest against framework matrix: sepolicy.
fn check_device_side(manifest: &HalManifest, matrix: &CompatibilityMatrix, report: &mut CompatibilityReport) {
    let (Ok(device), Ok(framework)) = (manifest.device_info(), matrix.framework_info()) else {
        return;
    };
    if !framework.sepolicy.accepts(device.sepolicy_version) {
        report.push(Mismatch::Sepolicy {
            device: device.sepolicy_version,
            accepted: framework.sepolicy.sepolicy_version_ranges.clone(),
        });
    }
}

/// Framework manifest against device matrix: vendor NDK and system SDK.
fn check_framework_side(manifest: &HalManifest, matrix: &CompatibilityMatrix, report: &mut CompatibilityReport) {
    let (Ok(framework), Ok(device)) = (manifest.framework_info(), matrix.device_info()) else {
        return;
    };
    if let Some(required) = device.vendor_ndk.as_ref().filter(|ndk| !ndk.version.is_empty()) {
        match framework
            .vendor_ndks
            .iter()
            .find(|ndk| ndk.version == required.version)
        {
            Some(provided) => {
                let missing: Vec<String> = required
                    .libraries
                    .difference(&provided.libraries)
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    report.push(Mismatch::VendorNdkLibraries {
                        version: required.version.clone(),
                        missing,
                    });
                }
            }
            None => report.push(Mismatch::VendorNdkVersion {
                required: required.version.clone(),
                provided: framework.vendor_ndks.iter().map(|n| n.version.clone()).collect(),
            }),
        }
    }
    let missing = device.system_sdk.missing_from(&framework.system_sdk);
    if !missing.is_empty() {
        report.push(Mismatch::SystemSdk { missing });
    }
}

/// Check `manifest` against an opposite-type `matrix`.
pub fn check_compatibility(
    manifest: &HalManifest,
    matrix: &CompatibilityMatrix,
    options: CheckOptions,
) -> Result<CompatibilityReport, CheckError> {
    if manifest.schema_type() == matrix.schema_type() {
        return Err(CheckError::SameType {
            manifest: manifest.schema_type(),
            matrix: matrix.schema_type(),
        });
    }
    let mut report = CompatibilityReport::default();
    check_hals(manifest, matrix, options, &mut report);
    check_device_side(manifest, matrix, &mut report);
    check_framework_side(manifest, matrix, &mut report);
    check_xml_files(manifest, matrix, options, &mut report);
    Ok(report)
}
