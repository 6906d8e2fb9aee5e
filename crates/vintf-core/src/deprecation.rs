//! Detecting instances that only a retired FCM level still requires but that
//! are still being served.

use crate::combine::Named;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use vintf_schema::{CompatibilityMatrix, HalManifest, Level, MatrixInstance, Version};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeprecationError {
    #[error("device does not specify a shipping FCM version")]
    UnspecifiedLevel,
    #[error("cannot find a framework matrix at FCM version {0}")]
    NoTargetMatrix(Level),
}

/// One instance reported in use by an instance query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServedInstance {
    pub instance: String,
    pub version: Version,
}

impl ServedInstance {
    pub fn new(instance: impl Into<String>, version: Version) -> Self {
        Self {
            instance: instance.into(),
            version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeprecatedInstance {
    pub package: String,
    pub version: Version,
    pub interface: String,
    pub instance: String,
    pub target_level: Level,
    /// Set when the target level still declares the instance but requires a
    /// newer minor version than is served.
    pub required_at_least: Option<Version>,
}

impl fmt::Display for DeprecatedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}::{}/{}",
            self.package, self.version, self.interface, self.instance
        )?;
        match self.required_at_least {
            Some(min) => write!(f, " is deprecated; requires at least {min}"),
            None => write!(
                f,
                " is deprecated in compatibility matrix at FCM Version {}; it should not be served",
                self.target_level
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeprecationReport {
    pub deprecated: Vec<DeprecatedInstance>,
    /// Pattern requirements queried without an instance hint.
    pub imprecise: Vec<String>,
}

impl DeprecationReport {
    pub fn has_deprecated(&self) -> bool {
        !self.deprecated.is_empty()
    }
}

fn check_instance<F>(
    old: &MatrixInstance,
    target: &CompatibilityMatrix,
    list_instances: &F,
    report: &mut DeprecationReport,
) where
    F: Fn(&str, Version, &str, &[String]) -> Vec<ServedInstance>,
{
    let version = old.range.min_ver();
    let hints: Vec<String> = old.instance.exact_name().map(str::to_owned).into_iter().collect();
    if old.instance.is_regex() {
        warn!("{old} is a pattern; deprecation is checked without an instance hint");
        report.imprecise.push(old.to_string());
    }

    for served in list_instances(&old.package, version, &old.interface, &hints) {
        if !old.instance.matches(&served.instance) {
            continue;
        }
        let target_min = target
            .hals()
            .get_all(&old.package)
            .iter()
            .flat_map(|hal| hal.instances())
            .filter(|t| {
                t.range.major() == version.major
                    && t.interface == old.interface
                    && t.instance.matches(&served.instance)
            })
            .map(|t| t.range.min_ver())
            .min();

        let deprecated = |required_at_least| DeprecatedInstance {
            package: old.package.clone(),
            version: served.version,
            interface: old.interface.clone(),
            instance: served.instance.clone(),
            target_level: target.level,
            required_at_least,
        };
        let Some(target_min) = target_min else {
            report.deprecated.push(deprecated(None));
            return;
        };
        let still_served = list_instances(&old.package, target_min, &old.interface, &hints)
            .iter()
            .any(|s| s.instance == served.instance);
        if !still_served {
            report.deprecated.push(deprecated(Some(target_min)));
            return;
        }
    }
}

/// Check every mandatory instance of the fragments below `device_level`
/// against the fragment at `device_level`.
///
/// `list_instances(package, version, interface, hints)` reports what is
/// served for that interface at `version` or a later minor. `hints` holds
/// the exact instance name when the requirement has one.
pub fn check_deprecation<F>(
    device_level: Level,
    fragments: &[Named<CompatibilityMatrix>],
    list_instances: F,
) -> Result<DeprecationReport, DeprecationError>
where
    F: Fn(&str, Version, &str, &[String]) -> Vec<ServedInstance>,
{
    if !device_level.is_specified() {
        return Err(DeprecationError::UnspecifiedLevel);
    }
    let target = fragments
        .iter()
        .find(|f| f.object.level == device_level)
        .ok_or(DeprecationError::NoTargetMatrix(device_level))?;

    let mut report = DeprecationReport::default();
    for old in fragments.iter().filter(|f| f.object.level < device_level) {
        debug!("checking {} (level {}) for deprecated HALs", old.name, old.object.level);
        for hal in old.object.hals().iter().filter(|h| !h.optional) {
            for instance in hal.instances() {
                check_instance(&instance, &target.object, &list_instances, &mut report);
            }
        }
    }
    Ok(report)
}

/// An instance query answered from a manifest's declared instances.
pub fn manifest_instance_query(
    manifest: &HalManifest,
) -> impl Fn(&str, Version, &str, &[String]) -> Vec<ServedInstance> + '_ {
    move |package: &str, version: Version, interface: &str, _hints: &[String]| {
        manifest
            .hals()
            .get_all(package)
            .iter()
            .flat_map(|hal| {
                hal.versions
                    .iter()
                    .filter(move |v| v.major == version.major && v.minor >= version.minor)
                    .flat_map(move |&v| {
                        hal.instances_of(interface)
                            .map(move |instance| ServedInstance::new(instance, v))
                    })
            })
            .collect()
    }
}
