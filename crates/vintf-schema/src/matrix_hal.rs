use crate::error::ParseError;
use crate::hal_group::{ContainsVersion, HasName};
use crate::instance::{InstancePattern, MatrixInstance};
use crate::types::HalFormat;
use crate::version::{Version, VersionRange};
use std::collections::{BTreeMap, BTreeSet};

/// One required HAL entry of a compatibility matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixHal {
    pub format: HalFormat,
    pub name: String,
    pub version_ranges: Vec<VersionRange>,
    pub optional: bool,
    pub interfaces: BTreeMap<String, BTreeSet<InstancePattern>>,
}

impl MatrixHal {
    pub fn new(format: HalFormat, name: impl Into<String>) -> Self {
        Self {
            format,
            name: name.into(),
            version_ranges: Vec::new(),
            optional: false,
            interfaces: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.version_ranges.push(range);
        self
    }

    #[must_use]
    pub fn with_instance(mut self, interface: &str, instance: &str) -> Self {
        self.insert_instance(interface, InstancePattern::exact(instance));
        self
    }

    pub fn with_regex_instance(mut self, interface: &str, pattern: &str) -> Result<Self, ParseError> {
        self.insert_instance(interface, InstancePattern::regex(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn insert_instance(&mut self, interface: &str, instance: InstancePattern) {
        self.interfaces
            .entry(interface.to_owned())
            .or_default()
            .insert(instance);
    }

    pub fn has_major(&self, major: u64) -> bool {
        self.version_ranges.iter().any(|r| r.major() == major)
    }

    pub fn range_for_major_mut(&mut self, major: u64) -> Option<&mut VersionRange> {
        self.version_ranges.iter_mut().find(|r| r.major() == major)
    }

    /// Whether every interface instance `other` declares is declared here too.
    pub fn contains_instances(&self, other: &Self) -> bool {
        other.interfaces.iter().all(|(interface, wanted)| {
            self.interfaces
                .get(interface)
                .is_some_and(|have| wanted.is_subset(have))
        })
    }

    /// `(interface, instance)` pairs, in interface order.
    pub fn interface_instances(&self) -> impl Iterator<Item = (&str, &InstancePattern)> {
        self.interfaces.iter().flat_map(|(interface, instances)| {
            instances
                .iter()
                .map(move |instance| (interface.as_str(), instance))
        })
    }

    /// Every range crossed with every interface instance.
    pub fn instances(&self) -> Vec<MatrixInstance> {
        let mut out = Vec::new();
        for range in &self.version_ranges {
            for (interface, instance) in self.interface_instances() {
                out.push(MatrixInstance {
                    format: self.format,
                    package: self.name.clone(),
                    range: *range,
                    interface: interface.to_owned(),
                    instance: instance.clone(),
                    optional: self.optional,
                });
            }
        }
        out
    }
}

impl HasName for MatrixHal {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ContainsVersion for MatrixHal {
    fn contains_version(&self, version: Version) -> bool {
        self.version_ranges.iter().any(|r| r.contains(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> MatrixHal {
        MatrixHal::new(HalFormat::Hidl, "android.hardware.camera")
            .with_range("2.0-5".parse().unwrap())
            .with_instance("ICameraProvider", "legacy/0")
    }

    #[test]
    fn contains_instances_is_a_subset_check() {
        let big = camera().with_instance("ICameraProvider", "external/0");
        assert!(big.contains_instances(&camera()));
        assert!(!camera().contains_instances(&big));

        let other_iface = MatrixHal::new(HalFormat::Hidl, "android.hardware.camera")
            .with_instance("IOther", "legacy/0");
        assert!(!big.contains_instances(&other_iface));
    }

    #[test]
    fn regex_instances_take_part_in_subset_check() {
        let with_regex = camera()
            .with_regex_instance("ICameraProvider", "external/[0-9]+")
            .unwrap();
        let donor = MatrixHal::new(HalFormat::Hidl, "android.hardware.camera")
            .with_regex_instance("ICameraProvider", "external/[0-9]+")
            .unwrap();
        assert!(with_regex.contains_instances(&donor));
        assert!(!camera().contains_instances(&donor));
    }

    #[test]
    fn contains_version_uses_range_bounds() {
        let hal = camera();
        assert!(hal.contains_version(Version::new(2, 5)));
        assert!(!hal.contains_version(Version::new(2, 6)));
    }

    #[test]
    fn instances_cross_ranges_and_interfaces() {
        let hal = camera().with_range("3.2".parse().unwrap()).set_optional(true);
        let instances = hal.instances();
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.optional));
        assert_eq!(
            instances[1].to_string(),
            "android.hardware.camera@3.2::ICameraProvider/legacy/0"
        );
    }

    #[test]
    fn raise_range_by_major() {
        let mut hal = camera();
        hal.range_for_major_mut(2).unwrap().raise_max_minor(7);
        assert_eq!(hal.version_ranges[0].to_string(), "2.0-7");
        assert!(hal.range_for_major_mut(3).is_none());
        assert!(hal.has_major(2));
    }
}
