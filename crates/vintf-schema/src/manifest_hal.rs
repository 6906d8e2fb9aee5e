use crate::hal_group::{ContainsVersion, HasName};
use crate::instance::{FqInstance, ManifestInstance};
use crate::types::{HalFormat, Transport, TransportArch};
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet};

/// One provided HAL entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHal {
    pub format: HalFormat,
    pub name: String,
    pub versions: Vec<Version>,
    pub transport_arch: TransportArch,
    /// Interface name to instance names.
    pub interfaces: BTreeMap<String, BTreeSet<String>>,
    pub is_override: bool,
}

impl ManifestHal {
    pub fn new(format: HalFormat, name: impl Into<String>) -> Self {
        Self {
            format,
            name: name.into(),
            versions: Vec::new(),
            transport_arch: TransportArch::default(),
            interfaces: BTreeMap::new(),
            is_override: false,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.versions.push(version);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport_arch: TransportArch) -> Self {
        self.transport_arch = transport_arch;
        self
    }

    #[must_use]
    pub fn with_instance(mut self, interface: &str, instance: &str) -> Self {
        self.insert_instance(interface, instance);
        self
    }

    #[must_use]
    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn insert_instance(&mut self, interface: &str, instance: &str) {
        self.interfaces
            .entry(interface.to_owned())
            .or_default()
            .insert(instance.to_owned());
    }

    pub fn transport(&self) -> Transport {
        self.transport_arch.transport
    }

    /// An override entry without versions blanks out every entry of its name.
    pub fn is_disabled(&self) -> bool {
        self.is_override && self.versions.is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut majors = BTreeSet::new();
        for v in &self.versions {
            if !majors.insert(v.major) {
                return Err(format!("duplicated major version {}", v.major));
            }
        }
        if !self.transport_arch.is_valid() {
            return Err(format!("invalid transport {}", self.transport_arch));
        }
        if self.format == HalFormat::Hidl
            && self.transport() == Transport::Empty
            && !self.versions.is_empty()
        {
            return Err("hidl HAL must declare a transport".to_owned());
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn has_major(&self, major: u64) -> bool {
        self.versions.iter().any(|v| v.major == major)
    }

    /// Drop declared versions with this major.
    pub fn remove_major(&mut self, major: u64) {
        self.versions.retain(|v| v.major != major);
    }

    pub fn instances_of(&self, interface: &str) -> impl Iterator<Item = &str> {
        self.interfaces
            .get(interface)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every declared version crossed with every interface instance.
    pub fn instances(&self) -> Vec<ManifestInstance> {
        let mut out = Vec::new();
        for version in &self.versions {
            for (interface, instances) in &self.interfaces {
                for instance in instances {
                    out.push(ManifestInstance {
                        fq: FqInstance::new(&self.name, *version, interface, instance),
                        format: self.format,
                        transport_arch: self.transport_arch,
                    });
                }
            }
        }
        out
    }
}

impl HasName for ManifestHal {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ContainsVersion for ManifestHal {
    /// A provided `1.3` also serves requests for `1.0` through `1.2`.
    fn contains_version(&self, version: Version) -> bool {
        self.versions
            .iter()
            .any(|v| v.major == version.major && v.minor >= version.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Arch;

    fn hwbinder() -> TransportArch {
        TransportArch::new(Transport::Hwbinder, Arch::Empty)
    }

    #[test]
    fn duplicate_major_is_invalid() {
        let hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.nfc")
            .with_transport(hwbinder())
            .with_version(Version::new(1, 0))
            .with_version(Version::new(1, 1));
        let reason = hal.validate().unwrap_err();
        assert!(reason.contains("major version 1"));
    }

    #[test]
    fn distinct_majors_are_valid() {
        let hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.nfc")
            .with_transport(hwbinder())
            .with_version(Version::new(1, 0))
            .with_version(Version::new(2, 0));
        assert!(hal.is_valid());
    }

    #[test]
    fn passthrough_without_arch_is_invalid() {
        let hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.light")
            .with_transport(TransportArch::new(Transport::Passthrough, Arch::Empty))
            .with_version(Version::new(2, 0));
        assert!(!hal.is_valid());
    }

    #[test]
    fn hidl_needs_transport_unless_disabled() {
        let hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.nfc")
            .with_version(Version::new(1, 0));
        assert!(!hal.is_valid());

        let marker = ManifestHal::new(HalFormat::Hidl, "android.hardware.nfc").overriding();
        assert!(marker.is_valid());
        assert!(marker.is_disabled());

        let native = ManifestHal::new(HalFormat::Native, "netutils-wrapper")
            .with_version(Version::new(1, 0));
        assert!(native.is_valid());
    }

    #[test]
    fn contains_version_is_minor_compatible() {
        let hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.camera")
            .with_transport(hwbinder())
            .with_version(Version::new(2, 3));
        assert!(hal.contains_version(Version::new(2, 0)));
        assert!(hal.contains_version(Version::new(2, 3)));
        assert!(!hal.contains_version(Version::new(2, 4)));
        assert!(!hal.contains_version(Version::new(3, 0)));
    }

    #[test]
    fn instances_are_the_cross_product() {
        let hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.foo")
            .with_transport(hwbinder())
            .with_version(Version::new(1, 0))
            .with_version(Version::new(2, 0))
            .with_instance("IFoo", "default")
            .with_instance("IFoo", "slot1")
            .with_instance("IBar", "default");
        let names: Vec<String> = hal.instances().iter().map(|i| i.fq.to_string()).collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"android.hardware.foo@2.0::IFoo/slot1".to_owned()));
        assert_eq!(hal.instances_of("IFoo").collect::<Vec<_>>(), vec!["default", "slot1"]);
        assert_eq!(hal.instances_of("IBaz").count(), 0);
    }

    #[test]
    fn remove_major_keeps_other_versions() {
        let mut hal = ManifestHal::new(HalFormat::Hidl, "android.hardware.foo")
            .with_transport(hwbinder())
            .with_version(Version::new(1, 0))
            .with_version(Version::new(2, 0));
        hal.remove_major(1);
        assert_eq!(hal.versions, vec![Version::new(2, 0)]);
        assert!(!hal.has_major(1));
    }
}
