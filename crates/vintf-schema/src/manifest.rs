//! The provided side: what a device or framework implements.

use crate::error::SchemaError;
use crate::hal_group::{ContainsVersion, HalGroup};
use crate::instance::{InstancePattern, ManifestInstance};
use crate::manifest_hal::ManifestHal;
use crate::matrix::{CompatibilityMatrix, DeviceMatrix, FrameworkMatrix, MatrixVariant};
use crate::matrix_hal::MatrixHal;
use crate::sepolicy::Sepolicy;
use crate::types::{Level, SchemaType, Transport};
use crate::version::{Version, VersionRange};
use crate::vndk::{SystemSdk, VendorNdk};
use crate::xml_file::ManifestXmlFile;
use std::collections::BTreeSet;

/// Schema version written on every manifest.
pub const MANIFEST_META_VERSION: Version = Version::new(1, 0);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceManifest {
    pub sepolicy_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameworkManifest {
    pub vendor_ndks: Vec<VendorNdk>,
    pub system_sdk: SystemSdk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestVariant {
    Device(DeviceManifest),
    Framework(FrameworkManifest),
}

impl ManifestVariant {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            Self::Device(_) => SchemaType::Device,
            Self::Framework(_) => SchemaType::Framework,
        }
    }
}

fn should_add_hal(group: &HalGroup<ManifestHal>, hal: &ManifestHal) -> bool {
    if !hal.is_valid() {
        return false;
    }
    if hal.is_override {
        return true;
    }
    let existing = group.get_all(&hal.name);
    hal.versions
        .iter()
        .all(|v| existing.iter().all(|other| !other.has_major(v.major)))
}

fn should_add_xml_file(group: &HalGroup<ManifestXmlFile>, file: &ManifestXmlFile) -> bool {
    group
        .get_all(&file.name)
        .iter()
        .all(|other| other.version.major != file.version.major)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalManifest {
    hals: HalGroup<ManifestHal>,
    xml_files: HalGroup<ManifestXmlFile>,
    pub level: Level,
    pub meta_version: Version,
    variant: ManifestVariant,
}

impl HalManifest {
    pub fn new(variant: ManifestVariant) -> Self {
        Self {
            hals: HalGroup::with_policy(should_add_hal),
            xml_files: HalGroup::with_policy(should_add_xml_file),
            level: Level::UNSPECIFIED,
            meta_version: MANIFEST_META_VERSION,
            variant,
        }
    }

    pub fn device(sepolicy_version: Version) -> Self {
        Self::new(ManifestVariant::Device(DeviceManifest { sepolicy_version }))
    }

    pub fn framework() -> Self {
        Self::new(ManifestVariant::Framework(FrameworkManifest::default()))
    }

    /// An empty manifest of the given type.
    pub fn empty(schema_type: SchemaType) -> Self {
        match schema_type {
            SchemaType::Device => Self::device(Version::default()),
            SchemaType::Framework => Self::framework(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn schema_type(&self) -> SchemaType {
        self.variant.schema_type()
    }

    pub fn variant(&self) -> &ManifestVariant {
        &self.variant
    }

    fn wrong_type(&self, expected: SchemaType) -> SchemaError {
        SchemaError::WrongSchemaType {
            entity: "manifest",
            expected,
            actual: self.schema_type(),
        }
    }

    pub fn device_info(&self) -> Result<&DeviceManifest, SchemaError> {
        match &self.variant {
            ManifestVariant::Device(device) => Ok(device),
            ManifestVariant::Framework(_) => Err(self.wrong_type(SchemaType::Device)),
        }
    }

    pub fn device_info_mut(&mut self) -> Result<&mut DeviceManifest, SchemaError> {
        let actual = self.schema_type();
        match &mut self.variant {
            ManifestVariant::Device(device) => Ok(device),
            ManifestVariant::Framework(_) => Err(SchemaError::WrongSchemaType {
                entity: "manifest",
                expected: SchemaType::Device,
                actual,
            }),
        }
    }

    pub fn framework_info(&self) -> Result<&FrameworkManifest, SchemaError> {
        match &self.variant {
            ManifestVariant::Framework(framework) => Ok(framework),
            ManifestVariant::Device(_) => Err(self.wrong_type(SchemaType::Framework)),
        }
    }

    pub fn framework_info_mut(&mut self) -> Result<&mut FrameworkManifest, SchemaError> {
        let actual = self.schema_type();
        match &mut self.variant {
            ManifestVariant::Framework(framework) => Ok(framework),
            ManifestVariant::Device(_) => Err(SchemaError::WrongSchemaType {
                entity: "manifest",
                expected: SchemaType::Framework,
                actual,
            }),
        }
    }

    pub fn sepolicy_version(&self) -> Result<Version, SchemaError> {
        self.device_info().map(|d| d.sepolicy_version)
    }

    pub fn vendor_ndks(&self) -> Result<&[VendorNdk], SchemaError> {
        self.framework_info().map(|f| f.vendor_ndks.as_slice())
    }

    pub fn system_sdk(&self) -> Result<&SystemSdk, SchemaError> {
        self.framework_info().map(|f| &f.system_sdk)
    }

    pub fn hals(&self) -> &HalGroup<ManifestHal> {
        &self.hals
    }

    pub fn xml_files(&self) -> &HalGroup<ManifestXmlFile> {
        &self.xml_files
    }

    /// Add one HAL entry.
    ///
    /// An override entry first removes the versions it declares from existing
    /// entries of the same name, dropping entries left without versions; an
    /// override entry declaring no versions removes every entry of its name.
    /// Nothing changes when an error is returned.
    pub fn add_hal(&mut self, hal: ManifestHal) -> Result<(), SchemaError> {
        hal.validate().map_err(|reason| SchemaError::InvalidHal {
            name: hal.name.clone(),
            reason,
        })?;
        if hal.is_override {
            if hal.versions.is_empty() {
                self.hals.remove_all(&hal.name);
            }
            for major in hal.versions.iter().map(|v| v.major) {
                self.hals.retain(&hal.name, |existing| {
                    existing.remove_major(major);
                    !existing.versions.is_empty()
                });
            }
        }
        let name = hal.name.clone();
        if self.hals.add(hal) {
            Ok(())
        } else {
            Err(SchemaError::DuplicateMajor { name })
        }
    }

    /// Move every HAL and xmlfile of `other` into this manifest.
    ///
    /// Stops at the first conflict. Entries added before it stay applied.
    pub fn add_all_hals(&mut self, other: Self) -> Result<(), SchemaError> {
        for hal in other.hals.into_entries() {
            self.add_hal(hal)?;
        }
        for file in other.xml_files.into_entries() {
            self.add_xml_file(file)?;
        }
        Ok(())
    }

    pub fn add_xml_file(&mut self, file: ManifestXmlFile) -> Result<(), SchemaError> {
        let name = file.name.clone();
        if self.xml_files.add(file) {
            Ok(())
        } else {
            Err(SchemaError::DuplicateXmlFile { name })
        }
    }

    /// The entry of `name` serving `version`.
    pub fn hal(&self, name: &str, version: Version) -> Option<&ManifestHal> {
        self.hals.get_exact(name, version)
    }

    pub fn hal_names(&self) -> BTreeSet<String> {
        self.hals.names().map(str::to_owned).collect()
    }

    /// `name@major.minor` for every declared version.
    pub fn hal_names_and_versions(&self) -> BTreeSet<String> {
        self.hals
            .iter()
            .flat_map(|hal| hal.versions.iter().map(move |v| format!("{}@{v}", hal.name)))
            .collect()
    }

    pub fn supported_versions(&self, name: &str) -> BTreeSet<Version> {
        self.hals
            .get_all(name)
            .iter()
            .flat_map(|hal| hal.versions.iter().copied())
            .collect()
    }

    /// Instance names of `interface` served at `version` by `name`.
    pub fn instances(&self, name: &str, version: Version, interface: &str) -> BTreeSet<String> {
        self.hal(name, version)
            .map(|hal| hal.instances_of(interface).map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn has_instance(&self, name: &str, version: Version, interface: &str, instance: &str) -> bool {
        self.instances(name, version, interface).contains(instance)
    }

    /// Transport of the instance, or [`Transport::Empty`] when not declared.
    pub fn transport(&self, name: &str, version: Version, interface: &str, instance: &str) -> Transport {
        self.hals
            .get_all(name)
            .iter()
            .filter(|hal| hal.contains_version(version))
            .find(|hal| hal.instances_of(interface).any(|i| i == instance))
            .map_or(Transport::Empty, ManifestHal::transport)
    }

    pub fn manifest_instances(&self) -> Vec<ManifestInstance> {
        self.hals.iter().flat_map(ManifestHal::instances).collect()
    }

    /// The opposite-type matrix this manifest trivially satisfies: every HAL
    /// optional and pinned to its declared versions.
    pub fn generate_compatible_matrix(&self) -> CompatibilityMatrix {
        let variant = match &self.variant {
            ManifestVariant::Device(device) => MatrixVariant::Framework(FrameworkMatrix {
                sepolicy: Sepolicy::new(0, vec![VersionRange::from(device.sepolicy_version)]),
                ..FrameworkMatrix::default()
            }),
            ManifestVariant::Framework(_) => MatrixVariant::Device(DeviceMatrix::default()),
        };
        let mut matrix = CompatibilityMatrix::new(variant);
        for hal in self.hals.iter() {
            let mut required = MatrixHal::new(hal.format, &hal.name).set_optional(true);
            required.version_ranges = hal.versions.iter().copied().map(VersionRange::from).collect();
            for (interface, instances) in &hal.interfaces {
                for instance in instances {
                    required.insert_instance(interface, InstancePattern::exact(instance));
                }
            }
            matrix.add_hal(required);
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Arch, HalFormat, TransportArch};

    fn hal(name: &str, versions: &[(u64, u64)]) -> ManifestHal {
        let mut hal = ManifestHal::new(HalFormat::Hidl, name)
            .with_transport(TransportArch::new(Transport::Hwbinder, Arch::Empty));
        for &(major, minor) in versions {
            hal = hal.with_version(Version::new(major, minor));
        }
        hal
    }

    fn vendor_manifest() -> HalManifest {
        let mut m = HalManifest::device(Version::new(25, 0));
        m.add_hal(
            hal("android.hardware.foo", &[(1, 0), (2, 0)]).with_instance("IVendorEtc", "default"),
        )
        .unwrap();
        m.add_hal(hal("android.hardware.bar", &[(1, 0)]).with_instance("IBar", "default"))
            .unwrap();
        m
    }

    #[test]
    fn duplicate_major_is_rejected() {
        let mut m = vendor_manifest();
        let err = m.add_hal(hal("android.hardware.foo", &[(1, 1)])).unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateMajor {
                name: "android.hardware.foo".to_owned()
            }
        );
        assert!(m.add_hal(hal("android.hardware.foo", &[(3, 0)])).is_ok());
    }

    #[test]
    fn invalid_hal_is_rejected_with_reason() {
        let mut m = HalManifest::framework();
        let bad = ManifestHal::new(HalFormat::Hidl, "android.hidl.manager")
            .with_version(Version::new(1, 0))
            .with_version(Version::new(1, 1))
            .with_transport(TransportArch::new(Transport::Hwbinder, Arch::Empty));
        assert!(matches!(m.add_hal(bad), Err(SchemaError::InvalidHal { .. })));
        assert!(m.hals().is_empty());
    }

    #[test]
    fn override_replaces_version_by_version() {
        let mut m = vendor_manifest();
        let odm = hal("android.hardware.foo", &[(1, 1)])
            .with_instance("IOdm", "default")
            .overriding();
        m.add_hal(odm).unwrap();

        assert!(m.instances("android.hardware.foo", Version::new(1, 0), "IVendorEtc").is_empty());
        assert!(m.has_instance("android.hardware.foo", Version::new(1, 0), "IOdm", "default"));
        assert!(m.has_instance("android.hardware.foo", Version::new(2, 0), "IVendorEtc", "default"));
        assert_eq!(
            m.supported_versions("android.hardware.foo"),
            BTreeSet::from([Version::new(1, 1), Version::new(2, 0)])
        );
    }

    #[test]
    fn override_without_versions_removes_all_entries_of_that_name() {
        let mut m = vendor_manifest();
        m.add_hal(ManifestHal::new(HalFormat::Hidl, "android.hardware.foo").overriding())
            .unwrap();
        assert!(m.supported_versions("android.hardware.foo").is_empty());
        assert!(m.hal("android.hardware.foo", Version::new(2, 0)).is_none());
        assert!(m.hal("android.hardware.bar", Version::new(1, 0)).is_some());
    }

    #[test]
    fn add_all_stops_at_first_conflict() {
        let mut m = vendor_manifest();
        let mut other = HalManifest::device(Version::new(25, 0));
        other.add_hal(hal("android.hardware.aaa", &[(1, 0)])).unwrap();
        other.add_hal(hal("android.hardware.bar", &[(1, 2)])).unwrap();
        other.add_hal(hal("android.hardware.zzz", &[(1, 0)])).unwrap();

        let err = m.add_all_hals(other).unwrap_err();
        assert!(err.to_string().contains("android.hardware.bar"));
        assert!(m.hal_names().contains("android.hardware.aaa"));
        assert!(!m.hal_names().contains("android.hardware.zzz"));
    }

    #[test]
    fn variant_accessors_return_typed_errors() {
        let framework = HalManifest::framework();
        let err = framework.sepolicy_version().unwrap_err();
        assert_eq!(
            err,
            SchemaError::WrongSchemaType {
                entity: "manifest",
                expected: SchemaType::Device,
                actual: SchemaType::Framework,
            }
        );
        assert!(vendor_manifest().vendor_ndks().is_err());
        assert_eq!(vendor_manifest().sepolicy_version().unwrap(), Version::new(25, 0));
    }

    #[test]
    fn queries() {
        let m = vendor_manifest();
        assert_eq!(
            m.transport("android.hardware.bar", Version::new(1, 0), "IBar", "default"),
            Transport::Hwbinder
        );
        assert_eq!(
            m.transport("android.hardware.bar", Version::new(1, 0), "IBar", "other"),
            Transport::Empty
        );
        assert!(m.hal_names_and_versions().contains("android.hardware.foo@2.0"));
        assert_eq!(m.manifest_instances().len(), 3);
    }

    #[test]
    fn xml_files_reject_duplicate_major() {
        let mut m = HalManifest::framework();
        m.add_xml_file(ManifestXmlFile::new("media_profile", Version::new(1, 0)))
            .unwrap();
        assert!(m
            .add_xml_file(ManifestXmlFile::new("media_profile", Version::new(1, 1)))
            .is_err());
        assert!(m
            .add_xml_file(ManifestXmlFile::new("media_profile", Version::new(2, 0)))
            .is_ok());
    }

    #[test]
    fn generated_matrix_has_opposite_type_and_optional_hals() {
        let m = vendor_manifest();
        let matrix = m.generate_compatible_matrix();
        assert_eq!(matrix.schema_type(), SchemaType::Framework);
        assert!(matrix.hals().iter().all(|h| h.optional));
        assert_eq!(matrix.hals().get_all("android.hardware.foo")[0].version_ranges.len(), 2);
        assert!(matrix.sepolicy().unwrap().accepts(Version::new(25, 0)));
    }
}
