//! The required side: what a framework or device mandates or optionally accepts.

use crate::error::SchemaError;
use crate::hal_group::HalGroup;
use crate::instance::MatrixInstance;
use crate::kernel::MatrixKernel;
use crate::matrix_hal::MatrixHal;
use crate::sepolicy::Sepolicy;
use crate::types::{Level, SchemaType};
use crate::version::{KernelVersion, Version};
use crate::vndk::{SystemSdk, VendorNdk};
use crate::xml_file::MatrixXmlFile;
use std::collections::BTreeSet;

/// Schema version written on every matrix.
pub const MATRIX_META_VERSION: Version = Version::new(1, 0);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameworkMatrix {
    pub kernels: Vec<MatrixKernel>,
    pub sepolicy: Sepolicy,
    pub avb_meta_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceMatrix {
    pub vendor_ndk: Option<VendorNdk>,
    pub system_sdk: SystemSdk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixVariant {
    Framework(FrameworkMatrix),
    Device(DeviceMatrix),
}

impl MatrixVariant {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            Self::Framework(_) => SchemaType::Framework,
            Self::Device(_) => SchemaType::Device,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityMatrix {
    hals: HalGroup<MatrixHal>,
    xml_files: HalGroup<MatrixXmlFile>,
    pub level: Level,
    variant: MatrixVariant,
}

impl CompatibilityMatrix {
    pub fn new(variant: MatrixVariant) -> Self {
        Self {
            hals: HalGroup::new(),
            xml_files: HalGroup::new(),
            level: Level::UNSPECIFIED,
            variant,
        }
    }

    pub fn framework() -> Self {
        Self::new(MatrixVariant::Framework(FrameworkMatrix::default()))
    }

    pub fn device() -> Self {
        Self::new(MatrixVariant::Device(DeviceMatrix::default()))
    }

    pub fn empty(schema_type: SchemaType) -> Self {
        match schema_type {
            SchemaType::Framework => Self::framework(),
            SchemaType::Device => Self::device(),
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

    pub fn variant(&self) -> &MatrixVariant {
        &self.variant
    }

    fn wrong_type(&self, expected: SchemaType) -> SchemaError {
        SchemaError::WrongSchemaType {
            entity: "compatibility matrix",
            expected,
            actual: self.schema_type(),
        }
    }

    pub fn framework_info(&self) -> Result<&FrameworkMatrix, SchemaError> {
        match &self.variant {
            MatrixVariant::Framework(framework) => Ok(framework),
            MatrixVariant::Device(_) => Err(self.wrong_type(SchemaType::Framework)),
        }
    }

    pub fn framework_info_mut(&mut self) -> Result<&mut FrameworkMatrix, SchemaError> {
        let err = self.wrong_type(SchemaType::Framework);
        match &mut self.variant {
            MatrixVariant::Framework(framework) => Ok(framework),
            MatrixVariant::Device(_) => Err(err),
        }
    }

    pub fn device_info(&self) -> Result<&DeviceMatrix, SchemaError> {
        match &self.variant {
            MatrixVariant::Device(device) => Ok(device),
            MatrixVariant::Framework(_) => Err(self.wrong_type(SchemaType::Device)),
        }
    }

    pub fn device_info_mut(&mut self) -> Result<&mut DeviceMatrix, SchemaError> {
        let err = self.wrong_type(SchemaType::Device);
        match &mut self.variant {
            MatrixVariant::Device(device) => Ok(device),
            MatrixVariant::Framework(_) => Err(err),
        }
    }

    pub fn kernels(&self) -> Result<&[MatrixKernel], SchemaError> {
        self.framework_info().map(|f| f.kernels.as_slice())
    }

    pub fn sepolicy(&self) -> Result<&Sepolicy, SchemaError> {
        self.framework_info().map(|f| &f.sepolicy)
    }

    pub fn avb_meta_version(&self) -> Result<Version, SchemaError> {
        self.framework_info().map(|f| f.avb_meta_version)
    }

    pub fn vendor_ndk(&self) -> Result<Option<&VendorNdk>, SchemaError> {
        self.device_info().map(|d| d.vendor_ndk.as_ref())
    }

    pub fn system_sdk(&self) -> Result<&SystemSdk, SchemaError> {
        self.device_info().map(|d| &d.system_sdk)
    }

    pub fn hals(&self) -> &HalGroup<MatrixHal> {
        &self.hals
    }

    pub fn xml_files(&self) -> &HalGroup<MatrixXmlFile> {
        &self.xml_files
    }

    pub fn hal_names(&self) -> BTreeSet<String> {
        self.hals.names().map(str::to_owned).collect()
    }

    /// Matrices accept any entry; several entries may share a name.
    pub fn add_hal(&mut self, hal: MatrixHal) -> bool {
        self.hals.add(hal)
    }

    pub fn add_xml_file(&mut self, file: MatrixXmlFile) -> bool {
        self.xml_files.add(file)
    }

    /// Append a kernel requirement. Framework matrices only.
    ///
    /// A duplicate is an entry with both the same minimum LTS version and
    /// identical conditions. Conditional blocks share the version of the
    /// unconditional entry they extend, so a matching version alone is not
    /// a conflict.
    pub fn add_kernel(&mut self, kernel: MatrixKernel) -> Result<(), SchemaError> {
        let framework = self.framework_info_mut()?;
        let duplicate = framework
            .kernels
            .iter()
            .any(|k| k.min_lts == kernel.min_lts && k.conditions == kernel.conditions);
        if duplicate {
            return Err(SchemaError::DuplicateKernel {
                version: kernel.min_lts.to_string(),
            });
        }
        framework.kernels.push(kernel);
        Ok(())
    }

    /// Remove and return every kernel requirement. Empty for device matrices.
    pub fn take_kernels(&mut self) -> Vec<MatrixKernel> {
        match &mut self.variant {
            MatrixVariant::Framework(framework) => std::mem::take(&mut framework.kernels),
            MatrixVariant::Device(_) => Vec::new(),
        }
    }

    /// The first kernel entry of the running kernel's series, if the running
    /// minor revision reaches its minimum.
    pub fn find_kernel(&self, running: KernelVersion) -> Option<&MatrixKernel> {
        let kernel = self
            .kernels()
            .ok()?
            .iter()
            .find(|k| k.min_lts.same_series(&running))?;
        (kernel.min_lts.minor_rev <= running.minor_rev).then_some(kernel)
    }

    /// Every kernel entry of the running kernel's series it satisfies, conditional or not.
    pub fn kernels_for(&self, running: KernelVersion) -> Vec<&MatrixKernel> {
        self.kernels()
            .unwrap_or_default()
            .iter()
            .filter(|k| k.min_lts.same_series(&running) && k.min_lts.minor_rev <= running.minor_rev)
            .collect()
    }

    pub fn instances(&self) -> Vec<MatrixInstance> {
        self.hals.iter().flat_map(MatrixHal::instances).collect()
    }

    /// Merge `other`'s HALs and xmlfiles as they are.
    ///
    /// An entry whose name and major version already occur here is a
    /// conflict. Stops at the first conflict; earlier entries stay applied.
    pub fn add_all_hals(&mut self, other: Self) -> Result<(), SchemaError> {
        for hal in other.hals.into_entries() {
            let conflict = self
                .hals
                .get_all(&hal.name)
                .iter()
                .any(|existing| hal.version_ranges.iter().any(|r| existing.has_major(r.major())));
            if conflict {
                return Err(SchemaError::DuplicateMajor { name: hal.name });
            }
            self.hals.add(hal);
        }
        for file in other.xml_files.into_entries() {
            let major = file.version_range.major();
            let conflict = self
                .xml_files
                .get_all(&file.name)
                .iter()
                .any(|existing| existing.version_range.major() == major);
            if conflict {
                return Err(SchemaError::DuplicateXmlFile { name: file.name });
            }
            self.xml_files.add(file);
        }
        Ok(())
    }

    /// Absorb a newer-level matrix's HALs and xmlfiles as optional.
    ///
    /// For each version range of a donor entry: with no entry of that name and
    /// major here, a copy restricted to that range is added as optional;
    /// otherwise the existing range's ceiling is raised to the donor's. A
    /// required HAL must already declare every donor instance. Stops at the
    /// first violation; earlier ranges stay absorbed.
    pub fn add_all_hals_as_optional(&mut self, other: Self) -> Result<(), SchemaError> {
        let donor_level = other.level;
        for hal in other.hals.into_entries() {
            for range in &hal.version_ranges {
                let existing = self
                    .hals
                    .get_all_mut(&hal.name)
                    .find(|h| h.has_major(range.major()));
                match existing {
                    None => {
                        let mut absorbed = hal.clone();
                        absorbed.version_ranges = vec![*range];
                        absorbed.optional = true;
                        self.hals.add(absorbed);
                    }
                    Some(existing) => {
                        if !existing.optional && !existing.contains_instances(&hal) {
                            return Err(SchemaError::RequiredInstanceMismatch {
                                name: hal.name.clone(),
                                version: range.min_ver(),
                                level: self.level,
                                donor_level,
                            });
                        }
                        if let Some(own) = existing.range_for_major_mut(range.major()) {
                            own.raise_max_minor(range.max_minor());
                        }
                    }
                }
            }
        }
        for file in other.xml_files.into_entries() {
            let range = file.version_range;
            let existing = self
                .xml_files
                .get_all_mut(&file.name)
                .find(|f| f.version_range.major() == range.major());
            match existing {
                None => {
                    self.xml_files.add(file.set_optional(true));
                }
                Some(existing) => existing.version_range.raise_max_minor(range.max_minor()),
            }
        }
        Ok(())
    }
}
