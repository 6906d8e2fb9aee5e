//! The device's vintf documents, loaded from a [`FileSystem`] and cached.

use crate::cache::CachedSlot;
use crate::combine::{combine, Named};
use crate::compat::{check_compatibility, CheckOptions, CompatibilityReport};
use crate::deprecation::{check_deprecation, manifest_instance_query, DeprecationReport, ServedInstance};
use crate::fs::{FileSystem, FsError};
use crate::properties::PropertyFetcher;
use crate::runtime::{check_kernel, KernelCheckReport, KernelInfo};
use crate::CoreError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vintf_schema::{CompatibilityMatrix, HalManifest, Level, SchemaType, Version, XmlSchema};

const VENDOR_MANIFEST: &str = "/vendor/etc/vintf/manifest.xml";
const VENDOR_MANIFEST_FRAGMENT_DIR: &str = "/vendor/etc/vintf/manifest/";
const VENDOR_LEGACY_MANIFEST: &str = "/vendor/manifest.xml";
const VENDOR_MATRIX: &str = "/vendor/etc/vintf/compatibility_matrix.xml";
const VENDOR_LEGACY_MATRIX: &str = "/vendor/compatibility_matrix.xml";

const ODM_VINTF_DIR: &str = "/odm/etc/vintf/";
const ODM_MANIFEST_FRAGMENT_DIR: &str = "/odm/etc/vintf/manifest/";
const ODM_LEGACY_DIR: &str = "/odm/etc/";

const SYSTEM_VINTF_DIR: &str = "/system/etc/vintf/";
const SYSTEM_MANIFEST: &str = "/system/etc/vintf/manifest.xml";
const SYSTEM_MANIFEST_FRAGMENT_DIR: &str = "/system/etc/vintf/manifest/";
const SYSTEM_LEGACY_MANIFEST: &str = "/system/manifest.xml";
const SYSTEM_LEGACY_MATRIX: &str = "/system/compatibility_matrix.xml";

pub const SKU_PROPERTY: &str = "ro.boot.product.hardware.sku";
pub const FIRST_API_LEVEL_PROPERTY: &str = "ro.product.first_api_level";

/// Both pairings of the device's documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityResult {
    /// Device manifest against the combined framework matrix.
    pub device: CompatibilityReport,
    /// Framework manifest against the device matrix.
    pub framework: CompatibilityReport,
}

impl CompatibilityResult {
    pub fn is_compatible(&self) -> bool {
        self.device.is_compatible() && self.framework.is_compatible()
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for CompatibilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "device manifest vs framework matrix: {}", self.device)?;
        write!(f, "framework manifest vs device matrix: {}", self.framework)
    }
}

pub struct VintfObject {
    fs: Box<dyn FileSystem>,
    properties: Box<dyn PropertyFetcher>,
    device_manifest: CachedSlot<HalManifest>,
    framework_manifest: CachedSlot<HalManifest>,
    device_matrix: CachedSlot<CompatibilityMatrix>,
    framework_matrix: CachedSlot<CompatibilityMatrix>,
}

impl VintfObject {
    pub fn new(fs: impl FileSystem + 'static, properties: impl PropertyFetcher + 'static) -> Self {
        Self {
            fs: Box::new(fs),
            properties: Box::new(properties),
            device_manifest: CachedSlot::new(),
            framework_manifest: CachedSlot::new(),
            device_matrix: CachedSlot::new(),
            framework_matrix: CachedSlot::new(),
        }
    }

    pub fn device_manifest(&self, skip_cache: bool) -> Result<Arc<HalManifest>, CoreError> {
        self.device_manifest
            .get_or_fetch("device manifest", skip_cache, || self.fetch_device_manifest())
    }

    pub fn framework_manifest(&self, skip_cache: bool) -> Result<Arc<HalManifest>, CoreError> {
        self.framework_manifest
            .get_or_fetch("framework manifest", skip_cache, || self.fetch_framework_manifest())
    }

    pub fn device_matrix(&self, skip_cache: bool) -> Result<Arc<CompatibilityMatrix>, CoreError> {
        self.device_matrix.get_or_fetch("device matrix", skip_cache, || {
            match self.fetch_one::<CompatibilityMatrix>(VENDOR_MATRIX)? {
                Some(matrix) => Ok(matrix),
                None => self.fetch_required(VENDOR_LEGACY_MATRIX),
            }
        })
    }

    /// The framework matrix fragments combined at the device level.
    pub fn framework_matrix(&self, skip_cache: bool) -> Result<Arc<CompatibilityMatrix>, CoreError> {
        self.framework_matrix
            .get_or_fetch("framework matrix", skip_cache, || self.fetch_framework_matrix())
    }

    /// The device's shipping FCM level: the device manifest's level, else
    /// inferred from the first shipping API level.
    pub fn device_level(&self) -> Level {
        let level = match self.device_manifest(false) {
            Ok(manifest) => manifest.level,
            Err(e) => {
                debug!("device manifest unavailable for the device level: {e}");
                Level::UNSPECIFIED
            }
        };
        if level.is_specified() {
            return level;
        }
        match self.properties.get_u64(FIRST_API_LEVEL_PROPERTY) {
            Some(api) if api != 0 => {
                let inferred = Level::from_api_level(api);
                info!("inferred device level {inferred} from first API level {api}");
                inferred
            }
            _ => Level::UNSPECIFIED,
        }
    }

    /// Every file directly under `/system/etc/vintf/` that decodes as a
    /// framework matrix. Other files are skipped with a warning.
    pub fn all_framework_matrix_levels(&self) -> Result<Vec<Named<CompatibilityMatrix>>, CoreError> {
        let names = match self.fs.list_files(SYSTEM_VINTF_DIR) {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut fragments = Vec::new();
        for name in names {
            let path = format!("{SYSTEM_VINTF_DIR}{name}");
            let text = match self.fs.fetch(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("framework matrix: ignoring {path}: {e}");
                    continue;
                }
            };
            match CompatibilityMatrix::from_xml(&text) {
                Ok(matrix) if matrix.schema_type() == SchemaType::Framework => {
                    fragments.push(Named::new(path, matrix));
                }
                Ok(_) => warn!("framework matrix: ignoring {path}: not a framework matrix"),
                Err(e) => warn!("framework matrix: ignoring {path}: {e}"),
            }
        }
        Ok(fragments)
    }

    /// Check the device manifest against the framework matrix and the
    /// framework manifest against the device matrix.
    pub fn check_compatibility(&self, options: CheckOptions) -> Result<CompatibilityResult, CoreError> {
        let device_manifest = self.device_manifest(false)?;
        let framework_matrix = self.framework_matrix(false)?;
        let framework_manifest = self.framework_manifest(false)?;
        let device_matrix = self.device_matrix(false)?;
        Ok(CompatibilityResult {
            device: check_compatibility(&device_manifest, &framework_matrix, options)?,
            framework: check_compatibility(&framework_manifest, &device_matrix, options)?,
        })
    }

    /// Check the running kernel against the framework matrix.
    pub fn check_kernel(&self, info: &KernelInfo) -> Result<KernelCheckReport, CoreError> {
        let matrix = self.framework_matrix(false)?;
        Ok(check_kernel(info, &matrix)?)
    }

    /// Deprecation check with a caller-supplied instance query.
    pub fn check_deprecation_with<F>(&self, list_instances: F) -> Result<DeprecationReport, CoreError>
    where
        F: Fn(&str, Version, &str, &[String]) -> Vec<ServedInstance>,
    {
        let fragments = self.all_framework_matrix_levels()?;
        Ok(check_deprecation(self.device_level(), &fragments, list_instances)?)
    }

    /// Deprecation check where served instances are those the device
    /// manifest declares.
    pub fn check_deprecation(&self) -> Result<DeprecationReport, CoreError> {
        let manifest = self.device_manifest(false)?;
        self.check_deprecation_with(manifest_instance_query(&manifest))
    }

    /// `Ok(None)` when `path` does not exist.
    fn fetch_one<D: XmlSchema>(&self, path: &str) -> Result<Option<D>, CoreError> {
        let text = match self.fs.fetch(path) {
            Ok(text) => text,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        D::from_xml(&text).map(Some).map_err(|source| CoreError::Decode {
            path: path.to_owned(),
            source,
        })
    }

    fn fetch_required<D: XmlSchema>(&self, path: &str) -> Result<D, CoreError> {
        self.fetch_one(path)?
            .ok_or_else(|| FsError::NotFound(path.to_owned()).into())
    }

    /// Add the HALs of every manifest fragment in `dir`. A missing directory
    /// adds nothing; a conflicting fragment is skipped with a warning.
    fn add_directory_manifests(&self, dir: &str, manifest: &mut HalManifest) -> Result<(), CoreError> {
        let names = match self.fs.list_files(dir) {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for name in names {
            let path = format!("{dir}{name}");
            let Some(fragment) = self.fetch_one::<HalManifest>(&path)? else {
                continue;
            };
            debug!("adding manifest fragment {path}");
            if let Err(e) = manifest.add_all_hals(fragment) {
                warn!("manifest fragment {path} conflicts: {e}");
            }
        }
        Ok(())
    }

    fn fetch_odm_manifest(&self) -> Result<Option<HalManifest>, CoreError> {
        let sku = self.properties.get_or(SKU_PROPERTY, "");
        let mut candidates = Vec::with_capacity(4);
        if !sku.is_empty() {
            candidates.push(format!("{ODM_VINTF_DIR}manifest_{sku}.xml"));
        }
        candidates.push(format!("{ODM_VINTF_DIR}manifest.xml"));
        if !sku.is_empty() {
            candidates.push(format!("{ODM_LEGACY_DIR}manifest_{sku}.xml"));
        }
        candidates.push(format!("{ODM_LEGACY_DIR}manifest.xml"));

        for path in candidates {
            if let Some(manifest) = self.fetch_one(&path)? {
                debug!("using ODM manifest {path}");
                return Ok(Some(manifest));
            }
        }
        Ok(None)
    }

    /// Vendor manifest and its fragments, overlaid by the ODM manifest and
    /// its fragments. Without a vendor manifest the ODM manifest stands
    /// alone; without either, the legacy vendor manifest is used.
    fn fetch_device_manifest(&self) -> Result<HalManifest, CoreError> {
        let vendor = self.fetch_one::<HalManifest>(VENDOR_MANIFEST)?;
        let vendor = match vendor {
            Some(mut manifest) => {
                self.add_directory_manifests(VENDOR_MANIFEST_FRAGMENT_DIR, &mut manifest)?;
                Some(manifest)
            }
            None => None,
        };
        let odm = self.fetch_odm_manifest()?;

        let mut manifest = match (vendor, odm) {
            (Some(mut vendor), Some(odm)) => {
                if let Err(e) = vendor.add_all_hals(odm) {
                    warn!("ODM manifest conflicts with the vendor manifest: {e}");
                }
                vendor
            }
            (Some(vendor), None) => vendor,
            (None, Some(odm)) => odm,
            (None, None) => {
                info!("no vendor or ODM manifest, trying {VENDOR_LEGACY_MANIFEST}");
                return self.fetch_required(VENDOR_LEGACY_MANIFEST);
            }
        };
        self.add_directory_manifests(ODM_MANIFEST_FRAGMENT_DIR, &mut manifest)?;
        Ok(manifest)
    }

    fn fetch_framework_manifest(&self) -> Result<HalManifest, CoreError> {
        match self.fetch_one::<HalManifest>(SYSTEM_MANIFEST)? {
            Some(mut manifest) => {
                self.add_directory_manifests(SYSTEM_MANIFEST_FRAGMENT_DIR, &mut manifest)?;
                Ok(manifest)
            }
            None => self.fetch_required(SYSTEM_LEGACY_MANIFEST),
        }
    }

    fn fetch_framework_matrix(&self) -> Result<CompatibilityMatrix, CoreError> {
        let fragments = self.all_framework_matrix_levels()?;
        if fragments.is_empty() {
            info!("no framework matrix fragments under {SYSTEM_VINTF_DIR}, trying {SYSTEM_LEGACY_MATRIX}");
            return self.fetch_required(SYSTEM_LEGACY_MATRIX);
        }
        let device_level = self.device_level();
        debug!(
            "combining {} framework matrix fragments at level {device_level}",
            fragments.len()
        );
        Ok(combine(device_level, fragments)?)
    }
}
