use crate::version::{Version, VersionRange};

/// Framework-side security policy requirements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sepolicy {
    pub kernel_sepolicy_version: u64,
    pub sepolicy_version_ranges: Vec<VersionRange>,
}

impl Sepolicy {
    pub fn new(kernel_sepolicy_version: u64, sepolicy_version_ranges: Vec<VersionRange>) -> Self {
        Self {
            kernel_sepolicy_version,
            sepolicy_version_ranges,
        }
    }

    /// Whether a device's sepolicy version satisfies at least one accepted range.
    pub fn accepts(&self, device_version: Version) -> bool {
        self.sepolicy_version_ranges
            .iter()
            .any(|range| range.supported_by(device_version))
    }
}
