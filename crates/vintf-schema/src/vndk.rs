use std::collections::BTreeSet;

/// A vendor NDK snapshot: a version string and the libraries it contains.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct VendorNdk {
    pub version: String,
    pub libraries: BTreeSet<String>,
}

impl VendorNdk {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            libraries: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_library(mut self, library: &str) -> Self {
        self.libraries.insert(library.to_owned());
        self
    }
}

/// A set of system SDK versions, provided or required.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemSdk {
    pub versions: BTreeSet<String>,
}

impl SystemSdk {
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Versions in `self` that `provided` lacks.
    pub fn missing_from(&self, provided: &Self) -> Vec<String> {
        self.versions.difference(&provided.versions).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_from_lists_required_but_absent() {
        let required = SystemSdk::new(["27", "28"]);
        let provided = SystemSdk::new(["26", "27"]);
        assert_eq!(required.missing_from(&provided), vec!["28".to_owned()]);
        assert!(SystemSdk::default().missing_from(&provided).is_empty());
    }

    #[test]
    fn vendor_ndk_builder() {
        let ndk = VendorNdk::new("27").with_library("libbase.so").with_library("libjpeg.so");
        assert_eq!(ndk.libraries.len(), 2);
    }
}
