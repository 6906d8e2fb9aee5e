use crate::hal_group::{ContainsVersion, HasName};
use crate::types::XmlSchemaFormat;
use crate::version::{Version, VersionRange};

/// An auxiliary XML file a manifest ships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestXmlFile {
    pub name: String,
    pub version: Version,
    pub overridden_path: Option<String>,
}

impl ManifestXmlFile {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            overridden_path: None,
        }
    }
}

impl HasName for ManifestXmlFile {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ContainsVersion for ManifestXmlFile {
    fn contains_version(&self, version: Version) -> bool {
        self.version.major == version.major && self.version.minor >= version.minor
    }
}

/// An auxiliary XML file a matrix requires, validated against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixXmlFile {
    pub name: String,
    pub format: XmlSchemaFormat,
    pub optional: bool,
    pub version_range: VersionRange,
    pub overridden_path: Option<String>,
}

impl MatrixXmlFile {
    pub fn new(name: impl Into<String>, version_range: VersionRange) -> Self {
        Self {
            name: name.into(),
            format: XmlSchemaFormat::default(),
            optional: false,
            version_range,
            overridden_path: None,
        }
    }

    #[must_use]
    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

impl HasName for MatrixXmlFile {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ContainsVersion for MatrixXmlFile {
    fn contains_version(&self, version: Version) -> bool {
        self.version_range.contains(version)
    }
}
