//! Conversion between the model and its XML documents.
//!
//! Decoding is strict: malformed tokens, missing required children and
//! schema violations (such as a duplicated HAL major version) fail the whole
//! document. Unknown elements are skipped.

use crate::error::{ParseError, SchemaError};
use crate::flags::SerializeFlags;
use crate::instance::{FqInstance, InstancePattern};
use crate::kernel::{KernelConfig, KernelConfigType, KernelConfigTypedValue, MatrixKernel};
use crate::manifest::{HalManifest, ManifestVariant};
use crate::manifest_hal::ManifestHal;
use crate::matrix::{CompatibilityMatrix, MatrixVariant, MATRIX_META_VERSION};
use crate::matrix_hal::MatrixHal;
use crate::sepolicy::Sepolicy;
use crate::types::{Arch, HalFormat, Level, SchemaType, Transport, TransportArch, XmlSchemaFormat};
use crate::version::{KernelVersion, Version, VersionRange};
use crate::vndk::{SystemSdk, VendorNdk};
use crate::xml::{parse_document, write_document, Element, XmlError};
use crate::xml_file::{ManifestXmlFile, MatrixXmlFile};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("expected root element <{expected}>, found <{found}>")]
    WrongRoot { expected: &'static str, found: String },
    #[error("<{element}> is missing required child <{child}>")]
    MissingChild {
        element: &'static str,
        child: &'static str,
    },
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("unsupported <{element}> schema version {version}")]
    UnsupportedVersion {
        element: &'static str,
        version: Version,
    },
    #[error("invalid boolean '{0}'")]
    InvalidBool(String),
    #[error("HAL '{name}': {reason}")]
    Hal { name: String, reason: String },
}

/// A document type with an XML form.
pub trait XmlSchema: Sized {
    const ROOT: &'static str;

    fn from_element(root: &Element) -> Result<Self, CodecError>;

    fn to_element(&self, flags: SerializeFlags) -> Element;

    fn from_xml(text: &str) -> Result<Self, CodecError> {
        let root = parse_document(text)?;
        if root.name != Self::ROOT {
            return Err(CodecError::WrongRoot {
                expected: Self::ROOT,
                found: root.name,
            });
        }
        Self::from_element(&root)
    }

    fn to_xml(&self, flags: SerializeFlags) -> Result<String, CodecError> {
        Ok(write_document(&self.to_element(flags))?)
    }
}

fn parse_bool(s: &str) -> Result<bool, CodecError> {
    match s {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CodecError::InvalidBool(s.to_owned())),
    }
}

fn attr_or<T>(el: &Element, key: &str, default: T) -> Result<T, CodecError>
where
    T: FromStr<Err = ParseError>,
{
    el.attr(key)
        .map_or(Ok(default), |v| v.parse().map_err(CodecError::from))
}

fn bool_attr(el: &Element, key: &str) -> Result<bool, CodecError> {
    el.attr(key).map_or(Ok(false), parse_bool)
}

fn child_text<'a>(el: &'a Element, element: &'static str, child: &'static str) -> Result<&'a str, CodecError> {
    el.child_text(child)
        .ok_or(CodecError::MissingChild { element, child })
}

fn parse_children<T>(el: &Element, child: &str) -> Result<Vec<T>, CodecError>
where
    T: FromStr<Err = ParseError>,
{
    el.children_named(child)
        .map(|c| c.text.parse().map_err(CodecError::from))
        .collect()
}

fn texts(el: &Element, child: &str) -> Vec<String> {
    el.children_named(child).map(|c| c.text.clone()).collect()
}

fn check_meta_version(root: &Element, element: &'static str) -> Result<Version, CodecError> {
    let version: Version = root
        .attr("version")
        .ok_or(CodecError::MissingAttribute {
            element,
            attribute: "version",
        })?
        .parse()?;
    if version.major != 1 {
        return Err(CodecError::UnsupportedVersion { element, version });
    }
    Ok(version)
}

fn root_element(name: &str, meta_version: Version, schema_type: SchemaType, level: Level) -> Element {
    let root = Element::new(name)
        .with_attr("version", meta_version.to_string())
        .with_attr("type", schema_type.as_str());
    if level.is_specified() {
        root.with_attr("level", level.to_string())
    } else {
        root
    }
}

fn text_children(parent: &mut Element, name: &str, values: impl IntoIterator<Item = impl Into<String>>) {
    for value in values {
        parent.push(Element::text_node(name, value));
    }
}

fn decode_vendor_ndk(el: &Element) -> Result<VendorNdk, CodecError> {
    Ok(VendorNdk {
        version: child_text(el, "vendor-ndk", "version")?.to_owned(),
        libraries: texts(el, "library").into_iter().collect(),
    })
}

fn encode_vendor_ndk(ndk: &VendorNdk) -> Element {
    let mut el = Element::new("vendor-ndk");
    el.push(Element::text_node("version", &ndk.version));
    text_children(&mut el, "library", &ndk.libraries);
    el
}

fn decode_system_sdk(root: &Element) -> SystemSdk {
    root.child("system-sdk")
        .map(|el| SystemSdk::new(texts(el, "version")))
        .unwrap_or_default()
}

fn encode_system_sdk(sdk: &SystemSdk) -> Element {
    let mut el = Element::new("system-sdk");
    text_children(&mut el, "version", &sdk.versions);
    el
}

fn decode_manifest_hal(el: &Element) -> Result<ManifestHal, CodecError> {
    let name = child_text(el, "hal", "name")?;
    let mut hal = ManifestHal::new(attr_or(el, "format", HalFormat::Hidl)?, name);
    hal.is_override = bool_attr(el, "override")?;
    if let Some(transport) = el.child("transport") {
        hal.transport_arch = TransportArch::new(
            transport.text.parse()?,
            attr_or(transport, "arch", Arch::Empty)?,
        );
    }
    hal.versions = parse_children(el, "version")?;
    for interface in el.children_named("interface") {
        let interface_name = child_text(interface, "interface", "name")?;
        hal.interfaces.entry(interface_name.to_owned()).or_default();
        for instance in texts(interface, "instance") {
            hal.insert_instance(interface_name, &instance);
        }
    }
    for fqname in el.children_named("fqname") {
        let fq = FqInstance::parse_in_package(name, &fqname.text)?;
        if !hal.versions.contains(&fq.version) {
            return Err(CodecError::Hal {
                name: name.to_owned(),
                reason: format!("<fqname> {} uses an undeclared version", fqname.text),
            });
        }
        hal.insert_instance(&fq.interface, &fq.instance);
    }
    Ok(hal)
}

fn encode_manifest_hal(hal: &ManifestHal, flags: SerializeFlags) -> Element {
    let mut el = Element::new("hal").with_attr("format", hal.format.as_str());
    if hal.is_override {
        el = el.with_attr("override", "true");
    }
    el.push(Element::text_node("name", &hal.name));
    if hal.transport() != Transport::Empty {
        let mut transport = Element::text_node("transport", hal.transport().as_str());
        if hal.transport_arch.arch != Arch::Empty {
            transport = transport.with_attr("arch", hal.transport_arch.arch.as_str());
        }
        el.push(transport);
    }
    text_children(&mut el, "version", hal.versions.iter().map(ToString::to_string));

    let use_fqname = flags.fq_name && !hal.versions.is_empty();
    for (interface, instances) in &hal.interfaces {
        if use_fqname && !instances.is_empty() {
            continue;
        }
        let mut iface = Element::new("interface");
        iface.push(Element::text_node("name", interface));
        text_children(&mut iface, "instance", instances);
        el.push(iface);
    }
    if use_fqname {
        let fqnames: BTreeSet<String> = hal
            .instances()
            .iter()
            .map(|instance| instance.fq.simple_form())
            .collect();
        text_children(&mut el, "fqname", fqnames);
    }
    el
}

fn decode_manifest_xml_file(el: &Element) -> Result<ManifestXmlFile, CodecError> {
    let mut file = ManifestXmlFile::new(
        child_text(el, "xmlfile", "name")?,
        child_text(el, "xmlfile", "version")?.parse()?,
    );
    file.overridden_path = el.child_text("path").map(str::to_owned);
    Ok(file)
}

fn encode_manifest_xml_file(file: &ManifestXmlFile) -> Element {
    let mut el = Element::new("xmlfile");
    el.push(Element::text_node("name", &file.name));
    el.push(Element::text_node("version", file.version.to_string()));
    if let Some(path) = &file.overridden_path {
        el.push(Element::text_node("path", path));
    }
    el
}

impl XmlSchema for HalManifest {
    const ROOT: &'static str = "manifest";

    fn from_element(root: &Element) -> Result<Self, CodecError> {
        let meta_version = check_meta_version(root, Self::ROOT)?;
        let schema_type = attr_or(root, "type", SchemaType::Device)?;
        let mut manifest = Self::empty(schema_type).with_level(attr_or(root, "level", Level::UNSPECIFIED)?);
        manifest.meta_version = meta_version;

        match schema_type {
            SchemaType::Device => {
                if let Some(sepolicy) = root.child("sepolicy") {
                    manifest.device_info_mut()?.sepolicy_version =
                        child_text(sepolicy, "sepolicy", "version")?.parse()?;
                }
            }
            SchemaType::Framework => {
                let framework = manifest.framework_info_mut()?;
                framework.vendor_ndks = root
                    .children_named("vendor-ndk")
                    .map(decode_vendor_ndk)
                    .collect::<Result<_, _>>()?;
                framework.system_sdk = decode_system_sdk(root);
            }
        }

        for el in root.children_named("hal") {
            manifest.add_hal(decode_manifest_hal(el)?)?;
        }
        for el in root.children_named("xmlfile") {
            manifest.add_xml_file(decode_manifest_xml_file(el)?)?;
        }
        Ok(manifest)
    }

    fn to_element(&self, flags: SerializeFlags) -> Element {
        let mut root = root_element(Self::ROOT, self.meta_version, self.schema_type(), self.level);
        if flags.hals {
            for hal in self.hals().iter() {
                root.push(encode_manifest_hal(hal, flags));
            }
        }
        match self.variant() {
            ManifestVariant::Device(device) => {
                if flags.sepolicy {
                    let mut sepolicy = Element::new("sepolicy");
                    sepolicy.push(Element::text_node("version", device.sepolicy_version.to_string()));
                    root.push(sepolicy);
                }
            }
            ManifestVariant::Framework(framework) => {
                if flags.library_sets {
                    for ndk in &framework.vendor_ndks {
                        root.push(encode_vendor_ndk(ndk));
                    }
                }
                if flags.sdk && !framework.system_sdk.is_empty() {
                    root.push(encode_system_sdk(&framework.system_sdk));
                }
            }
        }
        if flags.xml_files {
            for file in self.xml_files().iter() {
                root.push(encode_manifest_xml_file(file));
            }
        }
        root
    }
}

fn decode_matrix_hal(el: &Element) -> Result<MatrixHal, CodecError> {
    let mut hal = MatrixHal::new(
        attr_or(el, "format", HalFormat::Hidl)?,
        child_text(el, "hal", "name")?,
    );
    hal.optional = bool_attr(el, "optional")?;
    hal.version_ranges = parse_children(el, "version")?;
    for interface in el.children_named("interface") {
        let interface_name = child_text(interface, "interface", "name")?;
        hal.interfaces.entry(interface_name.to_owned()).or_default();
        for instance in interface.children_named("instance") {
            hal.insert_instance(interface_name, InstancePattern::exact(instance.text.as_str()));
        }
        for pattern in interface.children_named("regex-instance") {
            hal.insert_instance(interface_name, InstancePattern::regex(&pattern.text)?);
        }
    }
    Ok(hal)
}

fn encode_matrix_hal(hal: &MatrixHal) -> Element {
    let mut el = Element::new("hal")
        .with_attr("format", hal.format.as_str())
        .with_attr("optional", hal.optional.to_string());
    el.push(Element::text_node("name", &hal.name));
    text_children(&mut el, "version", hal.version_ranges.iter().map(ToString::to_string));
    for (interface, instances) in &hal.interfaces {
        let mut iface = Element::new("interface");
        iface.push(Element::text_node("name", interface));
        for instance in instances {
            let tag = if instance.is_regex() {
                "regex-instance"
            } else {
                "instance"
            };
            iface.push(Element::text_node(tag, instance.as_str()));
        }
        el.push(iface);
    }
    el
}

fn decode_kernel_config(el: &Element) -> Result<KernelConfig, CodecError> {
    let key = child_text(el, "config", "key")?;
    let value = el.child("value").ok_or(CodecError::MissingChild {
        element: "config",
        child: "value",
    })?;
    let kind: KernelConfigType = value
        .attr("type")
        .ok_or(CodecError::MissingAttribute {
            element: "value",
            attribute: "type",
        })?
        .parse()?;
    Ok(KernelConfig::new(
        key,
        KernelConfigTypedValue::parse_as(kind, &value.text)?,
    ))
}

fn encode_kernel_config(config: &KernelConfig) -> Element {
    let mut el = Element::new("config");
    el.push(Element::text_node("key", &config.key));
    el.push(
        Element::text_node("value", config.value.value_text())
            .with_attr("type", config.value.kind().as_str()),
    );
    el
}

fn decode_kernel(el: &Element) -> Result<MatrixKernel, CodecError> {
    let version: KernelVersion = el
        .attr("version")
        .ok_or(CodecError::MissingAttribute {
            element: "kernel",
            attribute: "version",
        })?
        .parse()?;
    let configs = el
        .children_named("config")
        .map(decode_kernel_config)
        .collect::<Result<_, _>>()?;
    let conditions = match el.child("conditions") {
        Some(conditions) => conditions
            .children_named("config")
            .map(decode_kernel_config)
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    Ok(MatrixKernel::new(version, configs).with_conditions(conditions))
}

fn encode_kernel(kernel: &MatrixKernel, flags: SerializeFlags) -> Element {
    let mut version = kernel.min_lts;
    if !flags.kernel_minor_revision {
        version.minor_rev = 0;
    }
    let mut el = Element::new("kernel").with_attr("version", version.to_string());
    if flags.kernel_configs {
        if !kernel.conditions.is_empty() {
            let mut conditions = Element::new("conditions");
            for condition in &kernel.conditions {
                conditions.push(encode_kernel_config(condition));
            }
            el.push(conditions);
        }
        for config in &kernel.configs {
            el.push(encode_kernel_config(config));
        }
    }
    el
}

fn decode_sepolicy(el: &Element) -> Result<Sepolicy, CodecError> {
    let kernel_sepolicy_version = child_text(el, "sepolicy", "kernel-sepolicy-version")?;
    let kernel_sepolicy_version = crate::version::parse_number(kernel_sepolicy_version).ok_or_else(|| {
        ParseError::Token {
            kind: "kernel sepolicy version",
            text: kernel_sepolicy_version.to_owned(),
        }
    })?;
    let ranges: Vec<VersionRange> = parse_children(el, "sepolicy-version")?;
    Ok(Sepolicy::new(kernel_sepolicy_version, ranges))
}

fn encode_sepolicy(sepolicy: &Sepolicy) -> Element {
    let mut el = Element::new("sepolicy");
    el.push(Element::text_node(
        "kernel-sepolicy-version",
        sepolicy.kernel_sepolicy_version.to_string(),
    ));
    text_children(
        &mut el,
        "sepolicy-version",
        sepolicy.sepolicy_version_ranges.iter().map(ToString::to_string),
    );
    el
}

fn decode_matrix_xml_file(el: &Element) -> Result<MatrixXmlFile, CodecError> {
    let mut file = MatrixXmlFile::new(
        child_text(el, "xmlfile", "name")?,
        child_text(el, "xmlfile", "version")?.parse()?,
    );
    file.format = attr_or(el, "format", XmlSchemaFormat::Dtd)?;
    file.optional = bool_attr(el, "optional")?;
    file.overridden_path = el.child_text("path").map(str::to_owned);
    Ok(file)
}

fn encode_matrix_xml_file(file: &MatrixXmlFile) -> Element {
    let mut el = Element::new("xmlfile")
        .with_attr("format", file.format.as_str())
        .with_attr("optional", file.optional.to_string());
    el.push(Element::text_node("name", &file.name));
    el.push(Element::text_node("version", file.version_range.to_string()));
    if let Some(path) = &file.overridden_path {
        el.push(Element::text_node("path", path));
    }
    el
}

impl XmlSchema for CompatibilityMatrix {
    const ROOT: &'static str = "compatibility-matrix";

    fn from_element(root: &Element) -> Result<Self, CodecError> {
        check_meta_version(root, Self::ROOT)?;
        let schema_type = attr_or(root, "type", SchemaType::Framework)?;
        let mut matrix = Self::empty(schema_type).with_level(attr_or(root, "level", Level::UNSPECIFIED)?);

        for el in root.children_named("hal") {
            matrix.add_hal(decode_matrix_hal(el)?);
        }
        match schema_type {
            SchemaType::Framework => {
                for el in root.children_named("kernel") {
                    matrix.add_kernel(decode_kernel(el)?)?;
                }
                let framework = matrix.framework_info_mut()?;
                if let Some(el) = root.child("sepolicy") {
                    framework.sepolicy = decode_sepolicy(el)?;
                }
                if let Some(el) = root.child("avb") {
                    framework.avb_meta_version = child_text(el, "avb", "vbmeta-version")?.parse()?;
                }
            }
            SchemaType::Device => {
                let device = matrix.device_info_mut()?;
                device.vendor_ndk = root.child("vendor-ndk").map(decode_vendor_ndk).transpose()?;
                device.system_sdk = decode_system_sdk(root);
            }
        }
        for el in root.children_named("xmlfile") {
            matrix.add_xml_file(decode_matrix_xml_file(el)?);
        }
        Ok(matrix)
    }

    fn to_element(&self, flags: SerializeFlags) -> Element {
        let mut root = root_element(Self::ROOT, MATRIX_META_VERSION, self.schema_type(), self.level);
        if flags.hals {
            for hal in self.hals().iter() {
                root.push(encode_matrix_hal(hal));
            }
        }
        match self.variant() {
            MatrixVariant::Framework(framework) => {
                if flags.kernel {
                    for kernel in &framework.kernels {
                        root.push(encode_kernel(kernel, flags));
                    }
                }
                if flags.sepolicy {
                    root.push(encode_sepolicy(&framework.sepolicy));
                }
                if flags.avb {
                    let mut avb = Element::new("avb");
                    avb.push(Element::text_node(
                        "vbmeta-version",
                        framework.avb_meta_version.to_string(),
                    ));
                    root.push(avb);
                }
            }
            MatrixVariant::Device(device) => {
                if flags.library_sets {
                    if let Some(ndk) = &device.vendor_ndk {
                        root.push(encode_vendor_ndk(ndk));
                    }
                }
                if flags.sdk && !device.system_sdk.is_empty() {
                    root.push(encode_system_sdk(&device.system_sdk));
                }
            }
        }
        if flags.xml_files {
            for file in self.xml_files().iter() {
                root.push(encode_matrix_xml_file(file));
            }
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Tristate;

    const DEVICE_MANIFEST: &str = r#"
<manifest version="1.0" type="device" level="3">
    <hal format="hidl">
        <name>android.hardware.camera</name>
        <transport>hwbinder</transport>
        <version>2.0</version>
        <version>3.4</version>
        <interface>
            <name>ICameraProvider</name>
            <instance>legacy/0</instance>
        </interface>
        <fqname>@3.4::ICameraProvider/external/0</fqname>
    </hal>
    <hal format="hidl">
        <name>android.hardware.light</name>
        <transport arch="32+64">passthrough</transport>
        <version>2.0</version>
        <interface>
            <name>ILight</name>
            <instance>default</instance>
        </interface>
    </hal>
    <hal format="native" override="true">
        <name>netutils-wrapper</name>
        <version>1.0</version>
    </hal>
    <sepolicy>
        <version>25.5</version>
    </sepolicy>
    <xmlfile>
        <name>media_profile</name>
        <version>1.0</version>
        <path>/vendor/etc/media_profile_V1_0.xml</path>
    </xmlfile>
</manifest>
"#;

    const FRAMEWORK_MATRIX: &str = r#"
<compatibility-matrix version="1.0" type="framework" level="3">
    <hal format="hidl" optional="false">
        <name>android.hardware.camera</name>
        <version>2.0-5</version>
        <version>3.4</version>
        <interface>
            <name>ICameraProvider</name>
            <instance>legacy/0</instance>
            <regex-instance>external/[0-9]+</regex-instance>
        </interface>
    </hal>
    <hal format="native" optional="true">
        <name>netutils-wrapper</name>
        <version>1.0</version>
    </hal>
    <kernel version="4.4.107">
        <conditions>
            <config>
                <key>CONFIG_ARM64</key>
                <value type="tristate">y</value>
            </config>
        </conditions>
        <config>
            <key>CONFIG_HZ</key>
            <value type="int">250</value>
        </config>
        <config>
            <key>CONFIG_ARCH_MMAP_RND_BITS</key>
            <value type="range">24-32</value>
        </config>
        <config>
            <key>CONFIG_DEFAULT_SECURITY</key>
            <value type="string">selinux</value>
        </config>
    </kernel>
    <sepolicy>
        <kernel-sepolicy-version>30</kernel-sepolicy-version>
        <sepolicy-version>25.0</sepolicy-version>
        <sepolicy-version>26.0-3</sepolicy-version>
    </sepolicy>
    <avb>
        <vbmeta-version>2.1</vbmeta-version>
    </avb>
    <xmlfile format="xsd" optional="true">
        <name>media_profile</name>
        <version>1.0-1</version>
    </xmlfile>
</compatibility-matrix>
"#;

    #[test]
    fn decodes_device_manifest() {
        let m = HalManifest::from_xml(DEVICE_MANIFEST).unwrap();
        assert_eq!(m.schema_type(), SchemaType::Device);
        assert_eq!(m.level, Level::new(3));
        assert_eq!(m.sepolicy_version().unwrap(), Version::new(25, 5));
        assert!(m.has_instance("android.hardware.camera", Version::new(3, 4), "ICameraProvider", "external/0"));
        assert_eq!(
            m.transport("android.hardware.light", Version::new(2, 0), "ILight", "default"),
            Transport::Passthrough
        );
        let light = &m.hals().get_all("android.hardware.light")[0];
        assert_eq!(light.transport_arch.arch, Arch::Arch32Plus64);
        assert!(m.hals().get_all("netutils-wrapper")[0].is_override);
        assert_eq!(
            m.xml_files().get_all("media_profile")[0].overridden_path.as_deref(),
            Some("/vendor/etc/media_profile_V1_0.xml")
        );
    }

    #[test]
    fn decodes_framework_matrix() {
        let m = CompatibilityMatrix::from_xml(FRAMEWORK_MATRIX).unwrap();
        let camera = &m.hals().get_all("android.hardware.camera")[0];
        assert_eq!(camera.version_ranges.len(), 2);
        assert!(camera.interfaces["ICameraProvider"].iter().any(InstancePattern::is_regex));
        let kernel = &m.kernels().unwrap()[0];
        assert_eq!(kernel.conditions.len(), 1);
        assert_eq!(kernel.configs[0].value, KernelConfigTypedValue::Integer(250));
        assert_eq!(kernel.configs[1].value, KernelConfigTypedValue::Range(24, 32));
        assert_eq!(m.sepolicy().unwrap().kernel_sepolicy_version, 30);
        assert_eq!(m.avb_meta_version().unwrap(), Version::new(2, 1));
        assert_eq!(m.xml_files().get_all("media_profile")[0].format, XmlSchemaFormat::Xsd);
    }

    #[test]
    fn manifest_roundtrips_with_everything() {
        let m = HalManifest::from_xml(DEVICE_MANIFEST).unwrap();
        let text = m.to_xml(SerializeFlags::EVERYTHING).unwrap();
        assert_eq!(HalManifest::from_xml(&text).unwrap(), m);

        let no_fqname = m.to_xml(SerializeFlags::EVERYTHING.disable_fq_name()).unwrap();
        assert!(!no_fqname.contains("<fqname>"));
        assert_eq!(HalManifest::from_xml(&no_fqname).unwrap(), m);
    }

    #[test]
    fn matrix_roundtrips_with_everything() {
        let m = CompatibilityMatrix::from_xml(FRAMEWORK_MATRIX).unwrap();
        let text = m.to_xml(SerializeFlags::EVERYTHING).unwrap();
        assert_eq!(CompatibilityMatrix::from_xml(&text).unwrap(), m);
    }

    #[test]
    fn framework_manifest_roundtrip() {
        let mut m = HalManifest::framework();
        {
            let framework = m.framework_info_mut().unwrap();
            framework.vendor_ndks.push(VendorNdk::new("27").with_library("libbase.so"));
            framework.system_sdk = SystemSdk::new(["27", "28"]);
        }
        m.add_hal(
            ManifestHal::new(HalFormat::Hidl, "android.hidl.manager")
                .with_transport(TransportArch::new(Transport::Hwbinder, Arch::Empty))
                .with_version(Version::new(1, 0))
                .with_instance("IServiceManager", "default"),
        )
        .unwrap();
        let text = m.to_xml(SerializeFlags::EVERYTHING).unwrap();
        assert!(text.contains("type=\"framework\""));
        assert!(text.contains("<library>libbase.so</library>"));
        assert_eq!(HalManifest::from_xml(&text).unwrap(), m);
    }

    #[test]
    fn device_matrix_roundtrip() {
        let mut m = CompatibilityMatrix::device();
        {
            let device = m.device_info_mut().unwrap();
            device.vendor_ndk = Some(VendorNdk::new("27").with_library("libjpeg.so"));
            device.system_sdk = SystemSdk::new(["27"]);
        }
        m.add_hal(
            MatrixHal::new(HalFormat::Hidl, "android.hidl.manager")
                .with_range("1.0".parse().unwrap())
                .with_instance("IServiceManager", "default"),
        );
        let text = m.to_xml(SerializeFlags::EVERYTHING).unwrap();
        assert_eq!(CompatibilityMatrix::from_xml(&text).unwrap(), m);
    }

    #[test]
    fn flags_select_sections() {
        let m = CompatibilityMatrix::from_xml(FRAMEWORK_MATRIX).unwrap();
        let hals_only = m.to_xml(SerializeFlags::HALS_ONLY).unwrap();
        assert!(hals_only.contains("<hal "));
        assert!(!hals_only.contains("<kernel"));
        assert!(!hals_only.contains("<sepolicy>"));

        let no_configs = m.to_xml(SerializeFlags::NO_KERNEL_CONFIGS).unwrap();
        assert!(no_configs.contains("<kernel version=\"4.4.107\"/>"));

        let no_minor = m.to_xml(SerializeFlags::NO_KERNEL_MINOR_REVISION).unwrap();
        assert!(no_minor.contains("<kernel version=\"4.4.0\">"));

        let none = m.to_xml(SerializeFlags::NONE).unwrap();
        assert_eq!(
            none.trim(),
            r#"<compatibility-matrix version="1.0" type="framework" level="3"/>"#
        );
    }

    #[test]
    fn default_types_and_unspecified_level() {
        let m = HalManifest::from_xml(r#"<manifest version="1.0"/>"#).unwrap();
        assert_eq!(m.schema_type(), SchemaType::Device);
        assert_eq!(m.level, Level::UNSPECIFIED);
        let text = m.to_xml(SerializeFlags::EVERYTHING).unwrap();
        assert!(!text.contains("level="));

        let matrix = CompatibilityMatrix::from_xml(r#"<compatibility-matrix version="1.0"/>"#).unwrap();
        assert_eq!(matrix.schema_type(), SchemaType::Framework);
    }

    #[test]
    fn decode_errors_carry_context() {
        let err = HalManifest::from_xml("<compatibility-matrix version=\"1.0\"/>").unwrap_err();
        assert!(matches!(err, CodecError::WrongRoot { .. }));

        let err = HalManifest::from_xml("<manifest/>").unwrap_err();
        assert!(matches!(err, CodecError::MissingAttribute { attribute: "version", .. }));

        let err = HalManifest::from_xml("<manifest version=\"2.0\"/>").unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion { .. }));

        let bad_version = r#"<manifest version="1.0"><hal><name>a</name><transport>hwbinder</transport><version>1.x</version></hal></manifest>"#;
        let err = HalManifest::from_xml(bad_version).unwrap_err();
        assert!(err.to_string().contains("1.x"));

        let duplicate = r#"<manifest version="1.0">
            <hal><name>a</name><transport>hwbinder</transport><version>1.0</version></hal>
            <hal><name>a</name><transport>hwbinder</transport><version>1.1</version></hal>
        </manifest>"#;
        assert!(matches!(
            HalManifest::from_xml(duplicate).unwrap_err(),
            CodecError::Schema(SchemaError::DuplicateMajor { .. })
        ));

        let missing_value_type = r#"<compatibility-matrix version="1.0"><kernel version="4.4.0"><config><key>CONFIG_A</key><value>y</value></config></kernel></compatibility-matrix>"#;
        assert!(matches!(
            CompatibilityMatrix::from_xml(missing_value_type).unwrap_err(),
            CodecError::MissingAttribute { attribute: "type", .. }
        ));
    }

    #[test]
    fn fqname_with_undeclared_version_is_rejected() {
        let text = r#"<manifest version="1.0"><hal><name>a</name><transport>hwbinder</transport><version>1.0</version><fqname>@2.0::IA/default</fqname></hal></manifest>"#;
        assert!(matches!(HalManifest::from_xml(text).unwrap_err(), CodecError::Hal { .. }));
    }

    #[test]
    fn invalid_regex_instance_is_a_parse_error() {
        let text = r#"<compatibility-matrix version="1.0"><hal><name>a</name><version>1.0</version><interface><name>IA</name><regex-instance>[</regex-instance></interface></hal></compatibility-matrix>"#;
        assert!(matches!(
            CompatibilityMatrix::from_xml(text).unwrap_err(),
            CodecError::Parse(ParseError::Regex { .. })
        ));
    }

    #[test]
    fn tristate_and_empty_string_values() {
        let text = r#"<compatibility-matrix version="1.0"><kernel version="4.9.0">
            <config><key>CONFIG_A</key><value type="tristate">m</value></config>
            <config><key>CONFIG_B</key><value type="string"></value></config>
        </kernel></compatibility-matrix>"#;
        let m = CompatibilityMatrix::from_xml(text).unwrap();
        let configs = &m.kernels().unwrap()[0].configs;
        assert_eq!(configs[0].value, KernelConfigTypedValue::Tristate(Tristate::Module));
        assert_eq!(configs[1].value, KernelConfigTypedValue::String(String::new()));
        let again = CompatibilityMatrix::from_xml(&m.to_xml(SerializeFlags::EVERYTHING).unwrap()).unwrap();
        assert_eq!(again, m);
    }

    #[test]
    fn padded_string_values_round_trip() {
        let mut m = CompatibilityMatrix::framework();
        m.add_kernel(crate::kernel::MatrixKernel::new(
            "4.9.0".parse().unwrap(),
            vec![crate::kernel::KernelConfig::new(
                "CONFIG_CMDLINE",
                KernelConfigTypedValue::String(" quiet ".to_owned()),
            )],
        ))
        .unwrap();
        let text = m.to_xml(SerializeFlags::EVERYTHING).unwrap();
        assert!(text.contains("<value type=\"string\"> quiet </value>"), "{text}");
        let again = CompatibilityMatrix::from_xml(&text).unwrap();
        assert_eq!(
            again.kernels().unwrap()[0].configs[0].value,
            KernelConfigTypedValue::String(" quiet ".to_owned())
        );
        assert_eq!(again, m);
    }
}
