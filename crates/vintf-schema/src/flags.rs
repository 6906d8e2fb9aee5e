use serde::{Deserialize, Serialize};

/// Which optional sections an encoder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializeFlags {
    pub hals: bool,
    pub avb: bool,
    pub sepolicy: bool,
    pub library_sets: bool,
    pub kernel: bool,
    pub xml_files: bool,
    pub sdk: bool,
    /// Write manifest instances as `<fqname>` rather than `<interface>` blocks.
    pub fq_name: bool,
    pub kernel_configs: bool,
    /// Write the kernel version's minor revision instead of `0`.
    pub kernel_minor_revision: bool,
}

macro_rules! flag_toggles {
    ($($field:ident: $enable:ident, $disable:ident;)+) => {
        impl SerializeFlags {
            $(
                #[must_use]
                pub const fn $enable(mut self) -> Self {
                    self.$field = true;
                    self
                }

                #[must_use]
                pub const fn $disable(mut self) -> Self {
                    self.$field = false;
                    self
                }
            )+
        }
    };
}

flag_toggles! {
    hals: enable_hals, disable_hals;
    avb: enable_avb, disable_avb;
    sepolicy: enable_sepolicy, disable_sepolicy;
    library_sets: enable_library_sets, disable_library_sets;
    kernel: enable_kernel, disable_kernel;
    xml_files: enable_xml_files, disable_xml_files;
    sdk: enable_sdk, disable_sdk;
    fq_name: enable_fq_name, disable_fq_name;
    kernel_configs: enable_kernel_configs, disable_kernel_configs;
    kernel_minor_revision: enable_kernel_minor_revision, disable_kernel_minor_revision;
}

impl SerializeFlags {
    pub const EVERYTHING: Self = Self {
        hals: true,
        avb: true,
        sepolicy: true,
        library_sets: true,
        kernel: true,
        xml_files: true,
        sdk: true,
        fq_name: true,
        kernel_configs: true,
        kernel_minor_revision: true,
    };

    pub const NONE: Self = Self {
        hals: false,
        avb: false,
        sepolicy: false,
        library_sets: false,
        kernel: false,
        xml_files: false,
        sdk: false,
        fq_name: false,
        kernel_configs: false,
        kernel_minor_revision: false,
    };

    pub const HALS_ONLY: Self = Self::NONE.enable_hals().enable_fq_name();
    pub const HALS_NO_FQNAME: Self = Self::NONE.enable_hals();
    pub const XMLFILES_ONLY: Self = Self::NONE.enable_xml_files();
    pub const SEPOLICY_ONLY: Self = Self::NONE.enable_sepolicy();
    pub const VNDK_ONLY: Self = Self::NONE.enable_library_sets();
    pub const SSDK_ONLY: Self = Self::NONE.enable_sdk();
    pub const NO_KERNEL_CONFIGS: Self = Self::EVERYTHING.disable_kernel_configs();
    pub const NO_KERNEL_MINOR_REVISION: Self = Self::EVERYTHING.disable_kernel_minor_revision();
}

impl Default for SerializeFlags {
    fn default() -> Self {
        Self::EVERYTHING
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagPreset {
    pub name: &'static str,
    pub description: &'static str,
    pub flags: SerializeFlags,
}

pub const BUILTIN_PRESETS: &[FlagPreset] = &[
    FlagPreset {
        name: "everything",
        description: "Every section",
        flags: SerializeFlags::EVERYTHING,
    },
    FlagPreset {
        name: "none",
        description: "Only the root element and its attributes",
        flags: SerializeFlags::NONE,
    },
    FlagPreset {
        name: "hals-only",
        description: "HAL entries, instances as fully-qualified names",
        flags: SerializeFlags::HALS_ONLY,
    },
    FlagPreset {
        name: "hals-no-fqname",
        description: "HAL entries, instances as interface blocks",
        flags: SerializeFlags::HALS_NO_FQNAME,
    },
    FlagPreset {
        name: "xmlfiles-only",
        description: "XML file entries",
        flags: SerializeFlags::XMLFILES_ONLY,
    },
    FlagPreset {
        name: "sepolicy-only",
        description: "Security policy versions",
        flags: SerializeFlags::SEPOLICY_ONLY,
    },
    FlagPreset {
        name: "vndk-only",
        description: "Vendor NDK library sets",
        flags: SerializeFlags::VNDK_ONLY,
    },
    FlagPreset {
        name: "ssdk-only",
        description: "System SDK versions",
        flags: SerializeFlags::SSDK_ONLY,
    },
    FlagPreset {
        name: "no-kernel-configs",
        description: "Every section except kernel config entries",
        flags: SerializeFlags::NO_KERNEL_CONFIGS,
    },
];

pub fn get_preset(name: &str) -> Option<&'static FlagPreset> {
    BUILTIN_PRESETS.iter().find(|p| p.name == name)
}

pub fn list_presets() -> &'static [FlagPreset] {
    BUILTIN_PRESETS
}
