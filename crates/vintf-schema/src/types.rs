//! Small enumerations and the FCM level shared across manifests and matrices.
//!
//! Every token type parses from and prints as its schema spelling, and
//! serializes as that string.

use crate::error::ParseError;
use crate::version::parse_number;
use std::fmt;
use std::str::FromStr;

macro_rules! token_enum {
    (
        $(#[$meta:meta])* $name:ident, $kind:literal {
            $($(#[$variant_meta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $name {
            /// The schema spelling of this token.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseError::Token {
                        kind: $kind,
                        text: s.to_owned(),
                    }),
                }
            }
        }

        string_serde!($name);
    };
}

token_enum!(
    /// Which side of the partition boundary a manifest or matrix describes.
    SchemaType, "schema type" {
        Device => "device",
        Framework => "framework",
    }
);

impl SchemaType {
    /// The side a document of this type is checked against.
    pub fn opposite(self) -> Self {
        match self {
            Self::Device => Self::Framework,
            Self::Framework => Self::Device,
        }
    }
}

token_enum!(
    #[derive(Default)]
    HalFormat, "hal format" {
        #[default]
        Hidl => "hidl",
        Native => "native",
    }
);

token_enum!(
    #[derive(Default)]
    Transport, "transport" {
        #[default]
        Empty => "",
        Hwbinder => "hwbinder",
        Passthrough => "passthrough",
    }
);

token_enum!(
    #[derive(Default)]
    Arch, "arch" {
        #[default]
        Empty => "",
        Arch32 => "32",
        Arch64 => "64",
        Arch32Plus64 => "32+64",
    }
);

token_enum!(
    /// Schema language of an `<xmlfile>` required by a matrix.
    #[derive(Default)]
    XmlSchemaFormat, "xmlfile format" {
        #[default]
        Dtd => "dtd",
        Xsd => "xsd",
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransportArch {
    pub transport: Transport,
    pub arch: Arch,
}

impl TransportArch {
    pub fn new(transport: Transport, arch: Arch) -> Self {
        Self { transport, arch }
    }

    /// Passthrough needs an arch; hwbinder and the empty transport must not have one.
    pub fn is_valid(&self) -> bool {
        match self.transport {
            Transport::Empty | Transport::Hwbinder => self.arch == Arch::Empty,
            Transport::Passthrough => self.arch != Arch::Empty,
        }
    }
}

impl fmt::Display for TransportArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            Transport::Empty => f.write_str("(no transport)")?,
            t => f.write_str(t.as_str())?,
        }
        if self.arch != Arch::Empty {
            write!(f, " ({}-bit)", self.arch)?;
        }
        Ok(())
    }
}

/// FCM support level. `UNSPECIFIED` sorts above every concrete level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u64);

impl Level {
    pub const LEGACY: Self = Self(0);
    pub const UNSPECIFIED: Self = Self(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn is_specified(self) -> bool {
        self != Self::UNSPECIFIED
    }

    pub fn value(self) -> Option<u64> {
        self.is_specified().then_some(self.0)
    }

    /// Map a device's first shipping API level to the FCM level it launched with.
    pub fn from_api_level(api_level: u64) -> Self {
        match api_level {
            0..=25 => Self::LEGACY,
            26 => Self(1),
            27 => Self(2),
            28 => Self(3),
            29 => Self(4),
            30 => Self(5),
            _ => Self::UNSPECIFIED,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LEGACY => f.write_str("legacy"),
            Self::UNSPECIFIED => f.write_str("unspecified"),
            Self(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Level {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::LEGACY),
            "unspecified" => Ok(Self::UNSPECIFIED),
            _ => parse_number(s)
                .map(Self)
                .ok_or_else(|| ParseError::Level(s.to_owned())),
        }
    }
}

string_serde!(Level);
