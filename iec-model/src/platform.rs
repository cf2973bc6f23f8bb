//! Selection of the pre-compiled FMU for the running platform.
//!
//! The column model ships as several FMUs, one per platform, generating tool (vendor) and FMU
//! type. Only a few combinations exist.

use std::{fmt::Display, str::FromStr};

use crate::{variable::ModelInfo, Error};

/// Number of communication points for a run, the same for both FMU types.
pub const DEFAULT_NCP: usize = 500;

/// Default length of a simulation run [min].
pub const DEFAULT_SIMULATION_TIME: f64 = 100.0;

/// Process diagram shipped next to the FMUs, used when the FMU archive has none.
pub const PROCESS_DIAGRAM: &str = "IBPL_IEC_process_diagram_omnigraffle.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windows => write!(f, "Windows"),
            Self::Linux => write!(f, "Linux"),
            Self::Other(os) => write!(f, "{os}"),
        }
    }
}

/// The tool that generated the FMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    JModelica,
    OpenModelica,
}

impl Vendor {
    /// Guess the vendor from the `generationTool` of the model description.
    pub fn from_generation_tool(tool: &str) -> Self {
        if tool.contains("OpenModelica") {
            Self::OpenModelica
        } else {
            Self::JModelica
        }
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JM" | "jm" => Ok(Self::JModelica),
            "OM" | "om" => Ok(Self::OpenModelica),
            _ => Err(Error::UnknownVendor(s.to_owned())),
        }
    }
}

impl Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JModelica => write!(f, "JM"),
            Self::OpenModelica => write!(f, "OM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmuKind {
    CoSimulation,
    ModelExchange,
}

impl FromStr for FmuKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CS" | "cs" => Ok(Self::CoSimulation),
            "ME" | "me" => Ok(Self::ModelExchange),
            _ => Err(Error::UnknownKind(s.to_owned())),
        }
    }
}

impl Display for FmuKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoSimulation => write!(f, "CS"),
            Self::ModelExchange => write!(f, "ME"),
        }
    }
}

/// The FMU picked for a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmuSelection {
    pub platform: Platform,
    pub vendor: Vendor,
    pub kind: FmuKind,
    pub file_name: &'static str,
}

impl FmuSelection {
    /// Pick the FMU file. Vendor and kind default to what is available on the platform: JM/CS
    /// on Windows and OM/ME on Linux.
    pub fn select(
        platform: Platform,
        vendor: Option<Vendor>,
        kind: Option<FmuKind>,
    ) -> Result<Self, Error> {
        let (vendor, kind) = match platform {
            Platform::Windows => (
                vendor.unwrap_or(Vendor::JModelica),
                kind.unwrap_or(FmuKind::CoSimulation),
            ),
            Platform::Linux => {
                let vendor = vendor.unwrap_or(Vendor::OpenModelica);
                let default_kind = match vendor {
                    Vendor::JModelica => FmuKind::CoSimulation,
                    Vendor::OpenModelica => FmuKind::ModelExchange,
                };
                (vendor, kind.unwrap_or(default_kind))
            }
            Platform::Other(_) => (
                vendor.unwrap_or(Vendor::OpenModelica),
                kind.unwrap_or(FmuKind::ModelExchange),
            ),
        };

        let file_name = match (&platform, vendor, kind) {
            (Platform::Windows, Vendor::JModelica, FmuKind::CoSimulation) => {
                "BPL_IEC_Column_system_windows_jm_cs.fmu"
            }
            (Platform::Linux, Vendor::JModelica, FmuKind::CoSimulation) => {
                "BPL_IEC_Column_system_linux_jm_cs.fmu"
            }
            (Platform::Linux, Vendor::OpenModelica, FmuKind::CoSimulation) => {
                "BPL_IEC_Column_system_linux_om_cs.fmu"
            }
            (Platform::Linux, Vendor::OpenModelica, FmuKind::ModelExchange) => {
                "BPL_IEC_Column_system_linux_om_me.fmu"
            }
            _ => {
                return Err(Error::UnsupportedPlatform {
                    platform: platform.to_string(),
                    vendor: vendor.to_string(),
                    kind: kind.to_string(),
                })
            }
        };

        log::debug!("{platform} - selected {file_name}");
        Ok(Self {
            platform,
            vendor,
            kind,
            file_name,
        })
    }
}

/// Versions of the Modelica Standard Library and the Bioprocess Library the FMU was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryVersions {
    pub msl_usage: String,
    pub msl_version: String,
    pub bpl_version: String,
}

impl LibraryVersions {
    /// The OpenModelica FMUs carry no version constants, their versions are known.
    pub fn open_modelica() -> Self {
        Self {
            msl_usage: "3.2.3 - used components: RealInput, RealOutput, CombiTimeTable, Types"
                .to_owned(),
            msl_version: "3.2.3".to_owned(),
            bpl_version: "Bioprocess Library version 2.2.1 - GUI".to_owned(),
        }
    }

    /// JModelica FMUs carry the versions as string constants of the model.
    pub fn from_model(info: &ModelInfo) -> Self {
        let read = |key: &str| {
            info.local_text(key)
                .map(str::to_owned)
                .unwrap_or_else(|| {
                    log::warn!("No `{key}` constant in the model");
                    "unknown".to_owned()
                })
        };
        Self {
            msl_usage: read("MSL.usage"),
            msl_version: read("MSL.version"),
            bpl_version: read("BPL.version"),
        }
    }

    pub fn for_vendor(vendor: Vendor, info: &ModelInfo) -> Self {
        match vendor {
            Vendor::JModelica => Self::from_model(info),
            Vendor::OpenModelica => Self::open_modelica(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Platform::Windows, None, None, "BPL_IEC_Column_system_windows_jm_cs.fmu")]
    #[case(Platform::Linux, None, None, "BPL_IEC_Column_system_linux_om_me.fmu")]
    #[case(
        Platform::Linux,
        Some(Vendor::JModelica),
        None,
        "BPL_IEC_Column_system_linux_jm_cs.fmu"
    )]
    #[case(
        Platform::Linux,
        Some(Vendor::OpenModelica),
        Some(FmuKind::CoSimulation),
        "BPL_IEC_Column_system_linux_om_cs.fmu"
    )]
    fn test_select(
        #[case] platform: Platform,
        #[case] vendor: Option<Vendor>,
        #[case] kind: Option<FmuKind>,
        #[case] expected: &str,
    ) {
        let selection = FmuSelection::select(platform, vendor, kind).unwrap();
        assert_eq!(selection.file_name, expected);
    }

    #[rstest]
    #[case(Platform::Other("macos".to_owned()), None, None)]
    #[case(Platform::Windows, Some(Vendor::OpenModelica), None)]
    #[case(Platform::Linux, Some(Vendor::JModelica), Some(FmuKind::ModelExchange))]
    fn test_select_unsupported(
        #[case] platform: Platform,
        #[case] vendor: Option<Vendor>,
        #[case] kind: Option<FmuKind>,
    ) {
        let err = FmuSelection::select(platform, vendor, kind).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
        assert!(err.to_string().starts_with("There is no FMU for this platform"));
    }

    #[test]
    fn test_parse_vendor_kind() {
        assert_eq!("jm".parse::<Vendor>(), Ok(Vendor::JModelica));
        assert_eq!("OM".parse::<Vendor>(), Ok(Vendor::OpenModelica));
        assert_eq!("me".parse::<FmuKind>(), Ok(FmuKind::ModelExchange));
        assert_eq!(
            Vendor::from_generation_tool("OpenModelica Compiler v1.16.0"),
            Vendor::OpenModelica
        );
        assert_eq!(
            Vendor::from_generation_tool("JModelica.org"),
            Vendor::JModelica
        );
        assert_eq!(
            "Cs".parse::<FmuKind>(),
            Err(Error::UnknownKind("Cs".to_owned()))
        );
    }
}
