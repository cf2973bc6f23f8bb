//! Configuration tables for exploring the BPL ion-exchange chromatography (IEC) column FMU.
//!
//! This crate holds everything about the column model that is plain data: the parameter
//! dictionary with its model locations and requirements, the continuous-state naming rule used
//! to carry state between runs, the platform/FMU selection table, and the model-variable
//! catalogue type that the simulation engine fills from the FMU's model description.
//!
//! Nothing here talks to the FMU itself, see the `iec-explore` crate for that.
#![deny(unsafe_code)]
#![deny(clippy::all)]

use thiserror::Error;

pub mod params;
pub mod platform;
pub mod states;
pub mod variable;

pub use params::{ParValue, ParameterSet, Requirement};
pub use platform::{FmuKind, FmuSelection, LibraryVersions, Platform, Vendor};
pub use states::StateDict;
pub use variable::{Causality, ModelInfo, ModelVariable, VarType, Variability};

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("`{0}` seems not an accessible parameter - check the spelling")]
    UnknownParameter(String),

    #[error("`{0}` is ambiguous, it matches the parameters {1:?}")]
    AmbiguousParameter(String, Vec<String>),

    #[error("`{0}` seems not an initial state - use par() for parameters")]
    UnknownState(String),

    #[error("Invalid assignment `{0}`, expected `name=value`")]
    InvalidAssignment(String),

    #[error("Invalid value `{value}` for `{name}`")]
    InvalidValue { name: String, value: String },

    #[error("State `{0}` has an index of more than 1000 states")]
    TooManyStates(String),

    #[error("There is no FMU for this platform ({platform}, vendor {vendor}, type {kind})")]
    UnsupportedPlatform {
        platform: String,
        vendor: String,
        kind: String,
    },

    #[error("Unknown FMU vendor `{0}`, expected JM or OM")]
    UnknownVendor(String),

    #[error("Unknown FMU type `{0}`, expected CS or ME")]
    UnknownKind(String),
}
