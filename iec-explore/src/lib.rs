//! Explorative simulation of the BPL ion-exchange chromatography (IEC) column.
//!
//! The column physics, the phase control and the detectors are all inside a pre-compiled FMU.
//! This crate loads the FMU picked for the platform, keeps the parameter and state dictionaries
//! of [`iec_model`] in a [`Session`], runs simulations through the [`Engine`] boundary and draws
//! the fixed menu of diagnostic plots.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(clippy::all)]

use iec_model::{FmuKind, Requirement};
use itertools::Itertools;

pub mod commands;
pub mod describe;
pub mod engine;
pub mod options;
pub mod plots;
pub mod results;
pub mod script;
pub mod session;

pub use engine::{Engine, SimRequest};
pub use results::SimResult;
pub use session::{Session, SimMode};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] iec_model::Error),

    #[error(transparent)]
    Fmi(#[from] fmi::Error),

    #[error("FMU call failed: {0}")]
    Fmi2(#[from] fmi::fmi2::Fmi2Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("Reading the model description failed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Plotting failed: {0}")]
    Plot(String),

    #[error("`{0}` is not a variable of the model")]
    UnknownVariable(String),

    #[error("`{0}` has type String and cannot be used here")]
    UnsupportedType(String),

    #[error("`{0}` was not recorded in the last simulation")]
    NotRecorded(String),

    #[error("`{0}` has no value before a simulation is run")]
    NotYetSimulated(String),

    #[error("No previous run, simulation is first done with mode Initial")]
    NoPreviousRun,

    #[error("Simulation time {0} must be finite and positive")]
    InvalidTime(f64),

    #[error("Parameter requirements do not hold: {}", .0.iter().join(", "))]
    RequirementsViolated(Vec<Requirement>),

    #[error("Value missing for {}", .0.join(", "))]
    MissingValues(Vec<String>),

    #[error("Unknown plot type `{0}`, expected one of: {1}")]
    UnknownPlotType(String, String),

    #[error("`{0}` is not found")]
    NotFound(String),

    #[error("FMU type {0} is not enabled in this build")]
    KindNotEnabled(FmuKind),

    #[error("Invalid simulation mode `{0}`, expected init or cont")]
    InvalidMode(String),

    #[error("{0}")]
    InvalidCommand(String),

    #[error("Line {line}: {source}")]
    Script {
        line: usize,
        #[source]
        source: Box<Error>,
    },
}
