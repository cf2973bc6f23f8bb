use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use iec_model::{params::parse_assignment, FmuKind, ParValue, Vendor};

use crate::plots::PlotType;

/// Explore the BPL ion-exchange chromatography column FMU
#[derive(Parser, Debug)]
#[command(name = "iec-explore", version)]
pub struct Cli {
    #[command(flatten)]
    pub fmu: FmuOptions,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct FmuOptions {
    /// The FMU to load, instead of the one selected for the platform
    #[arg(long, global = true, value_name = "model.fmu")]
    pub fmu: Option<PathBuf>,

    /// Directory holding the platform FMUs
    #[arg(long, global = true, default_value = ".")]
    pub fmu_dir: PathBuf,

    /// Tool that generated the FMU, JM or OM
    #[arg(long, global = true)]
    pub vendor: Option<Vendor>,

    /// FMU type, CS or ME
    #[arg(long, global = true)]
    pub kind: Option<FmuKind>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print platform, FMU and library versions
    Info,
    /// Describe the process, the liquid phase, the model parts or a parameter or variable
    Describe {
        /// chromatography, liquidphase, parts, MSL, or a parameter or variable name
        name: String,
    },
    /// Show parameters whose location or name contains NAME
    Disp {
        name: Option<String>,
        /// Show the model location instead of the value
        #[arg(long)]
        long: bool,
    },
    /// List the plot types
    PlotTypes,
    /// Write the process diagram of the FMU to a file
    ProcessDiagram {
        #[arg(short, long, default_value = "process_diagram.png")]
        output: PathBuf,
    },
    /// Run a simulation
    Simulate(SimulateArgs),
    /// Run a session script, one call per line
    Run {
        script: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Set a parameter, `name=value`
    #[arg(short = 'p', long = "par", value_parser = parse_assignment)]
    pub pars: Vec<(String, ParValue)>,

    /// Set an initial state, `name=value`
    #[arg(short = 'i', long = "init", value_parser = parse_assignment)]
    pub inits: Vec<(String, ParValue)>,

    /// Simulation time [min]
    #[arg(short = 't', long)]
    pub time: Option<f64>,

    /// Number of communication points
    #[arg(long)]
    pub ncp: Option<usize>,

    /// Continue the simulation for another TIME, can be given multiple times
    #[arg(long = "continue-for", value_name = "TIME")]
    pub continue_for: Vec<f64>,

    /// Draw the runs into a figure of this type
    #[arg(long, value_parser = parse_plot_type)]
    pub plot: Option<PlotType>,

    #[arg(long, default_value = "IEC")]
    pub title: String,

    /// Figure output, `.svg` or a bitmap format
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the result of the last run as CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Print the result table of the last run
    #[arg(long)]
    pub print: bool,
}

fn parse_plot_type(s: &str) -> Result<PlotType, String> {
    s.parse::<PlotType>().map_err(|e| e.to_string())
}
