//! The `iec-explore` command line.

use std::{ffi::OsString, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use comfy_table::{presets, Table};
use iec_model::{FmuKind, FmuSelection, ParameterSet, Platform};

use crate::{
    describe::{describe, disp, system_info},
    engine::{extract_process_diagram, DiagramSource, FmuEngine},
    options::{Cli, Commands, FmuOptions, SimulateArgs},
    plots::{render, PlotConfig, PlotType},
    script::{parse_script, run_script},
    session::{Session, SimMode},
};

pub fn entrypoint() -> anyhow::Result<()> {
    entrypoint_from(std::env::args_os())
}

pub fn entrypoint_from<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let level = cli.verbose.log_level_filter().to_string().to_lowercase();
    let _logger = flexi_logger::Logger::try_with_env_or_str(level)?
        .set_palette("b1;3;2;4;6".to_string())
        .start()?;

    run(cli)
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli { fmu, command, .. } = cli;

    match command {
        Commands::PlotTypes => {
            for plot_type in PlotType::ALL {
                println!("{plot_type}");
            }
        }
        Commands::Disp { name, long } => {
            let params = ParameterSet::column_system();
            println!("{}", disp(&params, name.as_deref().unwrap_or_default(), long));
        }
        Commands::Info => {
            let session = open_session(&fmu)?;
            println!("{}", system_info(&session));
        }
        Commands::Describe { name } => {
            let session = open_session(&fmu)?;
            println!("{}", describe(&session, &name)?);
        }
        Commands::ProcessDiagram { output } => {
            let (path, _) = fmu_path(&fmu)?;
            match extract_process_diagram(&path, &output)
                .with_context(|| format!("No process diagram for {}", path.display()))?
            {
                DiagramSource::Archive => log::info!("Process diagram extracted from the FMU"),
                DiagramSource::Disk => log::info!("Process diagram copied from the FMU directory"),
            }
            println!("{}", output.display());
        }
        Commands::Simulate(args) => {
            let mut session = open_session(&fmu)?;
            simulate(&mut session, args)?;
        }
        Commands::Run { script } => {
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("Reading script {}", script.display()))?;
            let commands = parse_script(&text)?;
            let mut session = open_session(&fmu)?;
            run_script(&mut session, &commands, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}

/// The FMU to load: the one given with `--fmu`, or the one selected for the platform.
fn fmu_path(opts: &FmuOptions) -> anyhow::Result<(PathBuf, Option<FmuKind>)> {
    if let Some(path) = &opts.fmu {
        return Ok((path.clone(), opts.kind));
    }

    let selection = FmuSelection::select(Platform::current(), opts.vendor, opts.kind)
        .inspect_err(|e| log::error!("There is no FMU for this platform: {e}"))?;
    Ok((opts.fmu_dir.join(selection.file_name), Some(selection.kind)))
}

fn open_session(opts: &FmuOptions) -> anyhow::Result<Session<FmuEngine>> {
    let (path, kind) = fmu_path(opts)?;
    let engine = FmuEngine::load(&path, kind)
        .with_context(|| format!("Loading FMU {}", path.display()))?;
    Ok(Session::new(engine)?)
}

fn simulate(session: &mut Session<FmuEngine>, args: SimulateArgs) -> anyhow::Result<()> {
    if !args.pars.is_empty() {
        session.par(args.pars)?;
    }
    session.init(args.inits)?;
    if let Some(ncp) = args.ncp {
        session.set_ncp(ncp);
    }
    if let Some(plot_type) = args.plot {
        session.newplot(&args.title, plot_type);
    }

    session.simu(args.time, SimMode::Initial)?;
    for time in args.continue_for {
        session.simu(Some(time), SimMode::Continued)?;
    }

    if let Some(csv) = &args.csv {
        if let Some(result) = session.result() {
            result.write_csv(csv)?;
        }
    }

    match (session.figure(), &args.output) {
        (Some(figure), Some(output)) => {
            render(figure, output, &PlotConfig::default())
                .with_context(|| format!("Rendering {}", output.display()))?;
            log::info!("Figure written to {}", output.display());
        }
        (Some(_), None) => log::warn!("No --output given, the figure is not written"),
        (None, Some(_)) => log::warn!("No --plot given, nothing to write"),
        (None, None) => {}
    }

    if args.print {
        if let Some(result) = session.result() {
            println!("{}", result.pretty()?);
        }
    }
    println!("{}", final_states(session));
    Ok(())
}

/// Values of the states at the end of the last run.
fn final_states(session: &Session<FmuEngine>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "State".to_owned(),
        format!("t = {}", session.prev_final_time()),
    ]);
    for entry in session.states().iter() {
        let value = entry
            .final_value
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "-".to_owned());
        table.add_row(vec![entry.name.clone(), value]);
    }
    table
}
