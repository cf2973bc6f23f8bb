//! Session scripts.
//!
//! A script has one call per line, `#` starts a comment:
//!
//! ```text
//! newplot Elution-vs-CV Reference run
//! par start_desorption=300 stop_desorption=700
//! init tank_harvest.V=0.5
//! simu 700
//! simu 50 cont
//! disp control_pooling
//! save elution.svg
//! ```

use std::{io::Write, path::PathBuf};

use iec_model::{params::parse_assignment, ParValue};

use crate::{
    describe::{describe, disp},
    engine::Engine,
    plots::{render, PlotConfig, PlotType},
    session::{Session, SimMode},
    Error,
};

const DEFAULT_TITLE: &str = "IEC";

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Par(Vec<(String, ParValue)>),
    Init(Vec<(String, ParValue)>),
    NewPlot { plot_type: PlotType, title: String },
    Simu { time: Option<f64>, mode: SimMode },
    Disp { name: String, long: bool },
    Describe(String),
    /// Render the current figure
    Save(PathBuf),
    /// Write the last result as CSV
    Csv(PathBuf),
}

impl ScriptCommand {
    /// Parse one line. Blank lines and comments give `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, Error> {
        let line = line.split_once('#').map_or(line, |(code, _)| code).trim();
        let mut words = line.split_whitespace();
        let Some(call) = words.next() else {
            return Ok(None);
        };
        let args = words.collect::<Vec<_>>();

        let command = match call {
            "par" => Self::Par(assignments(&args)?),
            "init" => Self::Init(assignments(&args)?),
            "newplot" => {
                let (plot_type, title) = args
                    .split_first()
                    .ok_or_else(|| Error::InvalidCommand("newplot needs a plot type".to_owned()))?;
                let title = if title.is_empty() {
                    DEFAULT_TITLE.to_owned()
                } else {
                    title.join(" ")
                };
                Self::NewPlot {
                    plot_type: plot_type.parse()?,
                    title,
                }
            }
            "simu" => {
                let mut time = None;
                let mut mode = SimMode::Initial;
                for arg in args {
                    match arg.parse::<f64>() {
                        Ok(t) if time.is_none() => time = Some(t),
                        _ => mode = arg.parse()?,
                    }
                }
                Self::Simu { time, mode }
            }
            "disp" => match args.as_slice() {
                [] => Self::Disp {
                    name: String::new(),
                    long: false,
                },
                ["long"] => Self::Disp {
                    name: String::new(),
                    long: true,
                },
                [name] => Self::Disp {
                    name: name.to_string(),
                    long: false,
                },
                [name, "long"] => Self::Disp {
                    name: name.to_string(),
                    long: true,
                },
                _ => return Err(Error::InvalidCommand(format!("disp {}", args.join(" ")))),
            },
            "describe" => match args.as_slice() {
                [name] => Self::Describe(name.to_string()),
                _ => return Err(Error::InvalidCommand("describe needs one name".to_owned())),
            },
            "save" => Self::Save(single_path(call, &args)?),
            "csv" => Self::Csv(single_path(call, &args)?),
            other => return Err(Error::InvalidCommand(format!("Unknown call `{other}`"))),
        };
        Ok(Some(command))
    }
}

fn assignments(args: &[&str]) -> Result<Vec<(String, ParValue)>, Error> {
    if args.is_empty() {
        return Err(Error::InvalidCommand(
            "expected assignments `name=value`".to_owned(),
        ));
    }
    Ok(args
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>, _>>()?)
}

fn single_path(call: &str, args: &[&str]) -> Result<PathBuf, Error> {
    match args {
        [path] => Ok(PathBuf::from(path)),
        _ => Err(Error::InvalidCommand(format!("{call} needs one file name"))),
    }
}

/// Parse a script into its calls with their 1-based line numbers.
pub fn parse_script(text: &str) -> Result<Vec<(usize, ScriptCommand)>, Error> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| match ScriptCommand::parse(line) {
            Ok(Some(command)) => Some(Ok((idx + 1, command))),
            Ok(None) => None,
            Err(e) => Some(Err(Error::Script {
                line: idx + 1,
                source: Box::new(e),
            })),
        })
        .collect()
}

/// Run the calls of a script in order, stopping at the first failing one.
pub fn run_script<E: Engine>(
    session: &mut Session<E>,
    commands: &[(usize, ScriptCommand)],
    out: &mut impl Write,
) -> Result<(), Error> {
    for (line, command) in commands {
        log::debug!("line {line}: {command:?}");
        run_command(session, command, out).map_err(|e| Error::Script {
            line: *line,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

fn run_command<E: Engine>(
    session: &mut Session<E>,
    command: &ScriptCommand,
    out: &mut impl Write,
) -> Result<(), Error> {
    match command {
        ScriptCommand::Par(updates) => {
            for requirement in session.par(updates.iter().cloned())? {
                writeln!(out, "Check the requirement: {requirement}")?;
            }
        }
        ScriptCommand::Init(updates) => session.init(updates.iter().cloned())?,
        ScriptCommand::NewPlot { plot_type, title } => session.newplot(title, *plot_type),
        ScriptCommand::Simu { time, mode } => {
            let result = session.simu(*time, *mode)?;
            writeln!(
                out,
                "Simulated to t = {} ({} samples)",
                result.final_time()?,
                result.len()
            )?;
        }
        ScriptCommand::Disp { name, long } => {
            writeln!(out, "{}", disp(session.params(), name, *long))?;
        }
        ScriptCommand::Describe(name) => writeln!(out, "{}", describe(session, name)?)?,
        ScriptCommand::Save(path) => {
            let figure = session
                .figure()
                .ok_or_else(|| Error::InvalidCommand("No figure, use newplot first".to_owned()))?;
            render(figure, path, &PlotConfig::default())?;
            writeln!(out, "Saved {}", path.display())?;
        }
        ScriptCommand::Csv(path) => {
            let result = session
                .result()
                .ok_or_else(|| Error::NotYetSimulated("result".to_owned()))?;
            result.write_csv(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("simu", None, SimMode::Initial)]
    #[case("simu 700", Some(700.0), SimMode::Initial)]
    #[case("simu 50 cont", Some(50.0), SimMode::Continued)]
    #[case("simu cont", None, SimMode::Continued)]
    fn test_parse_simu(#[case] line: &str, #[case] time: Option<f64>, #[case] mode: SimMode) {
        assert_eq!(
            ScriptCommand::parse(line).unwrap(),
            Some(ScriptCommand::Simu { time, mode })
        );
    }

    #[test]
    fn test_parse_calls() {
        assert_eq!(
            ScriptCommand::parse("par k1=0.5 gradient=false # tune").unwrap(),
            Some(ScriptCommand::Par(vec![
                ("k1".to_owned(), ParValue::Real(0.5)),
                ("gradient".to_owned(), ParValue::Boolean(false)),
            ]))
        );
        assert_eq!(
            ScriptCommand::parse("newplot Elution-pooling First pooling run").unwrap(),
            Some(ScriptCommand::NewPlot {
                plot_type: PlotType::ElutionPooling,
                title: "First pooling run".to_owned(),
            })
        );
        assert_eq!(
            ScriptCommand::parse("newplot Pooling").unwrap(),
            Some(ScriptCommand::NewPlot {
                plot_type: PlotType::Pooling,
                title: "IEC".to_owned(),
            })
        );
        assert_eq!(
            ScriptCommand::parse("disp column long").unwrap(),
            Some(ScriptCommand::Disp {
                name: "column".to_owned(),
                long: true,
            })
        );
        assert_eq!(ScriptCommand::parse("   # nothing").unwrap(), None);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse_script("par k1=0.5\n\nsimu 10 sideways\n").unwrap_err();
        let Error::Script { line, source } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(line, 3);
        assert!(matches!(*source, Error::InvalidMode(_)));

        assert!(matches!(
            parse_script("plot Elution"),
            Err(Error::Script { line: 1, .. })
        ));
        assert!(matches!(
            parse_script("newplot Elution-vs-time"),
            Err(Error::Script { source, .. }) if matches!(*source, Error::UnknownPlotType(..))
        ));
    }
}
