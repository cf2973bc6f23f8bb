//! An exploration session over one loaded model.

use std::str::FromStr;

use iec_model::{
    platform::{DEFAULT_NCP, DEFAULT_SIMULATION_TIME},
    ModelInfo, ParValue, ParameterSet, Requirement, StateDict, VarType,
};
use itertools::Itertools;

use crate::{
    engine::{Engine, SimRequest},
    plots::{self, AxisContext, Figure, PlotType},
    results::SimResult,
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimMode {
    /// Start from time zero with the parameters and the states given with `init`
    #[default]
    Initial,
    /// Continue from where the previous run stopped
    Continued,
}

impl FromStr for SimMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" | "Initial" => Ok(Self::Initial),
            "cont" | "Continued" => Ok(Self::Continued),
            _ => Err(Error::InvalidMode(s.to_owned())),
        }
    }
}

pub struct Session<E: Engine> {
    engine: E,
    params: ParameterSet,
    states: StateDict,
    result: Option<SimResult>,
    prev_final_time: f64,
    ncp: usize,
    simulation_time: f64,
    figure: Option<Figure>,
}

impl<E: Engine> Session<E> {
    /// A session with the default parameters of the column system.
    pub fn new(engine: E) -> Result<Self, Error> {
        Self::with_parameters(engine, ParameterSet::column_system())
    }

    pub fn with_parameters(engine: E, params: ParameterSet) -> Result<Self, Error> {
        let states = StateDict::from_model(engine.model())?;
        Ok(Self {
            engine,
            params,
            states,
            result: None,
            prev_final_time: 0.0,
            ncp: DEFAULT_NCP,
            simulation_time: DEFAULT_SIMULATION_TIME,
            figure: None,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn model(&self) -> &ModelInfo {
        self.engine.model()
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn states(&self) -> &StateDict {
        &self.states
    }

    /// Result of the last run.
    pub fn result(&self) -> Option<&SimResult> {
        self.result.as_ref()
    }

    pub fn figure(&self) -> Option<&Figure> {
        self.figure.as_ref()
    }

    pub fn prev_final_time(&self) -> f64 {
        self.prev_final_time
    }

    pub fn ncp(&self) -> usize {
        self.ncp
    }

    pub fn set_ncp(&mut self, ncp: usize) {
        self.ncp = ncp.max(1);
    }

    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    pub fn set_simulation_time(&mut self, time: f64) -> Result<(), Error> {
        self.simulation_time = valid_time(time)?;
        Ok(())
    }

    /// Update parameters. Violated requirements are logged and returned.
    pub fn par<S: AsRef<str>>(
        &mut self,
        updates: impl IntoIterator<Item = (S, ParValue)>,
    ) -> Result<Vec<Requirement>, Error> {
        let violated = self.params.par(updates)?;
        for requirement in &violated {
            log::warn!("Check the requirement: {requirement}");
        }
        Ok(violated)
    }

    /// Set initial values of states for the next initial run.
    pub fn init<S: AsRef<str>>(
        &mut self,
        updates: impl IntoIterator<Item = (S, ParValue)>,
    ) -> Result<(), Error> {
        Ok(self.states.init(updates)?)
    }

    /// Start a new figure. Following runs are drawn into it.
    pub fn newplot(&mut self, title: &str, plot_type: PlotType) {
        log::debug!("New {plot_type} figure `{title}`");
        self.figure = Some(Figure::new(title, plot_type));
    }

    /// Variables recorded in a run: what the figure draws, the states and the key variables
    /// that are not parameters.
    pub fn outputs(&self) -> Vec<String> {
        let info = self.engine.model();
        let figure_vars = self
            .figure
            .iter()
            .flat_map(|f| {
                f.layout
                    .variables()
                    .into_iter()
                    .chain(f.layout.context_variables().into_iter().map(str::to_owned))
            })
            .collect_vec();
        let key_vars = self
            .params
            .key_variables()
            .iter()
            .filter(|k| self.params.parameter_at(k).is_none())
            .cloned();

        figure_vars
            .into_iter()
            .chain(self.states.names().map(str::to_owned))
            .chain(key_vars)
            .unique()
            .filter(|name| match info.get(name) {
                Some(var) => var.var_type != VarType::String,
                None => {
                    log::warn!("`{name}` is not a variable of the model and is not recorded");
                    false
                }
            })
            .collect()
    }

    /// Run a simulation for `time` (the default simulation time if `None`).
    ///
    /// Nothing in the session changes unless the run and the plot update both succeed.
    pub fn simu(&mut self, time: Option<f64>, mode: SimMode) -> Result<&SimResult, Error> {
        let time = valid_time(time.unwrap_or(self.simulation_time))?;
        let missing = self.params.missing();
        if !missing.is_empty() {
            return Err(Error::MissingValues(
                missing.into_iter().map(str::to_owned).collect(),
            ));
        }
        let violated = self.params.check();
        if !violated.is_empty() {
            return Err(Error::RequirementsViolated(violated));
        }

        let mut start_values = self.params.start_values();
        let start_time = match mode {
            SimMode::Initial => {
                start_values.extend(self.states.initial_values());
                0.0
            }
            SimMode::Continued => {
                if self.prev_final_time <= 0.0 {
                    return Err(Error::NoPreviousRun);
                }
                start_values.extend(self.states.continuation_values());
                self.prev_final_time
            }
        };

        let request = SimRequest {
            start_time,
            stop_time: start_time + time,
            ncp: self.ncp,
            start_values,
            outputs: self.outputs(),
        };
        let result = SimResult::new(self.engine.simulate(&request)?);
        let final_time = result.final_time()?;
        log::info!(
            "Simulated {mode:?} [{start_time}, {final_time}] with {} samples",
            result.len()
        );

        if let Some(figure) = &mut self.figure {
            let ctx = axis_context(&self.params, self.engine.model(), Some(&result));
            figure.add_run(&result, &ctx)?;
        }

        self.states.record_final(|state| result.last(state).ok());
        self.prev_final_time = final_time;
        Ok(self.result.insert(result))
    }

    /// Current value of a model variable or parameter location.
    pub fn model_get(&self, path: &str) -> Result<ParValue, Error> {
        lookup(&self.params, self.engine.model(), self.result.as_ref(), path)
    }
}

fn valid_time(time: f64) -> Result<f64, Error> {
    if time.is_finite() && time > 0.0 {
        Ok(time)
    } else {
        Err(Error::InvalidTime(time))
    }
}

/// Value of `path`: parameters from the parameter set, fixed variables from their start value
/// and anything else from the end of `result`.
pub(crate) fn lookup(
    params: &ParameterSet,
    info: &ModelInfo,
    result: Option<&SimResult>,
    path: &str,
) -> Result<ParValue, Error> {
    if let Some((_, value)) = params.parameter_at(path) {
        return Ok(*value);
    }
    let var = info
        .get(path)
        .ok_or_else(|| Error::UnknownVariable(path.to_owned()))?;
    if var.var_type == VarType::String {
        return Err(Error::UnsupportedType(path.to_owned()));
    }
    if var.is_fixed() {
        if let Some(start) = var.start {
            return Ok(start);
        }
    }
    match result {
        Some(result) if result.contains(path) => {
            let last = result.last(path)?;
            Ok(match var.var_type {
                VarType::Boolean => ParValue::Boolean(last != 0.0),
                VarType::Integer => ParValue::Integer(last as i64),
                _ => ParValue::Real(last),
            })
        }
        Some(_) => Err(Error::NotRecorded(path.to_owned())),
        None => Err(Error::NotYetSimulated(path.to_owned())),
    }
}

fn axis_context(params: &ParameterSet, info: &ModelInfo, result: Option<&SimResult>) -> AxisContext {
    let value = |path: &str| {
        lookup(params, info, result, path)
            .map(|v| v.as_f64())
            .ok()
    };
    AxisContext {
        start_desorption: params
            .get("start_desorption")
            .map(ParValue::as_f64)
            .unwrap_or_default(),
        scaling: value(plots::SCALING),
        flow_rate: value(plots::FLOW_RATE),
        column_volume: value(plots::COLUMN_VOLUME),
    }
}
