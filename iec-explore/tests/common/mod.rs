//! A stand-in engine with a small analytic model of the column system.

#![allow(dead_code)]

use arrow::record_batch::RecordBatch;
use iec_explore::{
    engine::{output_columns, Recorder, ValueSource},
    plots::{PlotType, COLUMN_VOLUME, FLOW_RATE, PUMPED_VOLUME, SCALING},
    Engine, Error, SimRequest,
};
use iec_model::{
    Causality, FmuKind, LibraryVersions, ModelInfo, ModelVariable, ParValue, ParameterSet,
    VarType, Variability,
};
use itertools::Itertools;

pub const HARVEST_VOLUME: &str = "tank_harvest.V";
pub const HARVEST_VOLUME_START: &str = "tank_harvest.V_start";
pub const POOLING: &str = "control_pooling.out";

/// Growth of the harvest volume per minute.
pub const HARVEST_RATE: f64 = 0.01;
pub const FLOW: f64 = 2.0;
pub const SCALE: f64 = 1.0;
pub const CV: f64 = 8.0;

/// Time from which the pooling valve is open.
pub const POOLING_FROM: f64 = 50.0;

pub struct MockEngine {
    info: ModelInfo,
    /// Every request handed to `simulate`
    pub requests: Vec<SimRequest>,
}

impl MockEngine {
    pub fn new() -> Self {
        let mut variables: Vec<ModelVariable> = Vec::new();

        let mut harvest = ModelVariable::new(HARVEST_VOLUME, 0, VarType::Real);
        harvest.description = Some("Harvest tank volume".to_owned());
        harvest.unit = Some("mL".to_owned());
        push(&mut variables, harvest);
        let mut der = ModelVariable::new("der(tank_harvest.V)", 0, VarType::Real);
        der.derivative_of = Some(1);
        push(&mut variables, der);
        push(&mut variables, parameter(HARVEST_VOLUME_START, ParValue::Real(0.0)));

        for (name, value) in [(COLUMN_VOLUME, CV), (FLOW_RATE, FLOW), (SCALING, SCALE)] {
            let mut var = ModelVariable::new(name, 0, VarType::Real);
            var.variability = Variability::Constant;
            var.start = Some(ParValue::Real(value));
            push(&mut variables, var);
        }

        for (name, value, location) in ParameterSet::column_system().iter() {
            if variables.iter().all(|v| v.name != location) {
                let mut var = parameter(location, *value);
                var.description = Some(format!("Parameter {name}"));
                push(&mut variables, var);
            }
        }

        let mut pooling = ModelVariable::new(POOLING, 0, VarType::Boolean);
        pooling.variability = Variability::Discrete;
        push(&mut variables, pooling);

        let mut mw = ModelVariable::new("liquidphase.mw[1]", 0, VarType::Real);
        mw.variability = Variability::Constant;
        mw.start = Some(ParValue::Real(150000.0));
        push(&mut variables, mw);

        let recorded = PlotType::ALL
            .iter()
            .flat_map(|p| p.layout().variables())
            .chain(
                ParameterSet::column_system()
                    .key_variables()
                    .iter()
                    .cloned(),
            )
            .chain(std::iter::once(PUMPED_VOLUME.to_owned()))
            .unique()
            .collect_vec();
        for name in recorded {
            if variables.iter().all(|v| v.name != name) {
                push(&mut variables, ModelVariable::new(&name, 0, VarType::Real));
            }
        }

        Self {
            info: ModelInfo {
                model_name: "BPL_IEC.Column_system".to_owned(),
                fmi_version: "2.0".to_owned(),
                generation_tool: Some("OpenModelica Compiler".to_owned()),
                guid: "{mock}".to_owned(),
                kind: FmuKind::ModelExchange,
                variables,
            },
            requests: Vec::new(),
        }
    }

    /// The same model without the variable `name`.
    pub fn without(mut self, name: &str) -> Self {
        self.info.variables.retain(|v| v.name != name);
        self
    }

    pub fn last_request(&self) -> Option<&SimRequest> {
        self.requests.last()
    }
}

fn push(variables: &mut Vec<ModelVariable>, mut var: ModelVariable) {
    var.value_reference = variables.len() as u32;
    variables.push(var);
}

fn parameter(name: &str, value: ParValue) -> ModelVariable {
    let var_type = match value {
        ParValue::Real(_) => VarType::Real,
        ParValue::Integer(_) => VarType::Integer,
        ParValue::Boolean(_) => VarType::Boolean,
    };
    let mut var = ModelVariable::new(name, 0, var_type);
    var.causality = Causality::Parameter;
    var.variability = Variability::Fixed;
    var.start = Some(value);
    var
}

impl Engine for MockEngine {
    fn model(&self) -> &ModelInfo {
        &self.info
    }

    fn library_versions(&self) -> LibraryVersions {
        LibraryVersions::open_modelica()
    }

    fn simulate(&mut self, request: &SimRequest) -> Result<RecordBatch, Error> {
        self.requests.push(request.clone());

        let start_of = |name: &str| {
            request
                .start_values
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_f64())
        };
        let vr_of = |name: &str| self.info.get(name).map(|v| v.value_reference);

        let columns = output_columns(&self.info, &request.outputs)?;
        let mut recorder = Recorder::new(columns, request.ncp + 1)?;
        for step in 0..=request.ncp {
            let time = request.time_at(step);
            let mut source = Signals {
                time,
                elapsed: time - request.start_time,
                harvest: (vr_of(HARVEST_VOLUME), start_of(HARVEST_VOLUME_START).unwrap_or(0.0)),
                pumped: vr_of(PUMPED_VOLUME),
            };
            recorder.record(time, &mut source)?;
        }
        recorder.finish()
    }
}

/// Values of the mock model at one time.
struct Signals {
    time: f64,
    elapsed: f64,
    harvest: (Option<u32>, f64),
    pumped: Option<u32>,
}

impl ValueSource for Signals {
    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Result<(), Error> {
        for (vr, value) in vrs.iter().zip(values.iter_mut()) {
            *value = if Some(*vr) == self.harvest.0 {
                self.harvest.1 + HARVEST_RATE * self.elapsed
            } else if Some(*vr) == self.pumped {
                FLOW * self.time
            } else {
                1e-3 * f64::from(*vr) * self.time
            };
        }
        Ok(())
    }

    fn get_integer(&mut self, _vrs: &[u32], values: &mut [i32]) -> Result<(), Error> {
        values.fill(self.time as i32);
        Ok(())
    }

    fn get_boolean(&mut self, _vrs: &[u32], values: &mut [bool]) -> Result<(), Error> {
        values.fill(self.time >= POOLING_FROM);
        Ok(())
    }
}
