//! [`Engine`] backed by an FMI 2.0 FMU.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use arrow::record_batch::RecordBatch;
use fmi::{
    fmi2::{
        import::Fmi2Import,
        instance::{CoSimulation, Common, ModelExchange},
        schema::{self, ScalarVariableElement},
        Fmi2Error,
    },
    traits::FmiImport,
    EventFlags,
};
use iec_model::{
    platform::PROCESS_DIAGRAM, Causality, FmuKind, LibraryVersions, ModelInfo, ModelVariable,
    ParValue, VarType, Variability, Vendor,
};

#[cfg(feature = "me")]
use super::{
    solver::{Euler, Model, Solver},
    stepping::{EventModel, EventUpdate},
};
#[cfg(feature = "cs")]
use super::stepping::{Slave, StepOutcome};
use super::{
    description::VariableTexts, output_columns, stepping, Engine, Recorder, SimRequest,
    ValueSource,
};
use crate::Error;

/// Entry of the FMU archive holding the process diagram.
const ARCHIVE_DIAGRAM: &str = "documentation/processinfo.png";

/// Instance name passed to the FMU.
const INSTANCE_NAME: &str = "iec";

pub struct FmuEngine {
    path: PathBuf,
    import: Fmi2Import,
    info: ModelInfo,
    vendor: Vendor,
    tolerance: Option<f64>,
}

impl FmuEngine {
    /// Extract the FMU and read its model description. `kind` picks the interface when the FMU
    /// supports both.
    pub fn load(path: impl AsRef<Path>, kind: Option<FmuKind>) -> Result<Self, Error> {
        let path = path.as_ref();
        let import: Fmi2Import = fmi::import::from_path(path)?;
        let md = import.model_description();

        let has_cs = md.co_simulation.is_some();
        let has_me = md.model_exchange.is_some();
        let kind = match (kind, has_cs, has_me) {
            (Some(FmuKind::CoSimulation), true, _) | (None, true, false) => FmuKind::CoSimulation,
            (Some(FmuKind::ModelExchange), _, true) | (None, _, true) => FmuKind::ModelExchange,
            (Some(kind), ..) => {
                return Err(fmi::Error::UnsupportedFmuType(kind.to_string()).into());
            }
            (None, false, false) => {
                return Err(fmi::Error::UnsupportedInterface("none".to_owned()).into())
            }
        };

        let mut info = model_info(&import, kind);
        VariableTexts::from_archive(path)?.apply(&mut info.variables);
        let vendor = info
            .generation_tool
            .as_deref()
            .map(Vendor::from_generation_tool)
            .unwrap_or(Vendor::JModelica);
        let tolerance = md.default_experiment.as_ref().map(|de| de.tolerance);

        log::info!(
            "Loaded {} ({kind}, {}) with {} variables",
            info.model_name,
            info.generation_tool.as_deref().unwrap_or("unknown tool"),
            info.variables.len()
        );

        Ok(Self {
            path: path.to_owned(),
            import,
            info,
            vendor,
            tolerance,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Resolve start values to typed value references.
    fn start_values(&self, values: &[(String, ParValue)]) -> Result<Vec<StartValue>, Error> {
        values
            .iter()
            .map(|(name, value)| {
                let var = self
                    .info
                    .get(name)
                    .ok_or_else(|| Error::UnknownVariable(name.clone()))?;
                if var.var_type == VarType::String {
                    return Err(Error::UnsupportedType(name.clone()));
                }
                Ok(StartValue {
                    vr: var.value_reference,
                    var_type: var.var_type,
                    value: *value,
                })
            })
            .collect()
    }

    #[cfg(feature = "cs")]
    fn co_simulation(
        &self,
        request: &SimRequest,
        start_values: &[StartValue],
        mut recorder: Recorder,
    ) -> Result<RecordBatch, Error> {
        let mut inst = self
            .import
            .instantiate_cs(INSTANCE_NAME, false, log::log_enabled!(log::Level::Trace))?;
        apply_start_values(&mut inst, start_values)?;
        initialize(&mut inst, self.tolerance, request)?;

        let stats = stepping::co_simulation(&mut FmiValues(&mut inst), request, &mut recorder)?;
        log::debug!("{} steps to t = {}", stats.num_steps, stats.end_time);

        Common::terminate(&mut inst)?;
        recorder.finish()
    }

    #[cfg(not(feature = "cs"))]
    fn co_simulation(
        &self,
        _request: &SimRequest,
        _start_values: &[StartValue],
        _recorder: Recorder,
    ) -> Result<RecordBatch, Error> {
        Err(Error::KindNotEnabled(FmuKind::CoSimulation))
    }

    #[cfg(feature = "me")]
    fn model_exchange(
        &self,
        request: &SimRequest,
        start_values: &[StartValue],
        mut recorder: Recorder,
    ) -> Result<RecordBatch, Error> {
        let mut inst = self
            .import
            .instantiate_me(INSTANCE_NAME, false, log::log_enabled!(log::Level::Trace))?;
        apply_start_values(&mut inst, start_values)?;
        initialize(&mut inst, self.tolerance, request)?;

        let nx = self.info.states().count();
        let nz = self.import.model_description().num_event_indicators();
        let mut model = FmiModel {
            inst: &mut inst,
            flags: EventFlags::default(),
        };
        let mut solver = <Euler as Solver<_>>::new(request.start_time, nx, nz);
        let stats = stepping::model_exchange(&mut model, &mut solver, request, &mut recorder)?;
        log::debug!(
            "{} steps and {} events to t = {}",
            stats.num_steps,
            stats.num_events,
            stats.end_time
        );

        Common::terminate(&mut inst)?;
        recorder.finish()
    }

    #[cfg(not(feature = "me"))]
    fn model_exchange(
        &self,
        _request: &SimRequest,
        _start_values: &[StartValue],
        _recorder: Recorder,
    ) -> Result<RecordBatch, Error> {
        Err(Error::KindNotEnabled(FmuKind::ModelExchange))
    }
}

impl Engine for FmuEngine {
    fn model(&self) -> &ModelInfo {
        &self.info
    }

    fn library_versions(&self) -> LibraryVersions {
        LibraryVersions::for_vendor(self.vendor, &self.info)
    }

    fn simulate(&mut self, request: &SimRequest) -> Result<RecordBatch, Error> {
        log::debug!(
            "Simulating [{}, {}] with ncp = {}, {} start values, {} outputs",
            request.start_time,
            request.stop_time,
            request.ncp,
            request.start_values.len(),
            request.outputs.len()
        );
        let start_values = self.start_values(&request.start_values)?;
        let recorder = Recorder::new(
            output_columns(&self.info, &request.outputs)?,
            request.ncp + 1,
        )?;

        match self.info.kind {
            FmuKind::CoSimulation => self.co_simulation(request, &start_values, recorder),
            FmuKind::ModelExchange => self.model_exchange(request, &start_values, recorder),
        }
    }
}

struct StartValue {
    vr: u32,
    var_type: VarType,
    value: ParValue,
}

fn apply_start_values<Inst: Common>(inst: &mut Inst, values: &[StartValue]) -> Result<(), Error> {
    for sv in values {
        let vr = [sv.vr];
        match sv.var_type {
            VarType::Real => Common::set_real(inst, &vr, &[sv.value.as_f64()])?,
            VarType::Integer => Common::set_integer(inst, &vr, &[sv.value.as_f64() as i32])?,
            VarType::Boolean => Common::set_boolean(inst, &vr, &[i32::from(sv.value.as_bool())])?,
            VarType::String => continue,
        };
    }
    Ok(())
}

fn initialize<Inst: Common>(
    inst: &mut Inst,
    tolerance: Option<f64>,
    request: &SimRequest,
) -> Result<(), Error> {
    Common::setup_experiment(inst, tolerance, request.start_time, Some(request.stop_time))?;
    Common::enter_initialization_mode(inst)?;
    Common::exit_initialization_mode(inst)?;
    Ok(())
}

/// Reads outputs from an FMU instance, and steps it when it is a Co-Simulation slave.
struct FmiValues<'a, Inst>(&'a mut Inst);

impl<Inst: Common> ValueSource for FmiValues<'_, Inst> {
    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Result<(), Error> {
        Common::get_real(self.0, vrs, values)?;
        Ok(())
    }

    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Result<(), Error> {
        Common::get_integer(self.0, vrs, values)?;
        Ok(())
    }

    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Result<(), Error> {
        let mut raw = vec![0; values.len()];
        Common::get_boolean(self.0, vrs, &mut raw)?;
        for (value, raw) in values.iter_mut().zip(raw) {
            *value = raw != 0;
        }
        Ok(())
    }
}

#[cfg(feature = "cs")]
impl<Inst: Common + CoSimulation> Slave for FmiValues<'_, Inst> {
    fn do_step(&mut self, time: f64, h: f64) -> Result<StepOutcome, Error> {
        match CoSimulation::do_step(self.0, time, h, true) {
            Ok(_) => Ok(StepOutcome::Completed),
            Err(Fmi2Error::Discard) => {
                if CoSimulation::terminated(self.0)? {
                    Ok(StepOutcome::Terminated(CoSimulation::last_successful_time(
                        self.0,
                    )?))
                } else {
                    Ok(StepOutcome::Discarded)
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A Model Exchange instance with the event flags of its last discrete-state update.
#[cfg(feature = "me")]
struct FmiModel<'a, Inst> {
    inst: &'a mut Inst,
    flags: EventFlags,
}

#[cfg(feature = "me")]
impl<Inst: ModelExchange> Model for FmiModel<'_, Inst> {
    fn get_continuous_states(&mut self, x: &mut [f64]) -> Result<(), Fmi2Error> {
        ModelExchange::get_continuous_states(self.inst, x).map(|_| ())
    }

    fn set_continuous_states(&mut self, x: &[f64]) -> Result<(), Fmi2Error> {
        ModelExchange::set_continuous_states(self.inst, x).map(|_| ())
    }

    fn get_derivatives(&mut self, dx: &mut [f64]) -> Result<(), Fmi2Error> {
        ModelExchange::get_derivatives(self.inst, dx).map(|_| ())
    }

    fn get_event_indicators(&mut self, z: &mut [f64]) -> Result<(), Fmi2Error> {
        ModelExchange::get_event_indicators(self.inst, z).map(|_| ())
    }
}

#[cfg(feature = "me")]
impl<Inst: Common> ValueSource for FmiModel<'_, Inst> {
    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Result<(), Error> {
        FmiValues(&mut *self.inst).get_real(vrs, values)
    }

    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Result<(), Error> {
        FmiValues(&mut *self.inst).get_integer(vrs, values)
    }

    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Result<(), Error> {
        FmiValues(&mut *self.inst).get_boolean(vrs, values)
    }
}

#[cfg(feature = "me")]
impl<Inst: Common + ModelExchange> EventModel for FmiModel<'_, Inst> {
    fn set_time(&mut self, time: f64) -> Result<(), Error> {
        ModelExchange::set_time(self.inst, time)?;
        Ok(())
    }

    fn completed_integrator_step(&mut self) -> Result<(bool, bool), Error> {
        let mut enter_event_mode = false;
        let mut terminate = false;
        ModelExchange::completed_integrator_step(
            self.inst,
            true,
            &mut enter_event_mode,
            &mut terminate,
        )?;
        Ok((enter_event_mode, terminate))
    }

    fn enter_event_mode(&mut self) -> Result<(), Error> {
        ModelExchange::enter_event_mode(self.inst)?;
        Ok(())
    }

    fn update_discrete_states(&mut self) -> Result<EventUpdate, Error> {
        self.flags.discrete_states_need_update = true;
        while self.flags.discrete_states_need_update && !self.flags.terminate_simulation {
            ModelExchange::new_discrete_states(self.inst, &mut self.flags)?;
        }
        Ok(EventUpdate {
            next_event_time: self.flags.next_event_time,
            terminate: self.flags.terminate_simulation,
        })
    }

    fn enter_continuous_time_mode(&mut self) -> Result<(), Error> {
        ModelExchange::enter_continuous_time_mode(self.inst)?;
        Ok(())
    }
}

/// Build the variable catalogue from the FMI 2.0 model description.
fn model_info(import: &Fmi2Import, kind: FmuKind) -> ModelInfo {
    let md = import.model_description();
    let variables = md
        .model_variables
        .variables
        .iter()
        .map(|sv| {
            let mut var = ModelVariable::new(&sv.name, sv.value_reference, VarType::Real);
            var.description = Some(sv.description.clone()).filter(|d| !d.is_empty());
            var.causality = match sv.causality {
                schema::Causality::Parameter => Causality::Parameter,
                schema::Causality::CalculatedParameter => Causality::CalculatedParameter,
                schema::Causality::Input => Causality::Input,
                schema::Causality::Output => Causality::Output,
                schema::Causality::Local => Causality::Local,
                schema::Causality::Independent => Causality::Independent,
                schema::Causality::Unknown => Causality::Unknown,
            };
            var.variability = match sv.variability {
                schema::Variability::Constant => Variability::Constant,
                schema::Variability::Fixed => Variability::Fixed,
                schema::Variability::Tunable => Variability::Tunable,
                schema::Variability::Discrete => Variability::Discrete,
                schema::Variability::Continuous => Variability::Continuous,
            };
            match &sv.elem {
                ScalarVariableElement::Real(real) => {
                    var.start = Some(ParValue::Real(real.start));
                    var.derivative_of = real.derivative.map(|idx| idx as usize);
                }
                ScalarVariableElement::Integer(int) => {
                    var.var_type = VarType::Integer;
                    var.start = Some(ParValue::Integer(i64::from(int.start)));
                }
                ScalarVariableElement::Boolean(b) => {
                    var.var_type = VarType::Boolean;
                    var.start = Some(ParValue::Boolean(b.start));
                }
                ScalarVariableElement::Enumeration => {
                    var.var_type = VarType::Integer;
                }
                ScalarVariableElement::String => {
                    var.var_type = VarType::String;
                }
            }
            var
        })
        .collect();

    ModelInfo {
        model_name: md.model_name.clone(),
        fmi_version: md.fmi_version.clone(),
        generation_tool: Some(md.generation_tool.clone()).filter(|t| !t.is_empty()),
        guid: md.guid.clone(),
        kind,
        variables,
    }
}

/// Where the process diagram came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramSource {
    Archive,
    Disk,
}

/// Write the process diagram of the FMU at `fmu` to `out`.
///
/// The diagram is taken from the FMU's documentation when present, otherwise from the picture
/// shipped next to the FMU.
pub fn extract_process_diagram(fmu: &Path, out: &Path) -> Result<DiagramSource, Error> {
    let file = File::open(fmu)?;
    let mut zip = zip::ZipArchive::new(file)?;

    match zip.by_name(ARCHIVE_DIAGRAM) {
        Ok(mut entry) => {
            let mut target = File::create(out)?;
            std::io::copy(&mut entry, &mut target)?;
            log::debug!("Extracted {ARCHIVE_DIAGRAM} from {}", fmu.display());
            Ok(DiagramSource::Archive)
        }
        Err(zip::result::ZipError::FileNotFound) => {
            let on_disk = fmu.with_file_name(PROCESS_DIAGRAM);
            if !on_disk.exists() {
                return Err(Error::NotFound(on_disk.display().to_string()));
            }
            std::fs::copy(&on_disk, out)?;
            log::debug!("Copied {}", on_disk.display());
            Ok(DiagramSource::Disk)
        }
        Err(e) => Err(e.into()),
    }
}
