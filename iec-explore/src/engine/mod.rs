//! The boundary to the simulation engine.
//!
//! A simulation takes a time span, start values for model variables and a selection of outputs,
//! and returns a table with a `time` column followed by one column per output.

use std::sync::Arc;

use arrow::{
    array::{self, ArrayBuilder, BooleanBuilder, Float64Builder, Int32Builder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use iec_model::{LibraryVersions, ModelInfo, ParValue, VarType};

use crate::Error;

mod description;
mod fmu;
pub mod solver;
pub mod stepping;

pub use fmu::{extract_process_diagram, DiagramSource, FmuEngine};

pub trait Engine {
    /// Variables and metadata of the loaded model.
    fn model(&self) -> &ModelInfo;

    fn library_versions(&self) -> LibraryVersions;

    /// Run one simulation.
    fn simulate(&mut self, request: &SimRequest) -> Result<RecordBatch, Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimRequest {
    pub start_time: f64,
    pub stop_time: f64,
    /// Number of communication intervals, the result has `ncp + 1` rows
    pub ncp: usize,
    /// Model path and value, applied in order so that later entries win
    pub start_values: Vec<(String, ParValue)>,
    pub outputs: Vec<String>,
}

impl SimRequest {
    pub fn output_interval(&self) -> f64 {
        (self.stop_time - self.start_time) / self.ncp.max(1) as f64
    }

    /// Time of communication point `step`.
    pub fn time_at(&self, step: usize) -> f64 {
        if step >= self.ncp {
            self.stop_time
        } else {
            self.start_time + step as f64 * self.output_interval()
        }
    }

    /// Check that the grid is finite and moves forward.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.start_time.is_finite() {
            return Err(Error::InvalidTime(self.start_time));
        }
        let span = self.stop_time - self.start_time;
        if !span.is_finite() || span <= 0.0 {
            return Err(Error::InvalidTime(span));
        }
        if self.ncp == 0 {
            return Err(Error::InvalidCommand(
                "At least one communication interval is needed".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A model variable recorded as an output column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    pub value_reference: u32,
    pub var_type: VarType,
}

impl OutputColumn {
    fn data_type(&self) -> Result<DataType, Error> {
        match self.var_type {
            VarType::Real => Ok(DataType::Float64),
            VarType::Integer => Ok(DataType::Int32),
            VarType::Boolean => Ok(DataType::Boolean),
            VarType::String => Err(Error::UnsupportedType(self.name.clone())),
        }
    }
}

/// Look up the requested outputs in the model.
pub fn output_columns<S: AsRef<str>>(
    info: &ModelInfo,
    names: &[S],
) -> Result<Vec<OutputColumn>, Error> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            info.get(name)
                .map(|v| OutputColumn {
                    name: v.name.clone(),
                    value_reference: v.value_reference,
                    var_type: v.var_type,
                })
                .ok_or_else(|| Error::UnknownVariable(name.to_owned()))
        })
        .collect()
}

/// Anything values can be read from by value reference.
pub trait ValueSource {
    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Result<(), Error>;
    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Result<(), Error>;
    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Result<(), Error>;
}

/// Collects the outputs at each communication point into Arrow columns.
pub struct Recorder {
    schema: Arc<Schema>,
    columns: Vec<OutputColumn>,
    time: Float64Builder,
    builders: Vec<Box<dyn ArrayBuilder>>,
}

impl Recorder {
    pub fn new(columns: Vec<OutputColumn>, capacity: usize) -> Result<Self, Error> {
        let fields = std::iter::once(Ok(Field::new("time", DataType::Float64, false)))
            .chain(
                columns
                    .iter()
                    .map(|c| Ok(Field::new(&c.name, c.data_type()?, false))),
            )
            .collect::<Result<Vec<_>, Error>>()?;

        let builders = fields
            .iter()
            .skip(1)
            .map(|field| array::make_builder(field.data_type(), capacity))
            .collect();

        Ok(Self {
            schema: Arc::new(Schema::new(fields)),
            columns,
            time: Float64Builder::with_capacity(capacity),
            builders,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.time.len()
    }

    /// Record all outputs at `time`.
    pub fn record(&mut self, time: f64, source: &mut impl ValueSource) -> Result<(), Error> {
        log::trace!("Recording variables at time {time}");
        self.time.append_value(time);

        for (column, builder) in self.columns.iter().zip(self.builders.iter_mut()) {
            let vr = [column.value_reference];
            let builder = (**builder).as_any_mut();
            match column.var_type {
                VarType::Real => {
                    let mut value = [0.0];
                    source.get_real(&vr, &mut value)?;
                    if let Some(b) = builder.downcast_mut::<Float64Builder>() {
                        b.append_value(value[0]);
                    }
                }
                VarType::Integer => {
                    let mut value = [0];
                    source.get_integer(&vr, &mut value)?;
                    if let Some(b) = builder.downcast_mut::<Int32Builder>() {
                        b.append_value(value[0]);
                    }
                }
                VarType::Boolean => {
                    let mut value = [false];
                    source.get_boolean(&vr, &mut value)?;
                    if let Some(b) = builder.downcast_mut::<BooleanBuilder>() {
                        b.append_value(value[0]);
                    }
                }
                VarType::String => return Err(Error::UnsupportedType(column.name.clone())),
            }
        }
        Ok(())
    }

    /// Finish recording and return the table.
    pub fn finish(mut self) -> Result<RecordBatch, Error> {
        let columns = std::iter::once(Arc::new(self.time.finish()) as array::ArrayRef)
            .chain(self.builders.iter_mut().map(|b| b.finish()))
            .collect::<Vec<_>>();
        Ok(RecordBatch::try_new(self.schema, columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::AsArray;
    use arrow::datatypes::{Float64Type, Int32Type};
    use iec_model::{FmuKind, ModelVariable};

    struct Ramp {
        time: f64,
    }

    impl ValueSource for Ramp {
        fn get_real(&mut self, _vrs: &[u32], values: &mut [f64]) -> Result<(), Error> {
            values.fill(2.0 * self.time);
            Ok(())
        }

        fn get_integer(&mut self, _vrs: &[u32], values: &mut [i32]) -> Result<(), Error> {
            values.fill(self.time as i32);
            Ok(())
        }

        fn get_boolean(&mut self, _vrs: &[u32], values: &mut [bool]) -> Result<(), Error> {
            values.fill(self.time > 0.5);
            Ok(())
        }
    }

    fn info() -> ModelInfo {
        ModelInfo {
            model_name: "test".to_owned(),
            fmi_version: "2.0".to_owned(),
            generation_tool: None,
            guid: String::new(),
            kind: FmuKind::CoSimulation,
            variables: vec![
                ModelVariable::new("x", 1, VarType::Real),
                ModelVariable::new("n", 2, VarType::Integer),
                ModelVariable::new("on", 3, VarType::Boolean),
                ModelVariable::new("label", 4, VarType::String),
            ],
        }
    }

    #[test]
    fn test_time_grid() {
        let request = SimRequest {
            start_time: 100.0,
            stop_time: 150.0,
            ncp: 500,
            start_values: vec![],
            outputs: vec![],
        };
        assert_eq!(request.output_interval(), 0.1);
        assert_eq!(request.time_at(0), 100.0);
        assert_eq!(request.time_at(500), 150.0);
        assert!(request.validate().is_ok());

        let backwards = SimRequest {
            stop_time: 50.0,
            ..request.clone()
        };
        assert!(matches!(backwards.validate(), Err(Error::InvalidTime(span)) if span == -50.0));
        let no_intervals = SimRequest { ncp: 0, ..request };
        assert!(matches!(
            no_intervals.validate(),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_output_columns() {
        let columns = output_columns(&info(), &["on", "x"]).unwrap();
        assert_eq!(columns[0].value_reference, 3);
        assert_eq!(columns[1].var_type, VarType::Real);
        assert!(matches!(
            output_columns(&info(), &["y"]),
            Err(Error::UnknownVariable(name)) if name == "y"
        ));
    }

    #[test]
    fn test_recorder() {
        let columns = output_columns(&info(), &["x", "n", "on"]).unwrap();
        let mut recorder = Recorder::new(columns, 3).unwrap();
        for time in [0.0, 1.0] {
            recorder.record(time, &mut Ramp { time }).unwrap();
        }
        assert_eq!(recorder.num_rows(), 2);

        let batch = recorder.finish().unwrap();
        assert_eq!(batch.schema().field(0).name(), "time");
        assert!(!batch.schema().field(0).is_nullable());
        let x = batch.column_by_name("x").unwrap().as_primitive::<Float64Type>();
        assert_eq!(x.values().to_vec(), vec![0.0, 2.0]);
        let n = batch.column_by_name("n").unwrap().as_primitive::<Int32Type>();
        assert_eq!(n.value(1), 1);
        assert!(batch.column_by_name("on").unwrap().as_boolean().value(1));
    }

    #[test]
    fn test_recorder_rejects_strings() {
        let columns = output_columns(&info(), &["label"]).unwrap();
        assert!(matches!(
            Recorder::new(columns, 1),
            Err(Error::UnsupportedType(_))
        ));
    }
}
