//! Result table of one simulation run.

use std::path::Path;

use arrow::{
    array::{Array, AsArray},
    compute::cast,
    datatypes::{DataType, Float64Type},
    record_batch::RecordBatch,
};

use crate::Error;

/// Number of sections the column is discretized into.
pub const NUM_SECTIONS: usize = 8;

#[derive(Debug, Clone)]
pub struct SimResult {
    batch: RecordBatch,
}

impl SimResult {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.batch.column_by_name(name).is_some()
    }

    pub fn time(&self) -> Result<Vec<f64>, Error> {
        self.series("time")
    }

    /// Values of a recorded column as `f64`. Integers and booleans are converted, nulls become
    /// NaN.
    pub fn series(&self, name: &str) -> Result<Vec<f64>, Error> {
        let column = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| Error::NotRecorded(name.to_owned()))?;
        let column = cast(column, &DataType::Float64)?;
        let values = column.as_primitive::<Float64Type>();
        Ok(values
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// Value of `name` at the end of the run.
    pub fn last(&self, name: &str) -> Result<f64, Error> {
        let column = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| Error::NotRecorded(name.to_owned()))?;
        if column.is_empty() {
            return Ok(f64::NAN);
        }
        let last = column.slice(column.len() - 1, 1);
        let last = cast(&last, &DataType::Float64)?;
        let last = last.as_primitive::<Float64Type>();
        Ok(if last.is_null(0) {
            f64::NAN
        } else {
            last.value(0)
        })
    }

    pub fn final_time(&self) -> Result<f64, Error> {
        self.last("time")
    }

    /// Name of the column holding concentration `component` of column section `section`.
    pub fn section_variable(section: usize, component: usize) -> String {
        format!("column.column_section[{section}].c[{component}]")
    }

    /// Concentration profile of `component` along the column at sample `sample`. Samples past
    /// the end are clamped to the last one.
    pub fn profile(&self, sample: usize, component: usize) -> Result<[f64; NUM_SECTIONS], Error> {
        let index = sample.min(self.len().saturating_sub(1));
        let mut profile = [f64::NAN; NUM_SECTIONS];
        for (section, value) in profile.iter_mut().enumerate() {
            let series = self.series(&Self::section_variable(section + 1, component))?;
            if let Some(v) = series.get(index) {
                *value = *v;
            }
        }
        Ok(profile)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        let file = std::fs::File::create(path)?;
        let mut writer = arrow::csv::Writer::new(file);
        writer.write(&self.batch)?;
        log::info!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    /// The table as text.
    pub fn pretty(&self) -> Result<String, Error> {
        Ok(arrow::util::pretty::pretty_format_batches(std::slice::from_ref(&self.batch))?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::{ArrayRef, BooleanArray, Float64Array, Int32Array},
        datatypes::{Field, Schema},
    };
    use float_cmp::assert_approx_eq;
    use std::sync::Arc;

    fn result() -> SimResult {
        let mut fields = vec![
            Field::new("time", DataType::Float64, false),
            Field::new("n", DataType::Int32, true),
            Field::new("on", DataType::Boolean, false),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(vec![0.0, 0.5, 1.0])),
            Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])),
            Arc::new(BooleanArray::from(vec![false, true, true])),
        ];
        for section in 1..=NUM_SECTIONS {
            fields.push(Field::new(
                SimResult::section_variable(section, 4),
                DataType::Float64,
                false,
            ));
            let s = section as f64;
            columns.push(Arc::new(Float64Array::from(vec![0.0, s, 10.0 * s])));
        }
        SimResult::new(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap())
    }

    #[test]
    fn test_series() {
        let result = result();
        assert_eq!(result.len(), 3);
        assert_eq!(result.time().unwrap(), vec![0.0, 0.5, 1.0]);
        let n = result.series("n").unwrap();
        assert_eq!(n[0], 1.0);
        assert!(n[1].is_nan());
        assert_eq!(result.series("on").unwrap(), vec![0.0, 1.0, 1.0]);
        assert!(matches!(
            result.series("missing"),
            Err(Error::NotRecorded(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_last() {
        let result = result();
        assert_approx_eq!(f64, result.final_time().unwrap(), 1.0);
        assert_approx_eq!(f64, result.last("n").unwrap(), 3.0);
        assert_approx_eq!(f64, result.last("on").unwrap(), 1.0);
    }

    #[test]
    fn test_profile() {
        let result = result();
        let profile = result.profile(1, 4).unwrap();
        assert_eq!(profile, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        // Sample 500 of a three row result is the last row
        assert_eq!(result.profile(500, 4).unwrap()[7], 80.0);
        assert!(result.profile(0, 5).is_err());
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        result().write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("time,n,on,"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_pretty() {
        let text = result().pretty().unwrap();
        assert!(text.contains("| time"));
    }
}
