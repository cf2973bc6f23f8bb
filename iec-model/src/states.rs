//! Continuous states of the model and their start parameters.
//!
//! After each run the final value of every state is kept, so that a continued run can start
//! from where the previous one stopped by writing those values into the corresponding start
//! parameters.

use crate::{variable::ModelInfo, Error, ParValue};

/// Name of the start parameter that initializes `state`.
///
/// * `tank.V` becomes `tank.V_start`
/// * `column.column_section[3].c[12]` becomes `column.column_section[3].c_start[12]`
/// * states of PI/PID controller blocks, which end in `I.y` or `D.x`, use the `I_start` and
///   `D_start` parameters of the enclosing controller
pub fn start_name(state: &str) -> Result<String, Error> {
    if !state.ends_with(']') {
        let controller_prefix = || {
            state
                .len()
                .checked_sub(10)
                .and_then(|end| state.get(..end))
                .unwrap_or_default()
        };
        return Ok(if state.ends_with("I.y") {
            format!("{}I_start", controller_prefix())
        } else if state.ends_with("D.x") {
            format!("{}D_start", controller_prefix())
        } else {
            format!("{state}_start")
        });
    }

    // Indices of one to three digits, `[n]` ... `[nnn]`
    match state.rfind('[') {
        Some(open) if (3..=5).contains(&(state.len() - open)) => {
            let (base, index) = state.split_at(open);
            Ok(format!("{base}_start{index}"))
        }
        _ => Err(Error::TooManyStates(state.to_owned())),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub name: String,
    pub start_name: String,
    /// Value set with `init()`, applied on the next initial run
    pub initial: Option<f64>,
    /// Value at the end of the last run
    pub final_value: Option<f64>,
}

/// The state dictionary.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    entries: Vec<StateEntry>,
}

impl StateDict {
    pub fn new<S: AsRef<str>>(states: impl IntoIterator<Item = S>) -> Result<Self, Error> {
        let entries = states
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                Ok(StateEntry {
                    name: name.to_owned(),
                    start_name: start_name(name)?,
                    initial: None,
                    final_value: None,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self { entries })
    }

    /// Build the dictionary from the continuous states listed in the model description.
    pub fn from_model(info: &ModelInfo) -> Result<Self, Error> {
        let states = info.states().map(|v| v.name.as_str()).collect::<Vec<_>>();
        log::debug!("Model has {} continuous states", states.len());
        Self::new(states)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Final value of `state` after the last run.
    pub fn get(&self, state: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.name == state)
            .and_then(|e| e.final_value)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name || e.start_name == name)
    }

    /// Set initial values, addressed either by state name or by start parameter name. Nothing
    /// is changed if any of the names is unknown.
    pub fn init<S: AsRef<str>>(
        &mut self,
        updates: impl IntoIterator<Item = (S, ParValue)>,
    ) -> Result<(), Error> {
        let resolved = updates
            .into_iter()
            .map(|(name, value)| {
                let name = name.as_ref();
                self.position(name)
                    .map(|idx| (idx, value.as_f64()))
                    .ok_or_else(|| Error::UnknownState(name.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (idx, value) in resolved {
            log::debug!("init {} = {value}", self.entries[idx].start_name);
            self.entries[idx].initial = Some(value);
        }
        Ok(())
    }

    /// Start values for an initial run: only the states given with `init()`.
    pub fn initial_values(&self) -> Vec<(String, ParValue)> {
        self.entries
            .iter()
            .filter_map(|e| e.initial.map(|v| (e.start_name.clone(), ParValue::Real(v))))
            .collect()
    }

    /// Start values for a continued run: every state starts at its last final value.
    pub fn continuation_values(&self) -> Vec<(String, ParValue)> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.final_value
                    .map(|v| (e.start_name.clone(), ParValue::Real(v)))
            })
            .collect()
    }

    /// Store the final values of a run.
    pub fn record_final(&mut self, mut final_value: impl FnMut(&str) -> Option<f64>) {
        for entry in &mut self.entries {
            entry.final_value = final_value(&entry.name);
        }
    }
}
