//! The parameter dictionary of the column system.
//!
//! Parameters are addressed by a short friendly name (`k1`, `start_desorption`, ...) and each
//! one maps to the path of the variable inside the model (`column.k1`,
//! `control_desorption_buffer.start`, ...). A few extra locations are kept only for lookups by
//! `describe()` and `model_get()`; they have no value of their own.

use std::fmt::Display;

use itertools::Itertools;

use crate::Error;

/// A parameter value as set by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParValue {
    Real(f64),
    Integer(i64),
    Boolean(bool),
}

impl ParValue {
    /// Parse a value from text. `true`/`false` give a Boolean, an integer literal gives an
    /// Integer and anything else that parses as a float gives a Real.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("true") {
            Some(Self::Boolean(true))
        } else if text.eq_ignore_ascii_case("false") {
            Some(Self::Boolean(false))
        } else if let Ok(i) = text.parse::<i64>() {
            Some(Self::Integer(i))
        } else {
            text.parse::<f64>().ok().map(Self::Real)
        }
    }

    /// Numeric view of the value, booleans map to 0 and 1.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Real(v) => *v,
            Self::Integer(v) => *v as f64,
            Self::Boolean(v) => f64::from(u8::from(*v)),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Self::Boolean(v) => *v,
            other => other.as_f64() != 0.0,
        }
    }

    /// A real value of NaN marks a parameter without a usable value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Real(v) if v.is_nan())
    }

    /// Convert `self` into the kind of `current`, as long as no information is lost.
    fn coerce_like(self, current: &ParValue) -> Option<ParValue> {
        match (current, self) {
            (Self::Boolean(_), Self::Boolean(_)) => Some(self),
            (Self::Boolean(_), Self::Integer(i @ (0 | 1))) => Some(Self::Boolean(i == 1)),
            (Self::Boolean(_), Self::Real(r)) if r == 0.0 || r == 1.0 => {
                Some(Self::Boolean(r == 1.0))
            }
            (Self::Boolean(_), _) => None,
            (_, Self::Boolean(_)) => None,
            (Self::Real(_), Self::Integer(i)) => Some(Self::Real(i as f64)),
            _ => Some(self),
        }
    }

    /// Format with reals rounded to `decimals` places.
    pub fn display_rounded(&self, decimals: usize) -> String {
        match self {
            Self::Real(v) => format!("{:.*}", decimals, v),
            other => other.to_string(),
        }
    }
}

impl Display for ParValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<i64> for ParValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ParValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Split a `name=value` string into its parts.
pub fn parse_assignment(text: &str) -> Result<(String, ParValue), Error> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| Error::InvalidAssignment(text.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidAssignment(text.to_owned()));
    }
    let value = ParValue::parse(value).ok_or_else(|| Error::InvalidValue {
        name: name.to_owned(),
        value: value.trim().to_owned(),
    })?;
    Ok((name.to_owned(), value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Less,
    Greater,
}

/// An ordering that must hold between two parameters, mostly to keep the hysteresis of the
/// phase controllers well defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub lhs: String,
    pub relation: Relation,
    pub rhs: String,
}

impl Requirement {
    pub fn new(lhs: &str, relation: Relation, rhs: &str) -> Self {
        Self {
            lhs: lhs.to_owned(),
            relation,
            rhs: rhs.to_owned(),
        }
    }

    /// Evaluate against `params`. A requirement naming an unknown parameter does not hold.
    pub fn holds(&self, params: &ParameterSet) -> bool {
        match (params.get(&self.lhs), params.get(&self.rhs)) {
            (Some(lhs), Some(rhs)) => {
                let (lhs, rhs) = (lhs.as_f64(), rhs.as_f64());
                match self.relation {
                    Relation::Less => lhs < rhs,
                    Relation::Greater => lhs > rhs,
                }
            }
            _ => false,
        }
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.relation {
            Relation::Less => "<",
            Relation::Greater => ">",
        };
        write!(f, "{} {op} {}", self.lhs, self.rhs)
    }
}

/// Parameter dictionary, parameter locations, key variables and requirements.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    /// Friendly name and current value, in declaration order
    values: Vec<(String, ParValue)>,
    /// Friendly name to model path, parameters first followed by the describe-only extras
    locations: Vec<(String, String)>,
    /// Model paths of variables that are interesting to inspect but are not parameters
    key_variables: Vec<String>,
    requirements: Vec<Requirement>,
}

impl ParameterSet {
    /// An empty set, mostly useful for tests.
    pub fn empty() -> Self {
        Self {
            values: Vec::new(),
            locations: Vec::new(),
            key_variables: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Declare a parameter with its default value and model location.
    pub fn insert(&mut self, name: &str, value: impl Into<ParValue>, location: &str) {
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_owned(), value)),
        }
        self.set_location(name, location);
    }

    fn set_location(&mut self, name: &str, location: &str) {
        match self.locations.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = location.to_owned(),
            None => self.locations.push((name.to_owned(), location.to_owned())),
        }
    }

    /// Declare a location that is only used for lookups and register its path as a key
    /// variable.
    pub fn insert_key_variable(&mut self, name: &str, location: &str) {
        self.set_location(name, location);
        if !self.key_variables.iter().any(|k| k == location) {
            self.key_variables.push(location.to_owned());
        }
    }

    pub fn add_requirement(&mut self, requirement: Requirement) {
        self.requirements.push(requirement);
    }

    pub fn get(&self, name: &str) -> Option<&ParValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Model path of a parameter or describe-only location.
    pub fn location(&self, name: &str) -> Option<&str> {
        self.locations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l.as_str())
    }

    /// The parameter that is stored at the model path `location`, if any.
    pub fn parameter_at(&self, location: &str) -> Option<(&str, &ParValue)> {
        self.values.iter().find_map(|(name, value)| {
            (self.location(name) == Some(location)).then_some((name.as_str(), value))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value, location)` for all parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParValue, &str)> + '_ {
        self.values.iter().map(|(name, value)| {
            (
                name.as_str(),
                value,
                self.location(name).unwrap_or(name.as_str()),
            )
        })
    }

    pub fn key_variables(&self) -> &[String] {
        &self.key_variables
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Resolve a user supplied name to a parameter name. Exact matches win, otherwise a unique
    /// case-insensitive match is accepted.
    pub fn resolve(&self, name: &str) -> Result<&str, Error> {
        if let Some((n, _)) = self.values.iter().find(|(n, _)| n == name) {
            return Ok(n);
        }
        let candidates = self
            .values
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(n, _)| n.as_str())
            .collect_vec();
        match candidates.as_slice() {
            [single] => Ok(*single),
            [] => Err(Error::UnknownParameter(name.to_owned())),
            many => Err(Error::AmbiguousParameter(
                name.to_owned(),
                many.iter().map(|s| s.to_string()).collect(),
            )),
        }
    }

    /// Update parameter values.
    ///
    /// All names are resolved before anything is changed, so a misspelled name leaves the set
    /// untouched. Accepted updates are kept even if a requirement no longer holds; the violated
    /// requirements are returned.
    pub fn par<S: AsRef<str>>(
        &mut self,
        updates: impl IntoIterator<Item = (S, ParValue)>,
    ) -> Result<Vec<Requirement>, Error> {
        let mut resolved = Vec::new();
        for (name, value) in updates {
            let name = self.resolve(name.as_ref())?.to_owned();
            let current = self.get(&name).copied().unwrap_or(value);
            let value = value
                .coerce_like(&current)
                .ok_or_else(|| Error::InvalidValue {
                    name: name.clone(),
                    value: value.to_string(),
                })?;
            resolved.push((name, value));
        }

        for (name, value) in resolved {
            log::debug!("par {name} = {value}");
            if let Some(entry) = self.values.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = value;
            }
        }

        Ok(self.check())
    }

    /// Requirements that do not hold, in declaration order.
    pub fn check(&self) -> Vec<Requirement> {
        self.requirements
            .iter()
            .filter(|r| !r.holds(self))
            .cloned()
            .collect()
    }

    /// Names of parameters without a usable value.
    pub fn missing(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(_, v)| v.is_missing())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Parameter values keyed by model path, as handed to the simulation engine.
    pub fn start_values(&self) -> Vec<(String, ParValue)> {
        self.iter()
            .map(|(_, value, location)| (location.to_owned(), *value))
            .collect()
    }

    /// The defaults of the BPL IEC column system.
    pub fn column_system() -> Self {
        let mut set = Self::empty();

        set.insert("diameter", 7.136, "column.diameter");
        set.insert("height", 20.0, "column.height");
        set.insert("x_m", 0.30, "column.x_m");
        set.insert("k1", 0.3, "column.k1");
        set.insert("k2", 0.05, "column.k2");
        set.insert("k3", 0.05, "column.k3");
        set.insert("k4", 0.3, "column.k4");
        set.insert("Q_av", 3.0, "column.Q_av");

        set.insert("E_start", 0.0, "column.column_section[1].c_start[3]");

        set.insert("P_in", 0.3, "tank_sample.c_in[1]");
        set.insert("A_in", 0.3, "tank_sample.c_in[2]");
        set.insert("E_in", 0_i64, "tank_sample.c_in[3]");
        set.insert("E_in_desorption_buffer", 0.3, "tank_buffer2.c_in[3]");

        set.insert("LFR", 0.67, "u");

        set.insert("scale_volume", true, "scale_volume");
        set.insert("gradient", true, "control_desorption_buffer.gradient");
        set.insert("start_adsorption", 0_i64, "control_sample.start");
        set.insert("stop_adsorption", 67_i64, "control_sample.stop");
        set.insert("start_desorption", 200_i64, "control_desorption_buffer.start");
        set.insert("x_start_desorption", 0.2, "control_desorption_buffer.x_start");
        set.insert(
            "stationary_desorption",
            500_i64,
            "control_desorption_buffer.stationary",
        );
        set.insert("stop_desorption", 600_i64, "control_desorption_buffer.stop");
        set.insert("start_pooling", 308_i64, "control_pooling.start");
        set.insert("stop_pooling", 600_i64, "control_pooling.stop");

        set.insert("start_uv", -1_i64, "control_pooling.start_uv_pooling");
        set.insert("stop_uv", -2_i64, "control_pooling.stop_uv_pooling");

        set.insert_key_variable("V", "column.V");
        set.insert_key_variable("scale_volume", "scale_volume");
        set.insert_key_variable("VFR", "F");
        set.insert_key_variable("area", "column.area");
        set.insert_key_variable("V_m", "column.V_m");
        for path in [
            "column.column_section[1].V_m",
            "tank_mixing.outlet.c[1]",
            "control_buffer2.scaling",
        ] {
            set.insert_key_variable(path, path);
        }

        set.add_requirement(Requirement::new(
            "start_adsorption",
            Relation::Less,
            "stop_adsorption",
        ));
        set.add_requirement(Requirement::new(
            "start_desorption",
            Relation::Less,
            "stationary_desorption",
        ));
        set.add_requirement(Requirement::new(
            "stationary_desorption",
            Relation::Less,
            "stop_desorption",
        ));
        set.add_requirement(Requirement::new("start_uv", Relation::Greater, "stop_uv"));

        set
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::column_system()
    }
}
