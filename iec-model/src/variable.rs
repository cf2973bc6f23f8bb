//! Catalogue of the model variables, as read from the FMU's model description.

use std::fmt::Display;

use itertools::Itertools;

use crate::{platform::FmuKind, ParValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Causality {
    Parameter,
    CalculatedParameter,
    Input,
    Output,
    #[default]
    Local,
    Independent,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variability {
    Constant,
    Fixed,
    Tunable,
    Discrete,
    #[default]
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Real,
    Integer,
    Boolean,
    String,
}

impl Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Real => "Real",
            Self::Integer => "Integer",
            Self::Boolean => "Boolean",
            Self::String => "String",
        };
        write!(f, "{s}")
    }
}

/// One scalar variable of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVariable {
    pub name: String,
    pub value_reference: u32,
    pub description: Option<String>,
    pub causality: Causality,
    pub variability: Variability,
    pub var_type: VarType,
    /// Start value, if the model declares one
    pub start: Option<ParValue>,
    /// Start value of a String variable
    pub start_text: Option<String>,
    /// 1-based index of the variable this one is the derivative of
    pub derivative_of: Option<usize>,
    pub unit: Option<String>,
}

impl ModelVariable {
    pub fn new(name: &str, value_reference: u32, var_type: VarType) -> Self {
        Self {
            name: name.to_owned(),
            value_reference,
            description: None,
            causality: Causality::default(),
            variability: Variability::default(),
            var_type,
            start: None,
            start_text: None,
            derivative_of: None,
            unit: None,
        }
    }

    /// Parameters and constants have a value before any simulation is run.
    pub fn is_fixed(&self) -> bool {
        self.causality == Causality::Parameter || self.variability == Variability::Constant
    }

    /// The first segment of the variable path, `column` for `column.column_section[2].c[1]`.
    pub fn component(&self) -> &str {
        let end = self
            .name
            .find(['.', '['])
            .unwrap_or(self.name.len());
        &self.name[..end]
    }
}

/// Summary of the model description together with its variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub model_name: String,
    pub fmi_version: String,
    pub generation_tool: Option<String>,
    pub guid: String,
    pub kind: FmuKind,
    pub variables: Vec<ModelVariable>,
}

impl ModelInfo {
    pub fn get(&self, name: &str) -> Option<&ModelVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// The continuous states: variables that some derivative refers to, in order of
    /// declaration of their derivatives.
    pub fn states(&self) -> impl Iterator<Item = &ModelVariable> + '_ {
        self.variables
            .iter()
            .filter_map(|v| v.derivative_of)
            .filter_map(|idx| idx.checked_sub(1).and_then(|i| self.variables.get(i)))
            .unique_by(|v| v.value_reference)
    }

    /// Distinct top-level components of the model, in order of first appearance.
    pub fn parts(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| !v.name.starts_with("der("))
            .map(ModelVariable::component)
            .filter(|part| !part.is_empty())
            .unique()
            .collect()
    }

    /// Start value of the first local variable whose name contains `key`.
    pub fn local_text(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .filter(|v| v.causality == Causality::Local && v.name.contains(key))
            .find_map(|v| v.start_text.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ModelInfo {
        let mut c1 = ModelVariable::new("column.column_section[1].c[1]", 0, VarType::Real);
        c1.causality = Causality::Local;
        let mut v = ModelVariable::new("tank_harvest.V", 1, VarType::Real);
        v.causality = Causality::Local;
        let mut der_c1 = ModelVariable::new("der(column.column_section[1].c[1])", 2, VarType::Real);
        der_c1.derivative_of = Some(1);
        let mut der_v = ModelVariable::new("der(tank_harvest.V)", 3, VarType::Real);
        der_v.derivative_of = Some(2);
        let mut k1 = ModelVariable::new("column.k1", 4, VarType::Real);
        k1.causality = Causality::Parameter;
        k1.variability = Variability::Fixed;
        k1.start = Some(ParValue::Real(0.3));
        let mut version = ModelVariable::new("BPL.version", 5, VarType::String);
        version.variability = Variability::Constant;
        version.start_text = Some("2.1.1".to_owned());

        ModelInfo {
            model_name: "BPL_IEC.Column_system".to_owned(),
            fmi_version: "2.0".to_owned(),
            generation_tool: Some("OpenModelica".to_owned()),
            guid: "{0}".to_owned(),
            kind: FmuKind::ModelExchange,
            variables: vec![c1, v, der_c1, der_v, k1, version],
        }
    }

    #[test]
    fn test_states() {
        let info = info();
        let states = info.states().map(|v| v.name.as_str()).collect_vec();
        assert_eq!(states, ["column.column_section[1].c[1]", "tank_harvest.V"]);
    }

    #[test]
    fn test_parts() {
        assert_eq!(info().parts(), ["column", "tank_harvest", "BPL"]);
    }

    #[test]
    fn test_lookup() {
        let info = info();
        let k1 = info.get("column.k1").unwrap();
        assert!(k1.is_fixed());
        assert_eq!(k1.start, Some(ParValue::Real(0.3)));
        assert!(!info.get("tank_harvest.V").unwrap().is_fixed());
        assert!(info.get("column.k9").is_none());
        assert_eq!(info.local_text("BPL.version"), Some("2.1.1"));
    }
}
