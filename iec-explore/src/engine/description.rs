//! Texts of the model description that the typed FMI 2.0 schema leaves out: String start values
//! and units resolved through the type definitions.

use std::{collections::HashMap, fs::File, io::Read, path::Path};

use iec_model::ModelVariable;
use serde::Deserialize;

use crate::Error;

const MODEL_DESCRIPTION: &str = "modelDescription.xml";

#[derive(Debug, Default, Deserialize)]
struct Description {
    #[serde(rename = "TypeDefinitions", default)]
    type_definitions: TypeDefinitions,
    #[serde(rename = "ModelVariables", default)]
    model_variables: ModelVariables,
}

#[derive(Debug, Default, Deserialize)]
struct TypeDefinitions {
    #[serde(rename = "SimpleType", default)]
    simple_types: Vec<SimpleType>,
}

#[derive(Debug, Deserialize)]
struct SimpleType {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Real")]
    real: Option<RealAttributes>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelVariables {
    #[serde(rename = "ScalarVariable", default)]
    variables: Vec<ScalarVariable>,
}

#[derive(Debug, Deserialize)]
struct ScalarVariable {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Real")]
    real: Option<RealAttributes>,
    #[serde(rename = "String")]
    string: Option<StringAttributes>,
}

#[derive(Debug, Deserialize)]
struct RealAttributes {
    #[serde(rename = "@declaredType")]
    declared_type: Option<String>,
    #[serde(rename = "@unit")]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StringAttributes {
    #[serde(rename = "@start")]
    start: Option<String>,
}

/// Units and String start values keyed by variable name.
#[derive(Debug, Default, PartialEq)]
pub struct VariableTexts {
    pub units: HashMap<String, String>,
    pub string_starts: HashMap<String, String>,
}

impl VariableTexts {
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let description: Description = quick_xml::de::from_str(xml)?;

        let type_units = description
            .type_definitions
            .simple_types
            .into_iter()
            .filter_map(|st| Some((st.name, st.real?.unit?)))
            .collect::<HashMap<_, _>>();

        let mut texts = Self::default();
        for sv in description.model_variables.variables {
            if let Some(real) = sv.real {
                // A unit on the variable overrides the one of its declared type
                let unit = real.unit.or_else(|| {
                    real.declared_type
                        .and_then(|declared| type_units.get(&declared).cloned())
                });
                if let Some(unit) = unit {
                    texts.units.insert(sv.name, unit);
                }
            } else if let Some(start) = sv.string.and_then(|s| s.start) {
                texts.string_starts.insert(sv.name, start);
            }
        }
        Ok(texts)
    }

    /// Read the model description out of the FMU archive at `fmu`.
    pub fn from_archive(fmu: &Path) -> Result<Self, Error> {
        let mut zip = zip::ZipArchive::new(File::open(fmu)?)?;
        let mut xml = String::new();
        zip.by_name(MODEL_DESCRIPTION)?.read_to_string(&mut xml)?;
        Self::parse(&xml)
    }

    pub fn apply(&self, variables: &mut [ModelVariable]) {
        for var in variables {
            var.unit = self.units.get(&var.name).cloned();
            if let Some(start) = self.string_starts.get(&var.name) {
                var.start_text = Some(start.clone());
            }
        }
    }
}
