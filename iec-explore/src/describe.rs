//! Text about the model: `describe`, `disp` and the system information.

use comfy_table::{presets, Table};
use iec_model::{ParValue, ParameterSet};
use itertools::Itertools;

use crate::{engine::Engine, session::Session, Error};

const CHROMATOGRAPHY: &str =
    "Ion exchange chromatography controlled with varying salt-concentration. The pH is kept constant.";

/// Substances of the liquid phase with their index in concentration vectors.
const SUBSTANCES: [(&str, usize); 3] = [("P", 1), ("A", 2), ("E", 3)];

const DECIMALS: usize = 3;

/// Describe the process, the liquid phase, the model parts, a parameter or a model variable.
pub fn describe<E: Engine>(session: &Session<E>, name: &str) -> Result<String, Error> {
    match name {
        "chromatography" => Ok(CHROMATOGRAPHY.to_owned()),
        "liquidphase" => Ok(liquidphase(session)),
        "parts" => Ok(format!(
            "Model parts: {}",
            session.model().parts().into_iter().join(", ")
        )),
        "MSL" => Ok(format!(
            "MSL: {}",
            session.engine().library_versions().msl_usage
        )),
        _ => describe_variable(session, name),
    }
}

fn liquidphase<E: Engine>(session: &Session<E>) -> String {
    let info = session.model();
    let mut lines = vec!["Liquid phase substances included in the model".to_owned()];
    for (symbol, index) in SUBSTANCES {
        let path = format!("liquidphase.{symbol}");
        let mut line = format!("{symbol} index = {index}");
        if let Some(description) = info.get(&path).and_then(|v| v.description.as_deref()) {
            line.push_str(&format!(" - {description}"));
        }
        if let Ok(mw) = session.model_get(&format!("liquidphase.mw[{index}]")) {
            line.push_str(&format!(
                " - molecular weight {} Da",
                mw.display_rounded(1)
            ));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn describe_variable<E: Engine>(session: &Session<E>, name: &str) -> Result<String, Error> {
    let params = session.params();
    let info = session.model();

    // Friendly names first, then model paths
    let path = params.location(name).unwrap_or(name);
    let Some(var) = info.get(path) else {
        return match params.get(name) {
            // A parameter the loaded model does not know of
            Some(value) => Ok(format!("{name} : {}", value.display_rounded(DECIMALS))),
            None => Err(Error::NotFound(name.to_owned())),
        };
    };

    let description = var.description.as_deref().unwrap_or(name);
    let unit = var
        .unit
        .as_deref()
        .map(|u| format!(" [{u}]"))
        .unwrap_or_default();
    let value = session.model_get(path)?;
    Ok(format!(
        "{description} : {}{unit}",
        value.display_rounded(DECIMALS)
    ))
}

/// Table of parameters whose location contains `name`, or failing that, whose name contains it.
/// An empty `name` lists all parameters. The long form shows the location instead of the value.
pub fn disp(params: &ParameterSet, name: &str, long: bool) -> Table {
    let by_location = params
        .iter()
        .filter(|(_, _, location)| location.contains(name))
        .collect_vec();
    let selected = if by_location.is_empty() {
        params
            .iter()
            .filter(|(n, _, _)| n.contains(name))
            .collect_vec()
    } else {
        by_location
    };

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["Parameter", if long { "Location" } else { "Value" }]);
    for (n, value, location) in selected {
        let shown = if long {
            location.to_owned()
        } else {
            format_value(value)
        };
        table.add_row(vec![n.to_owned(), shown]);
    }
    table
}

fn format_value(value: &ParValue) -> String {
    match value {
        ParValue::Real(_) => value.display_rounded(DECIMALS),
        ParValue::Integer(_) | ParValue::Boolean(_) => value.to_string(),
    }
}

/// Platform, crate and FMU versions.
pub fn system_info<E: Engine>(session: &Session<E>) -> Table {
    let info = session.model();
    let versions = session.engine().library_versions();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["System information", ""]);
    let rows = [
        ("OS", std::env::consts::OS.to_owned()),
        ("Architecture", std::env::consts::ARCH.to_owned()),
        ("iec-explore", env!("CARGO_PKG_VERSION").to_owned()),
        ("FMU model", info.model_name.clone()),
        (
            "FMU generated by",
            info.generation_tool.clone().unwrap_or_default(),
        ),
        ("FMI version", info.fmi_version.clone()),
        ("FMU type", info.kind.to_string()),
        ("MSL", versions.msl_version),
        ("BPL", versions.bpl_version),
    ];
    for (key, value) in rows {
        table.add_row(vec![key.to_owned(), value]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disp_by_location() {
        let params = ParameterSet::column_system();
        let text = disp(&params, "control_pooling", false).to_string();
        for name in ["start_pooling", "stop_pooling", "start_uv", "stop_uv"] {
            assert!(text.contains(name), "{name} missing in\n{text}");
        }
        assert!(!text.contains("start_desorption"));
        assert!(text.contains("-1"));
    }

    #[test]
    fn test_disp_by_name() {
        let params = ParameterSet::column_system();
        // No location contains `_in`, so names are searched
        let text = disp(&params, "P_in", false).to_string();
        assert!(text.contains("P_in"));
        assert!(text.contains("0.300"));
        assert!(!text.contains("A_in"));
    }

    #[test]
    fn test_disp_long_and_all() {
        let params = ParameterSet::column_system();
        let text = disp(&params, "", true).to_string();
        assert!(text.contains("Location"));
        assert!(text.contains("control_desorption_buffer.gradient"));
        assert!(text.contains("column.column_section[1].c_start[3]"));

        let text = disp(&params, "gradient", false).to_string();
        assert!(text.contains("true"));
    }
}
