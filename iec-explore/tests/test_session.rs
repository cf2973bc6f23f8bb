//! Sessions over the mock engine.

mod common;

use common::{MockEngine, CV, FLOW, HARVEST_RATE, HARVEST_VOLUME, HARVEST_VOLUME_START, POOLING};
use float_cmp::assert_approx_eq;
use iec_explore::{
    describe::{describe, system_info},
    plots::PlotType,
    Error, Session, SimMode,
};
use iec_model::ParValue;
use rstest::rstest;

fn session() -> Session<MockEngine> {
    Session::new(MockEngine::new()).unwrap()
}

#[test_log::test]
fn test_initial_run() {
    let mut session = session();
    session.set_ncp(10);
    session
        .init([(HARVEST_VOLUME, ParValue::Real(0.5))])
        .unwrap();

    let result = session.simu(Some(100.0), SimMode::Initial).unwrap();
    assert_eq!(result.len(), 11);
    assert_approx_eq!(f64, result.final_time().unwrap(), 100.0);
    assert_approx_eq!(f64, result.last(HARVEST_VOLUME).unwrap(), 0.5 + 100.0 * HARVEST_RATE);

    let request = session.engine().last_request().unwrap();
    assert_eq!(request.start_time, 0.0);
    assert_eq!(request.stop_time, 100.0);
    assert!(request
        .start_values
        .contains(&("column.k1".to_owned(), ParValue::Real(0.3))));
    assert!(request
        .start_values
        .contains(&(HARVEST_VOLUME_START.to_owned(), ParValue::Real(0.5))));

    assert_approx_eq!(f64, session.prev_final_time(), 100.0);
    assert_approx_eq!(
        f64,
        session.states().get(HARVEST_VOLUME).unwrap(),
        0.5 + 100.0 * HARVEST_RATE
    );
}

#[test_log::test]
fn test_continued_run_starts_from_final_state() {
    let mut session = session();
    session
        .init([(HARVEST_VOLUME, ParValue::Real(0.5))])
        .unwrap();
    session.simu(Some(100.0), SimMode::Initial).unwrap();

    let result = session.simu(Some(50.0), SimMode::Continued).unwrap();
    assert_approx_eq!(f64, result.time().unwrap()[0], 100.0);
    assert_approx_eq!(f64, result.final_time().unwrap(), 150.0);
    assert_approx_eq!(
        f64,
        result.last(HARVEST_VOLUME).unwrap(),
        0.5 + 150.0 * HARVEST_RATE,
        epsilon = 1e-12
    );

    let request = session.engine().last_request().unwrap();
    assert_eq!(request.start_time, 100.0);
    let start = request
        .start_values
        .iter()
        .rev()
        .find(|(name, _)| name == HARVEST_VOLUME_START)
        .map(|(_, v)| v.as_f64())
        .unwrap();
    assert_approx_eq!(f64, start, 1.5, epsilon = 1e-12);
    assert_approx_eq!(f64, session.prev_final_time(), 150.0);
}

#[test_log::test]
fn test_initial_run_resets_time() {
    let mut session = session();
    session.simu(Some(100.0), SimMode::Initial).unwrap();
    session.simu(Some(20.0), SimMode::Continued).unwrap();

    let result = session.simu(None, SimMode::Initial).unwrap();
    assert_eq!(result.time().unwrap()[0], 0.0);
    assert_approx_eq!(
        f64,
        result.final_time().unwrap(),
        iec_model::platform::DEFAULT_SIMULATION_TIME
    );
}

#[test]
fn test_continued_needs_previous_run() {
    let mut session = session();
    assert!(matches!(
        session.simu(Some(10.0), SimMode::Continued),
        Err(Error::NoPreviousRun)
    ));
    assert!(session.engine().requests.is_empty());
}

#[rstest]
#[case::nan(f64::NAN)]
#[case::infinite(f64::INFINITY)]
#[case::zero(0.0)]
#[case::negative(-5.0)]
fn test_invalid_time_is_rejected(#[case] time: f64) {
    let mut session = session();
    assert!(matches!(
        session.simu(Some(time), SimMode::Initial),
        Err(Error::InvalidTime(_))
    ));
    assert!(matches!(
        session.set_simulation_time(time),
        Err(Error::InvalidTime(_))
    ));
    assert_eq!(session.simulation_time(), 100.0);

    session.simu(Some(10.0), SimMode::Initial).unwrap();
    assert!(matches!(
        session.simu(Some(time), SimMode::Continued),
        Err(Error::InvalidTime(_))
    ));
    assert_eq!(session.engine().requests.len(), 1);
    assert_approx_eq!(f64, session.prev_final_time(), 10.0);
}

#[test]
fn test_default_simulation_time() {
    let mut session = session();
    session.set_simulation_time(40.0).unwrap();
    session.simu(None, SimMode::Initial).unwrap();
    assert_eq!(session.engine().last_request().unwrap().stop_time, 40.0);
}

#[test_log::test]
fn test_failed_plot_update_leaves_session_unchanged() {
    let engine = MockEngine::new().without("column.outlet.c[2]");
    let mut session = Session::new(engine).unwrap();
    session.newplot("Outlet", PlotType::ColumnOutlet);

    assert!(matches!(
        session.simu(Some(100.0), SimMode::Initial),
        Err(Error::NotRecorded(name)) if name == "column.outlet.c[2]"
    ));
    assert_eq!(session.engine().requests.len(), 1);
    assert_eq!(session.prev_final_time(), 0.0);
    assert!(session.result().is_none());
    assert_eq!(session.figure().unwrap().runs(), 0);
    assert_eq!(session.states().get(HARVEST_VOLUME), None);
    assert!(matches!(
        session.simu(Some(10.0), SimMode::Continued),
        Err(Error::NoPreviousRun)
    ));
}

#[test]
fn test_violated_requirement_blocks_simulation() {
    let mut session = session();
    let violated = session
        .par([("start_desorption", ParValue::Integer(550))])
        .unwrap();
    assert_eq!(violated.len(), 1);
    assert!(violated[0].to_string().contains("start_desorption"));

    assert!(matches!(
        session.simu(Some(10.0), SimMode::Initial),
        Err(Error::RequirementsViolated(v)) if v.len() == 1
    ));
    assert!(session.engine().requests.is_empty());

    session
        .par([("stationary_desorption", ParValue::Integer(580))])
        .unwrap();
    assert!(session.simu(Some(10.0), SimMode::Initial).is_ok());
}

#[test]
fn test_unknown_parameter_changes_nothing() {
    let mut session = session();
    assert!(session
        .par([
            ("k1", ParValue::Real(0.9)),
            ("k99", ParValue::Real(1.0)),
        ])
        .is_err());
    assert_eq!(session.params().get("k1"), Some(&ParValue::Real(0.3)));
}

#[test]
fn test_model_get() {
    let mut session = session();

    // Parameters come from the parameter set, not the model start value
    session.par([("k1", ParValue::Real(0.45))]).unwrap();
    assert_eq!(session.model_get("column.k1").unwrap(), ParValue::Real(0.45));
    assert_eq!(session.model_get("F").unwrap(), ParValue::Real(FLOW));
    assert_eq!(session.model_get("column.V").unwrap(), ParValue::Real(CV));

    assert!(matches!(
        session.model_get(HARVEST_VOLUME),
        Err(Error::NotYetSimulated(_))
    ));
    assert!(matches!(
        session.model_get("column.nothing"),
        Err(Error::UnknownVariable(_))
    ));

    session.simu(Some(100.0), SimMode::Initial).unwrap();
    let ParValue::Real(v) = session.model_get(HARVEST_VOLUME).unwrap() else {
        panic!("expected a real value");
    };
    assert_approx_eq!(f64, v, 100.0 * HARVEST_RATE);

    // Only drawn when a figure needs it
    assert!(matches!(session.model_get(POOLING), Err(Error::NotRecorded(_))));
}

#[test]
fn test_outputs_follow_figure() {
    let mut session = session();
    let outputs = session.outputs();
    assert!(outputs.contains(&HARVEST_VOLUME.to_owned()));
    assert!(outputs.contains(&"column.V".to_owned()));
    assert!(!outputs.contains(&"scale_volume".to_owned()));
    assert!(!outputs.contains(&POOLING.to_owned()));

    session.newplot("pooling", PlotType::Pooling);
    let outputs = session.outputs();
    assert!(outputs.contains(&POOLING.to_owned()));
    assert!(outputs.contains(&"tank_harvest.m[1]".to_owned()));
    assert!(!outputs.contains(&"time".to_owned()));
    let mut unique = outputs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), outputs.len());

    session.simu(Some(100.0), SimMode::Initial).unwrap();
    assert_eq!(session.model_get(POOLING).unwrap(), ParValue::Boolean(true));
}

#[test_log::test]
fn test_runs_are_drawn_into_figure() {
    let mut session = session();
    session.set_ncp(20);
    session.newplot("Reference", PlotType::ElutionVsCv);
    session.simu(Some(100.0), SimMode::Initial).unwrap();
    session.simu(Some(50.0), SimMode::Continued).unwrap();

    let figure = session.figure().unwrap();
    assert_eq!(figure.runs(), 2);
    let first_panel = figure.traces(0);
    let series = figure.layout.panels[0].series.len();
    assert_eq!(first_panel.len(), 2 * series);
    assert_ne!(first_panel[0].dash, first_panel[series].dash);

    // Pumped volume in column volumes, relative to the start of desorption
    let offset = 200.0 * FLOW / common::SCALE;
    let (x0, _) = first_panel[0].points[0];
    assert_approx_eq!(f64, x0, -offset / CV, epsilon = 1e-9);
}

#[test]
fn test_describe() {
    let mut session = session();
    assert!(describe(&session, "chromatography")
        .unwrap()
        .contains("Ion exchange chromatography"));
    assert!(describe(&session, "parts").unwrap().contains("tank_harvest"));
    assert!(describe(&session, "MSL").unwrap().contains("3.2.3"));
    assert!(describe(&session, "liquidphase")
        .unwrap()
        .contains("molecular weight 150000.0 Da"));

    assert_eq!(describe(&session, "k1").unwrap(), "Parameter k1 : 0.300");
    assert!(matches!(describe(&session, "xyz"), Err(Error::NotFound(_))));
    // Bioreactor names are not substances of this model
    assert!(matches!(describe(&session, "broth"), Err(Error::NotFound(_))));

    session.simu(Some(100.0), SimMode::Initial).unwrap();
    assert_eq!(
        describe(&session, HARVEST_VOLUME).unwrap(),
        "Harvest tank volume : 1.000 [mL]"
    );

    let info = system_info(&session).to_string();
    assert!(info.contains("BPL_IEC.Column_system"));
    assert!(info.contains("OpenModelica"));
}
