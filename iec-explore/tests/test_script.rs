mod common;

use common::{MockEngine, HARVEST_VOLUME};
use float_cmp::assert_approx_eq;
use iec_explore::{
    script::{parse_script, run_script},
    Error, Session,
};
use iec_model::ParValue;

#[test_log::test]
fn test_run_script() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("result.csv");
    let text = format!(
        "# reference run\n\
         newplot Elution-vs-CV Reference\n\
         par k1=0.4\n\
         init {HARVEST_VOLUME}=0.5\n\
         simu 100\n\
         simu 50 cont\n\
         disp control_pooling\n\
         describe k1\n\
         csv {}\n",
        csv.display()
    );

    let commands = parse_script(&text).unwrap();
    assert_eq!(commands.len(), 8);
    assert_eq!(commands[0].0, 2);

    let mut session = Session::new(MockEngine::new()).unwrap();
    let mut out = Vec::new();
    run_script(&mut session, &commands, &mut out).unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Simulated to t = 150"));
    assert!(out.contains("start_pooling"));
    assert!(out.contains("Parameter k1 : 0.400"));

    assert_eq!(session.params().get("k1"), Some(&ParValue::Real(0.4)));
    assert_eq!(session.figure().unwrap().runs(), 2);
    assert_approx_eq!(f64, session.prev_final_time(), 150.0);

    let written = std::fs::read_to_string(&csv).unwrap();
    let header = written.lines().next().unwrap();
    assert!(header.starts_with("time,"));
    assert!(header.contains(HARVEST_VOLUME));
    // 500 communication points of the continued run plus the header
    assert_eq!(written.lines().count(), 502);
}

#[test]
fn test_script_stops_at_failing_line() {
    let commands = parse_script("par k1=0.4\nsimu 10 cont\npar k2=0.1\n").unwrap();
    let mut session = Session::new(MockEngine::new()).unwrap();
    let mut out = Vec::new();

    let err = run_script(&mut session, &commands, &mut out).unwrap_err();
    assert!(matches!(
        &err,
        Error::Script { line: 2, source } if matches!(**source, Error::NoPreviousRun)
    ));
    assert_eq!(err.to_string(), format!("Line 2: {}", Error::NoPreviousRun));

    // Calls before the failing line took effect, the ones after did not
    assert_eq!(session.params().get("k1"), Some(&ParValue::Real(0.4)));
    assert_eq!(session.params().get("k2"), Some(&ParValue::Real(0.05)));
}

#[test]
fn test_save_needs_figure() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!("simu 10\nsave {}\n", dir.path().join("fig.svg").display());
    let commands = parse_script(&text).unwrap();
    let mut session = Session::new(MockEngine::new()).unwrap();

    let err = run_script(&mut session, &commands, &mut std::io::sink()).unwrap_err();
    assert!(matches!(
        err,
        Error::Script { line: 2, source } if matches!(*source, Error::InvalidCommand(_))
    ));
    assert!(!dir.path().join("fig.svg").exists());
}

#[test]
fn test_invalid_time_stops_script() {
    let commands = parse_script("simu 10\nsimu nan cont\nsimu 5 cont\n").unwrap();
    let mut session = Session::new(MockEngine::new()).unwrap();

    let err = run_script(&mut session, &commands, &mut std::io::sink()).unwrap_err();
    assert!(matches!(
        err,
        Error::Script { line: 2, source } if matches!(*source, Error::InvalidTime(t) if t.is_nan())
    ));
    assert_eq!(session.engine().requests.len(), 1);
    assert_approx_eq!(f64, session.prev_final_time(), 10.0);
}
