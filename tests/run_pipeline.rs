use mzkit_runner::config::{ConfigDocument, ConfigStore, ResolvedModule};
use mzkit_runner::error::{ConfigError, RunError};
use mzkit_runner::pipeline::{
    ModuleFailure, ModuleMessage, ModuleRunner, RunCoordinator, RunOutcome,
};
use mzkit_runner::report;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"{
    "pipeline": {
        "peakdetector": { "use": true, "required": true, "critical": true, "modules": ["peakdetector"] },
        "qc": { "use": true, "required": false, "critical": false, "modules": ["pipeline_qc", "qc_plots"] },
        "search": { "use": false, "required": false, "critical": false, "modules": ["pipeline_standard_search"] },
        "report": { "use": true, "required": false, "critical": false, "modules": ["pipeline_report"] }
    },
    "globals": {
        "mzroll_db_file": "peakdetector.mzrollDB",
        "methodId": "M004A",
        "chemical_class": "lipid",
        "MS1tol": "10ppm",
        "MS2tol": "20ppm",
        "mode": "positive",
        "collision_energies": "30",
        "dbname": "standards",
        "standard_db_user": "reader",
        "standard_db_passwd_key": "PW",
        "standard_db_host_key": "HOST"
    },
    "modules": {
        "peakdetector": { "language": "bin", "parameters": { "ms2": "-2", "minintensity": 1000, "ppm": 10 } },
        "pipeline_qc": { "language": "R", "parameters": { "referenceSample": "pool" } },
        "qc_plots": { "language": "R", "parameters": {} },
        "pipeline_standard_search": { "language": "R", "parameters": { "matching_model": "default" } },
        "pipeline_report": { "language": "R", "parameters": {} }
    }
}"#;

/// Records invocations with the parameters each module received.
#[derive(Default)]
struct RecordingRunner {
    seen: Vec<(String, String, Value)>,
    fail: Vec<&'static str>,
}

impl ModuleRunner for RecordingRunner {
    fn invoke(&mut self, stage: &str, module: &ResolvedModule) -> Result<(), ModuleFailure> {
        self.seen.push((
            stage.to_string(),
            module.name.clone(),
            Value::Object(module.parameters.clone()),
        ));
        if self.fail.iter().any(|f| *f == module.name) {
            return Err(ModuleFailure::Recoverable("exit status 1".to_string()));
        }
        Ok(())
    }
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input.json");
    fs::write(&path, CONFIG).unwrap();
    path
}

#[test]
fn overrides_are_persisted_and_drive_execution() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let mut store = ConfigStore::load(&config).unwrap();
    store
        .apply_overrides([
            "globals.mode=negative",
            "modules.peakdetector.parameters.ppm=5",
            "pipeline.search.use=TRUE",
        ])
        .unwrap();
    let persisted = dir.path().join("config.json");
    let document = store.commit(&persisted).unwrap();

    // The audit copy is exactly what runs.
    assert_eq!(ConfigDocument::load(&persisted).unwrap(), document);
    assert_eq!(document.as_value()["globals"]["mode"], json!("negative"));
    assert_eq!(
        document.as_value()["modules"]["peakdetector"]["parameters"]["ppm"],
        json!(5.0)
    );

    let mut runner = RecordingRunner::default();
    let outcome = RunCoordinator::new(&document, &mut runner).run().unwrap();
    assert!(outcome.is_success());

    let called: Vec<&str> = runner.seen.iter().map(|(_, m, _)| m.as_str()).collect();
    assert_eq!(
        called,
        vec![
            "peakdetector",
            "pipeline_qc",
            "qc_plots",
            "pipeline_standard_search",
            "pipeline_report"
        ]
    );

    let (_, _, pd_params) = &runner.seen[0];
    assert_eq!(pd_params["ppm"], json!(5.0));
    assert_eq!(pd_params["mode"], json!("negative"));
    assert_eq!(pd_params["methodId"], json!("M004A"));

    let path = report::write_success_file(outcome.status(), dir.path(), chrono::Local::now()).unwrap();
    let text = fs::read_to_string(path).unwrap();
    assert!(text.contains("search step: SUCCEEDED"));
}

#[test]
fn non_critical_failure_is_reported_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let document = ConfigDocument::load(&write_config(dir.path())).unwrap();

    let mut runner = RecordingRunner {
        fail: vec!["pipeline_qc"],
        ..Default::default()
    };
    let outcome = RunCoordinator::new(&document, &mut runner).run().unwrap();
    let status = outcome.status();

    let qc = status.get("qc").unwrap();
    assert!(qc.ran && qc.fail && !qc.critical_fail);
    assert_eq!(
        qc.messages(),
        vec![ModuleMessage::NonCriticalFailure, ModuleMessage::SkippedAfterFailure]
    );

    let search = status.get("search").unwrap();
    assert!(!search.ran);
    assert_eq!(search.messages(), vec![ModuleMessage::NotRun]);

    assert!(status.get("report").unwrap().ran);
}

#[test]
fn critical_failure_halts_before_later_stages() {
    let dir = tempfile::tempdir().unwrap();
    let document = ConfigDocument::load(&write_config(dir.path())).unwrap();

    let mut runner = RecordingRunner {
        fail: vec!["peakdetector"],
        ..Default::default()
    };
    let outcome = RunCoordinator::new(&document, &mut runner).run().unwrap();
    match outcome {
        RunOutcome::Halted { stage, status } => {
            assert_eq!(stage, "peakdetector");
            assert_eq!(status.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(runner.seen.len(), 1);
}

#[test]
fn override_can_break_flag_invariants_which_execution_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ConfigStore::load(&write_config(dir.path())).unwrap();
    store.apply_override("pipeline.peakdetector.use=false").unwrap();

    let mut runner = RecordingRunner::default();
    let err = RunCoordinator::new(store.document(), &mut runner)
        .run()
        .unwrap_err();
    assert!(matches!(err, RunError::InvalidStageFlags { .. }));
    assert!(runner.seen.is_empty());
}

#[test]
fn override_errors_are_classified() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ConfigStore::load(&write_config(dir.path())).unwrap();

    assert!(matches!(
        store.apply_override("modules.qc_plots.parameters=x"),
        Err(ConfigError::NotALeaf { .. })
    ));
    assert!(matches!(
        store.apply_override("modules.ghost.language=R"),
        Err(ConfigError::PathNotFound { .. })
    ));
    assert!(matches!(
        store.apply_override("globals.mode"),
        Err(ConfigError::MalformedOverride(_))
    ));
    assert!(store.history().is_empty());
}
