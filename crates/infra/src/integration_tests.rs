//! End-to-end tests over the file-backed pipeline.
//!
//! Tests: DatasetSource → Ingest → Segment → Forecast → Registry → ArtifactStore
//!
//! Verifies:
//! - Waste is netted out of sales before forecasting
//! - Versions survive a restart and keep increasing
//! - Readers never see a torn snapshot while runs publish
//! - Uploads fully replace a dataset

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kitchencast_core::Frequency;
use kitchencast_forecast::{ForecastScheduler, ModelChoice};
use kitchencast_ingest::DatasetRole;

use crate::artifacts::FsArtifactStore;
use crate::datasets::{DatasetSource, DirectoryDatasetSource};
use crate::jobs::{JobOrchestrator, OrchestratorConfig, RunOutcome, RunRequest};

const ITALIAN_HEADER: &str = "Regione,Città,Scuola,Mese,Settimana,Categoria piatto,Piatto,Valore\n";

fn rows(category: &str, dish: &str, value: &str, weeks: usize) -> String {
    (0..weeks)
        .map(|i| {
            format!(
                "Lazio,Roma,Scuola 1,2024-{:02},W{},{category},{dish},{value}\n",
                1 + i / 5,
                1 + i % 5
            )
        })
        .collect()
}

fn write_inputs(dir: &Path) {
    let sales = format!(
        "{ITALIAN_HEADER}{}{}",
        rows("Primi", "Pasta al pomodoro", "10", 8),
        rows("Contorni", "Insalata", "\"5,5\"", 8)
    );
    let tray = format!("{ITALIAN_HEADER}{}", rows("Primi", "Pasta al pomodoro", "2", 8));
    let plate = format!("{ITALIAN_HEADER}{}", rows("Primi", "Pasta al pomodoro", "1", 8));
    fs::write(dir.join("sales.csv"), sales).unwrap();
    fs::write(dir.join("tray_waste.csv"), tray).unwrap();
    fs::write(dir.join("plate_waste.csv"), plate).unwrap();
}

fn build(data: &Path, artifacts: &Path) -> JobOrchestrator {
    JobOrchestrator::new(
        OrchestratorConfig::default().with_defaults(4, Frequency::Weekly),
        Arc::new(DirectoryDatasetSource::new(data).unwrap()),
        Arc::new(FsArtifactStore::open(artifacts, 2).unwrap()),
        ForecastScheduler::new(2).unwrap(),
    )
}

#[test]
fn waste_is_netted_before_forecasting() {
    let data = tempfile::tempdir().unwrap();
    let artifacts = tempfile::tempdir().unwrap();
    write_inputs(data.path());

    let orch = build(data.path(), artifacts.path());
    let report = orch.run(RunRequest::new()).unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);

    let forecasts = orch.store().read_latest_forecasts().unwrap();
    assert_eq!(forecasts.version, 1);
    assert_eq!(forecasts.items.len(), 8);
    let primi: Vec<_> = forecasts.items.iter().filter(|p| p.category == "Primi").collect();
    assert!(primi.iter().all(|p| p.yhat == 7.0));
    let contorni: Vec<_> = forecasts.items.iter().filter(|p| p.category == "Contorni").collect();
    assert!(contorni.iter().all(|p| p.yhat == 5.5));
}

#[test]
fn versions_continue_after_restart() {
    let data = tempfile::tempdir().unwrap();
    let artifacts = tempfile::tempdir().unwrap();
    write_inputs(data.path());

    build(data.path(), artifacts.path()).run(RunRequest::new()).unwrap();
    let restarted = build(data.path(), artifacts.path());
    assert_eq!(restarted.store().latest_version(), Some(1));

    let report = restarted
        .run(RunRequest::new().with_frequency(Frequency::Monthly).with_horizon(2))
        .unwrap();
    assert_eq!(report.version, 2);
    let latest = restarted.store().read_latest().unwrap();
    assert!(latest.forecasts.iter().all(|p| p.timestamp.frequency() == Frequency::Monthly));
    assert_eq!(restarted.store().read_version(1).unwrap().version, 1);
}

#[test]
fn readers_see_whole_snapshots_while_runs_publish() {
    let data = tempfile::tempdir().unwrap();
    let artifacts = tempfile::tempdir().unwrap();
    write_inputs(data.path());
    let orch = Arc::new(build(data.path(), artifacts.path()));
    orch.run(RunRequest::new()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = orch.store().clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut last_seen = 0;
                while !done.load(Ordering::Acquire) {
                    let snapshot = store.read_latest().unwrap();
                    assert!(snapshot.version >= last_seen);
                    last_seen = snapshot.version;
                    assert_eq!(snapshot.registry.len(), 2);
                    assert_eq!(snapshot.forecasts.len(), 8);
                }
            })
        })
        .collect();

    for _ in 0..10 {
        orch.run(RunRequest::new()).unwrap();
    }
    done.store(true, Ordering::Release);
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(orch.store().latest_version(), Some(11));
}

#[test]
fn upload_replaces_dataset_for_the_next_run() {
    let data = tempfile::tempdir().unwrap();
    let artifacts = tempfile::tempdir().unwrap();
    write_inputs(data.path());
    let source = Arc::new(DirectoryDatasetSource::new(data.path()).unwrap());
    let orch = JobOrchestrator::new(
        OrchestratorConfig::default()
            .with_defaults(2, Frequency::Weekly)
            .with_model(ModelChoice::LinearTrend),
        source.clone(),
        Arc::new(FsArtifactStore::open(artifacts.path(), 2).unwrap()),
        ForecastScheduler::new(1).unwrap(),
    );
    orch.run(RunRequest::new()).unwrap();

    let replacement = format!("{ITALIAN_HEADER}{}", rows("Dolci", "Tiramisù", "3", 6));
    source.replace(DatasetRole::Sales, replacement.as_bytes()).unwrap();

    let report = orch.run(RunRequest::new()).unwrap();
    assert_eq!(report.summary.keys().collect::<Vec<_>>(), vec!["Dolci"]);
    let registry = orch.store().read_latest_registry().unwrap();
    assert_eq!(registry.items.len(), 1);
    assert_eq!(registry.items[0].model_kind, "OLS-Trend");
}
