mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{
    external, harness, primary, secondary, standalone, CountingFlusher, FakeBackend, FakeControl,
};
use kura_core::errors::Error;
use kura_core::status::DbErrorCode;
use kura_dataservice::hooks::{Heartbeat, HeartbeatFile};
use kura_dataservice::orchestrator::PANIC_SHUTDOWN_MESSAGE;
use kura_dataservice::{DaemonLifecycleState, OrchestratorContext, ProbeStatus};
use kura_persistence::ConnectTimeout;

#[tokio::test]
async fn external_database_never_touches_lifecycle() -> anyhow::Result<()> {
    common::init_basic_logging();

    let home = tempfile::tempdir()?;
    let backend = FakeBackend::failing_with(&[DbErrorCode::ConnRefused, DbErrorCode::ConnFailed]);
    let h = harness(external(home.path()), backend, FakeControl::new());
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;

    assert_eq!(ctx.connection()?.host, "dbhost");
    assert!(h
        .backend
        .connects
        .lock()
        .unwrap()
        .iter()
        .all(|(host, timeout)| host == "dbhost" && *timeout == ConnectTimeout::Infinite));
    assert_eq!(h.backend.connects.lock().unwrap().len(), 3);
    assert_eq!(h.control.probe_count(), 0);
    assert_eq!(h.control.start_count(), 0);

    Ok(())
}

#[tokio::test]
async fn standalone_starts_data_service_that_is_not_running() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let control = FakeControl::new().with_status("head01", &[ProbeStatus::NotRunning]);
    let h = harness(standalone(home.path()), FakeBackend::new(), control);
    let mut ctx = OrchestratorContext::new();

    assert_eq!(ctx.lifecycle_state(), DaemonLifecycleState::Down);

    h.orchestrator.connect(&mut ctx).await;

    assert_eq!(ctx.lifecycle_state(), DaemonLifecycleState::Starting);
    assert_eq!(*h.control.starts.lock().unwrap(), vec!["head01".to_string()]);
    assert_eq!(
        *h.backend.connects.lock().unwrap(),
        vec![("head01".to_string(), ConnectTimeout::Infinite)]
    );
    // settle delay, then one backoff at budget 0
    assert_eq!(h.sleeper.seconds(), vec![0.5, 1.0]);
    assert!(ctx.is_connected());

    Ok(())
}

#[tokio::test]
async fn backoff_follows_failure_codes() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let control = FakeControl::new().with_status("head01", &[ProbeStatus::RunningLocal]);
    let backend = FakeBackend::failing_with(&[
        DbErrorCode::ConnRefused,
        DbErrorCode::ConnRefused,
        DbErrorCode::StillStarting,
    ]);

    let h = harness(standalone(home.path()), backend, control);
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;

    let sleeps = h.sleeper.seconds();
    assert_eq!(sleeps[..3], [2.5, 4.0, 2.5]);
    assert_eq!(ctx.retry_budget(), 1);
    assert_eq!(h.backend.connects.lock().unwrap().len(), 4);
    assert_eq!(h.heartbeat.beats.load(Ordering::SeqCst), sleeps.len());
    assert_eq!(h.control.start_count(), 0);

    Ok(())
}

#[tokio::test]
async fn backoff_is_capped() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let control = FakeControl::new().with_status("head01", &[ProbeStatus::RunningLocal]);
    let backend = FakeBackend::failing_with(&[DbErrorCode::ConnRefused; 9]);

    let h = harness(standalone(home.path()), backend, control);
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;

    let sleeps = h.sleeper.seconds();
    assert!(sleeps.windows(2).all(|x| x[0] <= x[1]));
    assert!(sleeps.iter().all(|x| *x <= 10.0));
    assert_eq!(sleeps.last().copied(), Some(10.0));

    Ok(())
}

#[tokio::test]
async fn role_mismatch_stops_peer_and_renegotiates() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    std::fs::create_dir_all(home.path().join("datastore"))?;

    let control = FakeControl::new()
        .with_status(
            "pri01",
            &[ProbeStatus::RunningRemote, ProbeStatus::NotRunning],
        )
        .with_status("sec01", &[ProbeStatus::RunningLocal]);

    let h = harness(primary(home.path()), FakeBackend::new(), control);
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;

    assert_eq!(ctx.connection()?.host, "pri01");
    assert_eq!(h.backend.connected_hosts(), vec!["sec01", "pri01"]);
    assert_eq!(*h.backend.disconnects.lock().unwrap(), vec!["sec01".to_string()]);
    assert!(home.path().join("datastore/pbs_dbclose").exists());
    assert_eq!(h.sleeper.seconds(), vec![1.0, 10.0, 0.5, 1.0]);
    assert!(h.notifier.messages.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn role_mismatch_notifies_once_past_threshold() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    std::fs::create_dir_all(home.path().join("datastore"))?;

    let control = FakeControl::new()
        .with_status(
            "sec01",
            &[
                ProbeStatus::RunningRemote,
                ProbeStatus::RunningRemote,
                ProbeStatus::RunningRemote,
                ProbeStatus::RunningRemote,
                ProbeStatus::NotRunning,
            ],
        )
        .with_status("pri01", &[ProbeStatus::RunningLocal]);

    let mut persistence = secondary(home.path());
    persistence.max_stop_retries = 2;

    let h = harness(persistence, FakeBackend::new(), control);
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;

    assert_eq!(ctx.connection()?.host, "sec01");
    assert_eq!(h.backend.disconnects.lock().unwrap().len(), 4);
    assert_eq!(
        *h.notifier.messages.lock().unwrap(),
        vec!["Not able to stop data service at the primary site, please stop manually".to_string()]
    );
    assert_eq!(*h.control.starts.lock().unwrap(), vec!["sec01".to_string()]);

    Ok(())
}

#[tokio::test]
async fn role_mismatch_guard_conditions() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;

    let h = harness(standalone(home.path()), FakeBackend::new(), FakeControl::new());
    assert!(!h.orchestrator.is_role_mismatch("elsewhere"));

    let h = harness(external(home.path()), FakeBackend::new(), FakeControl::new());
    assert!(!h.orchestrator.is_role_mismatch("elsewhere"));

    let mut paired_external = primary(home.path());
    paired_external.data_service_host = Some("dbhost".to_string());
    let h = harness(paired_external, FakeBackend::new(), FakeControl::new());
    assert!(!h.orchestrator.is_role_mismatch("dbhost"));

    let h = harness(primary(home.path()), FakeBackend::new(), FakeControl::new());
    assert!(h.orchestrator.is_role_mismatch("sec01"));
    assert!(!h.orchestrator.is_role_mismatch("pri01"));

    let h = harness(secondary(home.path()), FakeBackend::new(), FakeControl::new());
    assert!(h.orchestrator.is_role_mismatch("pri01"));
    assert!(!h.orchestrator.is_role_mismatch("sec01"));

    Ok(())
}

#[tokio::test]
async fn stop_releases_connection_and_stops_local_instance() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let control = FakeControl::new().with_status("head01", &[ProbeStatus::RunningLocal]);
    let h = harness(standalone(home.path()), FakeBackend::new(), control);
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;
    h.orchestrator.stop_data_service(&mut ctx).await;

    assert!(!ctx.is_connected());
    assert!(matches!(ctx.connection(), Err(Error::NotConnected)));
    assert_eq!(*h.backend.disconnects.lock().unwrap(), vec!["head01".to_string()]);
    assert_eq!(*h.control.stops.lock().unwrap(), vec!["head01".to_string()]);
    assert_eq!(ctx.lifecycle_state(), DaemonLifecycleState::Down);
    assert_eq!(h.sleeper.seconds().last().copied(), Some(2.5));

    Ok(())
}

#[tokio::test]
async fn stop_leaves_external_instance_alone() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let h = harness(external(home.path()), FakeBackend::new(), FakeControl::new());
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;
    h.orchestrator.stop_data_service(&mut ctx).await;

    assert!(!ctx.is_connected());
    assert!(h.control.stops.lock().unwrap().is_empty());
    assert_eq!(h.control.probe_count(), 0);

    Ok(())
}

#[tokio::test]
async fn panic_shutdown_notifies_and_stops() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let control = FakeControl::new().with_status("head01", &[ProbeStatus::RunningLocal]);
    let h = harness(standalone(home.path()), FakeBackend::new(), control);
    let mut ctx = OrchestratorContext::new();

    h.orchestrator.connect(&mut ctx).await;
    h.orchestrator.prepare_panic_shutdown(&mut ctx).await;

    assert_eq!(
        *h.notifier.messages.lock().unwrap(),
        vec![PANIC_SHUTDOWN_MESSAGE.to_string()]
    );
    assert_eq!(h.control.stops.lock().unwrap().len(), 1);
    assert!(!ctx.is_connected());

    Ok(())
}

#[tokio::test]
async fn stop_marker_requires_datastore_dir() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let h = harness(standalone(home.path()), FakeBackend::new(), FakeControl::new());

    assert!(matches!(
        h.orchestrator.touch_stop_marker(),
        Err(Error::StopMarkerFailed { .. })
    ));

    std::fs::create_dir_all(home.path().join("datastore"))?;
    h.orchestrator.touch_stop_marker()?;
    h.orchestrator.touch_stop_marker()?;

    assert!(home.path().join("datastore/pbs_dbclose").exists());

    Ok(())
}

#[test]
fn heartbeat_file_is_created_and_refreshed() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let path = home.path().join("svrlive");
    let heartbeat = HeartbeatFile::new(path.clone());

    heartbeat.beat()?;
    let first = std::fs::metadata(&path)?.modified()?;

    heartbeat.beat()?;
    let second = std::fs::metadata(&path)?.modified()?;

    assert!(second >= first);

    Ok(())
}

#[tokio::test]
async fn panic_shutdown_runs_installed_flusher() -> anyhow::Result<()> {
    let home = tempfile::tempdir()?;
    let control = FakeControl::new().with_status("head01", &[ProbeStatus::RunningLocal]);
    let mut h = harness(standalone(home.path()), FakeBackend::new(), control);

    let flusher = CountingFlusher::default();
    h.orchestrator = h
        .orchestrator
        .with_flusher(Arc::new(Box::new(flusher.clone())));

    let mut ctx = OrchestratorContext::new();
    h.orchestrator.connect(&mut ctx).await;

    assert_eq!(flusher.flushes.load(Ordering::SeqCst), 0);

    h.orchestrator.prepare_panic_shutdown(&mut ctx).await;

    assert_eq!(flusher.flushes.load(Ordering::SeqCst), 1);
    assert_eq!(h.control.stops.lock().unwrap().len(), 1);

    Ok(())
}
