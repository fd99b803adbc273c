use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use kura_core::config::persistence::Persistence;
use kura_core::errors::Error;
use kura_core::status::DbErrorCode;
use kura_core::types;
use kura_dataservice::hooks::{AdminNotifier, Flusher, Heartbeat, Sleeper};
use kura_dataservice::{DataServiceControl, Orchestrator, ProbeStatus};
use kura_persistence::{Backend, ConnectTimeout, Registry};

#[allow(dead_code)]
static LOG_INIT_ONCE: Once = Once::new();

#[allow(dead_code)]
pub fn init_basic_logging() {
    LOG_INIT_ONCE.call_once(|| {
        env_logger::init();
    });
}

/// Stand-in for a backend connection, remembers where it points.
#[derive(Debug)]
pub struct FakeConnection {
    pub host: String,
}

#[derive(Clone)]
pub struct FakeBackend {
    pub connects: Arc<Mutex<Vec<(String, ConnectTimeout)>>>,
    pub disconnects: Arc<Mutex<Vec<String>>>,
    /// Codes the next connects fail with; once drained every connect succeeds.
    pub failures: Arc<Mutex<VecDeque<DbErrorCode>>>,
    registry: Arc<Registry<FakeConnection>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        Self {
            connects: Default::default(),
            disconnects: Default::default(),
            failures: Default::default(),
            registry: Arc::new(Registry::builder().build()),
        }
    }

    pub fn failing_with(codes: &[DbErrorCode]) -> Self {
        let backend = Self::new();
        backend.failures.lock().unwrap().extend(codes.iter().copied());
        backend
    }

    pub fn connected_hosts(&self) -> Vec<String> {
        self.connects
            .lock()
            .unwrap()
            .iter()
            .map(|(host, _)| host.clone())
            .collect()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    type Connection = FakeConnection;

    async fn connect(
        &self,
        host: &str,
        _port: u16,
        timeout: ConnectTimeout,
    ) -> types::Result<FakeConnection> {
        self.connects
            .lock()
            .unwrap()
            .push((host.to_string(), timeout));

        match self.failures.lock().unwrap().pop_front() {
            Some(code) => Err(Error::data_service(
                "connect",
                code,
                format!("connect to {} failed", host),
            )),
            None => Ok(FakeConnection {
                host: host.to_string(),
            }),
        }
    }

    async fn disconnect(&self, conn: FakeConnection) -> types::Result<()> {
        self.disconnects.lock().unwrap().push(conn.host);
        Ok(())
    }

    fn registry(&self) -> &Registry<FakeConnection> {
        &self.registry
    }
}

/// Scripted control: each host answers the queued statuses in turn, repeating the last one.
#[derive(Clone, Default)]
pub struct FakeControl {
    pub statuses: Arc<Mutex<HashMap<String, VecDeque<ProbeStatus>>>>,
    pub probes: Arc<Mutex<Vec<String>>>,
    pub starts: Arc<Mutex<Vec<String>>>,
    pub stops: Arc<Mutex<Vec<String>>>,
    pub start_failure: Arc<Mutex<Option<DbErrorCode>>>,
}

#[allow(dead_code)]
impl FakeControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, host: &str, statuses: &[ProbeStatus]) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(host.to_string(), statuses.iter().copied().collect());
        self
    }

    pub fn failing_start(self, code: DbErrorCode) -> Self {
        *self.start_failure.lock().unwrap() = Some(code);
        self
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }
}

#[async_trait]
impl DataServiceControl for FakeControl {
    async fn start(&self, host: &str, _port: u16) -> types::Result<()> {
        self.starts.lock().unwrap().push(host.to_string());

        match *self.start_failure.lock().unwrap() {
            Some(code) => Err(Error::data_service("start", code, "start refused")),
            None => {
                self.statuses
                    .lock()
                    .unwrap()
                    .insert(host.to_string(), VecDeque::from([ProbeStatus::RunningLocal]));
                Ok(())
            }
        }
    }

    async fn stop(&self, host: &str, _port: u16) -> types::Result<()> {
        self.stops.lock().unwrap().push(host.to_string());
        Ok(())
    }

    async fn status(&self, host: &str, _port: u16) -> types::Result<ProbeStatus> {
        self.probes.lock().unwrap().push(host.to_string());

        let mut statuses = self.statuses.lock().unwrap();
        let queue = statuses.get_mut(host).ok_or_else(|| Error::ProbeFailed {
            message: format!("no status scripted for {}", host),
        })?;

        let status = match queue.len() {
            0 => None,
            1 => queue.front().copied(),
            _ => queue.pop_front(),
        };

        status.ok_or_else(|| Error::ProbeFailed {
            message: format!("no status scripted for {}", host),
        })
    }
}

#[derive(Clone, Default)]
pub struct RecordingSleeper {
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

#[allow(dead_code)]
impl RecordingSleeper {
    pub fn seconds(&self) -> Vec<f64> {
        self.sleeps
            .lock()
            .unwrap()
            .iter()
            .map(|x| x.as_secs_f64())
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AdminNotifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Clone, Default)]
pub struct CountingHeartbeat {
    pub beats: Arc<AtomicUsize>,
}

impl Heartbeat for CountingHeartbeat {
    fn beat(&self) -> types::Result<()> {
        self.beats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CountingFlusher {
    pub flushes: Arc<AtomicUsize>,
}

impl Flusher for CountingFlusher {
    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator<FakeBackend>,
    pub backend: FakeBackend,
    pub control: FakeControl,
    pub sleeper: RecordingSleeper,
    pub notifier: RecordingNotifier,
    pub heartbeat: CountingHeartbeat,
}

#[allow(dead_code)]
pub fn harness(persistence: Persistence, backend: FakeBackend, control: FakeControl) -> Harness {
    let sleeper = RecordingSleeper::default();
    let notifier = RecordingNotifier::default();
    let heartbeat = CountingHeartbeat::default();

    let orchestrator = Orchestrator::new(
        persistence,
        Arc::new(backend.clone()),
        Arc::new(Box::new(control.clone())),
        Arc::new(Box::new(sleeper.clone())),
        Arc::new(Box::new(notifier.clone())),
        Arc::new(Box::new(heartbeat.clone())),
    );

    Harness {
        orchestrator,
        backend,
        control,
        sleeper,
        notifier,
        heartbeat,
    }
}

fn persistence(home: &Path, extra: serde_json::Value) -> Persistence {
    let mut value = serde_json::json!({
        "home_path": home,
        "server_host": "head01",
        "start_settle_millis": 500,
    });

    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }

    serde_json::from_value(value).unwrap()
}

#[allow(dead_code)]
pub fn standalone(home: &Path) -> Persistence {
    persistence(home, serde_json::json!({}))
}

#[allow(dead_code)]
pub fn external(home: &Path) -> Persistence {
    persistence(home, serde_json::json!({ "data_service_host": "dbhost" }))
}

#[allow(dead_code)]
pub fn primary(home: &Path) -> Persistence {
    persistence(
        home,
        serde_json::json!({ "primary_host": "pri01", "secondary_host": "sec01" }),
    )
}

#[allow(dead_code)]
pub fn secondary(home: &Path) -> Persistence {
    persistence(
        home,
        serde_json::json!({
            "primary_host": "pri01",
            "secondary_host": "sec01",
            "failover_active": true,
        }),
    )
}
