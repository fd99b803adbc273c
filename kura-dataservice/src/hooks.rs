//! Side effects of the retry loop that tests replace.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use kura_core::errors::ToUnknownErrorResult;
use kura_core::types;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delivers a message to the cluster administrator.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Hands administrator notices to the log, where the mailer picks them up.
pub struct LogNotifier;

#[async_trait]
impl AdminNotifier for LogNotifier {
    async fn notify(&self, message: &str) {
        tracing::error!(target: "kura::admin", "{}", message);
    }
}

/// Pushes out buffered log records and spans before the process exits.
pub trait Flusher: Send + Sync {
    fn flush(&self);
}

pub struct LogFlusher;

impl Flusher for LogFlusher {
    fn flush(&self) {
        log::logger().flush();
    }
}

/// Tells external supervisors that the process is alive.
pub trait Heartbeat: Send + Sync {
    fn beat(&self) -> types::Result<()>;
}

/// Touches the liveness file, bumping its modification time.
pub struct HeartbeatFile {
    path: PathBuf,
}

impl HeartbeatFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Heartbeat for HeartbeatFile {
    fn beat(&self) -> types::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)
            .to_unknown_err_result()?;

        file.set_modified(std::time::SystemTime::now())
            .to_unknown_err_result()
    }
}
