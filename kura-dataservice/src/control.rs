//! Administrative verbs issued against a data service instance.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use kura_core::config::persistence::Persistence;
use kura_core::errors::Error;
use kura_core::status::DbErrorCode;
use kura_core::types;
use tokio::process::Command;

/// Where a probed data service instance was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[repr(i32)]
pub enum ProbeStatus {
    #[strum(serialize = "running_local")]
    RunningLocal = 0,

    #[strum(serialize = "not_running")]
    NotRunning = 1,

    #[strum(serialize = "running_remote")]
    RunningRemote = 2,
}

impl ProbeStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::RunningLocal),
            1 => Some(Self::NotRunning),
            2 => Some(Self::RunningRemote),
            _ => None,
        }
    }
}

/// Code reported for a probe that could not determine the status.
pub const PROBE_ERROR_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ControlVerb {
    #[strum(serialize = "start")]
    Start,

    #[strum(serialize = "stop")]
    Stop,

    #[strum(serialize = "status")]
    Status,
}

#[async_trait]
pub trait DataServiceControl: Send + Sync {
    /// Issues the start request. An `OomGuard` coded error means the service was
    /// started without protection from the OOM killer.
    async fn start(&self, host: &str, port: u16) -> types::Result<()>;

    async fn stop(&self, host: &str, port: u16) -> types::Result<()>;

    /// A probe that cannot determine the status fails with `ProbeFailed`.
    async fn status(&self, host: &str, port: u16) -> types::Result<ProbeStatus>;
}

/// Exit code of `start` when the OOM score file could not be written.
const START_OOM_GUARD_EXIT_CODE: i32 = 3;

/// Drives the data service through its control script: `<command> <verb> <host> <port>`.
pub struct ScriptControl {
    command: PathBuf,
    timeout: Duration,
}

impl ScriptControl {
    pub fn new(command: PathBuf, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn from_persistence(persistence: &Persistence) -> Self {
        Self::new(
            persistence.control_command.clone(),
            persistence.control_timeout(),
        )
    }

    fn command_line(&self, verb: ControlVerb) -> String {
        format!("{} {}", self.command.display(), verb)
    }

    async fn run(&self, verb: ControlVerb, host: &str, port: u16) -> types::Result<(i32, String)> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.command)
                .arg(verb.to_string())
                .arg(host)
                .arg(port.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::ControlCommandFailed {
            command: self.command_line(verb),
            message: format!("timed out after {}s", self.timeout.as_secs()),
            source: anyhow::anyhow!("control command timeout"),
        })?
        .map_err(|e| Error::ControlCommandFailed {
            command: self.command_line(verb),
            message: e.to_string(),
            source: e.into(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let diagnostic = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        // Killed by a signal.
        let code = output.status.code().unwrap_or(-1);

        tracing::debug!(
            "'{}' for {}:{} exited with code {}",
            self.command_line(verb),
            host,
            port,
            code
        );

        Ok((code, diagnostic))
    }
}

#[async_trait]
impl DataServiceControl for ScriptControl {
    async fn start(&self, host: &str, port: u16) -> types::Result<()> {
        match self.run(ControlVerb::Start, host, port).await? {
            (0, _) => Ok(()),
            (START_OOM_GUARD_EXIT_CODE, diagnostic) => Err(Error::data_service(
                "start",
                DbErrorCode::OomGuard,
                diagnostic,
            )),
            (code, diagnostic) => Err(Error::data_service(
                "start",
                DbErrorCode::Generic,
                format!("exit code {}, {}", code, diagnostic),
            )),
        }
    }

    async fn stop(&self, host: &str, port: u16) -> types::Result<()> {
        match self.run(ControlVerb::Stop, host, port).await? {
            (0, _) => Ok(()),
            (code, diagnostic) => Err(Error::data_service(
                "stop",
                DbErrorCode::Generic,
                format!("exit code {}, {}", code, diagnostic),
            )),
        }
    }

    async fn status(&self, host: &str, port: u16) -> types::Result<ProbeStatus> {
        let (code, diagnostic) = self
            .run(ControlVerb::Status, host, port)
            .await
            .map_err(|e| Error::ProbeFailed {
                message: e.to_string(),
            })?;

        ProbeStatus::from_code(code).ok_or_else(|| Error::ProbeFailed {
            message: format!("exit code {}, {}", code, diagnostic),
        })
    }
}
