//! Stable status codes surfaced by the data-service layer and their diagnostic text.

use serde::{Deserialize, Serialize};

/// Small, stable set of codes that every backend error is reduced to before it
/// reaches the orchestrator or the dispatch registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[repr(i32)]
pub enum DbErrorCode {
    #[strum(serialize = "success")]
    Success = 0,

    #[strum(serialize = "out_of_memory")]
    NoMem = 1,

    #[strum(serialize = "still_starting")]
    StillStarting = 2,

    #[strum(serialize = "auth_failed")]
    AuthFailed = 3,

    #[strum(serialize = "connection_refused")]
    ConnRefused = 4,

    #[strum(serialize = "connection_failed")]
    ConnFailed = 5,

    #[strum(serialize = "oom_guard_unavailable")]
    OomGuard = 6,

    #[strum(serialize = "generic")]
    Generic = -1,
}

impl DbErrorCode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::NoMem),
            2 => Some(Self::StillStarting),
            3 => Some(Self::AuthFailed),
            4 => Some(Self::ConnRefused),
            5 => Some(Self::ConnFailed),
            6 => Some(Self::OomGuard),
            -1 => Some(Self::Generic),
            _ => None,
        }
    }

    /// Reduce a driver error message to one of the stable codes.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();

        if message.contains("starting up") || message.contains("still starting") {
            Self::StillStarting
        } else if message.contains("authentication failed") || message.contains("password") {
            Self::AuthFailed
        } else if message.contains("connection refused") {
            Self::ConnRefused
        } else if message.contains("out of memory") {
            Self::NoMem
        } else if message.contains("connect")
            || message.contains("timed out")
            || message.contains("pool")
        {
            Self::ConnFailed
        } else {
            Self::Generic
        }
    }
}

const DEFAULT_MESSAGE: &str = "data service error";

/// Translates status codes into operator-facing text.
///
/// `Generic` has no fixed text: it reports whatever the last failing low-level
/// call recorded. That slot is overwritten by every [`ErrorCatalog::record`], so
/// callers must read it right after the failure they care about.
#[derive(Debug, Default, Clone)]
pub struct ErrorCatalog {
    last_diagnostic: Option<String>,
}

impl ErrorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, function: &str, message: &str, detail: Option<&str>) {
        self.last_diagnostic = Some(format!(
            "{} failed: {} {}",
            function,
            message,
            detail.unwrap_or("")
        ));
    }

    pub fn last_diagnostic(&self) -> Option<&str> {
        self.last_diagnostic.as_deref()
    }

    pub fn translate(&self, code: DbErrorCode) -> Option<String> {
        match code {
            DbErrorCode::StillStarting => Some("data service is still starting up".to_string()),
            DbErrorCode::AuthFailed => Some("data service authentication failed".to_string()),
            DbErrorCode::NoMem => Some("out of memory in connect".to_string()),
            DbErrorCode::ConnRefused => Some("data service not running".to_string()),
            DbErrorCode::ConnFailed => Some("failed to connect to data service".to_string()),
            DbErrorCode::OomGuard => Some(
                "failed to protect the data service from the OOM killer, no access to OOM score file"
                    .to_string(),
            ),
            DbErrorCode::Generic => self.last_diagnostic.clone(),
            DbErrorCode::Success => Some(DEFAULT_MESSAGE.to_string()),
        }
    }

    /// Same as [`ErrorCatalog::translate`] for codes read off the wire or a process exit.
    pub fn translate_raw(&self, code: i32) -> Option<String> {
        match DbErrorCode::from_i32(code) {
            Some(code) => self.translate(code),
            None => Some(DEFAULT_MESSAGE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_reads_last_diagnostic() {
        let mut catalog = ErrorCatalog::new();
        assert_eq!(catalog.translate(DbErrorCode::Generic), None);

        catalog.record("connect", "refused", Some("port 15007"));
        catalog.record("status", "exit code 7", None);

        assert_eq!(
            catalog.translate(DbErrorCode::Generic).as_deref(),
            Some("status failed: exit code 7 ")
        );
    }

    #[test]
    fn classify_driver_messages() {
        assert_eq!(
            DbErrorCode::classify("error communicating with database: Connection refused (os error 111)"),
            DbErrorCode::ConnRefused
        );
        assert_eq!(
            DbErrorCode::classify("FATAL: the database system is starting up"),
            DbErrorCode::StillStarting
        );
        assert_eq!(
            DbErrorCode::classify("password authentication failed for user \"kura\""),
            DbErrorCode::AuthFailed
        );
        assert_eq!(DbErrorCode::classify("duplicate key"), DbErrorCode::Generic);
    }

    #[test]
    fn unknown_raw_code_uses_default_text() {
        let catalog = ErrorCatalog::new();
        assert_eq!(catalog.translate_raw(42).as_deref(), Some(DEFAULT_MESSAGE));
        assert_eq!(
            catalog.translate_raw(4).as_deref(),
            Some("data service not running")
        );
    }
}
