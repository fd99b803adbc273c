use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::Constants;
use crate::errors::Error;
use crate::types;

/// Which side of the deployment this node plays, as far as the data service is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum NodeRole {
    Standalone,
    Primary,
    Secondary,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Persistence {
    pub home_path: PathBuf,

    /// Set when the database is run by somebody else; we never start or stop it.
    #[serde(default)]
    pub data_service_host: Option<String>,

    #[serde(default)]
    pub primary_host: Option<String>,

    #[serde(default)]
    pub secondary_host: Option<String>,

    /// Host of the data service when no failover pair is configured.
    pub server_host: String,

    #[serde(default = "default_data_service_port")]
    pub data_service_port: u16,

    /// True when this node is the secondary of a failover pair.
    #[serde(default)]
    pub failover_active: bool,

    #[serde(default = "default_database_scheme")]
    pub database_scheme: String,

    #[serde(default = "default_database_user")]
    pub database_user: String,

    #[serde(default)]
    pub database_password: Option<String>,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    #[serde(default = "default_control_command")]
    pub control_command: PathBuf,

    #[serde(default = "default_control_timeout_seconds")]
    pub control_timeout_seconds: u64,

    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_max_loop_delay_seconds")]
    pub max_loop_delay_seconds: u64,

    #[serde(default = "default_max_stop_retries")]
    pub max_stop_retries: u32,

    #[serde(default = "default_mismatch_cooldown_seconds")]
    pub mismatch_cooldown_seconds: u64,

    #[serde(default = "default_start_settle_millis")]
    pub start_settle_millis: u64,
}

impl Persistence {
    pub fn validate(&self) -> types::Result<()> {
        if self.primary_host.is_some() != self.secondary_host.is_some() {
            return Err(Error::InvalidConfiguration {
                message: "failover requires both primary_host and secondary_host to be set"
                    .to_string(),
            });
        }

        if self.failover_active && self.primary_host.is_none() {
            return Err(Error::InvalidConfiguration {
                message: "failover_active is set but no failover pair is configured".to_string(),
            });
        }

        if self.max_loop_delay_seconds == 0 {
            return Err(Error::InvalidConfiguration {
                message: "max_loop_delay_seconds must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn is_externally_managed(&self) -> bool {
        self.data_service_host.is_some()
    }

    pub fn is_failover_configured(&self) -> bool {
        self.primary_host.is_some()
    }

    pub fn node_role(&self) -> NodeRole {
        match (self.primary_host.is_some(), self.failover_active) {
            (false, _) => NodeRole::Standalone,
            (true, false) => NodeRole::Primary,
            (true, true) => NodeRole::Secondary,
        }
    }

    /// Host of the data service instance this node owns.
    pub fn own_host(&self) -> &str {
        match self.node_role() {
            NodeRole::Standalone => &self.server_host,
            NodeRole::Primary => self.primary_host.as_deref().unwrap_or(&self.server_host),
            NodeRole::Secondary => self.secondary_host.as_deref().unwrap_or(&self.server_host),
        }
    }

    /// Host of the instance owned by the other side of the failover pair, if any.
    pub fn peer_host(&self) -> Option<&str> {
        match self.node_role() {
            NodeRole::Standalone => None,
            NodeRole::Primary => self.secondary_host.as_deref(),
            NodeRole::Secondary => self.primary_host.as_deref(),
        }
    }

    pub fn stop_marker_path(&self) -> PathBuf {
        self.home_path
            .join(Constants::DatastoreDir.to_string())
            .join(Constants::StopMarkerFile.to_string())
    }

    pub fn liveness_path(&self) -> PathBuf {
        self.home_path
            .join(Constants::ServerPrivDir.to_string())
            .join(Constants::LivenessFile.to_string())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn max_loop_delay(&self) -> Duration {
        Duration::from_secs(self.max_loop_delay_seconds)
    }

    pub fn mismatch_cooldown(&self) -> Duration {
        Duration::from_secs(self.mismatch_cooldown_seconds)
    }

    pub fn start_settle(&self) -> Duration {
        Duration::from_millis(self.start_settle_millis)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_seconds)
    }
}

fn default_data_service_port() -> u16 {
    15007
}

fn default_database_scheme() -> String {
    "postgres".to_string()
}

fn default_database_user() -> String {
    "postgres".to_string()
}

fn default_database_name() -> String {
    "pbs_datastore".to_string()
}

fn default_control_command() -> PathBuf {
    PathBuf::from("/opt/pbs/sbin/pbs_dataservice")
}

fn default_control_timeout_seconds() -> u64 {
    60
}

fn default_connect_timeout_seconds() -> u64 {
    30
}

fn default_max_loop_delay_seconds() -> u64 {
    10
}

fn default_max_stop_retries() -> u32 {
    5
}

fn default_mismatch_cooldown_seconds() -> u64 {
    10
}

fn default_start_settle_millis() -> u64 {
    1000
}
