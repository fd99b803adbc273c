//! Decides which data service instance to connect to and with what timeout.

use kura_core::config::persistence::{NodeRole, Persistence};
use kura_core::errors::Error;
use kura_core::status::DbErrorCode;
use kura_core::types;
use kura_persistence::{Backend, ConnectTimeout};

use crate::control::{ProbeStatus, PROBE_ERROR_CODE};
use crate::lifecycle::{DaemonLifecycleState, LifecycleController};
use crate::metric;
use crate::orchestrator::OrchestratorContext;

/// Where this node stands relative to the instance it is about to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FailoverRole {
    ExternallyManaged,
    PrimaryOwnsLocal,
    SecondaryOwnsLocal,
    PrimaryOnSecondary,
    SecondaryOnPrimary,
    Standalone,
}

impl FailoverRole {
    /// True when this node starts and stops the target instance itself.
    pub fn owns_target(self) -> bool {
        matches!(
            self,
            Self::PrimaryOwnsLocal | Self::SecondaryOwnsLocal | Self::Standalone
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub timeout: ConnectTimeout,
    pub role: FailoverRole,
}

#[derive(Clone)]
pub struct Negotiator {
    persistence: Persistence,
    lifecycle: LifecycleController,
}

impl Negotiator {
    pub fn new(persistence: Persistence, lifecycle: LifecycleController) -> Self {
        Self {
            persistence,
            lifecycle,
        }
    }

    /// The external instance, when one is configured. It is never probed, started or stopped.
    pub fn external_target(&self) -> Option<Target> {
        self.persistence
            .data_service_host
            .as_ref()
            .map(|host| Target {
                host: host.clone(),
                timeout: ConnectTimeout::Infinite,
                role: FailoverRole::ExternallyManaged,
            })
    }

    /// Target for an instance under our control, given the status probed on our own host.
    pub fn resolve(&self, status: ProbeStatus) -> Target {
        let own_host = self.persistence.own_host().to_string();
        let peer_host = self
            .persistence
            .peer_host()
            .map(str::to_string)
            .unwrap_or_else(|| own_host.clone());

        let normal = ConnectTimeout::Normal(self.persistence.connect_timeout());
        let remote = status == ProbeStatus::RunningRemote;

        let (host, timeout, role) = match self.persistence.node_role() {
            NodeRole::Standalone => (own_host, ConnectTimeout::Infinite, FailoverRole::Standalone),
            NodeRole::Primary if remote => (peer_host, normal, FailoverRole::PrimaryOnSecondary),
            NodeRole::Primary => (
                own_host,
                ConnectTimeout::Infinite,
                FailoverRole::PrimaryOwnsLocal,
            ),
            NodeRole::Secondary if remote => (peer_host, normal, FailoverRole::SecondaryOnPrimary),
            NodeRole::Secondary => (
                own_host,
                ConnectTimeout::Infinite,
                FailoverRole::SecondaryOwnsLocal,
            ),
        };

        Target {
            host,
            timeout,
            role,
        }
    }

    /// One negotiation round: pick a target, start our own instance if it is down,
    /// then connect. Every failure is recorded in the context's catalog before it is returned.
    pub async fn negotiate<B: Backend>(
        &self,
        backend: &B,
        ctx: &mut OrchestratorContext<B::Connection>,
    ) -> types::Result<B::Connection> {
        match self.try_negotiate(backend, ctx).await {
            Ok(connection) => Ok(connection),
            Err(e) => {
                ctx.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn try_negotiate<B: Backend>(
        &self,
        backend: &B,
        ctx: &mut OrchestratorContext<B::Connection>,
    ) -> types::Result<B::Connection> {
        let port = self.persistence.data_service_port;

        let target = match self.external_target() {
            Some(target) => target,
            None => self.negotiate_owned(ctx, port).await?,
        };

        tracing::debug!(
            "negotiated data service target {}:{} as {}",
            target.host,
            port,
            target.role
        );

        ctx.host = Some(target.host.clone());

        if target.role.owns_target() && !ctx.lifecycle.is_up() {
            return Err(Error::NotConnected);
        }

        self.connect(backend, &target, port).await
    }

    async fn negotiate_owned<C>(
        &self,
        ctx: &mut OrchestratorContext<C>,
        port: u16,
    ) -> types::Result<Target> {
        let own_host = self.persistence.own_host().to_string();

        let status = match self.lifecycle.probe(&own_host, port).await {
            Ok(status) => status,
            Err(e) => {
                ctx.budget.observe_probe(PROBE_ERROR_CODE);
                return Err(e);
            }
        };

        tracing::info!("data service status exit code {}", status.code());

        if ctx.budget.observe_probe(status.code()) {
            tracing::debug!("data service status changed to '{}', retry budget reset", status);
        }

        let target = self.resolve(status);

        match (status, target.role) {
            (ProbeStatus::NotRunning, _)
            | (ProbeStatus::RunningRemote, FailoverRole::Standalone) => {
                ctx.lifecycle = self.lifecycle.start(&target.host, port).await;
            }
            (ProbeStatus::RunningLocal, _)
            | (ProbeStatus::RunningRemote, FailoverRole::SecondaryOnPrimary) => {
                ctx.lifecycle = DaemonLifecycleState::Started;
            }
            _ => {}
        }

        Ok(target)
    }

    async fn connect<B: Backend>(
        &self,
        backend: &B,
        target: &Target,
        port: u16,
    ) -> types::Result<B::Connection> {
        metric::connection_attempt_metric()
            .with_label_values(&[&target.host])
            .inc();

        if target.role != FailoverRole::ExternallyManaged {
            if let ProbeStatus::NotRunning = self.lifecycle.probe(&target.host, port).await? {
                return Err(Error::data_service(
                    "connect",
                    DbErrorCode::ConnRefused,
                    format!("no data service running for {}", target.host),
                ));
            }
        }

        backend.connect(&target.host, port, target.timeout).await
    }
}
