//! The failover retry loop: keeps negotiating until this node holds a connection
//! to the data service instance it is supposed to use.

use std::fs::OpenOptions;
use std::sync::Arc;

use kura_core::config::persistence::{NodeRole, Persistence};
use kura_core::errors::Error;
use kura_core::status::{DbErrorCode, ErrorCatalog};
use kura_core::types;
use kura_persistence::Backend;

use crate::control::{DataServiceControl, ProbeStatus, ScriptControl};
use crate::hooks::{
    AdminNotifier, Flusher, Heartbeat, HeartbeatFile, LogFlusher, LogNotifier, Sleeper,
    TokioSleeper,
};
use crate::lifecycle::{DaemonLifecycleState, LifecycleController};
use crate::metric;
use crate::negotiator::Negotiator;
use crate::retry::{backoff_delay, RetryBudget};

pub const PANIC_SHUTDOWN_MESSAGE: &str =
    "Panic shutdown of server on data service error. Please check the home file system for a no space condition.";

/// Everything the retry loop mutates, owned by the caller instead of living in globals.
pub struct OrchestratorContext<C> {
    pub(crate) connection: Option<C>,
    pub(crate) lifecycle: DaemonLifecycleState,
    pub(crate) budget: RetryBudget,
    pub(crate) host: Option<String>,
    pub(crate) catalog: ErrorCatalog,
}

impl<C> Default for OrchestratorContext<C> {
    fn default() -> Self {
        Self {
            connection: None,
            lifecycle: DaemonLifecycleState::Down,
            budget: RetryBudget::new(),
            host: None,
            catalog: ErrorCatalog::new(),
        }
    }
}

impl<C> OrchestratorContext<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active connection. Do not hold on to it across a reconnect.
    pub fn connection(&self) -> types::Result<&C> {
        self.connection.as_ref().ok_or(Error::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Host of the instance last negotiated.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn lifecycle_state(&self) -> DaemonLifecycleState {
        self.lifecycle
    }

    pub fn retry_budget(&self) -> u32 {
        self.budget.value()
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Captures the failure in the diagnostic slot and logs its operator-facing text.
    pub(crate) fn record_failure(&mut self, error: &Error) {
        let (function, message) = match error {
            Error::DataService {
                function, message, ..
            } => (function.as_str(), message.clone()),
            Error::ProbeFailed { message } => ("status", message.clone()),
            e => ("connect", e.to_string()),
        };

        self.catalog.record(function, &message, None);

        if let Some(text) = self.catalog.translate(error.code()) {
            tracing::error!("{}", text);
        }
    }
}

enum ConnectState<C> {
    NotConnected,
    Connected(C),
    Failed(DbErrorCode),
}

pub struct Orchestrator<B: Backend> {
    persistence: Persistence,
    backend: Arc<B>,
    lifecycle: LifecycleController,
    negotiator: Negotiator,
    sleeper: Arc<Box<dyn Sleeper>>,
    notifier: Arc<Box<dyn AdminNotifier>>,
    heartbeat: Arc<Box<dyn Heartbeat>>,
    flusher: Arc<Box<dyn Flusher>>,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(
        persistence: Persistence,
        backend: Arc<B>,
        control: Arc<Box<dyn DataServiceControl>>,
        sleeper: Arc<Box<dyn Sleeper>>,
        notifier: Arc<Box<dyn AdminNotifier>>,
        heartbeat: Arc<Box<dyn Heartbeat>>,
    ) -> Self {
        let lifecycle =
            LifecycleController::new(control, sleeper.clone(), persistence.start_settle());
        let negotiator = Negotiator::new(persistence.clone(), lifecycle.clone());

        Self {
            persistence,
            backend,
            lifecycle,
            negotiator,
            sleeper,
            notifier,
            heartbeat,
            flusher: Arc::new(Box::new(LogFlusher)),
        }
    }

    /// Replaces what the panic path flushes before exiting.
    pub fn with_flusher(mut self, flusher: Arc<Box<dyn Flusher>>) -> Self {
        self.flusher = flusher;
        self
    }

    /// Control script, real sleeps, log notifications and the liveness file under the home path.
    pub fn with_defaults(persistence: Persistence, backend: Arc<B>) -> Self {
        let control = ScriptControl::from_persistence(&persistence);
        let heartbeat = HeartbeatFile::new(persistence.liveness_path());

        Self::new(
            persistence,
            backend,
            Arc::new(Box::new(control)),
            Arc::new(Box::new(TokioSleeper)),
            Arc::new(Box::new(LogNotifier)),
            Arc::new(Box::new(heartbeat)),
        )
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// True when the connected host is the failover peer's instance rather than our own.
    pub fn is_role_mismatch(&self, connected_host: &str) -> bool {
        self.persistence.is_failover_configured()
            && !self.persistence.is_externally_managed()
            && connected_host != self.persistence.own_host()
    }

    /// Retries until connected to the right instance, then leaves the connection in `ctx`.
    pub async fn connect(&self, ctx: &mut OrchestratorContext<B::Connection>) {
        self.release(ctx).await;

        let mut mismatches: u32 = 0;
        let mut notified = false;

        loop {
            tracing::info!("connecting to data service");

            let connection = self.retry_until_connected(ctx).await;
            let host = ctx.host.clone().unwrap_or_default();

            if !self.is_role_mismatch(&host) {
                ctx.connection = Some(connection);
                return;
            }

            metric::role_mismatch_metric().inc();

            let peer_side = self.peer_side();

            tracing::error!(
                "data service is up on the {} instance {}, attempting to stop it",
                peer_side,
                host
            );

            if let Err(e) = self.backend.disconnect(connection).await {
                tracing::warn!("failed to disconnect from {}, {}", host, e);
            }

            if let Err(e) = self.touch_stop_marker() {
                tracing::error!("{}", e);
            }

            if !notified {
                mismatches += 1;

                if mismatches > self.persistence.max_stop_retries {
                    let message = format!(
                        "Not able to stop data service at the {} site, please stop manually",
                        peer_side
                    );

                    tracing::error!("{}", message);
                    self.notifier.notify(&message).await;
                    notified = true;
                }
            }

            self.sleeper.sleep(self.persistence.mismatch_cooldown()).await;
        }
    }

    async fn retry_until_connected(
        &self,
        ctx: &mut OrchestratorContext<B::Connection>,
    ) -> B::Connection {
        let max_delay = self.persistence.max_loop_delay();
        let mut state = ConnectState::NotConnected;

        ctx.budget.reset();

        loop {
            state = match state {
                ConnectState::Connected(connection) => {
                    tracing::info!(
                        "connected to data service@{}",
                        ctx.host.as_deref().unwrap_or_default()
                    );
                    return connection;
                }
                ConnectState::NotConnected => {
                    match self.negotiator.negotiate(self.backend.as_ref(), ctx).await {
                        Ok(connection) => ConnectState::Connected(connection),
                        Err(e) => ConnectState::Failed(e.code()),
                    }
                }
                failed => failed,
            };

            if let ConnectState::Failed(code) = state {
                self.release(ctx).await;

                let budget = ctx.budget.record_failure(code);
                ctx.lifecycle = DaemonLifecycleState::Down;

                metric::connection_failure_metric()
                    .with_label_values(&[
                        ctx.host.as_deref().unwrap_or_default(),
                        &code.to_string(),
                    ])
                    .inc();

                tracing::debug!(
                    "connection attempt failed with '{}', retry budget {}",
                    code,
                    budget
                );

                state = ConnectState::NotConnected;
            }

            let delay = ctx.budget.delay(max_delay);
            metric::retry_backoff_duration_metric().observe(delay.as_secs_f64());

            self.sleeper.sleep(delay).await;
            self.beat();
        }
    }

    /// Disconnects the active connection, if any.
    pub async fn release(&self, ctx: &mut OrchestratorContext<B::Connection>) {
        if let Some(connection) = ctx.connection.take() {
            if let Err(e) = self.backend.disconnect(connection).await {
                tracing::warn!("failed to disconnect from data service, {}", e);
            }
        }
    }

    /// Disconnects, then stops our own instance if it is still running here.
    pub async fn stop_data_service(&self, ctx: &mut OrchestratorContext<B::Connection>) {
        self.release(ctx).await;

        if self.persistence.is_externally_managed() {
            return;
        }

        let host = ctx
            .host
            .clone()
            .unwrap_or_else(|| self.persistence.own_host().to_string());
        let port = self.persistence.data_service_port;

        match self.lifecycle.probe(&host, port).await {
            Ok(ProbeStatus::RunningLocal) => {}
            Ok(status) => {
                tracing::info!("data service for {} is {}, nothing to stop", host, status);
                return;
            }
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        }

        self.lifecycle.stop(&host, port).await;
        ctx.lifecycle = DaemonLifecycleState::Down;

        self.sleeper
            .sleep(backoff_delay(1, self.persistence.max_loop_delay()))
            .await;
    }

    /// Everything the panic shutdown does short of exiting.
    pub async fn prepare_panic_shutdown(&self, ctx: &mut OrchestratorContext<B::Connection>) {
        tracing::error!("{}", PANIC_SHUTDOWN_MESSAGE);

        self.notifier.notify(PANIC_SHUTDOWN_MESSAGE).await;
        self.stop_data_service(ctx).await;

        self.flusher.flush();
    }

    /// Called when a save fails in a way the server cannot recover from.
    pub async fn panic_shutdown(&self, ctx: &mut OrchestratorContext<B::Connection>) -> ! {
        self.prepare_panic_shutdown(ctx).await;

        std::process::exit(1);
    }

    /// Signals that the data service was stopped on purpose.
    pub fn touch_stop_marker(&self) -> types::Result<()> {
        let path = self.persistence.stop_marker_path();

        OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map(|_| ())
            .map_err(|e| Error::StopMarkerFailed {
                path: path.display().to_string(),
                source: e,
            })
    }

    fn peer_side(&self) -> &'static str {
        match self.persistence.node_role() {
            NodeRole::Secondary => "primary",
            _ => "secondary",
        }
    }

    fn beat(&self) {
        if let Err(e) = self.heartbeat.beat() {
            tracing::warn!("failed to update liveness file, {}", e);
        }
    }
}

