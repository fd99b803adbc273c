//! PostgreSQL backend built on SeaORM.

mod handler;

pub use handler::ObjectStoreHandler;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kura_core::config::persistence::Persistence;
use kura_core::errors::Error;
use kura_core::status::DbErrorCode;
use kura_core::types;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::backend::{Backend, ConnectTimeout};
use crate::object::EntityType;
use crate::registry::{ObjectHandler, Operation, Registry};

pub struct SqlBackend {
    scheme: String,
    user: String,
    password: Option<String>,
    database: String,
    registry: Registry<DatabaseConnection>,
}

impl SqlBackend {
    pub fn new(persistence: &Persistence) -> Self {
        Self {
            scheme: persistence.database_scheme.clone(),
            user: persistence.database_user.clone(),
            password: persistence.database_password.clone(),
            database: persistence.database_name.clone(),
            registry: default_registry(),
        }
    }

    pub fn connection_url(&self, host: &str, port: u16) -> String {
        let credentials = match &self.password {
            Some(password) => format!("{}:{}", self.user, password),
            None => self.user.clone(),
        };

        format!(
            "{}://{}@{}:{}/{}",
            self.scheme, credentials, host, port, self.database
        )
    }
}

/// Operations each entity type supports on this backend.
pub fn default_registry() -> Registry<DatabaseConnection> {
    use Operation::*;

    let handler = |kind| {
        Arc::new(ObjectStoreHandler::new(kind)) as Arc<dyn ObjectHandler<DatabaseConnection>>
    };

    Registry::builder()
        .register(handler(EntityType::Server), &[Save, Load, DeleteAttributes])
        .register(
            handler(EntityType::Scheduler),
            &[Save, Delete, Load, Find, DeleteAttributes, Reset],
        )
        .register(
            handler(EntityType::Queue),
            &[Save, Delete, Load, Find, DeleteAttributes, Reset],
        )
        .register(
            handler(EntityType::Node),
            &[Save, Delete, Load, Find, DeleteAttributes],
        )
        .register(handler(EntityType::MomInfoTimestamp), &[Save, Load])
        .register(
            handler(EntityType::Job),
            &[Save, Delete, Load, Find, DeleteAttributes, Reset],
        )
        .register(handler(EntityType::JobScript), &[Save, Load])
        .register(
            handler(EntityType::Reservation),
            &[Save, Delete, Load, Find, DeleteAttributes, Reset],
        )
        .build()
}

#[async_trait]
impl Backend for SqlBackend {
    type Connection = DatabaseConnection;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: ConnectTimeout,
    ) -> types::Result<DatabaseConnection> {
        let mut connect_opts = ConnectOptions::new(self.connection_url(host, port));

        // The scheduler serializes all persistence calls through one connection.
        connect_opts.max_connections(1).min_connections(1);

        connect_opts.sqlx_logging(true);
        connect_opts.sqlx_logging_level(log::LevelFilter::Trace);
        connect_opts.sqlx_slow_statements_logging_settings(
            log::LevelFilter::Warn,
            Duration::from_millis(100),
        );

        if let ConnectTimeout::Normal(duration) = timeout {
            connect_opts.connect_timeout(duration).acquire_timeout(duration);
        }

        Database::connect(connect_opts).await.map_err(|e| {
            let message = e.to_string();
            Error::data_service("connect", DbErrorCode::classify(&message), message)
        })
    }

    async fn disconnect(&self, conn: DatabaseConnection) -> types::Result<()> {
        conn.close().await?;

        Ok(())
    }

    fn registry(&self) -> &Registry<DatabaseConnection> {
        &self.registry
    }
}
