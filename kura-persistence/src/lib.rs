use kura_core::types;
use kura_persistence_migration::Migrator;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

pub mod backend;
pub mod cursor;
pub mod object;
pub mod object_store;
pub mod registry;
pub mod sql;

pub use backend::{Backend, ConnectTimeout};
pub use object::{EntityType, ObjectDescriptor};
pub use registry::{Operation, Registry};

pub async fn apply_migrations(connection: &DatabaseConnection) -> types::Result<()> {
    Migrator::up(connection, None).await?;

    Ok(())
}
