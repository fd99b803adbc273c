pub use sea_orm_migration::prelude::*;

mod m20240405_093112_create_kura_object_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20240405_093112_create_kura_object_table::Migration,
        )]
    }
}
