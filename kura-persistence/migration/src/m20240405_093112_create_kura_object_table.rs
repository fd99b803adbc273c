use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(KuraObject::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(KuraObject::ObjectType).string().not_null())
                    .col(ColumnDef::new(KuraObject::ObjectId).string().not_null())
                    .col(ColumnDef::new(KuraObject::ParentId).string())
                    .col(
                        ColumnDef::new(KuraObject::Rank)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(KuraObject::Attributes).json().not_null())
                    .col(ColumnDef::new(KuraObject::Body).json().not_null())
                    .col(ColumnDef::new(KuraObject::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(KuraObject::UpdatedAt).date_time().not_null())
                    .primary_key(
                        Index::create()
                            .col(KuraObject::ObjectType)
                            .col(KuraObject::ObjectId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_kura_object_parent")
                    .table(KuraObject::Table)
                    .col(KuraObject::ObjectType)
                    .col(KuraObject::ParentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KuraObject::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum KuraObject {
    Table,
    ObjectType,
    ObjectId,
    ParentId,
    Rank,
    Attributes,
    Body,
    CreatedAt,
    UpdatedAt,
}
