use async_trait::async_trait;
use chrono::Utc;
use kura_core::errors::Error;
use kura_core::types;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde_json::Value as Json;

use crate::cursor::QueryCursor;
use crate::object::{
    AttributeList, DbOutcome, EntityType, LoadOutcome, ObjectDescriptor, QueryOptions, SaveMode,
};
use crate::object_store::{ActiveModel, Column, Entity, Model};
use crate::registry::ObjectHandler;

/// Stores every entity type as a row of the shared object table, keyed by type and id.
pub struct ObjectStoreHandler {
    kind: EntityType,
}

impl ObjectStoreHandler {
    pub fn new(kind: EntityType) -> Self {
        Self { kind }
    }

    fn codec_error(&self, message: &str, source: serde_json::Error) -> Error {
        Error::CodecFailed {
            kind: self.kind.to_string(),
            message: message.to_string(),
            source: source.into(),
        }
    }

    fn primary_key(&self, id: &str) -> (String, String) {
        (self.kind.to_string(), id.to_string())
    }

    /// Splits an object into its body and its attribute list, the latter stored in its own column.
    fn encode(&self, object: &ObjectDescriptor) -> types::Result<(Json, Json)> {
        let attributes = serde_json::to_value(object.attributes().cloned().unwrap_or_default())
            .map_err(|e| self.codec_error("failed to encode attributes", e))?;

        let mut stripped = object.clone();
        if let Some(x) = stripped.attributes_mut() {
            x.clear();
        }

        let body = serde_json::to_value(&stripped)
            .map_err(|e| self.codec_error("failed to encode body", e))?;

        Ok((body, attributes))
    }

    fn decode(&self, model: &Model) -> types::Result<ObjectDescriptor> {
        let mut object: ObjectDescriptor = serde_json::from_value(model.body.clone())
            .map_err(|e| self.codec_error("failed to decode body", e))?;

        if object.kind() != self.kind {
            return Err(Error::CodecFailed {
                kind: self.kind.to_string(),
                message: format!("stored body holds an object of type '{}'", object.kind()),
                source: anyhow::anyhow!("object type mismatch"),
            });
        }

        if let Some(x) = object.attributes_mut() {
            *x = self.decode_attributes(&model.attributes)?;
        }

        Ok(object)
    }

    fn decode_attributes(&self, value: &Json) -> types::Result<AttributeList> {
        serde_json::from_value(value.clone())
            .map_err(|e| self.codec_error("failed to decode attributes", e))
    }
}

#[async_trait]
impl ObjectHandler<DatabaseConnection> for ObjectStoreHandler {
    fn kind(&self) -> EntityType {
        self.kind
    }

    async fn save(
        &self,
        conn: &DatabaseConnection,
        object: &mut ObjectDescriptor,
        mode: SaveMode,
    ) -> types::Result<DbOutcome> {
        let (body, attributes) = self.encode(object)?;
        let now = Utc::now().naive_utc();

        let tx = conn.begin().await?;

        let existing = Entity::find_by_id(self.primary_key(object.id()))
            .one(&tx)
            .await?;

        let outcome = match existing {
            None if mode == SaveMode::Quick => DbOutcome::NoRowsAffected,
            None => {
                ActiveModel {
                    object_type: Set(self.kind.to_string()),
                    object_id: Set(object.id().to_string()),
                    parent_id: Set(object.parent().map(str::to_string)),
                    rank: Set(object.rank()),
                    attributes: Set(attributes),
                    body: Set(body),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&tx)
                .await?;

                DbOutcome::Applied
            }
            Some(model) => {
                let attributes = match mode {
                    SaveMode::Full => attributes,
                    SaveMode::Quick => {
                        let mut merged = self.decode_attributes(&model.attributes)?;
                        if let Some(changed) = object.attributes() {
                            merged.merge(changed);
                        }

                        serde_json::to_value(merged)
                            .map_err(|e| self.codec_error("failed to encode attributes", e))?
                    }
                };

                let mut active: ActiveModel = model.into();
                active.parent_id = Set(object.parent().map(str::to_string));
                active.rank = Set(object.rank());
                active.attributes = Set(attributes);
                active.body = Set(body);
                active.updated_at = Set(now);
                active.update(&tx).await?;

                DbOutcome::Applied
            }
        };

        tx.commit().await?;

        Ok(outcome)
    }

    async fn delete(
        &self,
        conn: &DatabaseConnection,
        object: &ObjectDescriptor,
    ) -> types::Result<DbOutcome> {
        let tx = conn.begin().await?;

        let result = Entity::delete_by_id(self.primary_key(object.id()))
            .exec(&tx)
            .await?;

        // A job takes its script with it.
        if self.kind == EntityType::Job {
            Entity::delete_by_id((EntityType::JobScript.to_string(), object.id().to_string()))
                .exec(&tx)
                .await?;
        }

        tx.commit().await?;

        if result.rows_affected == 0 {
            return Ok(DbOutcome::NoRowsAffected);
        }

        Ok(DbOutcome::Applied)
    }

    async fn load(
        &self,
        conn: &DatabaseConnection,
        object: &mut ObjectDescriptor,
    ) -> types::Result<LoadOutcome> {
        match Entity::find_by_id(self.primary_key(object.id()))
            .one(conn)
            .await?
        {
            Some(model) => {
                *object = self.decode(&model)?;
                Ok(LoadOutcome::Loaded)
            }
            None => Ok(LoadOutcome::NotFound),
        }
    }

    async fn find(
        &self,
        conn: &DatabaseConnection,
        cursor: &mut QueryCursor<'_>,
        filter: &ObjectDescriptor,
        options: &QueryOptions,
    ) -> types::Result<()> {
        let mut query = Entity::find().filter(Column::ObjectType.eq(self.kind.to_string()));

        // A filter without a queue matches no queue, not every queue.
        if self.kind == EntityType::Job && options.has_flag(QueryOptions::FIND_JOBS_BY_QUEUE) {
            let queue = filter.parent().unwrap_or_default();
            query = query.filter(Column::ParentId.eq(queue.to_string()));
        }

        if let Some(modified_since) = options.modified_since {
            query = query.filter(Column::UpdatedAt.gt(modified_since));
        }

        let rows = query
            .order_by_asc(Column::Rank)
            .order_by_asc(Column::ObjectId)
            .all(conn)
            .await?;

        cursor.set_count(rows.len());

        for row in rows.iter() {
            let object = self.decode(row)?;
            cursor.deliver(object)?;
        }

        Ok(())
    }

    async fn delete_attributes(
        &self,
        conn: &DatabaseConnection,
        id: &str,
        attributes: &AttributeList,
    ) -> types::Result<DbOutcome> {
        let tx = conn.begin().await?;

        let model = match Entity::find_by_id(self.primary_key(id)).one(&tx).await? {
            Some(model) => model,
            None => {
                tx.commit().await?;
                return Ok(DbOutcome::NoRowsAffected);
            }
        };

        let mut remaining = self.decode_attributes(&model.attributes)?;

        if remaining.remove_matching(attributes) == 0 {
            tx.commit().await?;
            return Ok(DbOutcome::NoRowsAffected);
        }

        let remaining = serde_json::to_value(remaining)
            .map_err(|e| self.codec_error("failed to encode attributes", e))?;

        let mut active: ActiveModel = model.into();
        active.attributes = Set(remaining);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(&tx).await?;

        tx.commit().await?;

        Ok(DbOutcome::Applied)
    }
}
