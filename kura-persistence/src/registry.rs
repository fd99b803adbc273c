use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use kura_core::{err_unsupported_op, types};
use strum::IntoEnumIterator;

use crate::cursor::{CursorManager, QueryCursor, RowCallback};
use crate::object::{
    AttributeList, DbOutcome, EntityType, LoadOutcome, ObjectDescriptor, QueryOptions, SaveMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
pub enum Operation {
    #[strum(serialize = "save")]
    Save,

    #[strum(serialize = "delete")]
    Delete,

    #[strum(serialize = "load")]
    Load,

    #[strum(serialize = "find")]
    Find,

    #[strum(serialize = "delete_attributes")]
    DeleteAttributes,

    #[strum(serialize = "reset")]
    Reset,
}

/// Backend implementation of the persistence operations for one entity type.
///
/// Only the operations declared when the handler is registered are ever
/// dispatched; the default bodies exist so a handler can leave out what its
/// type does not support.
#[async_trait]
pub trait ObjectHandler<C>: Send + Sync
where
    C: Send + Sync,
{
    fn kind(&self) -> EntityType;

    async fn save(
        &self,
        _conn: &C,
        _object: &mut ObjectDescriptor,
        _mode: SaveMode,
    ) -> types::Result<DbOutcome> {
        Err(err_unsupported_op!(self.kind(), Operation::Save))
    }

    async fn delete(&self, _conn: &C, _object: &ObjectDescriptor) -> types::Result<DbOutcome> {
        Err(err_unsupported_op!(self.kind(), Operation::Delete))
    }

    /// Fills `object` in place; a missing row is `LoadOutcome::NotFound`, not an error.
    async fn load(&self, _conn: &C, _object: &mut ObjectDescriptor) -> types::Result<LoadOutcome> {
        Err(err_unsupported_op!(self.kind(), Operation::Load))
    }

    /// Sets the matched row count on the cursor and streams rows through it.
    async fn find(
        &self,
        _conn: &C,
        _cursor: &mut QueryCursor<'_>,
        _filter: &ObjectDescriptor,
        _options: &QueryOptions,
    ) -> types::Result<()> {
        Err(err_unsupported_op!(self.kind(), Operation::Find))
    }

    async fn delete_attributes(
        &self,
        _conn: &C,
        _id: &str,
        _attributes: &AttributeList,
    ) -> types::Result<DbOutcome> {
        Err(err_unsupported_op!(self.kind(), Operation::DeleteAttributes))
    }

    fn reset(&self, object: &mut ObjectDescriptor) {
        object.reset();
    }
}

pub struct OperationSet<C>
where
    C: Send + Sync,
{
    handler: Arc<dyn ObjectHandler<C>>,
    supported: HashSet<Operation>,
}

impl<C> OperationSet<C>
where
    C: Send + Sync,
{
    pub fn supports(&self, operation: Operation) -> bool {
        self.supported.contains(&operation)
    }
}

pub struct RegistryBuilder<C>
where
    C: Send + Sync,
{
    table: Vec<Option<OperationSet<C>>>,
}

impl<C> RegistryBuilder<C>
where
    C: Send + Sync,
{
    pub fn register(
        mut self,
        handler: Arc<dyn ObjectHandler<C>>,
        operations: &[Operation],
    ) -> Self {
        let index = handler.kind().index();

        self.table[index] = Some(OperationSet {
            handler,
            supported: operations.iter().copied().collect(),
        });

        self
    }

    pub fn build(self) -> Registry<C> {
        Registry {
            table: self.table,
            cursors: CursorManager::new(),
        }
    }

    pub fn build_with_cursors(self, cursors: CursorManager) -> Registry<C> {
        Registry {
            table: self.table,
            cursors,
        }
    }
}

/// Fixed table from entity type to the operations its backend supports.
/// Immutable once built.
pub struct Registry<C>
where
    C: Send + Sync,
{
    table: Vec<Option<OperationSet<C>>>,
    cursors: CursorManager,
}

impl<C> Registry<C>
where
    C: Send + Sync,
{
    pub fn builder() -> RegistryBuilder<C> {
        RegistryBuilder {
            table: EntityType::iter().map(|_| None).collect(),
        }
    }

    pub fn supports(&self, kind: EntityType, operation: Operation) -> bool {
        self.table[kind.index()]
            .as_ref()
            .map(|x| x.supports(operation))
            .unwrap_or(false)
    }

    pub fn cursors(&self) -> &CursorManager {
        &self.cursors
    }

    fn resolve(
        &self,
        kind: EntityType,
        operation: Operation,
    ) -> types::Result<&Arc<dyn ObjectHandler<C>>> {
        match self.table[kind.index()].as_ref() {
            Some(set) if set.supports(operation) => Ok(&set.handler),
            _ => {
                tracing::error!(
                    "'{}' dispatched for '{}' which does not support it",
                    operation,
                    kind
                );
                Err(err_unsupported_op!(kind, operation))
            }
        }
    }

    pub async fn save(
        &self,
        conn: &C,
        object: &mut ObjectDescriptor,
        mode: SaveMode,
    ) -> types::Result<DbOutcome> {
        self.resolve(object.kind(), Operation::Save)?
            .save(conn, object, mode)
            .await
    }

    pub async fn delete(&self, conn: &C, object: &ObjectDescriptor) -> types::Result<DbOutcome> {
        self.resolve(object.kind(), Operation::Delete)?
            .delete(conn, object)
            .await
    }

    pub async fn load(
        &self,
        conn: &C,
        object: &mut ObjectDescriptor,
    ) -> types::Result<LoadOutcome> {
        self.resolve(object.kind(), Operation::Load)?
            .load(conn, object)
            .await
    }

    /// Runs the type's finder and returns how many rows matched.
    ///
    /// Rows are streamed to `callback` by the finder; the cursor is released
    /// before this returns, on success and on failure alike.
    pub async fn find<'a>(
        &self,
        conn: &C,
        filter: &ObjectDescriptor,
        options: &QueryOptions,
        callback: RowCallback<'a>,
    ) -> types::Result<usize> {
        let handler = self.resolve(filter.kind(), Operation::Find)?;
        let mut cursor = self.cursors.open(callback)?;

        let result = handler.find(conn, &mut cursor, filter, options).await;
        let count = cursor.count;

        self.cursors.close(&mut cursor);

        result.map(|_| count)
    }

    pub async fn delete_attributes(
        &self,
        conn: &C,
        kind: EntityType,
        id: &str,
        attributes: &AttributeList,
    ) -> types::Result<DbOutcome> {
        self.resolve(kind, Operation::DeleteAttributes)?
            .delete_attributes(conn, id, attributes)
            .await
    }

    pub fn reset(&self, object: &mut ObjectDescriptor) -> types::Result<()> {
        self.resolve(object.kind(), Operation::Reset)?.reset(object);

        Ok(())
    }
}
