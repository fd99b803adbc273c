use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kura_core::errors::Error;
use kura_core::types;

use crate::object::ObjectDescriptor;

/// Receives each row a find produces.
pub type RowCallback<'a> = Box<dyn FnMut(ObjectDescriptor) + Send + 'a>;

/// Per-query state owned by a single find. Never shared between calls.
pub struct QueryCursor<'a> {
    /// Number of rows already handed to the callback.
    pub row: usize,
    /// Total rows the query matched.
    pub count: usize,
    callback: Option<RowCallback<'a>>,
    live: Option<Arc<AtomicUsize>>,
}

impl<'a> QueryCursor<'a> {
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    pub fn deliver(&mut self, object: ObjectDescriptor) -> types::Result<()> {
        match self.callback.as_mut() {
            Some(callback) => {
                callback(object);
                self.row += 1;
                Ok(())
            }
            None => Err(Error::UnknownWithMsgOnly {
                message: "row delivered to a closed query cursor".to_string(),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.live.is_none()
    }

    /// Releases the cursor. Calling it again is a no-op.
    pub fn close(&mut self) {
        self.callback = None;

        if let Some(live) = self.live.take() {
            live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for QueryCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Clone, Default)]
pub struct CursorManager {
    live: Arc<AtomicUsize>,
    limit: Option<usize>,
}

impl CursorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager that refuses to hold more than `limit` cursors at once.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            live: Default::default(),
            limit: Some(limit),
        }
    }

    pub fn open<'a>(&self, callback: RowCallback<'a>) -> types::Result<QueryCursor<'a>> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(limit) = self.limit {
            if live > limit {
                self.live.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::CursorAllocationFailed);
            }
        }

        Ok(QueryCursor {
            row: 0,
            count: 0,
            callback: Some(callback),
            live: Some(self.live.clone()),
        })
    }

    pub fn close(&self, cursor: &mut QueryCursor<'_>) {
        cursor.close();
    }

    pub fn live_cursors(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}
