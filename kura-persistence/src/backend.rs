use std::time::Duration;

use async_trait::async_trait;
use kura_core::types;

use crate::registry::Registry;

/// How long a connect attempt may take before the backend gives up on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTimeout {
    /// We own the instance (or it is external): keep waiting for it.
    Infinite,
    /// The instance belongs to the other side of a failover pair.
    Normal(Duration),
}

#[async_trait]
pub trait Backend: Send + Sync {
    type Connection: Send + Sync + 'static;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: ConnectTimeout,
    ) -> types::Result<Self::Connection>;

    async fn disconnect(&self, conn: Self::Connection) -> types::Result<()>;

    fn registry(&self) -> &Registry<Self::Connection>;
}
