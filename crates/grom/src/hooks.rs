//! Optional lifecycle hooks.

use async_trait::async_trait;

use crate::client::GraphClient;
use crate::error::{Error, Result};

/// Lifecycle capabilities a record type opts into.
///
/// Every method defaults to a no-op; implement only the ones the type
/// needs. Before-hooks run strictly before marshalling and persistence —
/// their failure aborts the operation with nothing written, and their
/// mutations are persisted. After-hooks run strictly after persistence and
/// stamping; their failure reaches the caller even though the write
/// already succeeded.
#[async_trait]
pub trait Hooks: Send {
    async fn before_create(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_create(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_update(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_update(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on every record loaded by `find`, `take`, and `by_id`.
    async fn after_find(&mut self, _db: &GraphClient) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) async fn before_create<T: Hooks>(db: &GraphClient, record: &mut T) -> Result<()> {
    record.before_create(db).await.map_err(|source| Error::Hook {
        stage: "before create hook",
        source,
    })
}

pub(crate) async fn after_create<T: Hooks>(db: &GraphClient, record: &mut T) -> Result<()> {
    record.after_create(db).await.map_err(|source| Error::Hook {
        stage: "after create hook",
        source,
    })
}

pub(crate) async fn before_update<T: Hooks>(db: &GraphClient, record: &mut T) -> Result<()> {
    record.before_update(db).await.map_err(|source| Error::Hook {
        stage: "before update hook",
        source,
    })
}

pub(crate) async fn after_update<T: Hooks>(db: &GraphClient, record: &mut T) -> Result<()> {
    record.after_update(db).await.map_err(|source| Error::Hook {
        stage: "after update hook",
        source,
    })
}

pub(crate) async fn after_find<T: Hooks>(db: &GraphClient, record: &mut T) -> Result<()> {
    record.after_find(db).await.map_err(|source| Error::Hook {
        stage: "after find hook",
        source,
    })
}
