//! Stream Cursor
//!
//! Wraps a single tailable, `$natural`-ordered query against one capped
//! collection behind a minimal contract: a factory opens the stream, `next`
//! yields the next buffered document or reports that nothing is available
//! yet, and `close` releases the server-side cursor.
//!
//! The MongoDB driver buffers batches internally, so `next` maps directly
//! onto the driver cursor: a document when one is buffered or fetchable, an
//! empty result when a live cursor has no new data, `CursorExhausted` when
//! the server has invalidated the cursor, and `QueryFailed` for transient
//! errors on an otherwise-live connection.

use crate::error::{classify_driver_error, Result, TailError};
use crate::resolver::CollectionRef;
use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::CursorType;
use mongodb::{Client, Collection};
use tracing::debug;

/// One live tailing stream. Exclusively owned by a single worker.
#[async_trait]
pub trait TailStream: Send {
    /// Next document, or `None` when the live cursor currently has nothing
    /// new. `CursorExhausted` and `QueryFailed` are the recoverable errors.
    async fn next(&mut self) -> Result<Option<Document>>;

    /// Release server-side resources. Idempotent.
    async fn close(&mut self);
}

/// Opens tailing streams. Implementations must report a missing collection,
/// a non-capped collection, and an unreachable server as distinct errors.
#[async_trait]
pub trait StreamFactory: Send + Sync {
    async fn open(&self, target: &CollectionRef) -> Result<Box<dyn TailStream>>;
}

// ============================================================================
// MongoDB implementation
// ============================================================================

pub struct MongoStreamFactory {
    client: Client,
    filter: Document,
}

impl MongoStreamFactory {
    pub fn new(client: Client, filter: Document) -> Self {
        Self { client, filter }
    }

    /// Verify the target is a capped collection, via `collStats`.
    async fn check_capped(&self, target: &CollectionRef) -> Result<()> {
        let db = self.client.database(&target.database);
        let stats = db
            .run_command(doc! { "collStats": &target.collection })
            .await
            .map_err(|e| classify_driver_error(e, &target.database, &target.collection))?;

        if stats.get_bool("capped").unwrap_or(false) {
            Ok(())
        } else {
            Err(TailError::NotCapped {
                database: target.database.clone(),
                collection: target.collection.clone(),
            })
        }
    }

    /// Position the tailable find after the newest existing document so only
    /// appends made after cursor creation are delivered.
    async fn positional_filter(&self, collection: &Collection<Document>, target: &CollectionRef) -> Result<Document> {
        let latest = collection
            .find_one(self.filter.clone())
            .sort(doc! { "$natural": -1 })
            .await
            .map_err(|e| classify_driver_error(e, &target.database, &target.collection))?;

        let mut filter = self.filter.clone();
        if let Some(id) = latest.and_then(|d| d.get("_id").cloned()) {
            filter.insert("_id", doc! { "$gt": id });
        }
        Ok(filter)
    }
}

#[async_trait]
impl StreamFactory for MongoStreamFactory {
    async fn open(&self, target: &CollectionRef) -> Result<Box<dyn TailStream>> {
        self.check_capped(target).await?;

        let collection: Collection<Document> = self
            .client
            .database(&target.database)
            .collection(&target.collection);
        let filter = self.positional_filter(&collection, target).await?;

        let cursor = collection
            .find(filter)
            .sort(doc! { "$natural": 1 })
            .cursor_type(CursorType::Tailable)
            .await
            .map_err(|e| classify_driver_error(e, &target.database, &target.collection))?;

        debug!(collection = %target, "Tailable cursor opened");
        Ok(Box::new(MongoTailStream {
            target: target.clone(),
            cursor: Some(cursor),
        }))
    }
}

pub struct MongoTailStream {
    target: CollectionRef,
    cursor: Option<mongodb::Cursor<Document>>,
}

#[async_trait]
impl TailStream for MongoTailStream {
    async fn next(&mut self) -> Result<Option<Document>> {
        let cursor = self.cursor.as_mut().ok_or(TailError::CursorExhausted)?;

        match cursor.try_next().await {
            Ok(Some(doc)) => Ok(Some(doc)),
            // A tailable cursor yields no document either because nothing
            // new arrived (live cursor, normal under low write volume) or
            // because the server invalidated it.
            Ok(None) => {
                if !cursor.has_next() {
                    Err(TailError::CursorExhausted)
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(classify_driver_error(
                e,
                &self.target.database,
                &self.target.collection,
            )),
        }
    }

    async fn close(&mut self) {
        // Dropping the driver cursor kills the server-side cursor.
        if self.cursor.take().is_some() {
            debug!(collection = %self.target, "Tailable cursor closed");
        }
    }
}
