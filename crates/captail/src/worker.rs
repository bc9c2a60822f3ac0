//! Tailing Worker
//!
//! Owns the reconnect/poll/normalize/emit loop for exactly one collection.
//! Each failure class has its own recovery action: empty polls sleep for the
//! configured interval, transient query failures retry on the same cursor,
//! and cursor invalidation closes the dead cursor and reconnects. A worker
//! holds at most one live stream at any time.

use crate::cursor::{StreamFactory, TailStream};
use crate::error::TailError;
use crate::normalizer::normalize;
use crate::resolver::CollectionRef;
use crate::shutdown::StopSignal;
use crate::sink::{EventSink, NormalizedEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consecutive `QueryFailed` results on one cursor before the worker starts
/// inserting the poll interval as backoff between retries.
const QUERY_RETRY_BACKOFF_THRESHOLD: u32 = 3;

/// Terminal outcome of one worker. Never affects sibling workers.
#[derive(Debug)]
pub enum WorkerResult {
    StoppedByRequest,
    CollectionMissingTolerated,
    Fatal(TailError),
}

pub struct TailWorker {
    target: CollectionRef,
    factory: Arc<dyn StreamFactory>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    raise_on_missing: bool,
    stop: StopSignal,
}

impl TailWorker {
    pub fn new(
        target: CollectionRef,
        factory: Arc<dyn StreamFactory>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
        raise_on_missing: bool,
        stop: StopSignal,
    ) -> Self {
        Self {
            target,
            factory,
            sink,
            interval,
            raise_on_missing,
            stop,
        }
    }

    /// Run until the stop signal is raised or a terminal condition is hit.
    pub async fn run(mut self) -> WorkerResult {
        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(outcome) => return outcome,
        };
        info!(collection = %self.target, "Tailing worker streaming");

        let mut consecutive_query_failures = 0u32;

        loop {
            if self.stop.is_stopped() {
                stream.close().await;
                return WorkerResult::StoppedByRequest;
            }

            match stream.next().await {
                Ok(Some(doc)) => {
                    consecutive_query_failures = 0;
                    if let Err(e) = self.emit(doc).await {
                        stream.close().await;
                        return WorkerResult::Fatal(e);
                    }
                    // No sleep on a delivered document, to keep throughput
                    // high under sustained write load.
                }
                Ok(None) => {
                    consecutive_query_failures = 0;
                    self.interruptible_sleep().await;
                }
                Err(TailError::QueryFailed(msg)) => {
                    consecutive_query_failures += 1;
                    warn!(
                        collection = %self.target,
                        failures = consecutive_query_failures,
                        "Query failed, retrying on same cursor: {}", msg
                    );
                    // Unbounded immediate retry can spin hot on a wedged
                    // query; back off once failures persist.
                    if consecutive_query_failures >= QUERY_RETRY_BACKOFF_THRESHOLD {
                        self.interruptible_sleep().await;
                    }
                }
                Err(TailError::CursorExhausted) => {
                    consecutive_query_failures = 0;
                    info!(collection = %self.target, "Tailable cursor broken, reconnecting");
                    stream.close().await;
                    stream = match self.connect().await {
                        Ok(stream) => stream,
                        Err(outcome) => return outcome,
                    };
                }
                Err(e) => {
                    error!(collection = %self.target, "Unrecoverable stream error: {}", e);
                    stream.close().await;
                    return WorkerResult::Fatal(e);
                }
            }
        }
    }

    /// Open a fresh stream, mapping open failures to terminal outcomes.
    async fn connect(&self) -> std::result::Result<Box<dyn TailStream>, WorkerResult> {
        if self.stop.is_stopped() {
            return Err(WorkerResult::StoppedByRequest);
        }

        match self.factory.open(&self.target).await {
            Ok(stream) => Ok(stream),
            Err(TailError::CollectionMissing { .. }) if !self.raise_on_missing => {
                info!(collection = %self.target, "Collection missing, tolerated by configuration");
                Err(WorkerResult::CollectionMissingTolerated)
            }
            Err(e) => {
                error!(collection = %self.target, "Failed to open tailing stream: {}", e);
                Err(WorkerResult::Fatal(e))
            }
        }
    }

    async fn emit(&self, doc: bson::Document) -> crate::error::Result<()> {
        let message_size = bson::to_vec(&doc)?.len() as u64;
        let event = NormalizedEvent::new(normalize(&doc), &self.target, message_size);

        debug!(collection = %self.target, size = message_size, "Emitting normalized event");
        self.sink
            .emit(event)
            .await
            .map_err(|e| TailError::Sink(e.to_string()))
    }

    /// Wait out the poll interval, waking early on the stop signal.
    async fn interruptible_sleep(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => {}
            _ = self.stop.stopped() => {}
        }
    }
}
