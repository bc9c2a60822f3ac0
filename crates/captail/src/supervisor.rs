//! Tailing Supervisor
//!
//! Spawns one independent worker task per resolved collection and joins all
//! of them before returning. Worker failures are isolated: a fatal outcome on
//! one collection never cancels its siblings, it is only collected into the
//! final report.

use crate::cursor::StreamFactory;
use crate::resolver::CollectionRef;
use crate::shutdown::StopSignal;
use crate::sink::EventSink;
use crate::worker::{TailWorker, WorkerResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Terminal outcome of one worker, tagged with its target.
#[derive(Debug)]
pub struct WorkerReport {
    pub target: CollectionRef,
    pub result: WorkerResult,
}

pub struct TailSupervisor {
    factory: Arc<dyn StreamFactory>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    raise_on_missing: bool,
}

impl TailSupervisor {
    pub fn new(
        factory: Arc<dyn StreamFactory>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
        raise_on_missing: bool,
    ) -> Self {
        Self {
            factory,
            sink,
            interval,
            raise_on_missing,
        }
    }

    /// Run one worker per target and block until every worker is terminal.
    /// Reports are returned in spawn order.
    pub async fn run(&self, targets: Vec<CollectionRef>, stop: StopSignal) -> Vec<WorkerReport> {
        info!(workers = targets.len(), "Starting tailing supervisor");

        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let worker = TailWorker::new(
                target.clone(),
                self.factory.clone(),
                self.sink.clone(),
                self.interval,
                self.raise_on_missing,
                stop.clone(),
            );
            handles.push((target, tokio::spawn(worker.run())));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => WorkerResult::Fatal(crate::error::TailError::QueryFailed(format!(
                    "worker task panicked: {}",
                    e
                ))),
            };

            match &result {
                WorkerResult::StoppedByRequest => {
                    info!(collection = %target, "Worker stopped by request")
                }
                WorkerResult::CollectionMissingTolerated => {
                    info!(collection = %target, "Worker ended: collection missing (tolerated)")
                }
                WorkerResult::Fatal(e) => error!(collection = %target, "Worker failed: {}", e),
            }
            reports.push(WorkerReport { target, result });
        }

        info!("All tailing workers terminal");
        reports
    }
}
