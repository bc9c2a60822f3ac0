//! In-memory mock backend for tests.
//!
//! Streams follow a per-open script so tests can drive the worker through
//! empty polls, transient query failures, and cursor invalidation without a
//! running MongoDB. The factory tracks live-stream counts so tests can assert
//! that a worker never holds two cursors at once.

use crate::cursor::{StreamFactory, TailStream};
use crate::error::{Result, TailError};
use crate::resolver::CollectionRef;
use crate::sink::{EventSink, NormalizedEvent};
use async_trait::async_trait;
use bson::Document;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One scripted `next()` outcome.
#[derive(Debug, Clone)]
pub enum MockStep {
    Doc(Document),
    Empty,
    QueryFail,
    Exhaust,
}

/// One scripted `open()` outcome.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    Stream(Vec<MockStep>),
    Missing,
    NotCapped,
    Unreachable,
}

#[derive(Default)]
struct FactoryState {
    opens: HashMap<CollectionRef, VecDeque<OpenOutcome>>,
}

/// Scripted stream factory. After a target's scripted opens are consumed,
/// further opens report the collection as missing (the capped window aged
/// out from under us).
#[derive(Default)]
pub struct MockStreamFactory {
    state: Mutex<FactoryState>,
    live: Arc<Mutex<HashMap<CollectionRef, usize>>>,
    overlap: Arc<AtomicBool>,
    open_count: Arc<AtomicUsize>,
    poll_log: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl MockStreamFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the scripted outcomes for successive opens of `target`.
    pub fn script_opens(&self, target: &CollectionRef, outcomes: Vec<OpenOutcome>) {
        self.state
            .lock()
            .opens
            .entry(target.clone())
            .or_default()
            .extend(outcomes);
    }

    /// How many streams were opened across all targets.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// True if one target ever had two streams live at once.
    pub fn saw_overlapping_streams(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    /// Timestamps of every `next()` call, across all streams.
    pub fn poll_times(&self) -> Vec<tokio::time::Instant> {
        self.poll_log.lock().clone()
    }
}

#[async_trait]
impl StreamFactory for MockStreamFactory {
    async fn open(&self, target: &CollectionRef) -> Result<Box<dyn TailStream>> {
        let outcome = self
            .state
            .lock()
            .opens
            .get_mut(target)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(OpenOutcome::Missing);

        match outcome {
            OpenOutcome::Missing => Err(TailError::CollectionMissing {
                database: target.database.clone(),
                collection: target.collection.clone(),
            }),
            OpenOutcome::NotCapped => Err(TailError::NotCapped {
                database: target.database.clone(),
                collection: target.collection.clone(),
            }),
            OpenOutcome::Unreachable => {
                Err(TailError::Connection("mock server unreachable".to_string()))
            }
            OpenOutcome::Stream(steps) => {
                self.open_count.fetch_add(1, Ordering::SeqCst);
                {
                    let mut live = self.live.lock();
                    let count = live.entry(target.clone()).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        self.overlap.store(true, Ordering::SeqCst);
                    }
                }
                Ok(Box::new(MockTailStream {
                    target: target.clone(),
                    steps: steps.into(),
                    exhausted: false,
                    live: Some(self.live.clone()),
                    poll_log: self.poll_log.clone(),
                }))
            }
        }
    }
}

pub struct MockTailStream {
    target: CollectionRef,
    steps: VecDeque<MockStep>,
    exhausted: bool,
    live: Option<Arc<Mutex<HashMap<CollectionRef, usize>>>>,
    poll_log: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl MockTailStream {
    fn release(&mut self) {
        if let Some(live) = self.live.take() {
            if let Some(count) = live.lock().get_mut(&self.target) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

#[async_trait]
impl TailStream for MockTailStream {
    async fn next(&mut self) -> Result<Option<Document>> {
        self.poll_log.lock().push(tokio::time::Instant::now());

        if self.exhausted {
            return Err(TailError::CursorExhausted);
        }
        match self.steps.pop_front() {
            Some(MockStep::Doc(doc)) => Ok(Some(doc)),
            Some(MockStep::Empty) | None => Ok(None),
            Some(MockStep::QueryFail) => {
                Err(TailError::QueryFailed("mock query failure".to_string()))
            }
            Some(MockStep::Exhaust) => {
                self.exhausted = true;
                Err(TailError::CursorExhausted)
            }
        }
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for MockTailStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Sink that buffers every emitted event in memory.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<NormalizedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NormalizedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, event: NormalizedEvent) -> anyhow::Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
