//! Captail tails MongoDB capped collections through tailable, natural-order
//! cursors and turns each newly appended document into a normalized event on
//! an output sink. One independent worker runs per configured collection,
//! recovering transparently from empty polls, transient query failures, and
//! server-side cursor invalidation.

pub mod config;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod mock;
pub mod normalizer;
pub mod resolver;
pub mod shutdown;
pub mod sink;
pub mod supervisor;
pub mod worker;

pub use config::TailConfig;
pub use cursor::{MongoStreamFactory, StreamFactory, TailStream};
pub use error::{Result, TailError};
pub use normalizer::normalize;
pub use resolver::{resolve, CollectionRef};
pub use shutdown::{stop_channel, StopHandle, StopSignal};
pub use sink::{ChannelSink, EventSink, NormalizedEvent};
pub use supervisor::{TailSupervisor, WorkerReport};
pub use worker::{TailWorker, WorkerResult};
