//! # relay-router
//!
//! Filtering and delivery for the relay logging pipeline.
//!
//! - [`CategoryRegistry`]: per-category level, color, and enabled flag
//! - [`LogRouter`]: resolves thresholds, writes sinks synchronously, and
//!   queues subscriber notifications
//! - [`Dispatcher`]: bounded queue drained by one owner thread
//! - [`Subscription`]: disposable subscriber handle
//! - [`SinkFactory`]: builds sinks, skipping file output without storage
//! - [`Pipeline`]: everything above wired from [`relay_settings::PipelineSettings`]
//!
//! Sinks never drop messages and run on the producer's thread. Subscribers
//! may be dropped under load and always run on the dispatcher thread.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod factory;
pub mod pipeline;
pub mod registry;
pub mod router;
pub mod subscription;

pub use dispatcher::{DEFAULT_CAPACITY, Dispatcher, WorkItem};
pub use factory::SinkFactory;
pub use pipeline::Pipeline;
pub use registry::{CategoryMetadata, CategoryRegistry, DEFAULT_COLOR, DEFAULT_MINIMUM_LEVEL};
pub use router::{LOGGING_CATEGORY, LogRouter};
pub use subscription::{Handler, Subscription};
