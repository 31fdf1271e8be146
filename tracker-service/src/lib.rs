pub mod pipeline;
pub mod config;
pub mod schema;
pub mod sources;
pub mod sinks;
pub mod transform;
pub mod dashboard;
pub mod observability;
pub mod metrics_server;

pub use pipeline::{Envelope, Pipeline, PipelineError, Snapshot};
