//! Pipeline definitions and the chainer that runs them

pub mod chainer;
pub mod definition;
pub mod error;
pub mod observer;

pub use chainer::{DEFAULT_CHANNEL_CAPACITY, StreamChainer};
pub use definition::*;
pub use error::PipelineError;
pub use observer::{Clock, RunLogger, SystemClock, TracingLogger, format_duration};
