//! Stages that can be chained into a pipeline
//!
//! Every stage is one of three shapes: a [`Source`] that only produces
//! items, a [`Sink`] that only consumes them, or a [`Transform`] that does
//! both. A [`StageHandle`] carries the shape, and therefore the
//! [`Capability`], decided when the stage is built.

mod channel;
mod csv;
mod download;
mod error;
mod factory;
mod file;
mod gzip;
mod item;
mod lines;
mod traits;

pub use channel::{ItemReader, StageInput, StageOutput, channel};
pub use self::csv::{CsvFormatter, CsvParser};
pub use download::FileDownloader;
pub use error::StageError;
pub use factory::{BuiltinStageFactory, StageFactory};
pub use file::{FileReader, FileWriter, MemorySink};
pub use gzip::{GzipDirection, GzipStream};
pub use item::{Item, Record};
pub use lines::{LineSplitter, SplitMode};
pub use traits::{Capability, Sink, Source, StageHandle, Transform};
