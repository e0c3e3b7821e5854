//! streamchain - stream pipeline chainer
//!
//! Chains readable, writable and duplex stages into one pipeline and runs
//! it to completion, reporting the first failure from any stage.
//!
//! # Core Concepts
//!
//! - **Capabilities decide the shape**: a chain starts readable and every
//!   link goes readable -> writable; this is checked before anything runs
//! - **One task per stage**: stages run concurrently, linked by bounded
//!   channels, so a slow sink slows the source down
//! - **First error wins**: the first stage failure ends the run
//!
//! # Modules
//!
//! - [`pipeline`] - Definitions, validation and the chainer
//! - [`stage`] - Built-in stages and the stage traits
//! - [`ident`] - Hash and UUID helpers
//! - [`config`] - Settings types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod ident;
pub mod pipeline;
pub mod stage;

pub use config::Settings;
pub use pipeline::{PipelineConfig, PipelineError, PipelineStep, StreamChainer};
pub use stage::{Capability, StageError, StageHandle};
