//! Stage traits and the capability-tagged stage handle

use std::fmt;

use async_trait::async_trait;

use super::{StageError, StageInput, StageOutput};

/// Structural capability of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// May be piped from
    Readable,
    /// May be piped to
    Writable,
    /// Both readable and writable
    Duplex,
}

impl Capability {
    pub fn is_readable(self) -> bool {
        matches!(self, Capability::Readable | Capability::Duplex)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Capability::Writable | Capability::Duplex)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Readable => write!(f, "readable"),
            Self::Writable => write!(f, "writable"),
            Self::Duplex => write!(f, "duplex"),
        }
    }
}

/// A stage that only produces items
#[async_trait]
pub trait Source: Send {
    /// Stage name for logs and errors
    fn name(&self) -> &'static str;

    /// Produce every item into `output`, returning once the data is exhausted
    async fn produce(self: Box<Self>, output: StageOutput) -> Result<(), StageError>;
}

/// A stage that only consumes items; a sink finishing ends the run
#[async_trait]
pub trait Sink: Send {
    fn name(&self) -> &'static str;

    /// Consume `input` until the upstream stage finishes
    async fn consume(self: Box<Self>, input: StageInput) -> Result<(), StageError>;
}

/// A stage that consumes items and produces new ones
#[async_trait]
pub trait Transform: Send {
    fn name(&self) -> &'static str;

    async fn transform(self: Box<Self>, input: StageInput, output: StageOutput) -> Result<(), StageError>;
}

/// An instantiated stage, tagged with its capability at construction
pub enum StageHandle {
    Source(Box<dyn Source>),
    Sink(Box<dyn Sink>),
    Transform(Box<dyn Transform>),
}

impl StageHandle {
    pub fn source(source: impl Source + 'static) -> Self {
        Self::Source(Box::new(source))
    }

    pub fn sink(sink: impl Sink + 'static) -> Self {
        Self::Sink(Box::new(sink))
    }

    pub fn transform(transform: impl Transform + 'static) -> Self {
        Self::Transform(Box::new(transform))
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Source(_) => Capability::Readable,
            Self::Sink(_) => Capability::Writable,
            Self::Transform(_) => Capability::Duplex,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Source(s) => s.name(),
            Self::Sink(s) => s.name(),
            Self::Transform(t) => t.name(),
        }
    }
}

impl fmt::Debug for StageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}
