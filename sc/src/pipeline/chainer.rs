//! StreamChainer - validates, connects and runs a pipeline
//!
//! A run goes through these states:
//!
//! - **Validating**: step count, instantiation, first-stage and adjacency
//!   checks; any failure is returned before a single task is spawned
//! - **Running**: one tokio task per stage, linked by bounded channels
//! - **Completed / Failed**: the first stage error wins, the remaining
//!   tasks are aborted and later errors are discarded

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use super::observer::{Clock, RunLogger, SystemClock, format_duration};
use super::{PipelineConfig, PipelineError};
use crate::config::Settings;
use crate::stage::{BuiltinStageFactory, StageError, StageFactory, StageHandle, StageInput, channel};

/// Default number of items buffered between two stages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Runs pipeline configurations, one independent chain per call
#[derive(Clone)]
pub struct StreamChainer {
    factory: Arc<dyn StageFactory>,
    logger: Option<Arc<dyn RunLogger>>,
    clock: Arc<dyn Clock>,
    channel_capacity: usize,
}

impl Default for StreamChainer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamChainer {
    /// Create a chainer with the built-in stages and no logger
    pub fn new() -> Self {
        debug!("StreamChainer::new: called");
        Self {
            factory: Arc::new(BuiltinStageFactory::new()),
            logger: None,
            clock: Arc::new(SystemClock),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        debug!("StreamChainer::from_settings: called");
        Self::new()
            .with_factory(Arc::new(BuiltinStageFactory::from_settings(settings)))
            .with_channel_capacity(settings.pipeline.channel_capacity)
    }

    pub fn with_factory(mut self, factory: Arc<dyn StageFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Run a pipeline to completion
    ///
    /// Resolves once the terminal stage has finished, or with the first
    /// error any stage raised. Output already written by a failed run is
    /// left in place.
    pub async fn run(&self, config: Option<&PipelineConfig>) -> Result<(), PipelineError> {
        let config = config.ok_or(PipelineError::ConfigMissing)?;
        debug!(name = %config.name, steps = config.steps.len(), "StreamChainer::run: called");

        let started = self.clock.now();
        self.log_info(&format!("Starting pipeline {}", config.name));

        let stages = self.instantiate(config)?;
        self.execute(stages).await?;

        let elapsed = self.clock.now().saturating_duration_since(started);
        self.log_info(&format!(
            "Pipeline {} finished in {}",
            config.name,
            format_duration(elapsed)
        ));
        Ok(())
    }

    /// Run stages that were built outside the factory
    pub async fn run_stages(&self, name: &str, stages: Vec<StageHandle>) -> Result<(), PipelineError> {
        debug!(%name, stages = stages.len(), "StreamChainer::run_stages: called");
        let started = self.clock.now();
        self.log_info(&format!("Starting pipeline {}", name));

        check_length(stages.len())?;
        validate_topology(&stages)?;
        self.execute(stages).await?;

        let elapsed = self.clock.now().saturating_duration_since(started);
        self.log_info(&format!("Pipeline {} finished in {}", name, format_duration(elapsed)));
        Ok(())
    }

    /// Check a configuration without running it
    pub fn validate(&self, config: &PipelineConfig) -> Result<(), PipelineError> {
        debug!(name = %config.name, "StreamChainer::validate: called");
        self.instantiate(config).map(|_| ())
    }

    /// Build every stage and check the chain's shape
    fn instantiate(&self, config: &PipelineConfig) -> Result<Vec<StageHandle>, PipelineError> {
        check_length(config.steps.len())?;

        let stages = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.factory.create(index, step))
            .collect::<Result<Vec<_>, _>>()?;

        validate_topology(&stages)?;
        Ok(stages)
    }

    /// Connect the stages left to right and wait for the outcome
    async fn execute(&self, stages: Vec<StageHandle>) -> Result<(), PipelineError> {
        let terminal = stages.len() - 1;
        let mut tasks = JoinSet::new();
        let mut upstream: Option<StageInput> = None;

        for (index, stage) in stages.into_iter().enumerate() {
            let input = upstream.take();
            let output = if stage.capability().is_readable() {
                let (tx, rx) = channel(self.channel_capacity);
                upstream = Some(rx);
                Some(tx)
            } else {
                None
            };

            let name = stage.name();
            let future = match (stage, input, output) {
                (StageHandle::Source(source), None, Some(output)) => source.produce(output),
                (StageHandle::Transform(transform), Some(input), Some(output)) => transform.transform(input, output),
                (StageHandle::Sink(sink), Some(input), None) => sink.consume(input),
                _ => {
                    return Err(PipelineError::InvalidChainTopology {
                        index: index.saturating_sub(1),
                        from: "previous stage",
                        to: name,
                    });
                }
            };

            debug!(index, stage = name, "StreamChainer::execute: spawning stage");
            tasks.spawn(async move { (index, future.await) });
        }

        // A readable terminal stage has nobody downstream; discard its output
        if let Some(rest) = upstream {
            debug!("StreamChainer::execute: draining output of terminal stage");
            tasks.spawn(async move { (terminal, rest.drain().await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined?;
            match result {
                Ok(()) => debug!(index, "StreamChainer::execute: stage finished"),
                Err(StageError::DownstreamClosed) => {
                    debug!(index, "StreamChainer::execute: stage stopped, downstream closed")
                }
                Err(e) => {
                    self.log_error(&format!("Error on stage {}: {}", index, e));
                    tasks.abort_all();
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    fn log_info(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.info(message);
        }
    }

    fn log_error(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.error(message);
        }
    }
}

fn check_length(steps: usize) -> Result<(), PipelineError> {
    match steps {
        0 => Err(PipelineError::EmptyPipeline),
        1 => Err(PipelineError::InsufficientSteps),
        _ => Ok(()),
    }
}

/// First stage must be readable; every adjacent pair must be readable -> writable
fn validate_topology(stages: &[StageHandle]) -> Result<(), PipelineError> {
    if let Some(first) = stages.first()
        && !first.capability().is_readable()
    {
        return Err(PipelineError::InvalidFirstStage {
            stage: first.name(),
            capability: first.capability(),
        });
    }

    for (index, pair) in stages.windows(2).enumerate() {
        let (from, to) = (&pair[0], &pair[1]);
        if !from.capability().is_readable() || !to.capability().is_writable() {
            debug!(index, from = from.name(), to = to.name(), "validate_topology: bad adjacency");
            return Err(PipelineError::InvalidChainTopology {
                index,
                from: from.name(),
                to: to.name(),
            });
        }
    }

    Ok(())
}
