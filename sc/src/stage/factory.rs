//! Stage factory - turns pipeline steps into stage handles

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use super::{
    CsvFormatter, CsvParser, FileDownloader, FileReader, FileWriter, GzipStream, LineSplitter, SplitMode, StageHandle,
};
use crate::config::Settings;
use crate::pipeline::{LineSplitMode, LineSplitParams, PipelineError, PipelineStep};

/// Builds the stage for one pipeline step
///
/// Instantiation must not start any I/O; stages open files and
/// connections once the chain runs.
pub trait StageFactory: Send + Sync {
    fn create(&self, index: usize, step: &PipelineStep) -> Result<StageHandle, PipelineError>;
}

/// Factory for the built-in stages
#[derive(Debug, Clone)]
pub struct BuiltinStageFactory {
    read_chunk_size: usize,
    download_timeout: Duration,
    user_agent: Option<String>,
}

impl Default for BuiltinStageFactory {
    fn default() -> Self {
        Self {
            read_chunk_size: super::file::DEFAULT_CHUNK_SIZE,
            download_timeout: super::download::DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }
}

impl BuiltinStageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        debug!("BuiltinStageFactory::from_settings: called");
        Self {
            read_chunk_size: settings.pipeline.read_chunk_size,
            download_timeout: Duration::from_millis(settings.download.timeout_ms),
            user_agent: Some(settings.download.user_agent.clone()),
        }
    }
}

fn invalid(index: usize, step: &PipelineStep, message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidStepParams {
        index,
        kind: step.kind().to_string(),
        message: message.into(),
    }
}

fn require_absolute(index: usize, step: &PipelineStep, path: &Path) -> Result<(), PipelineError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(invalid(index, step, format!("path must be absolute: {}", path.display())))
    }
}

fn ascii_delimiter(index: usize, step: &PipelineStep, delimiter: char) -> Result<u8, PipelineError> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(invalid(index, step, format!("delimiter must be a single ASCII character: {:?}", delimiter)))
    }
}

fn split_mode(index: usize, step: &PipelineStep, params: &LineSplitParams) -> Result<SplitMode, PipelineError> {
    match params.mode {
        LineSplitMode::Newline => Ok(SplitMode::Newline),
        LineSplitMode::Ndjson => Ok(SplitMode::Ndjson),
        LineSplitMode::Regex => {
            let pattern = params
                .pattern
                .as_deref()
                .ok_or_else(|| invalid(index, step, "regex mode requires a pattern"))?;
            let regex = Regex::new(pattern).map_err(|e| invalid(index, step, e.to_string()))?;
            Ok(SplitMode::Regex(regex))
        }
    }
}

impl StageFactory for BuiltinStageFactory {
    fn create(&self, index: usize, step: &PipelineStep) -> Result<StageHandle, PipelineError> {
        debug!(index, kind = %step.kind(), "BuiltinStageFactory::create: called");
        let handle = match step {
            PipelineStep::SourceFile(params) => {
                require_absolute(index, step, &params.path)?;
                StageHandle::source(FileReader::with_chunk_size(&params.path, self.read_chunk_size))
            }
            PipelineStep::SourceDownload(params) => {
                if !params.url.starts_with("http://") && !params.url.starts_with("https://") {
                    return Err(invalid(index, step, "url must start with http:// or https://"));
                }
                let timeout = params
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.download_timeout);
                let mut downloader = FileDownloader::new(&params.url)
                    .with_headers(params.headers.clone())
                    .with_timeout(timeout);
                if let Some(agent) = &self.user_agent {
                    downloader = downloader.with_user_agent(agent);
                }
                StageHandle::source(downloader)
            }
            PipelineStep::SinkFile(params) => {
                require_absolute(index, step, &params.path)?;
                StageHandle::sink(FileWriter::new(&params.path))
            }
            PipelineStep::LineSplit(params) => {
                let mode = split_mode(index, step, params)?;
                StageHandle::transform(LineSplitter::new(mode, params.max_length))
            }
            PipelineStep::CsvParse(params) => {
                let delimiter = ascii_delimiter(index, step, params.delimiter)?;
                StageHandle::transform(CsvParser::new(delimiter, params.headers).with_max_rows(params.max_rows))
            }
            PipelineStep::CsvFormat(params) => {
                let delimiter = ascii_delimiter(index, step, params.delimiter)?;
                StageHandle::transform(CsvFormatter::new(delimiter, params.headers, params.trailing_delimiter))
            }
            PipelineStep::Compress => StageHandle::transform(GzipStream::compress()),
            PipelineStep::Decompress => StageHandle::transform(GzipStream::decompress()),
        };

        debug!(index, stage = handle.name(), capability = %handle.capability(), "BuiltinStageFactory::create: built stage");
        Ok(handle)
    }
}
