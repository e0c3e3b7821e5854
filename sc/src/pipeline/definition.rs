// Pipeline definition types and loading from YAML/JSON files.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PipelineError;
use crate::stage::{Capability, GzipDirection};

/// An ordered list of steps, run as one chain
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Identifies the run in logs; not checked for uniqueness
    pub name: String,

    /// Steps in connection order
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>, steps: Vec<PipelineStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Parse a definition document (YAML, or JSON since it is valid YAML)
    pub fn from_yaml(content: &str) -> Result<Self, PipelineError> {
        debug!(len = content.len(), "PipelineConfig::from_yaml: called");
        let raw: RawDefinition = serde_yaml::from_str(content)?;

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| step.into_step(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { name: raw.name, steps })
    }

    /// Load a definition file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        debug!(?path, "PipelineConfig::load: called");
        let content = fs::read_to_string(path).map_err(|source| PipelineError::DefinitionRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

/// Step kinds, as named in definition files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    SourceFile,
    SourceDownload,
    SinkFile,
    LineSplit,
    CsvParse,
    CsvFormat,
    Compress,
    Decompress,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceFile => "source-file",
            Self::SourceDownload => "source-download",
            Self::SinkFile => "sink-file",
            Self::LineSplit => "line-split",
            Self::CsvParse => "csv-parse",
            Self::CsvFormat => "csv-format",
            Self::Compress => "compress",
            Self::Decompress => "decompress",
        }
    }

    /// Capability of the stage this kind instantiates
    pub fn capability(&self) -> Capability {
        match self {
            Self::SourceFile | Self::SourceDownload => Capability::Readable,
            Self::SinkFile => Capability::Writable,
            Self::LineSplit | Self::CsvParse | Self::CsvFormat | Self::Compress | Self::Decompress => {
                Capability::Duplex
            }
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    /// Accepts `csv-parse`, `CSV_PARSE` and `TRANSFORM_CSV_PARSE` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        let name = normalized.strip_prefix("transform-").unwrap_or(&normalized);
        match name {
            "source-file" => Ok(Self::SourceFile),
            "source-download" => Ok(Self::SourceDownload),
            "sink-file" => Ok(Self::SinkFile),
            "line-split" => Ok(Self::LineSplit),
            "csv-parse" => Ok(Self::CsvParse),
            "csv-format" => Ok(Self::CsvFormat),
            "compress" => Ok(Self::Compress),
            "decompress" => Ok(Self::Decompress),
            _ => Err(format!("Unknown step kind: {}", s)),
        }
    }
}

/// One step of a pipeline, with its kind-specific params
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    SourceFile(FileParams),
    SourceDownload(DownloadParams),
    SinkFile(FileParams),
    LineSplit(LineSplitParams),
    CsvParse(CsvParseParams),
    CsvFormat(CsvFormatParams),
    Compress,
    Decompress,
}

impl PipelineStep {
    pub fn source_file(path: impl Into<PathBuf>) -> Self {
        Self::SourceFile(FileParams { path: path.into() })
    }

    pub fn sink_file(path: impl Into<PathBuf>) -> Self {
        Self::SinkFile(FileParams { path: path.into() })
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Self::SourceFile(_) => StepKind::SourceFile,
            Self::SourceDownload(_) => StepKind::SourceDownload,
            Self::SinkFile(_) => StepKind::SinkFile,
            Self::LineSplit(_) => StepKind::LineSplit,
            Self::CsvParse(_) => StepKind::CsvParse,
            Self::CsvFormat(_) => StepKind::CsvFormat,
            Self::Compress => StepKind::Compress,
            Self::Decompress => StepKind::Decompress,
        }
    }
}

/// Params for file sources and sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileParams {
    /// Absolute path
    pub path: PathBuf,
}

/// Params for HTTP download sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DownloadParams {
    pub url: String,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Overrides the configured download timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl DownloadParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: None,
        }
    }
}

/// How a line splitter cuts its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineSplitMode {
    #[default]
    Newline,
    Regex,
    Ndjson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LineSplitParams {
    pub mode: LineSplitMode,

    /// Separator pattern, required in regex mode
    pub pattern: Option<String>,

    /// Maximum buffered line length in bytes
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CsvParseParams {
    pub delimiter: char,
    pub headers: bool,
    pub max_rows: Option<usize>,
}

impl Default for CsvParseParams {
    fn default() -> Self {
        Self {
            delimiter: ',',
            headers: false,
            max_rows: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CsvFormatParams {
    pub delimiter: char,
    pub headers: bool,

    /// Terminate the last row with a row delimiter too
    pub trailing_delimiter: bool,
}

impl Default for CsvFormatParams {
    fn default() -> Self {
        Self {
            delimiter: ',',
            headers: false,
            trailing_delimiter: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GzipParams {
    direction: GzipDirection,
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    name: String,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    kind: String,
    #[serde(default)]
    params: serde_yaml::Value,
}

impl RawStep {
    fn into_step(self, index: usize) -> Result<PipelineStep, PipelineError> {
        debug!(index, kind = %self.kind, "RawStep::into_step: called");
        // `gzip` carries its direction as a param
        if self.kind.eq_ignore_ascii_case("gzip") {
            let params: GzipParams = self.params(index)?;
            return Ok(match params.direction {
                GzipDirection::Compress => PipelineStep::Compress,
                GzipDirection::Decompress => PipelineStep::Decompress,
            });
        }

        let kind: StepKind = self.kind.parse().map_err(|_| PipelineError::UnknownStepKind {
            index,
            kind: self.kind.clone(),
        })?;

        Ok(match kind {
            StepKind::SourceFile => PipelineStep::SourceFile(self.params(index)?),
            StepKind::SourceDownload => PipelineStep::SourceDownload(self.params(index)?),
            StepKind::SinkFile => PipelineStep::SinkFile(self.params(index)?),
            StepKind::LineSplit => PipelineStep::LineSplit(self.params(index)?),
            StepKind::CsvParse => PipelineStep::CsvParse(self.params(index)?),
            StepKind::CsvFormat => PipelineStep::CsvFormat(self.params(index)?),
            StepKind::Compress => PipelineStep::Compress,
            StepKind::Decompress => PipelineStep::Decompress,
        })
    }

    fn params<T: DeserializeOwned>(&self, index: usize) -> Result<T, PipelineError> {
        let value = if self.params.is_null() {
            serde_yaml::Value::Mapping(Default::default())
        } else {
            self.params.clone()
        };
        serde_yaml::from_value(value).map_err(|e| PipelineError::InvalidStepParams {
            index,
            kind: self.kind.clone(),
            message: e.to_string(),
        })
    }
}
