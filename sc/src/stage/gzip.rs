//! Gzip compress/decompress transform

use std::io::Write;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Item, StageError, StageInput, StageOutput, Transform};

/// Direction of a gzip stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GzipDirection {
    #[serde(alias = "zip")]
    Compress,
    #[serde(alias = "unzip")]
    Decompress,
}

/// Either side of the flate2 write adapters, draining into a Vec
enum Codec {
    Encoder(GzEncoder<Vec<u8>>),
    Decoder(GzDecoder<Vec<u8>>),
}

impl Codec {
    fn new(direction: GzipDirection) -> Self {
        match direction {
            GzipDirection::Compress => Codec::Encoder(GzEncoder::new(Vec::new(), Compression::default())),
            GzipDirection::Decompress => Codec::Decoder(GzDecoder::new(Vec::new())),
        }
    }

    /// Feed a chunk and take whatever output it produced
    fn feed(&mut self, chunk: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Codec::Encoder(encoder) => {
                encoder.write_all(chunk)?;
                Ok(std::mem::take(encoder.get_mut()))
            }
            Codec::Decoder(decoder) => {
                decoder.write_all(chunk)?;
                Ok(std::mem::take(decoder.get_mut()))
            }
        }
    }

    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Codec::Encoder(encoder) => encoder.finish(),
            Codec::Decoder(decoder) => decoder.finish(),
        }
    }
}

/// Gzip-compresses or decompresses a byte stream
pub struct GzipStream {
    direction: GzipDirection,
}

impl GzipStream {
    pub fn new(direction: GzipDirection) -> Self {
        debug!(?direction, "GzipStream::new: called");
        Self { direction }
    }

    pub fn compress() -> Self {
        Self::new(GzipDirection::Compress)
    }

    pub fn decompress() -> Self {
        Self::new(GzipDirection::Decompress)
    }
}

#[async_trait]
impl Transform for GzipStream {
    fn name(&self) -> &'static str {
        match self.direction {
            GzipDirection::Compress => "compress",
            GzipDirection::Decompress => "decompress",
        }
    }

    async fn transform(self: Box<Self>, mut input: StageInput, output: StageOutput) -> Result<(), StageError> {
        debug!(direction = ?self.direction, "GzipStream::transform: called");
        let mut codec = Codec::new(self.direction);

        while let Some(item) = input.recv().await {
            let produced = match &item {
                Item::Bytes(bytes) => codec.feed(bytes)?,
                Item::Line(line) => codec.feed(line.as_bytes())?,
                other => {
                    return Err(StageError::UnsupportedItem {
                        stage: self.name(),
                        item: other.kind(),
                    });
                }
            };
            if !produced.is_empty() {
                output.send(produced).await?;
            }
        }

        let tail = codec.finish()?;
        if !tail.is_empty() {
            output.send(tail).await?;
        }
        Ok(())
    }
}
