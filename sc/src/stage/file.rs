//! File and in-memory stages

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Item, Sink, Source, StageError, StageInput, StageOutput};

/// Default read chunk size for file sources
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Reads a file and emits its content as byte chunks
pub struct FileReader {
    path: PathBuf,
    chunk_size: usize,
}

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        let path = path.into();
        debug!(?path, chunk_size, "FileReader::new: called");
        Self {
            path,
            chunk_size: chunk_size.max(1),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StageError {
        StageError::File {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl Source for FileReader {
    fn name(&self) -> &'static str {
        "file-reader"
    }

    async fn produce(self: Box<Self>, output: StageOutput) -> Result<(), StageError> {
        debug!(path = ?self.path, "FileReader::produce: called");
        let mut file = File::open(&self.path).await.map_err(|e| self.io_error(e))?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0usize;

        loop {
            let n = file.read(&mut buf).await.map_err(|e| self.io_error(e))?;
            if n == 0 {
                break;
            }
            total += n;
            output.send(Bytes::copy_from_slice(&buf[..n])).await?;
        }

        debug!(path = ?self.path, total, "FileReader::produce: reached end of file");
        Ok(())
    }
}

/// Writes incoming bytes and lines to a file, truncating it first
pub struct FileWriter {
    path: PathBuf,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(?path, "FileWriter::new: called");
        Self { path }
    }

    fn io_error(&self, source: std::io::Error) -> StageError {
        StageError::File {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl Sink for FileWriter {
    fn name(&self) -> &'static str {
        "file-writer"
    }

    async fn consume(self: Box<Self>, mut input: StageInput) -> Result<(), StageError> {
        debug!(path = ?self.path, "FileWriter::consume: called");
        let mut file = File::create(&self.path).await.map_err(|e| self.io_error(e))?;

        while let Some(item) = input.recv().await {
            let result = match &item {
                Item::Bytes(bytes) => file.write_all(bytes).await,
                Item::Line(line) => file.write_all(line.as_bytes()).await,
                other => {
                    return Err(StageError::UnsupportedItem {
                        stage: self.name(),
                        item: other.kind(),
                    });
                }
            };
            result.map_err(|e| self.io_error(e))?;
        }

        file.flush().await.map_err(|e| self.io_error(e))?;
        debug!(path = ?self.path, "FileWriter::consume: finished");
        Ok(())
    }
}

/// Collects incoming bytes and lines into a shared buffer
///
/// Keep a clone of [`MemorySink::buffer`] before handing the sink to a
/// chain; it holds the collected content once the run has finished.
#[derive(Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.buffer)
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &'static str {
        "memory-sink"
    }

    async fn consume(self: Box<Self>, mut input: StageInput) -> Result<(), StageError> {
        while let Some(item) = input.recv().await {
            let mut buffer = self.buffer.lock().await;
            match item {
                Item::Bytes(bytes) => buffer.extend_from_slice(&bytes),
                Item::Line(line) => buffer.extend_from_slice(line.as_bytes()),
                other => {
                    return Err(StageError::UnsupportedItem {
                        stage: self.name(),
                        item: other.kind(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::channel;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_reader_emits_whole_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("x.txt");
        fs::write(&path, "L1\nL2\nL3\n").unwrap();

        let (output, mut input) = channel(16);
        let reader = Box::new(FileReader::with_chunk_size(&path, 4));
        let producer = tokio::spawn(reader.produce(output));

        let mut content = Vec::new();
        while let Some(Item::Bytes(bytes)) = input.recv().await {
            assert!(bytes.len() <= 4);
            content.extend_from_slice(&bytes);
        }

        producer.await.unwrap().unwrap();
        assert_eq!(content, b"L1\nL2\nL3\n");
    }

    #[tokio::test]
    async fn test_file_reader_missing_file() {
        let temp = tempdir().unwrap();
        let (output, _input) = channel(1);

        let err = Box::new(FileReader::new(temp.path().join("nope.txt")))
            .produce(output)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::File { .. }));
        assert!(err.to_string().contains("nope.txt"));
    }

    #[tokio::test]
    async fn test_file_writer_writes_bytes_and_lines() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("out.txt");

        let (output, input) = channel(4);
        let writer = tokio::spawn(Box::new(FileWriter::new(&path)).consume(input));
        output.send(Item::from(b"abc".to_vec())).await.unwrap();
        output.send(Item::Line("def".to_string())).await.unwrap();
        drop(output);

        writer.await.unwrap().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdef");
    }

    #[tokio::test]
    async fn test_memory_sink_rejects_json() {
        let sink = MemorySink::new();
        let (output, input) = channel(4);
        let task = tokio::spawn(Box::new(sink).consume(input));
        output.send(Item::Json(serde_json::json!({"a": 1}))).await.unwrap();
        drop(output);

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, StageError::UnsupportedItem { item: "json", .. }));
    }
}
