//! Line splitting transform

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{Item, StageError, StageInput, StageOutput, Transform};

/// How incoming text is cut into lines
#[derive(Debug, Clone)]
pub enum SplitMode {
    /// `\n` or `\r\n`
    Newline,
    /// Any match of the pattern
    Regex(Regex),
    /// Newline-delimited JSON; each non-blank line is parsed
    Ndjson,
}

/// Splits byte or text input into lines (or JSON documents)
///
/// In newline mode a non-empty unterminated last line is still emitted;
/// regex and ndjson modes drop whatever follows the last separator. With
/// `max_length` set, a partial line buffered beyond that many bytes fails
/// the stage.
pub struct LineSplitter {
    mode: SplitMode,
    separator: Regex,
    max_length: Option<usize>,
}

impl LineSplitter {
    pub fn new(mode: SplitMode, max_length: Option<usize>) -> Self {
        debug!(?mode, ?max_length, "LineSplitter::new: called");
        let separator = match &mode {
            SplitMode::Regex(pattern) => pattern.clone(),
            SplitMode::Newline | SplitMode::Ndjson => NEWLINE.clone(),
        };
        Self {
            mode,
            separator,
            max_length,
        }
    }

    pub fn newline() -> Self {
        Self::new(SplitMode::Newline, None)
    }

    /// Only newline mode emits an unterminated last piece
    fn keeps_trailing(&self) -> bool {
        matches!(self.mode, SplitMode::Newline)
    }

    fn emit_item(&self, piece: &str) -> Result<Option<Item>, StageError> {
        match self.mode {
            SplitMode::Ndjson => {
                // Blank lines are skipped, not parsed
                if piece.trim().is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_str(piece).map_err(|source| StageError::Json {
                    line: piece.to_string(),
                    source,
                })?;
                Ok(Some(Item::Json(value)))
            }
            SplitMode::Newline | SplitMode::Regex(_) => Ok(Some(Item::Line(piece.to_string()))),
        }
    }

    /// Split the buffered text, emitting every complete piece and keeping the remainder
    async fn flush_complete(&self, carry: &mut String, output: &StageOutput) -> Result<(), StageError> {
        let mut pieces: Vec<&str> = self.separator.split(carry.as_str()).collect();
        let remainder = pieces.pop().unwrap_or_default().to_string();

        for piece in pieces {
            if let Some(item) = self.emit_item(piece)? {
                output.send(item).await?;
            }
        }

        *carry = remainder;
        if let Some(max_length) = self.max_length
            && carry.len() > max_length
        {
            return Err(StageError::LineTooLong { max_length });
        }
        Ok(())
    }
}

static NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").expect("newline pattern is valid"));

/// Move the longest valid UTF-8 prefix of `pending` into `carry`
fn decode_prefix(pending: &mut Vec<u8>, carry: &mut String) {
    let valid = match std::str::from_utf8(pending) {
        Ok(text) => text.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        // Invalid sequence in the middle: decode lossily rather than stall
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(valid);
    carry.push_str(&String::from_utf8_lossy(pending));
    *pending = rest;
}

#[async_trait]
impl Transform for LineSplitter {
    fn name(&self) -> &'static str {
        "line-split"
    }

    async fn transform(self: Box<Self>, mut input: StageInput, output: StageOutput) -> Result<(), StageError> {
        debug!(mode = ?self.mode, "LineSplitter::transform: called");
        let mut pending: Vec<u8> = Vec::new();
        let mut carry = String::new();

        while let Some(item) = input.recv().await {
            match item {
                Item::Bytes(bytes) => {
                    pending.extend_from_slice(&bytes);
                    decode_prefix(&mut pending, &mut carry);
                }
                Item::Line(line) => carry.push_str(&line),
                other => {
                    return Err(StageError::UnsupportedItem {
                        stage: self.name(),
                        item: other.kind(),
                    });
                }
            }
            self.flush_complete(&mut carry, &output).await?;
        }

        if self.keeps_trailing() {
            if !pending.is_empty() {
                carry.push_str(&String::from_utf8_lossy(&pending));
            }
            if !carry.is_empty()
                && let Some(item) = self.emit_item(&carry)?
            {
                output.send(item).await?;
            }
        } else if !carry.is_empty() || !pending.is_empty() {
            debug!(len = carry.len() + pending.len(), "LineSplitter::transform: dropping unterminated remainder");
        }

        debug!("LineSplitter::transform: input exhausted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::channel;
    use bytes::Bytes;
    use serde_json::json;

    async fn run_splitter(splitter: LineSplitter, chunks: &[&'static [u8]]) -> Result<Vec<Item>, StageError> {
        let (in_tx, in_rx) = channel(16);
        let (out_tx, mut out_rx) = channel(16);
        let task = tokio::spawn(Box::new(splitter).transform(in_rx, out_tx));

        for chunk in chunks {
            in_tx.send(Bytes::from_static(chunk)).await.unwrap();
        }
        drop(in_tx);

        let mut items = Vec::new();
        while let Some(item) = out_rx.recv().await {
            items.push(item);
        }
        task.await.unwrap()?;
        Ok(items)
    }

    fn lines(items: &[Item]) -> Vec<String> {
        items
            .iter()
            .filter_map(|i| match i {
                Item::Line(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_newline_split_across_chunks() {
        let items = run_splitter(
            LineSplitter::newline(),
            &[b"This is Li", b"ne 1\r\nThis is Line 2\nThis", b" is Line 3\n"],
        )
        .await
        .unwrap();

        assert_eq!(lines(&items), vec!["This is Line 1", "This is Line 2", "This is Line 3"]);
    }

    #[tokio::test]
    async fn test_last_line_without_newline_is_emitted() {
        let items = run_splitter(LineSplitter::newline(), &[b"a\nb"]).await.unwrap();
        assert_eq!(lines(&items), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_regex_mode_drops_unterminated_remainder() {
        let splitter = LineSplitter::new(SplitMode::Regex(Regex::new(r"\n").unwrap()), None);
        let items = run_splitter(splitter, &[b"L1\nL2\npartial"]).await.unwrap();
        assert_eq!(lines(&items), vec!["L1", "L2"]);
    }

    #[tokio::test]
    async fn test_ndjson_mode_drops_unterminated_remainder() {
        let splitter = LineSplitter::new(SplitMode::Ndjson, None);
        let items = run_splitter(splitter, &[b"{\"a\":1}\n{\"a\":"]).await.unwrap();
        assert_eq!(items, vec![Item::Json(json!({"a": 1}))]);
    }

    #[tokio::test]
    async fn test_multibyte_char_split_between_chunks() {
        let items = run_splitter(LineSplitter::newline(), &[b"caf\xc3", b"\xa9\n"]).await.unwrap();
        assert_eq!(lines(&items), vec!["café"]);
    }

    #[tokio::test]
    async fn test_regex_split() {
        let splitter = LineSplitter::new(SplitMode::Regex(Regex::new(r"\s*\|\s*").unwrap()), None);
        let items = run_splitter(splitter, &[b"a | b|c|"]).await.unwrap();
        assert_eq!(lines(&items), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_ndjson_split() {
        let splitter = LineSplitter::new(SplitMode::Ndjson, None);
        let items = run_splitter(
            splitter,
            &[b"{\"name\":\"rob\",\"age\":30}\n\n{\"name\":\"mike\",", b"\"age\":22}\n"],
        )
        .await
        .unwrap();

        assert_eq!(
            items,
            vec![
                Item::Json(json!({"name": "rob", "age": 30})),
                Item::Json(json!({"name": "mike", "age": 22})),
            ]
        );
    }

    #[tokio::test]
    async fn test_ndjson_invalid_line() {
        let splitter = LineSplitter::new(SplitMode::Ndjson, None);
        let err = run_splitter(splitter, &[b"{not json}\n"]).await.unwrap_err();
        assert!(matches!(err, StageError::Json { .. }));
    }

    #[tokio::test]
    async fn test_max_length_exceeded() {
        let splitter = LineSplitter::new(SplitMode::Newline, Some(4));
        let err = run_splitter(splitter, &[b"ok\n", b"far too long"]).await.unwrap_err();
        assert!(matches!(err, StageError::LineTooLong { max_length: 4 }));
    }
}
