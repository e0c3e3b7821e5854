//! Items flowing between stages

use std::sync::Arc;

use bytes::Bytes;
use csv::StringRecord;
use serde_json::Value;

/// One unit of data passed from a stage to the next
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// Raw bytes (file chunks, HTTP body chunks, encoded CSV)
    Bytes(Bytes),

    /// A decoded line of text, without its delimiter
    Line(String),

    /// A parsed CSV row
    Record(Record),

    /// A parsed JSON document (one per ndjson line)
    Json(Value),
}

impl Item {
    /// Short name of the item variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Bytes(_) => "bytes",
            Item::Line(_) => "line",
            Item::Record(_) => "record",
            Item::Json(_) => "json",
        }
    }
}

impl From<Bytes> for Item {
    fn from(bytes: Bytes) -> Self {
        Item::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Item {
    fn from(bytes: Vec<u8>) -> Self {
        Item::Bytes(Bytes::from(bytes))
    }
}

/// A CSV row, optionally tagged with the header row it was parsed under
///
/// Headers are shared between every row of a parse run.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub headers: Option<Arc<StringRecord>>,
    pub values: StringRecord,
}

impl Record {
    pub fn new(values: StringRecord) -> Self {
        Self { headers: None, values }
    }

    pub fn with_headers(headers: Arc<StringRecord>, values: StringRecord) -> Self {
        Self {
            headers: Some(headers),
            values,
        }
    }

    /// Look up a field by header name
    pub fn get(&self, name: &str) -> Option<&str> {
        let index = self.headers.as_ref()?.iter().position(|h| h == name)?;
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
