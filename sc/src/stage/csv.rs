//! CSV parse and format transforms

use std::sync::Arc;

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use serde_json::Value;
use tracing::debug;

use super::{Item, Record, StageError, StageInput, StageOutput, Transform};

const ROW_DELIMITER: u8 = b'\n';

/// Parses byte or line input into CSV records
///
/// Parsing is blocking and runs on a `spawn_blocking` worker fed through
/// the stage input.
#[derive(Debug, Clone)]
pub struct CsvParser {
    delimiter: u8,
    headers: bool,
    max_rows: Option<usize>,
}

impl CsvParser {
    pub fn new(delimiter: u8, headers: bool) -> Self {
        debug!(delimiter = %(delimiter as char), headers, "CsvParser::new: called");
        Self {
            delimiter,
            headers,
            max_rows: None,
        }
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    fn parse_blocking(&self, input: StageInput, output: StageOutput) -> Result<usize, StageError> {
        let mut source = input.into_reader("csv-parse", true);
        let result = self.read_records(&mut source, &output);
        match (result, source.take_failure()) {
            (_, Some(failure)) => Err(failure),
            (result, None) => result,
        }
    }

    fn read_records(&self, source: &mut impl std::io::Read, output: &StageOutput) -> Result<usize, StageError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.headers)
            .flexible(true)
            .from_reader(source);

        let headers = if self.headers {
            Some(Arc::new(reader.headers()?.clone()))
        } else {
            None
        };

        let mut rows = 0usize;
        let mut values = StringRecord::new();
        while self.max_rows.is_none_or(|max| rows < max) && reader.read_record(&mut values)? {
            let record = match &headers {
                Some(headers) => Record::with_headers(Arc::clone(headers), values.clone()),
                None => Record::new(values.clone()),
            };
            output.blocking_send(Item::Record(record))?;
            rows += 1;
        }
        Ok(rows)
    }
}

#[async_trait]
impl Transform for CsvParser {
    fn name(&self) -> &'static str {
        "csv-parse"
    }

    async fn transform(self: Box<Self>, input: StageInput, output: StageOutput) -> Result<(), StageError> {
        debug!(parser = ?self, "CsvParser::transform: called");
        let rows = tokio::task::spawn_blocking(move || self.parse_blocking(input, output))
            .await
            .map_err(|e| StageError::Worker(e.to_string()))??;
        debug!(rows, "CsvParser::transform: parsed rows");
        Ok(())
    }
}

/// Formats records (or JSON objects/arrays) as CSV bytes
///
/// Rows are separated by `\n`; the last row only gets one when
/// `trailing_delimiter` is set. With `headers`, a header row is written
/// before the first row, taken from the record headers or the JSON keys.
/// Later named rows are written in that column order.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    delimiter: u8,
    headers: bool,
    trailing_delimiter: bool,
}

impl CsvFormatter {
    pub fn new(delimiter: u8, headers: bool, trailing_delimiter: bool) -> Self {
        debug!(delimiter = %(delimiter as char), headers, trailing_delimiter, "CsvFormatter::new: called");
        Self {
            delimiter,
            headers,
            trailing_delimiter,
        }
    }

    /// Encode one row without its terminator
    fn encode_row<I, F>(&self, fields: I) -> Result<Vec<u8>, StageError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(Terminator::Any(ROW_DELIMITER))
            .from_writer(Vec::new());
        writer.write_record(fields)?;
        let mut encoded = writer.into_inner().map_err(|e| StageError::Io(e.into_error()))?;
        if encoded.last() == Some(&ROW_DELIMITER) {
            encoded.pop();
        }
        Ok(encoded)
    }

    /// Split an item into its fields, named when the item carries column names
    fn row_of(&self, item: Item) -> Result<Row, StageError> {
        match item {
            Item::Record(record) => {
                let values = record.values.iter().map(str::to_string).collect();
                Ok(match record.headers {
                    Some(headers) => Row::Named {
                        names: headers.iter().map(str::to_string).collect(),
                        values,
                    },
                    None => Row::Positional(values),
                })
            }
            Item::Json(Value::Object(map)) => Ok(Row::Named {
                names: map.keys().cloned().collect(),
                values: map.values().map(json_field).collect(),
            }),
            Item::Json(Value::Array(values)) => Ok(Row::Positional(values.iter().map(json_field).collect())),
            other => Err(StageError::UnsupportedItem {
                stage: self.name(),
                item: other.kind(),
            }),
        }
    }
}

/// Fields of one incoming item
enum Row {
    Named { names: Vec<String>, values: Vec<String> },
    Positional(Vec<String>),
}

impl Row {
    /// Values in `columns` order; a name the row lacks becomes an empty field
    fn aligned(self, columns: &[String]) -> Vec<String> {
        match self {
            Row::Named { names, values } if names == columns => values,
            Row::Named { names, values } => columns
                .iter()
                .map(|column| {
                    names
                        .iter()
                        .position(|name| name == column)
                        .and_then(|index| values.get(index).cloned())
                        .unwrap_or_default()
                })
                .collect(),
            Row::Positional(values) => values,
        }
    }
}

fn json_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Transform for CsvFormatter {
    fn name(&self) -> &'static str {
        "csv-format"
    }

    async fn transform(self: Box<Self>, mut input: StageInput, output: StageOutput) -> Result<(), StageError> {
        debug!(formatter = ?self, "CsvFormatter::transform: called");
        let mut rows = 0usize;
        // Column order is fixed by the first named row
        let mut columns: Option<Vec<String>> = None;

        while let Some(item) = input.recv().await {
            let row = self.row_of(item)?;

            let mut chunk = Vec::new();
            let values = if let Some(columns) = &columns {
                row.aligned(columns)
            } else {
                match row {
                    Row::Named { names, values } => {
                        if rows == 0 && self.headers {
                            chunk.extend(self.encode_row(&names)?);
                            rows += 1;
                        }
                        columns = Some(names);
                        values
                    }
                    Row::Positional(values) => values,
                }
            };

            if rows > 0 {
                chunk.push(ROW_DELIMITER);
            }
            chunk.extend(self.encode_row(&values)?);
            rows += 1;

            output.send(chunk).await?;
        }

        if self.trailing_delimiter && rows > 0 {
            output.send(vec![ROW_DELIMITER]).await?;
        }

        debug!(rows, "CsvFormatter::transform: finished");
        Ok(())
    }
}
