//! Converting between CSV text and record collections.

use crate::Result;
use crate::record::{Record, RecordCollection};
use anyhow::Context;

/// Text format the reconciler reads its inputs from and writes its buckets to.
pub trait RecordCodec {
    fn parse(&self, text: &str) -> Result<RecordCollection>;
    fn serialize(&self, records: &[Record]) -> Result<String>;
}

/// Header-row CSV: the first row names the fields of every following row.
#[derive(Debug, Clone, Copy)]
pub struct CsvCodec {
    delimiter: u8,
}

impl Default for CsvCodec {
    fn default() -> Self {
        CsvCodec { delimiter: b',' }
    }
}

impl CsvCodec {
    pub fn with_delimiter(delimiter: u8) -> Self {
        CsvCodec { delimiter }
    }
}

impl RecordCodec for CsvCodec {
    fn parse(&self, text: &str) -> Result<RecordCollection> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = unique_headers(reader.headers().context("reading header row")?);

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let row_record = result.with_context(|| format!("reading row {}", row + 2))?;
            if row_record.len() > headers.len() {
                tracing::debug!(
                    "row {} has {} cells but only {} columns, dropping the extra cells",
                    row + 2,
                    row_record.len(),
                    headers.len()
                );
            }
            records.push(
                headers
                    .iter()
                    .map(String::as_str)
                    .zip(row_record.iter())
                    .collect::<Record>(),
            );
        }

        Ok(records)
    }

    fn serialize(&self, records: &[Record]) -> Result<String> {
        let Some(first) = records.first() else {
            return Ok(String::new());
        };
        let columns: Vec<&str> = first.keys().collect();

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        writer.write_record(&columns)?;
        for record in records {
            writer.write_record(columns.iter().map(|column| record.get(column).unwrap_or("")))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|error| anyhow::anyhow!("flushing csv writer: {}", error.error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Column names with repeats renamed to `name_1`, `name_2`, ... so that no
/// column is lost.
fn unique_headers(headers: &csv::StringRecord) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut name = header.to_string();
        let mut suffix = 1;
        while names.contains(&name) || (name != header && headers.iter().any(|h| h == name)) {
            name = format!("{header}_{suffix}");
            suffix += 1;
        }
        if name != header {
            tracing::debug!("duplicate column {header:?} renamed to {name:?}");
        }
        names.push(name);
    }
    names
}
