//! Two-column CSV ingestion into a fresh [`ChunkedStore`].
//!
//! Bad rows never abort a load: they are counted and skipped. A load fails only when the
//! input is empty, when no row decodes, or when the decoder itself fails (I/O).

use crate::error::ViewError;
use crate::storage::ChunkedStore;
use crate::types::{IngestReport, Value};

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

/// How the first record of the input is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Skip the first record only if it does not decode as two numbers.
    #[default]
    Auto,
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub header: HeaderMode,
    pub chunk_size: usize,
    /// Field delimiter byte.
    pub delimiter: u8,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            header: HeaderMode::Auto,
            chunk_size: crate::storage::DEFAULT_CHUNK_SIZE,
            delimiter: b',',
        }
    }
}

/// A loaded dataset together with its load report.
#[derive(Debug)]
pub struct Ingested {
    pub store: ChunkedStore,
    pub report: IngestReport,
}

/// Decodes one record into a row, or describes why it could not.
fn decode_row(record: &csv::ByteRecord) -> Result<(Value, Value), String> {
    if record.len() < 2 {
        return Err(format!("expected 2 fields, found {}", record.len()));
    }
    let x = parse_field(&record[0]).ok_or_else(|| "x is not a finite number".to_string())?;
    let y = parse_field(&record[1]).ok_or_else(|| "y is not a finite number".to_string())?;
    Ok((x, y))
}

#[inline]
fn parse_field(raw: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    let v = text.parse::<Value>().ok()?;
    v.is_finite().then_some(v)
}

/// Reads a two-column CSV from `reader` into a new store.
pub fn ingest_reader<R: Read>(reader: R, options: &IngestOptions) -> Result<Ingested, ViewError> {
    let started = Instant::now();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .from_reader(reader);

    let mut store = ChunkedStore::new(options.chunk_size);
    let mut record = csv::ByteRecord::new();
    let mut records: u64 = 0;
    let mut invalid_rows: u64 = 0;
    let mut first_error: Option<String> = None;

    while rdr.read_byte_record(&mut record)? {
        records += 1;
        let is_first = records == 1;
        if is_first && options.header == HeaderMode::Present {
            continue;
        }

        let decoded = decode_row(&record).and_then(|(x, y)| {
            store.append(x, y).map(|_| ()).map_err(|e| e.to_string())
        });

        if let Err(reason) = decoded {
            if is_first && options.header == HeaderMode::Auto {
                continue;
            }
            invalid_rows += 1;
            if first_error.is_none() {
                first_error = Some(format!("record {}: {}", records, reason));
            }
        }
    }

    if records == 0 {
        return Err(ViewError::EmptyInput);
    }
    if store.is_empty() {
        return Err(ViewError::NoValidRows { invalid_rows, first_error });
    }

    let report = IngestReport {
        total_rows: store.total_rows() as u64,
        elapsed: started.elapsed(),
        invalid_rows,
    };
    Ok(Ingested { store, report })
}

/// Reads a two-column CSV file into a new store.
pub fn ingest_path(path: &Path, options: &IngestOptions) -> Result<Ingested, ViewError> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(ViewError::EmptyInput);
    }
    ingest_reader(std::io::BufReader::new(file), options)
}
