//! Candle feed: CSV in, materialized candle sequence out.
//!
//! Columns: `timestamp,open,high,low,close,volume` with RFC 3339 timestamps.
//! Values are passed through unvalidated so the indicator engine can reject
//! and log malformed candles itself; only rows that do not parse are errors.

use chrono::{DateTime, Utc};
use gatelab_core::domain::Candle;
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("row {row}: bad timestamp '{value}': {source}")]
    Timestamp {
        row: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("row {row}: timestamp {timestamp} is not after the previous row")]
    OutOfOrder { row: usize, timestamp: DateTime<Utc> },

    #[error("failed to write candles: {0}")]
    Write(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load a candle CSV from disk.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>, FeedError> {
    let file = std::fs::File::open(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_candles(file)
}

/// Parse candles from any reader. Rows must be in strictly increasing time order.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>, FeedError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut candles: Vec<Candle> = Vec::new();
    for (i, result) in rdr.deserialize::<CandleRow>().enumerate() {
        let row = i + 1;
        let rec = result.map_err(|source| FeedError::Csv { row, source })?;
        let timestamp = DateTime::parse_from_rfc3339(&rec.timestamp)
            .map_err(|source| FeedError::Timestamp {
                row,
                value: rec.timestamp.clone(),
                source,
            })?
            .with_timezone(&Utc);

        if candles.last().is_some_and(|prev| prev.timestamp >= timestamp) {
            return Err(FeedError::OutOfOrder { row, timestamp });
        }
        candles.push(Candle::new(
            timestamp, rec.open, rec.high, rec.low, rec.close, rec.volume,
        ));
    }
    Ok(candles)
}

/// Write candles in the same format `read_candles` accepts.
pub fn write_candles<W: Write>(writer: W, candles: &[Candle]) -> Result<(), FeedError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        wtr.write_record([
            c.timestamp.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}
