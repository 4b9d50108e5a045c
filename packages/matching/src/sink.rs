//! Persistence of linkage outcomes.
//!
//! The matcher never talks to storage directly: it owns a bounded
//! [`ChunkBuffer`] flushed through an injected [`LinkSink`]. Chunk
//! flushes are all-or-nothing — a chunk is serialized to memory first
//! and only then written out, so a failure never leaves a partially
//! visible chunk.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use placelink_models::{LinkRecord, RecordId};
use serde::Serialize;

/// Default number of accumulated links per flush.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Errors from link persistence.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for batches of link records.
///
/// Implementations append whole batches; batch boundaries match the
/// matcher's chunk boundaries and arrive in accumulation order.
pub trait LinkSink {
    /// Appends a batch of links.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the batch cannot be persisted; the
    /// batch must not be partially applied.
    fn append(&mut self, batch: &[LinkRecord]) -> Result<(), SinkError>;
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Everything appended so far, in arrival order.
    pub records: Vec<LinkRecord>,
    /// Sizes of the appended batches, in arrival order.
    pub batch_sizes: Vec<usize>,
}

impl LinkSink for MemorySink {
    fn append(&mut self, batch: &[LinkRecord]) -> Result<(), SinkError> {
        self.records.extend_from_slice(batch);
        self.batch_sizes.push(batch.len());
        Ok(())
    }
}

/// Flat CSV row of the persisted linkage table.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkRow<'a> {
    historical_id: RecordId,
    contemporary_id: Option<RecordId>,
    score: f64,
    status: u16,
    number: Option<&'a str>,
    district_code: Option<&'a str>,
    assigned_code: Option<&'a str>,
    density: Option<f64>,
    start_year: Option<i32>,
    event_count: u32,
    easting: Option<f64>,
    northing: Option<f64>,
    cell: Option<usize>,
}

impl<'a> From<&'a LinkRecord> for LinkRow<'a> {
    fn from(record: &'a LinkRecord) -> Self {
        Self {
            historical_id: record.historical_id,
            contemporary_id: record.contemporary_id,
            score: record.score,
            status: record.status.code(),
            number: record.number.as_deref(),
            district_code: record.district_code.as_deref(),
            assigned_code: record.assigned_code.as_deref(),
            density: record.density,
            start_year: record.start_year,
            event_count: record.event_count,
            easting: record.easting,
            northing: record.northing,
            cell: record.cell,
        }
    }
}

/// CSV-backed sink writing the linkage table with numeric status codes.
pub struct CsvSink<W: Write> {
    out: W,
    wrote_header: bool,
}

impl CsvSink<File> {
    /// Creates (truncating) the target file.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wraps an arbitrary writer.
    pub const fn from_writer(out: W) -> Self {
        Self {
            out,
            wrote_header: false,
        }
    }
}

impl<W: Write> LinkSink for CsvSink<W> {
    fn append(&mut self, batch: &[LinkRecord]) -> Result<(), SinkError> {
        // Serialize the whole chunk to memory before touching the
        // output, so an error cannot leave a torn chunk behind.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(!self.wrote_header)
            .from_writer(Vec::new());
        for record in batch {
            writer.serialize(LinkRow::from(record))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))?;

        self.out.write_all(&bytes)?;
        self.out.flush()?;
        self.wrote_header = true;
        Ok(())
    }
}

/// Bounded accumulation buffer owned by the matcher.
///
/// Pushes flush automatically once `capacity` links have accumulated;
/// [`ChunkBuffer::finish`] flushes the remainder. Flush order matches
/// accumulation order.
pub struct ChunkBuffer<'a, S: LinkSink> {
    sink: &'a mut S,
    buffer: Vec<LinkRecord>,
    capacity: usize,
}

impl<'a, S: LinkSink> ChunkBuffer<'a, S> {
    /// Wraps a sink with the given chunk capacity (minimum 1).
    pub fn new(sink: &'a mut S, capacity: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Buffers one link, flushing when the chunk fills.
    ///
    /// # Errors
    ///
    /// Propagates sink failures from an automatic flush.
    pub fn push(&mut self, record: LinkRecord) -> Result<(), SinkError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes any buffered links as one chunk.
    ///
    /// # Errors
    ///
    /// Propagates sink failures; the buffer is kept intact on failure.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sink.append(&self.buffer)?;
        log::debug!("flushed chunk of {} links", self.buffer.len());
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the final partial chunk.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn finish(mut self) -> Result<(), SinkError> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placelink_models::MatchStatus;

    fn link(id: RecordId) -> LinkRecord {
        LinkRecord {
            historical_id: id,
            contemporary_id: Some(id + 100),
            score: 92.5,
            status: MatchStatus::Matched,
            number: Some("12".into()),
            district_code: Some("A".into()),
            assigned_code: None,
            density: None,
            start_year: Some(1881),
            event_count: 2,
            easting: Some(301_250.0),
            northing: Some(679_400.0),
            cell: None,
        }
    }

    #[test]
    fn chunk_buffer_flushes_at_capacity() {
        let mut sink = MemorySink::default();
        let mut buffer = ChunkBuffer::new(&mut sink, 3);
        for id in 0..7 {
            buffer.push(link(id)).unwrap();
        }
        buffer.finish().unwrap();
        assert_eq!(sink.batch_sizes, vec![3, 3, 1]);
        let ids: Vec<RecordId> = sink.records.iter().map(|r| r.historical_id).collect();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn empty_buffer_finishes_without_appending() {
        let mut sink = MemorySink::default();
        let buffer: ChunkBuffer<'_, MemorySink> = ChunkBuffer::new(&mut sink, 3);
        buffer.finish().unwrap();
        assert!(sink.batch_sizes.is_empty());
    }

    #[test]
    fn csv_sink_writes_header_once_and_status_codes() {
        let mut sink = CsvSink::from_writer(Vec::new());
        sink.append(&[link(1)]).unwrap();
        sink.append(&[link(2)]).unwrap();
        let text = String::from_utf8(sink.out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("historicalId,contemporaryId,score,status"));
        assert!(lines[1].contains(",100,"));
        assert!(lines[2].starts_with('2'));
    }
}
