//! Append-only event journal on disk
//!
//! Each record is framed as
//! `[u32 LE payload length][u32 LE crc32 of payload][bincode payload]`.
//! A checksum mismatch is corruption; a record cut short at the end of the
//! file is a torn write and is dropped with a warning.

use crate::error::{BookError, BookResult};
use crate::events::BookEvent;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bytes of framing before each payload
const RECORD_HEADER_LEN: usize = 8;

/// Refuse records larger than this when reading
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Append-only journal writer
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: u64,
}

impl Journal {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> BookResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Opened journal at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    /// Append one event
    pub fn append(&mut self, event: &BookEvent) -> BookResult<()> {
        let payload = bincode::serialize(event)?;
        let len = u32::try_from(payload.len()).map_err(|_| BookError::Corrupted {
            reason: format!("event {} too large to journal", event.sequence()),
        })?;

        self.writer.write_u32::<LittleEndian>(len)?;
        self.writer.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
        self.writer.write_all(&payload)?;
        self.records_written += 1;
        Ok(())
    }

    /// Append events in order
    pub fn append_all(&mut self, events: &[BookEvent]) -> BookResult<()> {
        for event in events {
            self.append(event)?;
        }
        debug!("Appended {} events to {}", events.len(), self.path.display());
        Ok(())
    }

    /// Flush buffered records and sync them to disk
    pub fn flush(&mut self) -> BookResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Records appended through this handle
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Journal file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every intact record from `path`
    pub fn read_all(path: &Path) -> BookResult<Vec<BookEvent>> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        let events = decode_records(&data)?;
        debug!("Read {} events from {}", events.len(), path.display());
        Ok(events)
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush journal {} on drop: {}", self.path.display(), e);
        }
    }
}

/// Decode framed records from a byte buffer
pub fn decode_records(data: &[u8]) -> BookResult<Vec<BookEvent>> {
    let mut cursor = Cursor::new(data);
    let mut events = Vec::new();

    loop {
        let offset = cursor.position() as usize;
        let remaining = data.len() - offset;
        if remaining == 0 {
            break;
        }
        if remaining < RECORD_HEADER_LEN {
            warn!("Dropping torn record header at byte {offset} ({remaining} bytes)");
            break;
        }

        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let crc = cursor.read_u32::<LittleEndian>()?;
        if len > MAX_RECORD_LEN {
            return Err(BookError::Corrupted {
                reason: format!("record at byte {offset} claims {len} bytes"),
            });
        }

        let start = offset + RECORD_HEADER_LEN;
        if data.len() - start < len {
            warn!("Dropping torn record at byte {offset}: expected {len} bytes");
            break;
        }

        let payload = &data[start..start + len];
        if crc32fast::hash(payload) != crc {
            return Err(BookError::Corrupted {
                reason: format!("record at byte {offset} failed checksum"),
            });
        }

        events.push(bincode::deserialize(payload)?);
        cursor.set_position((start + len) as u64);
    }

    Ok(events)
}
