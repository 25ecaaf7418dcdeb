//! Buffered CSV log writer.
//!
//! Lines are collected in a fixed RAM buffer and handed to the storage once
//! the buffer reaches the flush threshold, so the SD card sees a few larger
//! writes instead of one per sample. A line is never split across two writes.

use core::fmt::Write;

use chrono::{NaiveDateTime, Timelike};
use heapless::{String, Vec};

use crate::config::{LOG_BUFFER_CAPACITY, LOG_FLUSH_THRESHOLD};
use crate::hardware::traits::LogStorage;
use crate::state::PhysicalSample;

pub const HEADER: &str = "time,temperature,pressure,humidity,light\n";

/// Longest possible line: three `f32::MIN` values with two decimals each.
pub const LINE_CAPACITY: usize = 160;

pub type FileName = String<12>;
pub type LogLine = String<LINE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogError<E> {
    Storage(E),
    /// The storage accepted fewer bytes than requested (card full).
    ShortWrite { written: usize, expected: usize },
    NotActive,
}

impl<E> From<E> for LogError<E> {
    fn from(error: E) -> Self {
        LogError::Storage(error)
    }
}

/// `HHMM_LOG.TXT`, from the time logging started.
pub fn file_name(time: NaiveDateTime) -> FileName {
    let mut name = FileName::new();
    let _ = write!(name, "{:02}{:02}_LOG.TXT", time.hour(), time.minute());
    name
}

/// `HH:MM:SS,<temperature>,<pressure>,<humidity>,<light>\n`
pub fn format_line(sample: &PhysicalSample, time: NaiveDateTime) -> LogLine {
    let mut line = LogLine::new();
    let _ = write!(
        line,
        "{:02}:{:02}:{:02},{:.2},{:.2},{:.2},{}\n",
        time.hour(),
        time.minute(),
        time.second(),
        sample.temperature,
        sample.pressure,
        sample.humidity,
        sample.light
    );
    line
}

pub struct LogWriter<S, const N: usize = LOG_BUFFER_CAPACITY> {
    storage: S,
    buffer: Vec<u8, N>,
    flush_threshold: usize,
    active: bool,
}

impl<S: LogStorage> LogWriter<S> {
    pub fn new(storage: S) -> Self {
        Self::with_threshold(storage, LOG_FLUSH_THRESHOLD)
    }
}

impl<S: LogStorage, const N: usize> LogWriter<S, N> {
    pub fn with_threshold(storage: S, flush_threshold: usize) -> Self {
        Self {
            storage,
            buffer: Vec::new(),
            flush_threshold,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bytes waiting in RAM.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Opens a new log file and writes the header. Does nothing when a log is
    /// already open.
    pub fn start(&mut self, time: NaiveDateTime) -> Result<(), LogError<S::Error>> {
        if self.active {
            return Ok(());
        }

        let name = file_name(time);
        self.storage.open(&name)?;
        if let Err(e) = write_exact(&mut self.storage, HEADER.as_bytes()) {
            let _ = self.storage.close();
            error!("log header write failed");
            return Err(e);
        }

        self.buffer.clear();
        self.active = true;
        info!("logging started at {}:{}", time.hour(), time.minute());
        Ok(())
    }

    /// Buffers one sample line, flushing as needed. On a failed write the log
    /// is closed and logging stops.
    pub fn append(
        &mut self,
        sample: &PhysicalSample,
        time: NaiveDateTime,
    ) -> Result<(), LogError<S::Error>> {
        if !self.active {
            return Err(LogError::NotActive);
        }

        let line = format_line(sample, time);
        let result = self.push_line(line.as_bytes());
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Writes out what is buffered and closes the file.
    pub fn stop(&mut self) -> Result<(), LogError<S::Error>> {
        if !self.active {
            return Ok(());
        }

        if let Err(e) = self.flush() {
            self.abort();
            return Err(e);
        }
        self.active = false;
        self.storage.close()?;
        info!("logging stopped");
        Ok(())
    }

    fn push_line(&mut self, line: &[u8]) -> Result<(), LogError<S::Error>> {
        if line.len() >= N {
            self.flush()?;
            return write_exact(&mut self.storage, line);
        }

        if self.buffer.len() + line.len() >= N {
            self.flush()?;
        }
        // fits: either there was room or the buffer is now empty
        let _ = self.buffer.extend_from_slice(line);

        if self.buffer.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError<S::Error>> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        write_exact(&mut self.storage, &self.buffer)?;
        trace!("flushed {} bytes", self.buffer.len());
        self.buffer.clear();
        Ok(())
    }

    fn abort(&mut self) {
        self.active = false;
        self.buffer.clear();
        let _ = self.storage.close();
        error!("log write failed, logging stopped");
    }
}

fn write_exact<S: LogStorage>(storage: &mut S, data: &[u8]) -> Result<(), LogError<S::Error>> {
    let written = storage.write(data)?;
    if written < data.len() {
        return Err(LogError::ShortWrite {
            written,
            expected: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{HEADER, LogError, LogStorage, LogWriter, file_name, format_line};
    use crate::state::PhysicalSample;
    use chrono::{NaiveDate, NaiveDateTime};

    #[derive(Default)]
    struct MemoryStorage {
        opened: Option<std::string::String>,
        writes: std::vec::Vec<std::vec::Vec<u8>>,
        closed: usize,
        /// Accept at most this many bytes per write.
        limit: Option<usize>,
        fail: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Fault;

    impl LogStorage for MemoryStorage {
        type Error = Fault;

        fn open(&mut self, name: &str) -> Result<(), Fault> {
            self.opened = Some(name.into());
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, Fault> {
            if self.fail {
                return Err(Fault);
            }
            let n = self.limit.map_or(data.len(), |limit| data.len().min(limit));
            self.writes.push(data[..n].to_vec());
            Ok(n)
        }

        fn close(&mut self) -> Result<(), Fault> {
            self.closed += 1;
            Ok(())
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn sample() -> PhysicalSample {
        PhysicalSample {
            temperature: 21.5,
            pressure: 1013.25,
            humidity: 45.75,
            light: 80,
        }
    }

    #[test]
    fn line_and_file_name_format() {
        assert_eq!(file_name(at(7, 3, 0)).as_str(), "0703_LOG.TXT");
        let line = format_line(&sample(), at(12, 0, 0));
        assert_eq!(line.as_str(), "12:00:00,21.50,1013.25,45.75,80\n");
        assert_eq!(line.len(), 32);
    }

    #[test]
    fn negative_and_extreme_values_fit() {
        let sample = PhysicalSample {
            temperature: f32::MIN,
            pressure: f32::MIN,
            humidity: f32::MIN,
            light: 255,
        };
        let line = format_line(&sample, at(23, 59, 59));
        assert!(line.ends_with(",255\n"));
    }

    #[test]
    fn three_short_lines_are_one_flush() {
        let mut log = LogWriter::new(MemoryStorage::default());
        log.start(at(12, 0, 0)).unwrap();
        for s in 0..3 {
            log.append(&sample(), at(12, 0, s)).unwrap();
        }
        assert_eq!(log.storage().writes.len(), 1);
        log.stop().unwrap();

        let storage = log.storage();
        assert_eq!(storage.opened.as_deref(), Some("1200_LOG.TXT"));
        assert_eq!(storage.writes[0], HEADER.as_bytes());
        assert_eq!(storage.writes.len(), 2);
        assert_eq!(
            storage.writes[1],
            b"12:00:00,21.50,1013.25,45.75,80\n\
              12:00:01,21.50,1013.25,45.75,80\n\
              12:00:02,21.50,1013.25,45.75,80\n"
        );
        assert_eq!(storage.closed, 1);
        assert!(!log.is_active());
    }

    #[test]
    fn threshold_triggers_flush() {
        let mut log = LogWriter::new(MemoryStorage::default());
        log.start(at(12, 0, 0)).unwrap();
        for s in 0..4 {
            log.append(&sample(), at(12, 0, s)).unwrap();
        }
        // 4 * 32 bytes reaches the 128 byte threshold
        assert_eq!(log.pending(), 0);
        assert_eq!(log.storage().writes[1].len(), 128);
    }

    #[test]
    fn full_buffer_flushes_before_insert() {
        let mut log: LogWriter<_, 64> = LogWriter::with_threshold(MemoryStorage::default(), 60);
        log.start(at(12, 0, 0)).unwrap();
        log.append(&sample(), at(12, 0, 0)).unwrap();
        assert_eq!(log.pending(), 32);

        // 32 + 32 would fill the buffer: first line goes out whole, second stays
        log.append(&sample(), at(12, 0, 1)).unwrap();
        assert_eq!(log.pending(), 32);
        let writes = &log.storage().writes;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1], b"12:00:00,21.50,1013.25,45.75,80\n");
    }

    #[test]
    fn oversized_line_bypasses_buffer() {
        let mut log: LogWriter<_, 16> = LogWriter::with_threshold(MemoryStorage::default(), 8);
        log.start(at(12, 0, 0)).unwrap();
        log.append(&sample(), at(12, 0, 0)).unwrap();
        assert_eq!(log.pending(), 0);
        assert_eq!(log.storage().writes[1].len(), 32);
    }

    #[test]
    fn start_twice_keeps_first_file() {
        let mut log = LogWriter::new(MemoryStorage::default());
        log.start(at(8, 15, 0)).unwrap();
        log.start(at(9, 30, 0)).unwrap();
        assert_eq!(log.storage().opened.as_deref(), Some("0815_LOG.TXT"));
        assert_eq!(log.storage().writes.len(), 1);
    }

    #[test]
    fn append_without_start_is_rejected() {
        let mut log = LogWriter::new(MemoryStorage::default());
        assert_eq!(log.append(&sample(), at(0, 0, 0)), Err(LogError::NotActive));
        assert!(log.stop().is_ok());
    }

    #[test]
    fn failed_header_leaves_logging_off() {
        let storage = MemoryStorage {
            fail: true,
            ..Default::default()
        };
        let mut log = LogWriter::new(storage);
        assert_eq!(log.start(at(0, 0, 0)), Err(LogError::Storage(Fault)));
        assert!(!log.is_active());
        assert_eq!(log.storage().closed, 1);
    }

    #[test]
    fn short_write_stops_logging() {
        let mut log = LogWriter::new(MemoryStorage::default());
        log.start(at(12, 0, 0)).unwrap();
        log.append(&sample(), at(12, 0, 0)).unwrap();

        log.storage_mut().limit = Some(10);
        assert_eq!(
            log.stop(),
            Err(LogError::ShortWrite {
                written: 10,
                expected: 32
            })
        );
        assert!(!log.is_active());
        assert_eq!(log.pending(), 0);
        assert_eq!(log.storage().closed, 1);
    }

    #[test]
    fn storage_error_during_append_stops_logging() {
        let mut log: LogWriter<_, 64> = LogWriter::with_threshold(MemoryStorage::default(), 32);
        log.start(at(12, 0, 0)).unwrap();
        log.storage_mut().fail = true;
        assert_eq!(
            log.append(&sample(), at(12, 0, 0)),
            Err(LogError::Storage(Fault))
        );
        assert!(!log.is_active());
    }
}
