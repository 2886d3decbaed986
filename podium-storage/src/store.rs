//! Score store: segmented append-only persistence for (member, score)
//! mutations.
//!
//! One segment is active for writes at a time; it rotates once it exceeds
//! the configured size. Replay walks every segment in filename order, which
//! is arrival order, so applying records with last-writer-wins rebuilds the
//! exact final state.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use podium_core::config::StoreConfig;
use podium_core::error::{Error, Result};
use podium_core::metrics::Metrics;

use crate::segment::{
    read_header, read_record, write_header, write_record, ReadOutcome, Record, MAX_MEMBER_LEN,
    SEGMENT_HEADER_SIZE,
};

/// Durable mirror of a sorted set.
///
/// Writes go through an internal lock, so a shared reference is enough for
/// every operation; callers layer their own ordering on top.
pub struct ScoreStore {
    dir: PathBuf,
    config: StoreConfig,
    metrics: Metrics,
    active: Mutex<ActiveSegment>,
}

struct ActiveSegment {
    id: u64,
    writer: BufWriter<File>,
    size: u64,
}

impl ScoreStore {
    /// Open the store at `dir`, creating the directory if missing. An
    /// existing active segment is scanned and a torn tail left by a crashed
    /// writer is truncated before new records are appended after it.
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig, metrics: Metrics) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::StorageOpen {
            path: dir.clone(),
            source: e,
        })?;

        let segments = list_segments(&dir)?;
        let active = match segments.last() {
            Some(&(id, ref path)) => match repair_tail(path)? {
                Some(size) if size < config.max_segment_size => {
                    open_segment(path, id, size, &config)?
                }
                Some(_) => create_segment(&dir, id + 1, &config)?,
                // Unusable file shorter than its header: start it over.
                None => create_segment(&dir, id, &config)?,
            },
            None => create_segment(&dir, 0, &config)?,
        };

        info!(
            dir = %dir.display(),
            segments = segments.len().max(1),
            active = active.id,
            "score store opened"
        );

        Ok(Self {
            dir,
            config,
            metrics,
            active: Mutex::new(active),
        })
    }

    /// Persist the latest score for a member.
    pub fn put(&self, member: Bytes, score: f64) -> Result<()> {
        self.append(&Record::set(member, score))
    }

    /// Persist a removal for a member.
    pub fn remove(&self, member: Bytes) -> Result<()> {
        self.append(&Record::tombstone(member))
    }

    fn append(&self, record: &Record) -> Result<()> {
        if record.member.len() > MAX_MEMBER_LEN {
            return Err(Error::invalid(format!(
                "member length {} exceeds limit {}",
                record.member.len(),
                MAX_MEMBER_LEN
            )));
        }

        let mut active = self.active.lock();
        if active.size >= self.config.max_segment_size {
            self.rotate(&mut active)?;
        }

        write_record(&mut active.writer, record)
            .map_err(|e| Error::StorageWrite { source: e })?;
        active.size += record.encoded_len();

        if self.config.sync_on_write {
            active
                .writer
                .flush()
                .and_then(|_| active.writer.get_ref().sync_all())
                .map_err(|e| Error::StorageWrite { source: e })?;
        }

        self.metrics.record_store_write(record.encoded_len());
        Ok(())
    }

    fn rotate(&self, active: &mut ActiveSegment) -> Result<()> {
        // The outgoing segment must be durable before it becomes read-only
        // history.
        active
            .writer
            .flush()
            .and_then(|_| active.writer.get_ref().sync_all())
            .map_err(|e| Error::StorageWrite { source: e })?;

        let next = create_segment(&self.dir, active.id + 1, &self.config)?;
        info!(segment = next.id, "rotated score store segment");
        *active = next;
        Ok(())
    }

    /// Stream every record in arrival order across all segments.
    pub fn iter(&self) -> Result<ReplayIter> {
        // Drain the write buffer so buffered records are visible to readers.
        self.flush()?;
        let paths = list_segments(&self.dir)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        ReplayIter::new(paths)
    }

    /// Replay every record in arrival order into `sink`. Returns the number
    /// of records applied.
    pub fn reload<F>(&self, mut sink: F) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let mut count = 0u64;
        for record in self.iter()? {
            sink(record?)?;
            count += 1;
        }
        self.metrics.record_reload(count);
        debug!(records = count, "score store replayed");
        Ok(count)
    }

    /// Drain the write buffer and fsync the active segment.
    pub fn flush(&self) -> Result<()> {
        let mut active = self.active.lock();
        active
            .writer
            .flush()
            .and_then(|_| active.writer.get_ref().sync_all())
            .map_err(|e| Error::StorageWrite { source: e })
    }

    /// Flush and release the store. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        self.flush()?;
        debug!(dir = %self.dir.display(), "score store closed");
        Ok(())
    }
}

fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{:020}.seg", id))
}

fn list_segments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::StorageOpen {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::StorageOpen {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension() != Some(std::ffi::OsStr::new("seg")) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if let Ok(id) = stem.parse::<u64>() {
                segments.push((id, path));
            }
        }
    }
    segments.sort_by_key(|&(id, _)| id);
    Ok(segments)
}

fn create_segment(dir: &Path, id: u64, config: &StoreConfig) -> Result<ActiveSegment> {
    let path = segment_path(dir, id);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .map_err(|e| Error::StorageOpen {
            path: path.clone(),
            source: e,
        })?;

    let mut writer = BufWriter::with_capacity(config.buffer_size, file);
    write_header(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| Error::StorageWrite { source: e })?;

    debug!(path = %path.display(), "created segment");
    Ok(ActiveSegment {
        id,
        writer,
        size: SEGMENT_HEADER_SIZE,
    })
}

fn open_segment(path: &Path, id: u64, size: u64, config: &StoreConfig) -> Result<ActiveSegment> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| Error::StorageOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(ActiveSegment {
        id,
        writer: BufWriter::with_capacity(config.buffer_size, file),
        size,
    })
}

/// Scan a segment and truncate a torn trailing record, returning the valid
/// length. None means the file is shorter than its own header and should be
/// recreated.
fn repair_tail(path: &Path) -> Result<Option<u64>> {
    let file = File::open(path).map_err(|e| Error::StorageOpen {
        path: path.to_path_buf(),
        source: e,
    })?;
    let len = file
        .metadata()
        .map_err(|e| Error::StorageOpen {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    if len < SEGMENT_HEADER_SIZE {
        warn!(path = %path.display(), "segment shorter than header, recreating");
        return Ok(None);
    }

    let mut reader = BufReader::new(file);
    read_header(&mut reader)?;

    let mut valid = SEGMENT_HEADER_SIZE;
    loop {
        match read_record(&mut reader)? {
            ReadOutcome::Record(record) => valid += record.encoded_len(),
            ReadOutcome::Eof => break,
            ReadOutcome::Torn => {
                warn!(
                    path = %path.display(),
                    offset = valid,
                    "truncating torn record at segment tail"
                );
                let file = OpenOptions::new().write(true).open(path).map_err(|e| {
                    Error::StorageOpen {
                        path: path.to_path_buf(),
                        source: e,
                    }
                })?;
                file.set_len(valid)
                    .map_err(|e| Error::StorageWrite { source: e })?;
                break;
            }
        }
    }
    Ok(Some(valid))
}

/// Streaming iterator over every record in every segment, oldest first.
pub struct ReplayIter {
    paths: Vec<PathBuf>,
    next_index: usize,
    reader: Option<BufReader<File>>,
}

impl ReplayIter {
    fn new(paths: Vec<PathBuf>) -> Result<Self> {
        let mut iter = Self {
            paths,
            next_index: 0,
            reader: None,
        };
        iter.advance_file()?;
        Ok(iter)
    }

    fn advance_file(&mut self) -> Result<bool> {
        if self.next_index >= self.paths.len() {
            self.reader = None;
            return Ok(false);
        }
        let path = &self.paths[self.next_index];
        self.next_index += 1;

        let file = File::open(path).map_err(|e| Error::StorageOpen {
            path: path.clone(),
            source: e,
        })?;
        let mut reader = BufReader::new(file);
        read_header(&mut reader)?;
        self.reader = Some(reader);
        Ok(true)
    }
}

impl Iterator for ReplayIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match read_record(self.reader.as_mut()?) {
                Ok(ReadOutcome::Record(record)) => return Some(Ok(record)),
                Ok(ReadOutcome::Eof) => match self.advance_file() {
                    Ok(true) => continue,
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                },
                Ok(ReadOutcome::Torn) => {
                    return Some(Err(Error::StorageRead {
                        message: "segment ends mid-record".to_string(),
                        source: None,
                    }))
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory_and_segment() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scores");
        let store = ScoreStore::open(&dir, StoreConfig::default(), Metrics::new()).unwrap();
        store.put(Bytes::from("alice"), 1.0).unwrap();
        store.close().unwrap();
        assert!(segment_path(&dir, 0).exists());
    }

    #[test]
    fn test_reload_counts_records() {
        let tmp = TempDir::new().unwrap();
        let store =
            ScoreStore::open(tmp.path(), StoreConfig::default(), Metrics::new()).unwrap();
        for i in 0..10 {
            store.put(Bytes::from(format!("m{}", i)), i as f64).unwrap();
        }
        let mut seen = 0;
        let count = store
            .reload(|_| {
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 10);
        assert_eq!(seen, 10);
    }
}
