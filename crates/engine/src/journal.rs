//! JSON-lines journal
//!
//! Every accepted write is appended to `journal.jsonl` in the data
//! directory as one JSON object per line, before the write becomes
//! visible. Reopening a broker replays the journal into empty stores.
//!
//! # Torn tails
//!
//! A crash in the middle of an append can leave a partial last line. On
//! open, an unparseable final line is dropped and the file is truncated
//! back to the last complete record. An unparseable line followed by
//! valid records is corruption and fails the open. An append that fails
//! while the broker runs truncates its partial bytes before returning.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use accord_core::{AccordError, Result};
use accord_storage::{LogRecord, WriteAhead};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Journal file name placed in the broker data directory.
pub const JOURNAL_FILE_NAME: &str = "journal.jsonl";

/// Append-only JSON-lines write-ahead log
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    /// `None` once closed
    file: Mutex<Option<File>>,
    sync: bool,
}

impl Journal {
    /// Open (or create) the journal at `path`
    ///
    /// Returns the journal positioned for appends together with every
    /// complete record already in it, oldest-first.
    pub fn open(path: &Path, sync: bool) -> Result<(Self, Vec<LogRecord>)> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                AccordError::unavailable(format!("failed to open journal '{}': {}", path.display(), e))
            })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (records, valid_len) = parse_records(&bytes)?;

        if valid_len < bytes.len() {
            warn!(
                path = %path.display(),
                dropped_bytes = bytes.len() - valid_len,
                "dropping torn journal tail"
            );
            file.set_len(valid_len as u64)?;
        }
        if valid_len > 0 && bytes[valid_len - 1] != b'\n' {
            file.write_all(b"\n")?;
        }
        debug!(path = %path.display(), records = records.len(), "opened journal");

        Ok((
            Journal {
                path: path.to_path_buf(),
                file: Mutex::new(Some(file)),
                sync,
            },
            records,
        ))
    }

    /// Path of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the journal to disk
    pub fn sync(&self) -> Result<()> {
        match self.file.lock().as_ref() {
            Some(file) => Ok(file.sync_data()?),
            None => Ok(()),
        }
    }

    /// Sync and close; later appends fail with `StoreUnavailable`
    pub fn close(&self) -> Result<()> {
        if let Some(file) = self.file.lock().take() {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl WriteAhead for Journal {
    fn append(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)
            .map_err(|e| AccordError::unavailable(format!("failed to encode journal record: {}", e)))?;
        line.push(b'\n');

        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| AccordError::unavailable("journal is closed"))?;
        append_line(file, &line, self.sync, |file, line| file.write_all(line))
    }
}

/// Write one line, rolling the file back to its previous length on failure
///
/// A failed write may leave partial bytes behind. Without the rollback the
/// next record would be glued onto them and the journal could not be
/// replayed.
fn append_line<F>(file: &mut File, line: &[u8], sync: bool, write: F) -> Result<()>
where
    F: FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
{
    let start = file.metadata()?.len();
    let written = write(file, line).and_then(|()| if sync { file.sync_data() } else { Ok(()) });
    if let Err(e) = written {
        if let Err(rollback) = file.set_len(start) {
            warn!(error = %rollback, len = start, "failed to roll back journal after a failed append");
        }
        return Err(AccordError::unavailable(format!("journal append failed: {}", e)));
    }
    Ok(())
}

/// Parse complete records, returning them and the byte length they cover
fn parse_records(bytes: &[u8]) -> Result<(Vec<LogRecord>, usize)> {
    let mut records = Vec::new();
    let mut offset = 0;
    let mut line_no = 0;

    while offset < bytes.len() {
        let (line, next) = match bytes[offset..].iter().position(|b| *b == b'\n') {
            Some(i) => (&bytes[offset..offset + i], offset + i + 1),
            None => (&bytes[offset..], bytes.len()),
        };
        line_no += 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            continue;
        }
        match serde_json::from_slice::<LogRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                if bytes[next..].iter().all(u8::is_ascii_whitespace) {
                    warn!(line = line_no, error = %e, "ignoring unparseable final journal line");
                    return Ok((records, offset));
                }
                return Err(AccordError::Corruption(format!(
                    "journal line {} is unreadable: {}",
                    line_no, e
                )));
            }
        }
        offset = next;
    }
    Ok((records, bytes.len()))
}
