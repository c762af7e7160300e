//! Segmented on-disk spool backend.
//!
//! Items are serialized into a directory of bounded segment files named
//! `mainq.<NNNNNN>.qf`. A writer cursor appends encoded records and rolls to
//! the next segment once `max_file_bytes` is reached; an independent reader
//! cursor decodes records through a buffered, unget-capable byte source and
//! advances (deleting the segment it finished) when it drains a file the
//! writer has already left behind.
//!
//! Records survive the process: reopening a store over the same directory
//! resumes writing at the newest surviving segment and reading at the
//! oldest. Trailing bytes that do not form a whole record (a torn write from
//! a crash) are discarded at open time so the runtime readers only ever see
//! complete records.

use crate::error::SpoolError;
use crate::record::{ByteSource, Record};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Size of a cursor's buffered read page.
const PAGE_SIZE: usize = 4096;

/// Segment numbers are folded into six decimal digits for the file name.
const SEG_NAME_MODULO: u64 = 1_000_000;

const SEGMENT_PREFIX: &str = "mainq";
const SEGMENT_EXT: &str = "qf";

/// Builds the file name for a segment number.
fn segment_file_name(seq: u64) -> String {
    format!("{SEGMENT_PREFIX}.{:06}.{SEGMENT_EXT}", seq % SEG_NAME_MODULO)
}

/// Parses a segment number back out of a file name, if it is one of ours.
fn parse_segment_name(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_prefix('.')?
        .strip_suffix(SEGMENT_EXT)?
        .strip_suffix('.')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Lists the segment numbers present in `dir`, sorted ascending.
fn segments_on_disk(dir: &Path) -> Result<Vec<u64>, SpoolError> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(seq) = entry.file_name().to_str().and_then(parse_segment_name) {
            segments.push(seq);
        }
    }
    segments.sort_unstable();
    Ok(segments)
}

// ---------------------------------------------------------------------
// FILE CURSOR
// ---------------------------------------------------------------------

/// Position state over the spool: current segment, open file, byte offset,
/// and (for readers) a lazily allocated page with a one-byte unget slot.
///
/// For a writer, `offset` counts bytes written to the segment. For a
/// reader it counts bytes fetched from the file; the bytes actually
/// consumed by decoding are `offset` minus whatever still sits in the page
/// and the unget slot (see [`consumed`](Self::consumed)).
struct FileCursor {
    seg: u64,
    file: Option<File>,
    offset: u64,
    page: Option<Box<[u8]>>,
    pos: usize,
    len: usize,
    unget: Option<u8>,
}

impl FileCursor {
    fn new(seg: u64) -> Self {
        Self {
            seg,
            file: None,
            offset: 0,
            page: None,
            pos: 0,
            len: 0,
            unget: None,
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn path(&self, dir: &Path) -> PathBuf {
        dir.join(segment_file_name(self.seg))
    }

    /// Opens the current segment read-only.
    fn open_read(&mut self, dir: &Path) -> Result<(), SpoolError> {
        let path = self.path(dir);
        let file = File::open(&path)?;
        trace!(segment = self.seg, path = %path.display(), "opened segment for read");
        self.file = Some(file);
        self.offset = 0;
        self.pos = 0;
        self.len = 0;
        self.unget = None;
        Ok(())
    }

    /// Creates the current segment as a fresh file, mode 0600.
    ///
    /// `create_new` turns a name collision (a million live segments, or a
    /// stray file) into an explicit error instead of clobbering records.
    fn create_fresh(&mut self, dir: &Path) -> Result<(), SpoolError> {
        let path = self.path(dir);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::AlreadyExists {
                SpoolError::SegmentCollision {
                    name: segment_file_name(self.seg),
                }
            } else {
                SpoolError::Io(err)
            }
        })?;
        debug!(segment = self.seg, path = %path.display(), "created segment");
        self.file = Some(file);
        self.offset = 0;
        Ok(())
    }

    /// Opens the current segment for appending, creating it if absent.
    /// `offset` resumes at the existing file length.
    fn open_append(&mut self, dir: &Path) -> Result<(), SpoolError> {
        let path = self.path(dir);
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path)?;
        self.offset = file.metadata()?.len();
        debug!(
            segment = self.seg,
            offset = self.offset,
            "resumed segment for append"
        );
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
        self.pos = 0;
        self.len = 0;
        self.unget = None;
    }

    /// Closes the current segment and moves to the next number.
    fn advance(&mut self) {
        self.close();
        self.seg += 1;
        self.offset = 0;
    }

    /// Appends raw bytes (writer side).
    fn append(&mut self, bytes: &[u8]) -> Result<(), SpoolError> {
        let file = self.file.as_mut().ok_or_else(|| {
            SpoolError::Io(io::Error::new(
                io::ErrorKind::Other,
                "segment not open for write",
            ))
        })?;
        file.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Bytes consumed by decoding so far: fetched minus unread page bytes
    /// and a pending unget.
    fn consumed(&self) -> u64 {
        self.offset - (self.len - self.pos) as u64 - u64::from(self.unget.is_some())
    }
}

impl ByteSource for FileCursor {
    fn read_byte(&mut self) -> Result<u8, SpoolError> {
        if let Some(byte) = self.unget.take() {
            return Ok(byte);
        }
        let page = self
            .page
            .get_or_insert_with(|| vec![0u8; PAGE_SIZE].into_boxed_slice());
        if self.pos >= self.len {
            let file = self.file.as_mut().ok_or_else(|| {
                SpoolError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "segment not open for read",
                ))
            })?;
            let fetched = file.read(page)?;
            if fetched == 0 {
                return Err(SpoolError::Eof);
            }
            self.len = fetched;
            self.pos = 0;
            self.offset += fetched as u64;
        }
        let byte = page[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn unread_byte(&mut self, byte: u8) {
        debug_assert!(self.unget.is_none(), "single-byte unget slot already occupied");
        self.unget = Some(byte);
    }
}

// ---------------------------------------------------------------------
// DISK STORE
// ---------------------------------------------------------------------

/// The disk backend proper: one writer cursor, one reader cursor, and the
/// spool directory they share.
///
/// Holds at most two open file descriptors; each is closed on segment
/// advance and on drop. Segment numbers are a monotonic `u64` so a very
/// long-lived queue cannot silently wrap onto a live file name.
pub(crate) struct DiskStore<T> {
    dir: PathBuf,
    max_file_bytes: u64,
    writer: FileCursor,
    reader: FileCursor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> DiskStore<T> {
    /// Opens a store over `dir`, creating the directory if needed.
    ///
    /// Surviving segments from a previous run are scanned: the reader is
    /// positioned at the oldest, the writer resumes appending to the
    /// newest, and the returned count is the number of whole records
    /// resident on disk (these become the queue's initial size). Torn
    /// trailing bytes are truncated away during the scan.
    pub(crate) fn open(dir: &Path, max_file_bytes: u64) -> Result<(Self, usize), SpoolError> {
        fs::create_dir_all(dir)?;
        let segments = segments_on_disk(dir)?;

        let mut store = Self {
            dir: dir.to_path_buf(),
            max_file_bytes,
            writer: FileCursor::new(0),
            reader: FileCursor::new(0),
            _marker: PhantomData,
        };

        let Some((&oldest, &newest)) = segments.first().zip(segments.last()) else {
            return Ok((store, 0));
        };

        let mut resident = 0;
        for &seq in &segments {
            resident += scan_segment::<T>(dir, seq)?;
        }

        store.reader = FileCursor::new(oldest);
        store.writer = FileCursor::new(newest);
        store.writer.open_append(dir)?;
        if store.writer.offset >= max_file_bytes {
            // Newest segment is already at its size cap.
            store.writer.advance();
        }

        debug!(
            resident,
            oldest, newest, "recovered spool directory"
        );
        Ok((store, resident))
    }

    /// Serializes `item` and appends it to the writer's segment, rolling to
    /// the next segment once the file meets `max_file_bytes`.
    ///
    /// The in-memory item is gone after this returns; the on-disk bytes are
    /// its canonical representation until dequeue.
    pub(crate) fn add(&mut self, item: T) -> Result<(), SpoolError> {
        if !self.writer.is_open() {
            self.writer.create_fresh(&self.dir)?;
        }
        let mut buf = Vec::with_capacity(256);
        item.encode(&mut buf);
        self.writer.append(&buf)?;
        trace!(
            segment = self.writer.seg,
            bytes = buf.len(),
            offset = self.writer.offset,
            "record spooled"
        );
        if self.writer.offset >= self.max_file_bytes {
            self.writer.advance();
        }
        Ok(())
    }

    /// Decodes the oldest record not yet consumed.
    ///
    /// End-of-file on a segment the writer has moved past means the reader
    /// retires it (the file is deleted) and continues with the next one.
    /// The retry is bounded by the writer's segment number, so a genuinely
    /// empty spool reports [`SpoolError::Eof`] instead of spinning.
    pub(crate) fn remove(&mut self) -> Result<T, SpoolError> {
        loop {
            if !self.reader.is_open() {
                match self.reader.open_read(&self.dir) {
                    Ok(()) => {}
                    Err(SpoolError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                        if self.reader.seg < self.writer.seg {
                            // Segment vanished (or was never created); skip it.
                            self.reader.advance();
                            continue;
                        }
                        // Caught up to a segment the writer has not created:
                        // the spool holds nothing to read.
                        return Err(SpoolError::Eof);
                    }
                    Err(err) => return Err(err),
                }
            }
            match T::decode(&mut self.reader) {
                Ok(item) => return Ok(item),
                Err(SpoolError::Eof) if self.reader.seg < self.writer.seg => {
                    self.retire_read_segment();
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Deletes the segment the reader just drained and moves on.
    fn retire_read_segment(&mut self) {
        let path = self.reader.path(&self.dir);
        let seg = self.reader.seg;
        self.reader.advance();
        match fs::remove_file(&path) {
            Ok(()) => debug!(segment = seg, "retired consumed segment"),
            Err(err) => warn!(
                segment = seg,
                error = %err,
                "failed to delete consumed segment"
            ),
        }
    }

    /// Removes every segment file. Called once the owning queue has drained
    /// to size zero, so a clean restart does not replay consumed records.
    pub(crate) fn discard_drained(&mut self) {
        self.reader.close();
        self.writer.close();
        match segments_on_disk(&self.dir) {
            Ok(segments) => {
                for seq in segments {
                    let path = self.dir.join(segment_file_name(seq));
                    if let Err(err) = fs::remove_file(&path) {
                        warn!(segment = seq, error = %err, "failed to delete drained segment");
                    }
                }
            }
            Err(err) => warn!(error = %err, "failed to list spool directory at shutdown"),
        }
    }

    #[cfg(test)]
    fn reader_segment(&self) -> u64 {
        self.reader.seg
    }

    #[cfg(test)]
    fn writer_segment(&self) -> u64 {
        self.writer.seg
    }
}

/// Counts the whole records in one segment, truncating any trailing bytes
/// that do not decode (a torn record from an interrupted write).
fn scan_segment<T: Record>(dir: &Path, seq: u64) -> Result<usize, SpoolError> {
    let mut cursor = FileCursor::new(seq);
    cursor.open_read(dir)?;
    let path = cursor.path(dir);
    let file_len = fs::metadata(&path)?.len();

    let mut count = 0;
    let mut good = 0;
    loop {
        match T::decode(&mut cursor) {
            Ok(item) => {
                drop(item);
                count += 1;
                good = cursor.consumed();
            }
            Err(SpoolError::Eof) => break,
            Err(err) => {
                warn!(segment = seq, error = %err, "undecodable record in spool segment");
                break;
            }
        }
    }
    cursor.close();

    if file_len > good {
        warn!(
            segment = seq,
            discarded = file_len - good,
            "truncating torn spool tail"
        );
        let file = OpenOptions::new().write(true).open(&path)?;
        file.set_len(good)?;
    }
    Ok(count)
}
