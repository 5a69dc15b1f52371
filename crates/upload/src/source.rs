use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Errors from reading the source file.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("file is empty: {0}")]
    Empty(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads a file as an in-order sequence of fixed-size chunks.
///
/// Every chunk is a fresh open/seek/read/close cycle; no handle survives
/// between chunks, so other processes can modify or delete the file while a
/// network round-trip is in flight — the conflict guard relies on that.
/// The file length is captured once at open; a file that grows afterwards is
/// still read only up to the captured length.
#[derive(Debug)]
pub struct ChunkSource {
    path: PathBuf,
    chunk_size: usize,
    offset: u64,
    file_len: u64,
}

impl ChunkSource {
    /// Opens the source at `start_offset` (0 for a fresh session, a byte
    /// offset to resume a partially-uploaded one).
    pub fn open(path: &Path, chunk_size: usize, start_offset: u64) -> Result<Self, SourceError> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(SourceError::Io(e)),
        };
        if meta.len() == 0 {
            return Err(SourceError::Empty(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            chunk_size,
            offset: start_offset,
            file_len: meta.len(),
        })
    }

    /// Reads the next chunk. Returns `None` once the captured file length is
    /// covered. Each element is `chunk_size` bytes except possibly the last.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        if self.offset >= self.file_len {
            return Ok(None);
        }

        let expected = (self.file_len - self.offset).min(self.chunk_size as u64) as usize;
        let mut file = std::fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;

        let mut buf = vec![0u8; expected];
        let mut filled = 0;
        while filled < expected {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);

        if filled == 0 {
            // File shrank underneath us; the conflict guard will report it.
            return Ok(None);
        }
        self.offset += filled as u64;
        Ok(Some(buf))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// File length captured at open.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }
}
