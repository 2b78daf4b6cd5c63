use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::TransferError;
use crate::plan::ChunkRange;

/// A read-only byte source with a known length.
///
/// The coordinator never mutates the source; it only reads the ranges it
/// dispatches, possibly from several tasks at once.
pub trait ByteSource: Send + Sync {
    /// File name reported to the server.
    fn name(&self) -> &str;

    /// Total size in bytes.
    fn len(&self) -> u64;

    /// Returns `true` for a zero-length source.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly the bytes of `range`.
    fn read_range(&self, range: &ChunkRange) -> Result<Vec<u8>, TransferError>;
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Bytes already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, range: &ChunkRange) -> Result<Vec<u8>, TransferError> {
        let start = range.start as usize;
        let end = range.end as usize;
        self.data
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("range {start}..{end} exceeds {} bytes", self.data.len()),
                )
                .into()
            })
    }
}

// ---------------------------------------------------------------------------
// DiskSource
// ---------------------------------------------------------------------------

/// A file on disk, read range by range with seek + read.
pub struct DiskSource {
    file: Mutex<std::fs::File>,
    name: String,
    size: u64,
}

impl DiskSource {
    /// Opens `path` for ranged reading.
    ///
    /// The reported name is the final path component.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path.display().to_string()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            file: Mutex::new(file),
            name,
            size: metadata.len(),
        })
    }

    /// Overrides the name reported to the server.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ByteSource for DiskSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn read_range(&self, range: &ChunkRange) -> Result<Vec<u8>, TransferError> {
        let mut buf = vec![0u8; range.len() as usize];
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("file lock poisoned"))?;
        file.seek(SeekFrom::Start(range.start))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
