use crate::TransferError;

/// Half-open byte range `[start, end)` of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    /// Size of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Fixed-size partition of a source into chunks.
///
/// An empty source is planned as a single empty chunk so the server always
/// receives at least one piece to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    total_chunks: usize,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        let total_chunks = if total_size == 0 {
            1
        } else {
            total_size.div_ceil(chunk_size) as usize
        };
        Ok(Self {
            total_size,
            chunk_size,
            total_chunks,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Byte range of chunk `index`, or `None` past the last chunk.
    pub fn range(&self, index: usize) -> Option<ChunkRange> {
        if index >= self.total_chunks {
            return None;
        }
        let start = index as u64 * self.chunk_size;
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        Some(ChunkRange {
            index,
            start: start.min(self.total_size),
            end,
        })
    }

    /// Iterates over every chunk range in index order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkRange> + '_ {
        (0..self.total_chunks).filter_map(|i| self.range(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that the planned ranges tile `[0, size)` exactly.
    fn assert_exact_cover(size: u64, chunk: u64) {
        let plan = ChunkPlan::new(size, chunk).unwrap();
        let ranges: Vec<ChunkRange> = plan.iter().collect();
        assert_eq!(ranges.len(), plan.total_chunks());

        let mut cursor = 0;
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.index, i);
            assert_eq!(r.start, cursor, "gap or overlap before chunk {i} ({size}/{chunk})");
            assert!(r.end > r.start, "chunk {i} is empty ({size}/{chunk})");
            assert!(r.len() <= chunk);
            cursor = r.end;
        }
        assert_eq!(cursor, size);
    }

    #[test]
    fn total_chunks_is_ceiling() {
        for (size, chunk, expected) in [
            (1, 1, 1),
            (10, 4, 3),
            (12, 4, 3),
            (13, 4, 4),
            (3, 10, 1),
            (100 * 1024 * 1024, 10 * 1024 * 1024, 10),
            (100 * 1024 * 1024 + 1, 10 * 1024 * 1024, 11),
        ] {
            let plan = ChunkPlan::new(size, chunk).unwrap();
            assert_eq!(plan.total_chunks(), expected, "{size}/{chunk}");
        }
    }

    #[test]
    fn ranges_cover_source_exactly() {
        for size in [1u64, 2, 7, 8, 9, 63, 64, 65, 1000] {
            for chunk in [1u64, 2, 3, 8, 64, 1000, 4096] {
                assert_exact_cover(size, chunk);
            }
        }
    }

    #[test]
    fn last_chunk_is_short() {
        let plan = ChunkPlan::new(10, 4).unwrap();
        let last = plan.range(2).unwrap();
        assert_eq!((last.start, last.end), (8, 10));
        assert_eq!(last.len(), 2);
        assert!(plan.range(3).is_none());
    }

    #[test]
    fn empty_source_has_one_empty_chunk() {
        let plan = ChunkPlan::new(0, 1024).unwrap();
        assert_eq!(plan.total_chunks(), 1);
        let r = plan.range(0).unwrap();
        assert!(r.is_empty());
        assert_eq!((r.start, r.end), (0, 0));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkPlan::new(10, 0),
            Err(TransferError::InvalidChunkSize)
        ));
    }
}
