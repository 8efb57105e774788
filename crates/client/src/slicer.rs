//! Chunk slicer (§4.1): produces chunk byte ranges on demand and reads them positionally
//! so the file is never materialized in memory, grounded on the teacher pack's
//! `ChunkReader`/`ChunkInfo` pair (`gablilli-desktop/src/uploader/chunk.rs`), simplified
//! to a plain positional read since this engine has no at-rest encryption.

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::ClientResult;

/// A chunk's byte range within the source file (§4.1 algorithm: `start = i*chunkSize`,
/// `end = min(start+chunkSize, fileSize)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Computes `total_chunks` ranges covering `file_size` bytes at `chunk_size` each.
pub fn plan(file_size: u64, chunk_size: u64) -> Vec<ChunkRange> {
    if chunk_size == 0 || file_size == 0 {
        return vec![ChunkRange {
            index: 0,
            start: 0,
            end: 0,
        }];
    }
    let total_chunks = file_size.div_ceil(chunk_size);
    (0..total_chunks)
        .map(|i| {
            let start = i * chunk_size;
            let end = (start + chunk_size).min(file_size);
            ChunkRange { index: i, start, end }
        })
        .collect()
}

/// Reads one chunk's bytes from `path` at the given range via a positional read.
/// Opens a fresh file handle per call: the spec requires the file handle not be shared
/// across concurrent chunk reads, and opening per-read is the simplest way to satisfy
/// that without a serialization point (§5 "Shared resources").
pub async fn read_range(path: &std::path::Path, range: ChunkRange) -> ClientResult<Bytes> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let mut buf = vec![0u8; range.len() as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_file_size_exactly() {
        let ranges = plan(13, 6);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], ChunkRange { index: 0, start: 0, end: 6 });
        assert_eq!(ranges[1], ChunkRange { index: 1, start: 6, end: 12 });
        assert_eq!(ranges[2], ChunkRange { index: 2, start: 12, end: 13 });
    }

    #[test]
    fn plan_handles_exact_multiple() {
        let ranges = plan(12, 6);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end, 12);
    }

    #[tokio::test]
    async fn read_range_returns_exact_bytes() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        tokio::fs::write(tmp.path(), b"Hello World !").await.unwrap();

        let chunk = read_range(tmp.path(), ChunkRange { index: 1, start: 6, end: 12 })
            .await
            .unwrap();
        assert_eq!(&chunk[..], b"World ");
    }
}
