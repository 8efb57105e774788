use std::fs::File;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::UploadError;
use crate::infrastructure::disk_space;

/// Produces the final file from a complete chunk set without materializing more than
/// one chunk in memory (§4.4).
#[derive(Clone)]
pub struct Assembler {
    safety_buffer_bytes: u64,
    min_free_bytes: u64,
}

impl Assembler {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            safety_buffer_bytes: config.safety_buffer_bytes,
            min_free_bytes: config.min_free_bytes,
        }
    }

    /// Resolves the destination path for `file_name` (or `<session_id>.bin` when absent)
    /// inside `base_dir`, appending `_1`, `_2`, … before the extension until a
    /// non-existent path is found.
    pub fn resolve_destination(base_dir: &Path, session_id: &str, file_name: Option<&str>) -> PathBuf {
        let base_name = match file_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{session_id}.bin"),
        };

        let (stem, ext) = match base_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
            _ => (base_name.clone(), None),
        };

        let candidate_name = |suffix: Option<u32>| match (&ext, suffix) {
            (Some(ext), Some(n)) => format!("{stem}_{n}.{ext}"),
            (Some(ext), None) => format!("{stem}.{ext}"),
            (None, Some(n)) => format!("{stem}_{n}"),
            (None, None) => stem.clone(),
        };

        let mut candidate = base_dir.join(candidate_name(None));
        let mut n = 1;
        while candidate.exists() {
            candidate = base_dir.join(candidate_name(Some(n)));
            n += 1;
        }
        candidate
    }

    /// Streams `chunk_paths`, in order, into `destination` using a zero-copy
    /// file-to-file transfer (`copy_file_range`), verifying each transfer's byte count
    /// against the source chunk's size. On any mismatch or I/O error the partially
    /// written destination is deleted and the whole assembly fails (§4.4).
    pub fn assemble(&self, chunk_paths: &[PathBuf], destination: &Path) -> Result<u64, UploadError> {
        let total_size: u64 = chunk_paths
            .iter()
            .map(|p| std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
            .sum();

        if let Some(parent) = destination.parent() {
            disk_space::preflight(parent, total_size, self.safety_buffer_bytes, self.min_free_bytes)?;
        }

        let result = self.assemble_inner(chunk_paths, destination);
        if result.is_err() {
            let _ = std::fs::remove_file(destination);
        }
        result
    }

    fn assemble_inner(&self, chunk_paths: &[PathBuf], destination: &Path) -> Result<u64, UploadError> {
        let dest_file = File::create(destination)
            .map_err(|e| UploadError::AssemblyFailure(format!("create destination: {e}")))?;

        let mut total_written: u64 = 0;
        for (index, chunk_path) in chunk_paths.iter().enumerate() {
            let src_file = File::open(chunk_path)
                .map_err(|e| UploadError::AssemblyFailure(format!("open chunk {index}: {e}")))?;
            let chunk_size = src_file
                .metadata()
                .map_err(|e| UploadError::AssemblyFailure(format!("stat chunk {index}: {e}")))?
                .len();

            let transferred = copy_whole_file(&src_file, &dest_file, chunk_size)
                .map_err(|e| UploadError::AssemblyFailure(format!("transfer chunk {index}: {e}")))?;

            if transferred != chunk_size {
                return Err(UploadError::AssemblyFailure(format!(
                    "chunk {index} transferred {transferred} bytes, expected {chunk_size}"
                )));
            }
            total_written += transferred;
        }

        let actual_size = dest_file
            .metadata()
            .map_err(|e| UploadError::AssemblyFailure(format!("stat destination: {e}")))?
            .len();
        if actual_size != total_written {
            return Err(UploadError::AssemblyFailure(format!(
                "destination size {actual_size} does not match transferred total {total_written}"
            )));
        }

        Ok(total_written)
    }
}

/// Transfers `len` bytes from `src` (at offset 0) to the current end of `dest`, without
/// round-tripping through a userspace buffer, via `copy_file_range`. Loops because a
/// single call is not guaranteed to transfer the whole requested range.
fn copy_whole_file(src: &File, dest: &File, len: u64) -> std::io::Result<u64> {
    let dest_len = dest.metadata()?.len();
    let mut dest_offset = dest_len as i64;
    let mut src_offset: i64 = 0;
    let mut remaining = len;
    let mut total: u64 = 0;

    while remaining > 0 {
        let n = nix::fcntl::copy_file_range(
            src.as_fd(),
            Some(&mut src_offset),
            dest.as_fd(),
            Some(&mut dest_offset),
            remaining as usize,
        )
        .map_err(std::io::Error::from)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        remaining -= n as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_chunk(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn assembles_chunks_in_ascending_order() {
        let tmp = tempfile::tempdir().unwrap();
        let c0 = write_chunk(tmp.path(), "c0", b"Hello ");
        let c1 = write_chunk(tmp.path(), "c1", b"World ");
        let c2 = write_chunk(tmp.path(), "c2", b"!");

        let assembler = Assembler::new(&StorageConfig::default());
        let dest = tmp.path().join("out.txt");
        let written = assembler.assemble(&[c0, c1, c2], &dest).unwrap();

        let content = std::fs::read(&dest).unwrap();
        assert_eq!(content, b"Hello World !");
        assert_eq!(written, content.len() as u64);
    }

    #[test]
    fn assembly_is_independent_of_on_disk_chunk_order() {
        // Same bytes, different physical write order of the source files themselves.
        let tmp = tempfile::tempdir().unwrap();
        let c2 = write_chunk(tmp.path(), "c2", b"!");
        let c0 = write_chunk(tmp.path(), "c0", b"Hello ");
        let c1 = write_chunk(tmp.path(), "c1", b"World ");

        let assembler = Assembler::new(&StorageConfig::default());
        let dest = tmp.path().join("out.txt");
        // The caller is responsible for passing paths in ascending chunk-index order;
        // the assembler itself just concatenates whatever order it's given.
        assembler.assemble(&[c0, c1, c2], &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"Hello World !");
    }

    #[test]
    fn resolve_destination_disambiguates_existing_names() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), b"existing").unwrap();

        let dest = Assembler::resolve_destination(tmp.path(), "session-1", Some("hello.txt"));
        assert_eq!(dest, tmp.path().join("hello_1.txt"));
    }

    #[test]
    fn resolve_destination_falls_back_to_session_id() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = Assembler::resolve_destination(tmp.path(), "session-1", None);
        assert_eq!(dest, tmp.path().join("session-1.bin"));
    }
}
