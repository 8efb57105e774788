use std::path::Path;

use crate::error::UploadError;

/// Returns the number of bytes usable (not just free, but available to an unprivileged
/// writer) on the filesystem backing `path`.
pub fn usable_space(path: &Path) -> Result<u64, UploadError> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|e| UploadError::Storage(format!("statvfs({}): {e}", path.display())))?;
    Ok(stat.blocks_available() * stat.fragment_size())
}

/// Disk-space preflight shared by the chunk store (§4.3) and the assembler (§4.4):
/// fails with `InsufficientDiskSpace` if usable space is below `requested +
/// safety_buffer` or below `min_free`.
pub fn preflight(
    path: &Path,
    requested: u64,
    safety_buffer: u64,
    min_free: u64,
) -> Result<(), UploadError> {
    let available = usable_space(path)?;
    let required = requested.saturating_add(safety_buffer).max(min_free);
    if available < required {
        return Err(UploadError::InsufficientDiskSpace {
            requested: required,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 S6: without actually filling a disk, an unreasonably high `min_free`
    /// reproduces the same rejection path the assembler hits when usable space drops
    /// below `Σ size(chunkᵢ) + safetyBuffer`.
    #[test]
    fn preflight_rejects_when_min_free_exceeds_usable_space() {
        let tmp = tempfile::tempdir().unwrap();
        let err = preflight(tmp.path(), 1, 0, u64::MAX / 2).unwrap_err();
        assert!(matches!(err, UploadError::InsufficientDiskSpace { .. }));
    }

    #[test]
    fn preflight_accepts_a_small_request() {
        let tmp = tempfile::tempdir().unwrap();
        preflight(tmp.path(), 1024, 0, 0).unwrap();
    }
}
