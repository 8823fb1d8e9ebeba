//! Shared atomic-file-write helper used by both the config file and the
//! offline queue file.

use std::path::Path;

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file,
/// then rename over the target. The original agent's plain
/// `Path.write_text` is not atomic; this is upgraded since the agent is
/// expected to survive a crash mid-write.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}
