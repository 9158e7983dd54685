//! Write-to-temp-then-rename helper shared by every file this crate rewrites.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of in-flight temporary files.
pub const TEMP_SUFFIX: &str = "tmp";

/// Temp path beside `path`: `<file_name>.<uuid>.tmp`. Unique per call so
/// concurrent writers never share a temp file.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    path.with_file_name(format!(
        "{}.{}.{}",
        file_name,
        uuid::Uuid::new_v4().simple(),
        TEMP_SUFFIX
    ))
}

/// Replace `path` with `bytes` so readers see either the old or the new
/// contents, never a partial write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = temp_path_for(path);

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
