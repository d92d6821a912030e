//! File I/O operations

use crate::{Result, StoreError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `data` to `path` so that the file either keeps its old content or
/// holds all of the new content. The data goes to a temporary file next to
/// the destination which is then renamed over it.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| StoreError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "Wrote file");
    Ok(())
}
