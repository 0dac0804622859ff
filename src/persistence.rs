// File: src/persistence.rs
use crate::error::{CorrError, CorrResult};
use crate::store::{MemoryStore, Tables};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes every table to `path`. The file is replaced atomically, so a crash
/// mid-write leaves the previous snapshot intact.
pub fn save_to_disk(store: &MemoryStore, path: &Path) -> CorrResult<()> {
    let parent_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        bincode::serialize_into(&mut writer, store.tables())?;
        writer.flush()?;
    }

    temp_file
        .persist(path)
        .map_err(|e| CorrError::persistence(format!("replacing {}", path.display()), e.error))?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}

pub fn load_from_disk(path: &Path) -> CorrResult<Tables> {
    let file = File::open(path)
        .map_err(|e| CorrError::persistence(format!("opening {}", path.display()), e))?;
    let reader = BufReader::new(file);
    bincode::deserialize_from(reader)
        .map_err(|e| CorrError::persistence(format!("decoding {}", path.display()), e))
}
