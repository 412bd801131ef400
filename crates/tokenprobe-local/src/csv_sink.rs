//! CSV snapshot writer.
//!
//! Every [`RecordSink::persist`] call rewrites the whole file from the full
//! accumulator. The bytes go to a temp file in the target directory first and
//! are renamed into place, so readers never see a half-written table.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokenprobe_core::{Error, ProjectRecord, RecordSink, Result, COLUMNS};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Render records as CSV: the fixed header row, then one row per record.
pub fn render_csv(records: &[ProjectRecord]) -> Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(COLUMNS)
        .map_err(|e| Error::Persist(e.to_string()))?;
    for r in records {
        w.write_record(r.row())
            .map_err(|e| Error::Persist(e.to_string()))?;
    }
    w.into_inner().map_err(|e| Error::Persist(e.to_string()))
}

fn ensure_parent_dir(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .map_err(|e| Error::Persist(format!("create {}: {e}", parent.display())))?;
    Ok(parent)
}

impl RecordSink for CsvFileSink {
    fn persist(&mut self, records: &[ProjectRecord]) -> Result<()> {
        let bytes = render_csv(records)?;
        let parent = ensure_parent_dir(&self.path)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| Error::Persist(format!("temp file in {}: {e}", parent.display())))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.flush())
            .map_err(|e| Error::Persist(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Persist(format!("{}: {}", self.path.display(), e.error)))?;

        debug!(path = %self.path.display(), records = records.len(), bytes = bytes.len(), "csv written");
        Ok(())
    }
}
