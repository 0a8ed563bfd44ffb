pub mod codec;
pub mod reconcile;
pub mod record;
pub mod session;

pub use anyhow::Result;
pub use codec::{CsvCodec, RecordCodec};
pub use record::{Record, RecordCollection};

use anyhow::Context;
use reconcile::{Bucket, ReconciliationResult};
use std::path::{Path, PathBuf};

/// Read all records from the given file.
pub fn read_records(file: impl AsRef<Path>, codec: &impl RecordCodec) -> Result<RecordCollection> {
    let file = file.as_ref();
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records = codec
        .parse(&contents)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    tracing::debug!("read {} records from {}", records.len(), file.display());
    Ok(records)
}

/// Write one bucket of `result` into `dir` under the bucket's file name.
///
/// Returns `None` without touching the filesystem when the bucket is empty.
pub fn export_bucket(
    result: &ReconciliationResult,
    bucket: Bucket,
    dir: &Path,
    codec: &impl RecordCodec,
) -> Result<Option<PathBuf>> {
    let records = result.records(bucket);
    if records.is_empty() {
        return Ok(None);
    }

    let path = dir.join(bucket.filename());
    let text = codec.serialize(&records)?;
    std::fs::write(&path, text)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(Some(path))
}
