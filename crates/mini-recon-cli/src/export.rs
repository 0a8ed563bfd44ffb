use std::path::Path;

use anyhow::{Context, Result};
use mini_recon::CsvCodec;
use mini_recon::reconcile::{Bucket, ReconcileConfig};

pub fn export_all(config: &ReconcileConfig, codec: &CsvCodec, out_dir: &Path) -> Result<()> {
    let result = config.read(codec)?.reconcile()?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for bucket in Bucket::ALL {
        match mini_recon::export_bucket(&result, bucket, out_dir, codec)? {
            Some(path) => {
                tracing::info!("wrote {} records to {}", result.len(bucket), path.display());
                println!("Exported {} successfully.", bucket.filename());
            }
            None => println!("No data to export for {}.", bucket.filename()),
        }
    }

    Ok(())
}
