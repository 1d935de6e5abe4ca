use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tdp::auth::SystemActor;
use tdp::backup::ImportCounts;
use tdp::AppContext;
use tracing::info;

/// Write a fresh archive into `output_dir` and return its path.
pub async fn export_to_dir(ctx: &AppContext, output_dir: &Path) -> Result<PathBuf> {
    let file = ctx.export_service().export(&SystemActor::internal()).await?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;
    let path = output_dir.join(&file.filename);
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    for (collection, count) in &file.summary.collections {
        info!("  {:<20} {}", collection.name(), count);
    }
    info!(
        "Wrote {} ({} bytes, {} media files)",
        path.display(),
        file.bytes.len(),
        file.summary.media_files
    );
    Ok(path)
}

/// Restore `archive` in the foreground. Checkpoints are logged as they pass.
pub async fn restore_from_file(ctx: &AppContext, archive: &Path) -> Result<ImportCounts> {
    let filename = archive
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("{} is not a file name", archive.display()))?;
    let bytes = std::fs::read(archive)
        .with_context(|| format!("Cannot read archive {}", archive.display()))?;

    let service = ctx.restore_service();
    let task = service
        .prepare(&SystemActor::internal(), filename, bytes.len() as u64)
        .await?;
    info!("Restoring {} as task {}", filename, task.id);

    let counts = service.execute(&task.id, &bytes).await?;
    info!("Restore finished: {}", counts.summary());
    Ok(counts)
}
