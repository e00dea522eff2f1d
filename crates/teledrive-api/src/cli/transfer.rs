//! Upload, download, url and delete commands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;

use teledrive_types::storage::UploadResult;

use crate::state::AppState;

/// Read and parse a manifest file written by `upload`.
///
/// Accepts both a bare upload result and the fuller upload output, which
/// carries the same fields plus `used_provider`.
pub async fn read_manifest(path: &Path) -> Result<UploadResult> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    parse_manifest(&content).with_context(|| format!("invalid manifest {}", path.display()))
}

fn parse_manifest(content: &str) -> Result<UploadResult> {
    let manifest: UploadResult = serde_json::from_str(content)?;
    if !manifest.is_consistent() {
        bail!("chunk list does not match file_id/total_chunks/total_size");
    }
    Ok(manifest)
}

fn display_name(path: &Path, name: Option<String>) -> Result<String> {
    if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
        return Ok(name);
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("cannot derive a file name from {}", path.display()))
}

pub async fn upload(
    state: &AppState,
    path: &Path,
    name: Option<String>,
    manifest_out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let filename = display_name(path, name)?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let upload = state.manager.upload_with_fallback(&data, &filename).await?;
    let manifest = serde_json::to_string_pretty(&upload)?;

    if let Some(out) = manifest_out {
        tokio::fs::write(out, &manifest)
            .await
            .with_context(|| format!("failed to write manifest {}", out.display()))?;
    }

    if json || manifest_out.is_none() {
        println!("{manifest}");
        return Ok(());
    }

    println!();
    println!(
        "  {} Uploaded {} ({} bytes)",
        style("✓").green().bold(),
        style(&filename).cyan(),
        upload.result.total_size
    );
    println!("  Provider: {}", style(upload.used_provider).bold());
    if upload.used_provider != state.manager.config().primary {
        println!(
            "  {}",
            style(format!(
                "primary {} unavailable, fallback used",
                state.manager.config().primary
            ))
            .yellow()
        );
    }
    println!("  Chunks:   {}", upload.result.total_chunks);
    println!("  File id:  {}", style(&upload.result.file_id).dim());
    if let Some(out) = manifest_out {
        println!("  Manifest: {}", style(out.display()).dim());
    }
    println!();
    Ok(())
}

pub async fn download(state: &AppState, manifest: &Path, out: &Path, json: bool) -> Result<()> {
    let manifest = read_manifest(manifest).await?;
    let file_id = state.manager.restore_manifest(&manifest)?;
    let data = state.manager.download(manifest.provider, &file_id).await?;

    tokio::fs::write(out, &data)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;

    if json {
        let body = serde_json::json!({
            "file_id": file_id,
            "provider": manifest.provider,
            "bytes": data.len(),
            "path": out.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "  {} Wrote {} bytes to {}",
            style("✓").green().bold(),
            data.len(),
            style(out.display()).cyan()
        );
    }
    Ok(())
}

pub async fn url(state: &AppState, manifest: &Path, json: bool) -> Result<()> {
    let manifest = read_manifest(manifest).await?;
    let file_id = state.manager.restore_manifest(&manifest)?;
    let url = state
        .manager
        .get_download_url(manifest.provider, &file_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "url": url }))?);
    } else {
        println!("{url}");
    }
    Ok(())
}

pub async fn delete(state: &AppState, manifest: &Path, json: bool) -> Result<()> {
    let manifest = read_manifest(manifest).await?;
    let file_id = state.manager.restore_manifest(&manifest)?;
    let deleted = state.manager.delete_file(manifest.provider, &file_id).await?;

    if json {
        let body = serde_json::json!({ "file_id": file_id, "deleted": deleted });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else if deleted {
        println!("  {} Deleted {}", style("✓").green().bold(), style(&file_id).dim());
    } else {
        println!("  {} Nothing deleted for {}", style("!").yellow().bold(), file_id);
    }
    Ok(())
}
