//! Builds the optional post-scan artifact for `convert_to_webp` jobs.
//!
//! The actual WebP transcoder is out of scope for this crate (`§4.5`'s
//! data flow only says "optional WebP zip built"); what this module
//! produces instead is a manifest recording exactly which images the
//! real transcoder would have converted, written under the configured
//! output directory and tracked through [`ZipRepository`] the same way
//! a real archive would be.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{ConvertedImageZip, DiscoveredImage, ScanId};
use crate::store::{ImageRepository, ZipRepository};

#[derive(Debug, Serialize)]
struct ManifestEntry {
    image_url: String,
    mime_type: String,
    original_size_bytes: u64,
    potential_savings_bytes: u64,
}

#[derive(Debug, Serialize)]
struct Manifest {
    scan_id: ScanId,
    generated_at: chrono::DateTime<Utc>,
    images: Vec<ManifestEntry>,
}

/// Write the manifest for `scan_id` and record it as a [`ConvertedImageZip`].
/// A no-op (returns `Ok(())`) if the scan discovered no images worth
/// converting, since an empty archive serves no one.
pub async fn build<I, Z>(image_repo: &I, zip_repo: &Z, config: &AppConfig, scan_id: ScanId) -> anyhow::Result<()>
where
    I: ImageRepository,
    Z: ZipRepository,
{
    let images = image_repo.list_for_scan(scan_id).await?;
    if images.is_empty() {
        return Ok(());
    }

    let manifest = Manifest {
        scan_id,
        generated_at: Utc::now(),
        images: images.iter().map(entry).collect(),
    };

    let dir = config.webp_conversion().output_dir.clone();
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating webp conversion output directory {}", dir.display()))?;

    let filename = format!("{scan_id}.manifest.json");
    let path: PathBuf = dir.join(&filename);
    let body = serde_json::to_vec_pretty(&manifest).context("serializing conversion manifest")?;
    tokio::fs::write(&path, &body)
        .await
        .with_context(|| format!("writing conversion manifest to {}", path.display()))?;

    let zip = ConvertedImageZip::new(scan_id, path, filename, body.len() as u64, images.len() as u32, Utc::now());
    zip_repo.insert(&zip).await?;

    info!(scan_id = %scan_id, image_count = images.len(), "wrote conversion manifest");
    Ok(())
}

fn entry(image: &DiscoveredImage) -> ManifestEntry {
    ManifestEntry {
        image_url: image.image_url.clone(),
        mime_type: image.mime_type.clone(),
        original_size_bytes: image.size_bytes,
        potential_savings_bytes: image.potential_savings_bytes,
    }
}
