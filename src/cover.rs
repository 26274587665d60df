//! Cover art files.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{catalog::Catalog, error::Result};

pub const COVER_FILE: &str = "cover.jpg";

/// Fetches artwork, logging instead of failing: a missing cover never
/// fails a download.
pub async fn fetch(catalog: &dyn Catalog, md5: Option<&str>, size: u32) -> Option<Bytes> {
    let md5 = md5?;
    match catalog.cover(md5, size).await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => {
            warn!("cover {md5} is empty");
            None
        }
        Err(e) => {
            warn!("could not fetch cover {md5}: {e}");
            None
        }
    }
}

/// Writes `cover.jpg` into `dir` unless it is already there.
///
/// # Errors
///
/// Returns error if the directory or file cannot be written.
pub async fn save(image: &[u8], dir: &Path) -> Result<PathBuf> {
    let path = dir.join(COVER_FILE);
    if tokio::fs::try_exists(&path).await? {
        trace!("{} exists", path.display());
        return Ok(path);
    }

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, image).await?;
    debug!("saved {}", path.display());
    Ok(path)
}
