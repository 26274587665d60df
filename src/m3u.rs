//! Extended M3U playlist files.
//!
//! The file is rewritten with only its `#EXTM3U` header when a playlist
//! download starts, and each track is appended as soon as it succeeds, so an
//! interrupted download still leaves a usable playlist and a repeated one
//! lists every track once.

use std::path::{Path, PathBuf};

use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use crate::{error::Result, path};

const HEADER: &str = "#EXTM3U\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct M3u {
    path: PathBuf,

    /// Entries are written relative to this directory.
    base: PathBuf,
}

impl M3u {
    /// Starts `{output_dir}/{title}.m3u` over with just its header.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created.
    pub async fn create(output_dir: &Path, title: &str) -> Result<Self> {
        tokio::fs::create_dir_all(output_dir).await?;
        let path = path::m3u_path(output_dir, title);

        tokio::fs::write(&path, HEADER).await?;

        Ok(Self {
            path,
            base: output_dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a track entry.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn append(&self, track: &Path) -> Result<()> {
        let entry = track.strip_prefix(&self.base).unwrap_or(track);

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(format!("{}\n", entry.display()).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }
}
