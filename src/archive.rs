//! Zip archives of finished batches.

use std::{
    collections::HashSet,
    fs::File,
    io,
    path::{Path, PathBuf},
};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Writes `files` into a new archive at `zip_path`.
///
/// Entries are named by file name. Files that no longer exist are left
/// out; a name that occurs twice is stored once.
///
/// # Errors
///
/// Returns error if the archive cannot be written or a file cannot be read.
pub async fn create(files: Vec<PathBuf>, zip_path: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || write_archive(&files, &zip_path).map(|()| zip_path))
        .await
        .map_err(|e| Error::internal(format!("archive task failed: {e}")))?
}

fn write_archive(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut names = HashSet::new();
    for path in files {
        let Some(name) = path.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            continue;
        };
        if !names.insert(name.clone()) {
            warn!("{name} is already archived, skipping {}", path.display());
            continue;
        }

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("{} vanished before archiving", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        writer.start_file(name, options)?;
        io::copy(&mut file, &mut writer)?;
    }

    writer.finish()?;
    debug!("archived {} files into {}", names.len(), zip_path.display());
    Ok(())
}
