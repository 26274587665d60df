//! Streaming a download through its decryptor onto disk.
//!
//! The destination is registered with [`InFlight`] before the first byte
//! is written. Whatever happens, it is unregistered again before
//! [`write_decrypted`] returns; on failure the partial file is removed
//! first.

use std::path::Path;

use futures_util::StreamExt;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    decrypt::Decryptor,
    error::{Error, ErrorKind, Result},
    fetch::Download,
    inflight::InFlight,
};

/// Receives the number of bytes read so far and the expected total.
pub type Progress<'a> = dyn FnMut(u64, Option<u64>) + Send + 'a;

/// Decrypts `download` into `path`, truncating any existing file.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns `TrackNotFound` wrapping the cause when the stream, the
/// decryption or the file cannot be completed. The cause stays reachable
/// through [`Error::is`], so a `DecryptionFailed` is still recognizable.
pub async fn write_decrypted(
    download: Download,
    decryptor: Decryptor,
    path: &Path,
    in_flight: &InFlight,
    progress: &mut Progress<'_>,
) -> Result<u64> {
    in_flight.register(path);

    let result = stream_to_file(download, decryptor, path, progress).await;
    if let Err(ref e) = result {
        debug!("removing partial {}: {e}", path.display());
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove partial file {}: {e}", path.display()),
        }
    }
    in_flight.unregister(path);

    result.map_err(|e| {
        Error::wrap(
            ErrorKind::TrackNotFound,
            format!("failed to process {}", path.display()),
            e,
        )
    })
}

async fn stream_to_file(
    mut download: Download,
    mut decryptor: Decryptor,
    path: &Path,
    progress: &mut Progress<'_>,
) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;

    let total = download.content_length;
    let mut read = 0;
    let mut written = 0;
    let mut buffer = Vec::with_capacity(Decryptor::CBC_BLOCK_SIZE * 4);

    while let Some(chunk) = download.stream.next().await {
        let chunk = chunk?;
        read += chunk.len() as u64;

        decryptor.update(&chunk, &mut buffer)?;
        if !buffer.is_empty() {
            file.write_all(&buffer).await?;
            written += buffer.len() as u64;
            buffer.clear();
        }

        progress(read, total);
    }

    decryptor.finish(&mut buffer);
    file.write_all(&buffer).await?;
    written += buffer.len() as u64;
    file.flush().await?;

    if written == 0 {
        return Err(Error::not_found("source returned an empty stream"));
    }
    if let Some(expected) = total {
        if read < expected {
            return Err(Error::network_failure(format!(
                "stream ended after {read} of {expected} bytes"
            )));
        }
    }

    trace!("{}: {written} bytes ({})", path.display(), decryptor.kind());
    Ok(written)
}
