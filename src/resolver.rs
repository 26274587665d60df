//! Quality and source resolution.
//!
//! Resolves a playable [`MediaSource`] for each descriptor at a quality
//! tier. Songs are submitted to the media URL API in batches; results the
//! API cannot serve are derived per track instead:
//! * Tracks with AES key material ask the media URL API for their token
//!   alone
//! * Legacy tracks get a CDN URL derived from their origin hash, media
//!   version and id
//!
//! Episodes bypass all of this and stream from their direct URL.
//!
//! Output has one entry per input descriptor, in input order, so a
//! failure to derive one source never affects its siblings.

use aes::{
    cipher::{BlockEncrypt, KeyInit},
    Aes128,
};
use md5::{Digest, Md5};
use url::Url;

use crate::{
    catalog::MediaApi,
    config::{ResolvePolicy, Secrets},
    decrypt::Key,
    error::{Error, ErrorKind, Result},
    protocol::media::{self, MediaSource},
    quality::QualityTier,
    track::{Descriptor, Encryption, TrackId},
};

/// Separator of the legacy URL hash fields.
const LEGACY_SEPARATOR: u8 = 0xa4;

/// AES block size of the legacy URL cipher.
const LEGACY_BLOCK_SIZE: usize = 16;

pub struct Resolver<'a> {
    media: &'a dyn MediaApi,
    secrets: &'a Secrets,
    policy: ResolvePolicy,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(media: &'a dyn MediaApi, secrets: &'a Secrets, policy: ResolvePolicy) -> Self {
        Self {
            media,
            secrets,
            policy,
        }
    }

    /// Resolves one source per descriptor at `tier`, preserving order.
    ///
    /// # Errors
    ///
    /// Fails as a whole only when a batch call fails for another reason
    /// than missing rights. Per-track failures are returned in place.
    pub async fn resolve(
        &self,
        tracks: &[Descriptor],
        tier: QualityTier,
    ) -> Result<Vec<Result<MediaSource>>> {
        let mut results: Vec<Option<Result<MediaSource>>> =
            tracks.iter().map(|_| None).collect();

        let mut songs = Vec::new();
        for (index, track) in tracks.iter().enumerate() {
            match track {
                Descriptor::Episode(episode) => {
                    results[index] = Some(direct_source(&episode.direct_stream_url, tier));
                }
                Descriptor::Song(_) => songs.push(index),
            }
        }

        for batch in songs.chunks(self.policy.batch_size.max(1)) {
            let tokens: Vec<String> = batch
                .iter()
                .map(|index| tracks[*index].track_token().to_owned())
                .collect();

            match self.media.media_urls(&tokens, tier).await {
                Ok(data) => {
                    for (position, index) in batch.iter().enumerate() {
                        let track = &tracks[*index];
                        let source = match data.get(position) {
                            Some(data) if self.is_usable(data) => Ok(MediaSource {
                                tier,
                                sources: data.sources().to_vec(),
                            }),
                            Some(data) => {
                                debug!(
                                    "{track}: batched result unusable ({} sources), deriving",
                                    data.sources().len()
                                );
                                self.derive(track, tier).await
                            }
                            None => {
                                debug!("{track}: missing from batched result, deriving");
                                self.derive(track, tier).await
                            }
                        };
                        results[*index] = Some(source);
                    }
                }
                Err(e) if e.kind == ErrorKind::RightsDenied => {
                    debug!(
                        "batch of {} refused at {tier} ({e}), deriving per track",
                        batch.len()
                    );
                    for index in batch {
                        results[*index] = Some(self.derive(&tracks[*index], tier).await);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results
            .into_iter()
            .map(|result| result.unwrap_or_else(|| Err(Error::internal("track left unresolved"))))
            .collect())
    }

    /// Resolves a single descriptor at `tier`.
    ///
    /// # Errors
    ///
    /// Returns the error of the batch call or of the per-track derivation.
    pub async fn resolve_one(&self, track: &Descriptor, tier: QualityTier) -> Result<MediaSource> {
        self.resolve(std::slice::from_ref(track), tier)
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| Err(Error::internal("resolver returned no result")))
    }

    /// Whether a batched result may be used as is.
    fn is_usable(&self, data: &media::Data) -> bool {
        match data.sources().len() {
            0 => false,
            // Observed as a placeholder response of the media API.
            1 => !self.policy.single_source_fallback,
            _ => true,
        }
    }

    /// Derives a source for one track without the batch.
    async fn derive(&self, track: &Descriptor, tier: QualityTier) -> Result<MediaSource> {
        match track.encryption() {
            Encryption::Aes { .. } => {
                let token = track.track_token().to_owned();
                let data = self.media.media_urls(&[token], tier).await?;
                let sources = data.first().map(media::Data::sources).unwrap_or_default();
                if sources.is_empty() {
                    return Err(Error::not_found(format!("{track}: no source at {tier}")));
                }
                Ok(MediaSource {
                    tier,
                    sources: sources.to_vec(),
                })
            }
            Encryption::Blowfish {
                md5_origin,
                media_version,
            } => {
                let key = self.secrets.url_key.as_ref().ok_or_else(|| {
                    Error::invalid_argument("legacy URL derivation requires a url key")
                })?;
                let url = legacy_url(track.id(), &md5_origin, media_version, tier, key)?;
                Ok(MediaSource {
                    tier,
                    sources: vec![media::Source {
                        url,
                        provider: String::new(),
                    }],
                })
            }
            Encryption::None => Err(Error::invalid_argument(format!(
                "{track}: unencrypted songs have no derivable source"
            ))),
        }
    }
}

fn direct_source(url: &str, tier: QualityTier) -> Result<MediaSource> {
    if url.is_empty() {
        return Err(Error::not_found("episode has no direct stream url"));
    }
    Ok(MediaSource {
        tier,
        sources: vec![media::Source {
            url: Url::parse(url)?,
            provider: String::new(),
        }],
    })
}

/// Derives the legacy CDN URL of a track.
///
/// The URL path is the hex encoding of an AES-128-ECB encrypted record
/// `md5(fields) ¤ fields ¤`, where the fields are the origin hash, the
/// quality code, the track id and the media version, separated by `¤`
/// (`0xA4`). The record is zero-padded to the cipher block size.
///
/// # Errors
///
/// Returns `InvalidArgument` if the origin hash is missing.
pub fn legacy_url(
    track_id: TrackId,
    md5_origin: &str,
    media_version: u32,
    tier: QualityTier,
    key: &Key,
) -> Result<Url> {
    let Some(cdn) = md5_origin.chars().next() else {
        return Err(Error::invalid_argument(format!(
            "track {track_id} has no origin hash"
        )));
    };

    let fields = [
        md5_origin.to_owned(),
        tier.code().to_string(),
        track_id.to_string(),
        media_version.to_string(),
    ]
    .map(String::into_bytes)
    .join(&LEGACY_SEPARATOR);

    let mut record = hex::encode(Md5::digest(&fields)).into_bytes();
    record.push(LEGACY_SEPARATOR);
    record.extend_from_slice(&fields);
    record.push(LEGACY_SEPARATOR);
    if record.len() % LEGACY_BLOCK_SIZE != 0 {
        let padded = record.len().next_multiple_of(LEGACY_BLOCK_SIZE);
        record.resize(padded, 0);
    }

    let cipher = Aes128::new(aes::Block::from_slice(&key[..]));
    for block in record.chunks_exact_mut(LEGACY_BLOCK_SIZE) {
        cipher.encrypt_block(aes::Block::from_mut_slice(block));
    }

    let url = format!(
        "https://e-cdns-proxy-{cdn}.dzcdn.net/mobile/1/{}",
        hex::encode(record)
    );
    Ok(Url::parse(&url)?)
}

#[cfg(test)]
mod tests {
    use aes::cipher::BlockDecrypt;

    use super::*;

    fn key() -> Key {
        "0123456789abcdef".parse().unwrap()
    }

    #[test]
    fn legacy_url_decrypts_to_hashed_record() {
        let url = legacy_url(
            3_135_556,
            "51afcde9f56a132096c0496cc95eb24b",
            8,
            QualityTier::MP3_320,
            &key(),
        )
        .unwrap();

        assert_eq!(url.host_str(), Some("e-cdns-proxy-5.dzcdn.net"));
        let path = url.path().trim_start_matches("/mobile/1/");
        let mut record = hex::decode(path).unwrap();
        assert_eq!(record.len() % LEGACY_BLOCK_SIZE, 0);

        let cipher = Aes128::new(aes::Block::from_slice(&key()[..]));
        for block in record.chunks_exact_mut(LEGACY_BLOCK_SIZE) {
            cipher.decrypt_block(aes::Block::from_mut_slice(block));
        }

        let fields = b"51afcde9f56a132096c0496cc95eb24b\xa43\xa43135556\xa48";
        let digest = hex::encode(Md5::digest(fields));
        assert!(record.starts_with(digest.as_bytes()));
        assert_eq!(&record[32], &LEGACY_SEPARATOR);
        assert_eq!(&record[33..33 + fields.len()], fields);
        assert_eq!(record[33 + fields.len()], LEGACY_SEPARATOR);
        assert!(record[34 + fields.len()..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn legacy_url_requires_origin() {
        let error = legacy_url(1, "", 1, QualityTier::FLAC, &key()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn direct_sources_need_a_url() {
        assert!(direct_source("", QualityTier::MP3_128).is_err());
        let source = direct_source("https://podcasts.example/1.mp3", QualityTier::MP3_128).unwrap();
        assert_eq!(source.url().unwrap().as_str(), "https://podcasts.example/1.mp3");
    }
}
