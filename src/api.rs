//! Client of the public catalog API at `api.deezer.com`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::{
    catalog::{Catalog, Query},
    config::Config,
    error::{Error, Result},
    http::Client as HttpClient,
    metadata::{AlbumRecord, Listing, PlaylistRecord, TrackRecord},
    protocol,
};

pub struct PublicApi {
    http_client: HttpClient,
}

/// Error object returned with HTTP 200 by the public API.
#[derive(Clone, Debug, Deserialize)]
struct ApiError {
    #[serde(default, rename = "type")]
    typ: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Error { error: ApiError },
    Ok(T),
}

impl PublicApi {
    const API_URL: &'static str = "https://api.deezer.com";

    const COVER_URL: &'static str = "https://e-cdns-images.dzcdn.net/images/cover";

    /// `DataException: no data`
    const NO_DATA: i64 = 800;

    /// Quota and service errors.
    const QUOTA_EXCEEDED: i64 = 4;
    const SERVICE_BUSY: i64 = 700;

    /// Most popular tracks fetched per artist.
    const TOP_LIMIT: u32 = 100;

    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::without_cookies(config)?,
        })
    }

    async fn get<T>(&self, url: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + std::fmt::Debug,
    {
        let request = self.http_client.get(url.parse::<reqwest::Url>()?, "");
        let body = self.http_client.execute_checked(request).await?.text().await?;

        match protocol::json::<Envelope<T>>(&body, url)? {
            Envelope::Ok(result) => Ok(result),
            Envelope::Error { error } => {
                let message = format!("{url}: {} ({}: {})", error.message, error.typ, error.code);
                Err(match error.code {
                    Self::NO_DATA => Error::not_found(message),
                    Self::QUOTA_EXCEEDED | Self::SERVICE_BUSY => Error::network_failure(message),
                    _ => Error::unknown(message),
                })
            }
        }
    }

    /// Follows `next` links until the listing is complete.
    async fn complete<T>(&self, listing: &mut Listing<T>) -> Result<()>
    where
        T: for<'de> Deserialize<'de> + std::fmt::Debug,
    {
        while let Some(next) = listing.next.take() {
            let page: Listing<T> = self.get(&next).await?;
            listing.data.extend(page.data);
            listing.next = page.next;
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for PublicApi {
    async fn track(&self, query: &Query) -> Result<TrackRecord> {
        let track: TrackRecord = self
            .get(&format!("{}/track/{query}", Self::API_URL))
            .await?;
        if !track.readable {
            return Err(Error::market_unavailable(format!(
                "track {} is not readable",
                track.id
            )));
        }
        Ok(track)
    }

    async fn album(&self, query: &Query) -> Result<AlbumRecord> {
        let mut album: AlbumRecord = self
            .get(&format!("{}/album/{query}", Self::API_URL))
            .await?;
        self.complete(&mut album.tracks).await?;
        Ok(album)
    }

    async fn playlist(&self, id: u64) -> Result<PlaylistRecord> {
        let mut playlist: PlaylistRecord = self
            .get(&format!("{}/playlist/{id}", Self::API_URL))
            .await?;
        self.complete(&mut playlist.tracks).await?;
        Ok(playlist)
    }

    async fn artist_top(&self, id: u64) -> Result<Vec<TrackRecord>> {
        let top: Listing<TrackRecord> = self
            .get(&format!(
                "{}/artist/{id}/top?limit={}",
                Self::API_URL,
                Self::TOP_LIMIT
            ))
            .await?;
        Ok(top.data)
    }

    async fn cover(&self, md5: &str, size: u32) -> Result<Bytes> {
        let url = format!(
            "{}/{md5}/{size}x{size}-000000-80-0-0.jpg",
            Self::COVER_URL
        );
        let request = self.http_client.get(url.parse::<reqwest::Url>()?, "");
        let response = self.http_client.execute_checked(request).await?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_is_detected() {
        let body = r#"{"error":{"type":"DataException","message":"no data","code":800}}"#;
        let envelope: Envelope<TrackRecord> = serde_json::from_str(body).unwrap();
        assert!(matches!(envelope, Envelope::Error { error } if error.code == PublicApi::NO_DATA));

        let body = r#"{"id": 3135556, "title": "Harder, Better, Faster, Stronger"}"#;
        let envelope: Envelope<TrackRecord> = serde_json::from_str(body).unwrap();
        assert!(matches!(envelope, Envelope::Ok(track) if track.id == 3_135_556));
    }
}
