//! Client of the private Deezer gateway and the media URL service.
//!
//! The gateway session is established lazily: the first call fetches
//! `deezer.getUserData`, which yields the API token for subsequent
//! gateway calls and the license token for media URL requests. The `arl`
//! and language are sent as cookies.

use std::{collections::HashMap, fmt::Debug};

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{
    catalog::MediaApi,
    config::Config,
    error::{Error, ErrorKind, Result},
    http::Client as HttpClient,
    protocol::{
        self,
        gateway::{
            self, episodes, songs, AlbumSongs, EpisodeData, Method, PlaylistSongs, SongData,
            UserData,
        },
        media,
    },
    quality::QualityTier,
    track::{Descriptor, TrackId},
};

pub struct Gateway {
    http_client: HttpClient,
    user_data: Mutex<Option<UserData>>,
}

/// Tokens of an established session.
struct Session {
    api_token: String,
    license_token: String,
}

impl Gateway {
    /// Origin the session cookies are scoped to.
    const COOKIE_ORIGIN: &'static str = "https://www.deezer.com";

    const GATEWAY_URL: &'static str = "https://www.deezer.com/ajax/gw-light.php";

    const GATEWAY_VERSION: &'static str = "1.0";

    const GATEWAY_INPUT: usize = 3;

    const MEDIA_URL: &'static str = "https://media.deezer.com/v1/get_url";

    /// Gateway bodies are JSON but must not be declared as such.
    const PLAIN_TEXT_CONTENT: HeaderValue = HeaderValue::from_static("text/plain;charset=UTF-8");

    const EMPTY_JSON_OBJECT: &'static str = "{}";

    /// Gateway error raised when the API token has expired.
    const TOKEN_EXPIRED: &'static str = "VALID_TOKEN_REQUIRED";

    /// Creates a gateway client carrying the `arl` of `config`, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the cookie origin or the HTTP client is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        let cookie_jar = Self::cookie_jar(config)?;
        Ok(Self {
            http_client: HttpClient::with_cookies(config, cookie_jar)?,
            user_data: Mutex::new(None),
        })
    }

    fn cookie_jar(config: &Config) -> Result<reqwest::cookie::Jar> {
        let jar = reqwest::cookie::Jar::default();
        let origin = Self::COOKIE_ORIGIN.parse::<reqwest::Url>()?;

        jar.add_cookie_str(
            &format!(
                "dz_lang={}; Domain=deezer.com; Path=/; Secure; HttpOnly",
                config.app_lang
            ),
            &origin,
        );
        if let Some(ref arl) = config.arl {
            jar.add_cookie_str(
                &format!("arl={arl}; Domain=deezer.com; Path=/; Secure; HttpOnly"),
                &origin,
            );
        }

        Ok(jar)
    }

    /// Returns the tokens of the current session, refreshing it if needed.
    async fn session(&self) -> Result<Session> {
        let mut user_data = self.user_data.lock().await;
        if user_data.is_none() {
            *user_data = Some(self.refresh().await?);
        }

        let data = user_data
            .as_ref()
            .ok_or_else(|| Error::internal("session vanished after refresh"))?;
        Ok(Session {
            api_token: data.api_token.clone(),
            license_token: data.user.options.license_token.clone(),
        })
    }

    async fn refresh(&self) -> Result<UserData> {
        let response = match self
            .call::<UserData>("", Self::EMPTY_JSON_OBJECT.to_owned())
            .await
        {
            Ok(response) => response,
            // An invalid `arl` turns some string fields into `0`.
            Err(e) if e.kind == ErrorKind::InvalidArgument => {
                return Err(Error::rights_denied(format!(
                    "{e}: please refresh your arl"
                )));
            }
            Err(e) => return Err(e),
        };

        let data = response
            .into_all()
            .into_iter()
            .next()
            .ok_or_else(|| Error::rights_denied("no user data received"))?;

        if data.is_logged_in() {
            debug!("gateway session established for user {}", data.user.id);
        } else {
            warn!("gateway session is not logged in; media access will be limited");
        }

        Ok(data)
    }

    /// Posts `body` to gateway method `T::METHOD` with `api_token`.
    async fn call<T>(&self, api_token: &str, body: String) -> Result<gateway::Response<T>>
    where
        T: Debug + Method + for<'de> Deserialize<'de>,
    {
        let url = format!(
            "{}?method={}&input={}&api_version={}&api_token={api_token}",
            Self::GATEWAY_URL,
            T::METHOD,
            Self::GATEWAY_INPUT,
            Self::GATEWAY_VERSION,
        )
        .parse::<reqwest::Url>()?;

        let mut request = self.http_client.post(url, body);
        request
            .headers_mut()
            .try_insert(CONTENT_TYPE, Self::PLAIN_TEXT_CONTENT)?;

        let response = self.http_client.execute_checked(request).await?;
        let text = response.text().await?;
        protocol::json(&text, T::METHOD)
    }

    /// Calls gateway method `T::METHOD`, renewing an expired session once.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the gateway reports errors and no results.
    pub async fn request<T>(&self, body: &impl serde::Serialize) -> Result<Vec<T>>
    where
        T: Debug + Method + for<'de> Deserialize<'de>,
    {
        let body = serde_json::to_string(body)?;

        let mut session = self.session().await?;
        let mut response = self.call::<T>(&session.api_token, body.clone()).await?;

        if response.errors().contains_key(Self::TOKEN_EXPIRED) {
            debug!("{}: api token expired, renewing session", T::METHOD);
            self.user_data.lock().await.take();
            session = self.session().await?;
            response = self.call::<T>(&session.api_token, body).await?;
        }

        let errors = response.errors();
        if !errors.is_empty() && response.all().is_empty() {
            return Err(Error::not_found(format!(
                "{}: {}",
                T::METHOD,
                describe(errors)
            )));
        }

        Ok(response.into_all())
    }
}

fn describe(errors: &HashMap<String, serde_json::Value>) -> String {
    let mut pairs: Vec<String> = errors
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    pairs.sort();
    pairs.join(", ")
}

/// Whether a media error list refuses the tokens for lack of rights.
fn is_rights_error(errors: &[media::Error]) -> bool {
    !errors.is_empty()
        && errors
            .iter()
            .all(|error| error.code == media::Error::NO_RIGHTS)
}

#[async_trait]
impl MediaApi for Gateway {
    async fn song(&self, id: TrackId) -> Result<Descriptor> {
        let songs = self
            .request::<SongData>(&songs::SongRequest { track_id: id })
            .await?;
        songs
            .into_iter()
            .next()
            .map(|song| Descriptor::Song(song.0))
            .ok_or_else(|| Error::not_found(format!("song {id} not found")))
    }

    async fn album_songs(&self, id: u64) -> Result<Vec<Descriptor>> {
        let songs = self
            .request::<AlbumSongs>(&songs::AlbumRequest { album_id: id, nb: -1 })
            .await?;
        Ok(songs.into_iter().map(|song| Descriptor::Song(song.0)).collect())
    }

    async fn playlist_songs(&self, id: u64) -> Result<Vec<Descriptor>> {
        let songs = self
            .request::<PlaylistSongs>(&songs::PlaylistRequest {
                playlist_id: id,
                nb: -1,
            })
            .await?;
        Ok(songs.into_iter().map(|song| Descriptor::Song(song.0)).collect())
    }

    async fn episode(&self, id: TrackId) -> Result<Descriptor> {
        let episodes = self
            .request::<EpisodeData>(&episodes::Request { episode_id: id })
            .await?;
        episodes
            .into_iter()
            .next()
            .map(|episode| Descriptor::Episode(episode.0))
            .ok_or_else(|| Error::not_found(format!("episode {id} not found")))
    }

    async fn media_urls(&self, tokens: &[String], tier: QualityTier) -> Result<Vec<media::Data>> {
        let session = self.session().await?;
        if session.license_token.is_empty() {
            return Err(Error::rights_denied("session has no license token"));
        }

        let request = media::Request::new(session.license_token, tokens.to_vec(), tier);
        trace!("get_url: {request:?}");

        let body = serde_json::to_string(&request)?;
        let http_request = self
            .http_client
            .post(Self::MEDIA_URL.parse::<reqwest::Url>()?, body);
        let text = self
            .http_client
            .execute_checked(http_request)
            .await?
            .text()
            .await?;
        let response: media::Response = protocol::json(&text, "get_url")?;

        if !response.errors.is_empty() {
            let message = response
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(if is_rights_error(&response.errors) {
                Error::rights_denied(message)
            } else {
                Error::network_failure(message)
            });
        }

        let refused = response.data.iter().all(|data| match data {
            media::Data::Errors { errors } => is_rights_error(errors),
            media::Data::Media { .. } => false,
        });
        if refused && !response.data.is_empty() {
            return Err(Error::rights_denied(format!(
                "no rights on {} tokens at {tier}",
                tokens.len()
            )));
        }

        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rights_errors_are_recognized() {
        let no_rights = media::Error {
            code: media::Error::NO_RIGHTS,
            message: "no rights".to_owned(),
        };
        let other = media::Error {
            code: 1000,
            message: "invalid token".to_owned(),
        };

        assert!(is_rights_error(&[no_rights.clone()]));
        assert!(!is_rights_error(&[no_rights, other]));
        assert!(!is_rights_error(&[]));
    }

    #[test]
    fn gateway_errors_are_described_in_order() {
        let mut errors = HashMap::new();
        errors.insert("DATA_ERROR".to_owned(), serde_json::json!("song_id"));
        errors.insert("ALPHA".to_owned(), serde_json::json!(1));
        assert_eq!(describe(&errors), r#"ALPHA: 1, DATA_ERROR: "song_id""#);
    }
}
