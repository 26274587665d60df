//! Client configuration and secrets.
//!
//! [`Config`] identifies the client towards Deezer and carries the
//! credentials the acquisition pipeline needs. Key material is never part
//! of this crate; it is loaded from a TOML secrets file:
//!
//! ```toml
//! arl = "..."
//! bf_secret = "................"
//! url_key = "................"
//! ```

use std::{fs, path::Path};

use serde::Deserialize;
use veil::Redact;

use crate::{
    arl::Arl,
    decrypt::Key,
    error::{Error, Result},
};

#[derive(Clone, Debug)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub app_lang: String,

    pub user_agent: String,

    pub arl: Option<Arl>,

    pub secrets: Secrets,

    pub resolve: ResolvePolicy,
}

/// Decryption and URL derivation keys.
#[derive(Clone, Default, Redact)]
pub struct Secrets {
    /// Salt for per-track Blowfish keys.
    #[redact]
    pub bf_secret: Option<Key>,

    /// Key for legacy per-track URL derivation.
    #[redact]
    pub url_key: Option<Key>,
}

/// Tuning of the quality/source resolver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResolvePolicy {
    /// Tokens per media URL request.
    pub batch_size: usize,

    /// Treat a batched result with exactly one source as degraded and
    /// derive the URL per track instead.
    ///
    /// Observed behavior of the media API, not a documented contract.
    pub single_source_fallback: bool,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            batch_size: 25,
            single_source_fallback: true,
        }
    }
}

#[derive(Deserialize)]
struct SecretsFile {
    arl: Option<String>,
    bf_secret: Option<String>,
    url_key: Option<String>,
}

impl Config {
    /// Secrets files are small; anything larger is rejected unread.
    const MAX_SECRETS_SIZE: u64 = 1024;

    /// Creates a configuration without credentials.
    ///
    /// # Panics
    ///
    /// Panics if the package name, version or OS identity cannot be used
    /// in a `User-Agent` header.
    #[must_use]
    pub fn new() -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
            || app_lang.chars().count() != 2
        {
            panic!(
                "application name, version and/or language invalid (\"{app_name}\"; \"{app_version}\"; \"{app_lang}\")"
            );
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version()
            .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
            .unwrap_or_else(|| String::from("0"));

        // Served like Deezer on desktop.
        let user_agent =
            format!("{app_name}/{app_version} (Rust; {os_name}/{os_version}; Desktop; {app_lang})");
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            app_lang,
            user_agent,
            arl: None,
            secrets: Secrets::default(),
            resolve: ResolvePolicy::default(),
        }
    }

    /// Creates a configuration from a secrets file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the file is too large, is not valid
    /// TOML, or holds malformed values.
    pub fn from_secrets_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = fs::metadata(path)?.len();
        if size > Self::MAX_SECRETS_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        let mut config = Self::new();
        config.apply_secrets(&contents)?;
        Ok(config)
    }

    /// Applies secrets from TOML `contents`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed TOML or values.
    pub fn apply_secrets(&mut self, contents: &str) -> Result<()> {
        let file: SecretsFile = toml::from_str(contents)?;

        if let Some(arl) = file.arl {
            self.arl = Some(arl.parse()?);
        }
        if let Some(secret) = file.bf_secret {
            self.secrets.bf_secret = Some(secret.parse()?);
        }
        if let Some(key) = file.url_key {
            self.secrets.url_key = Some(key.parse()?);
        }

        Ok(())
    }

    #[must_use]
    pub fn with_arl(mut self, arl: Arl) -> Self {
        self.arl = Some(arl);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
