//! Transcoding of downloaded files.
//!
//! A [`ConversionTarget`] is parsed from strings like `MP3_320K`, `OPUS` or
//! `FLAC`. The [`Ffmpeg`] converter spawns `ffmpeg` and removes the source
//! file once the output is complete. Conversion failures are reported as
//! `ConversionFailed`; the caller decides whether that is fatal.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    error::{Error, Result},
    quality::QualityTier,
};

/// Container and codec of a conversion target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AudioFormat {
    Mp3,
    Aac,
    Ogg,
    Opus,
    Flac,
    Wav,
    Alac,
}

impl AudioFormat {
    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => ".mp3",
            Self::Aac => ".m4a",
            Self::Ogg => ".ogg",
            Self::Opus => ".opus",
            Self::Flac => ".flac",
            Self::Wav => ".wav",
            Self::Alac => ".m4a",
        }
    }

    /// `ffmpeg` audio encoder.
    #[must_use]
    pub fn codec(self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Ogg => "libvorbis",
            Self::Opus => "libopus",
            Self::Flac => "flac",
            Self::Wav => "pcm_s16le",
            Self::Alac => "alac",
        }
    }

    #[must_use]
    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Flac | Self::Wav | Self::Alac)
    }

    /// Bitrates in kbps the encoder is offered; empty for lossless formats.
    #[must_use]
    pub fn bitrates(self) -> &'static [u32] {
        match self {
            Self::Mp3 => &[32, 64, 96, 128, 160, 192, 224, 256, 320],
            Self::Aac => &[32, 64, 96, 128, 160, 192, 224, 256, 320],
            Self::Ogg => &[64, 96, 128, 160, 192, 224, 256, 320],
            Self::Opus => &[32, 64, 96, 128, 160, 192, 224, 256],
            Self::Flac | Self::Wav | Self::Alac => &[],
        }
    }

    #[must_use]
    pub fn default_bitrate(self) -> Option<u32> {
        match self {
            Self::Mp3 | Self::Aac | Self::Ogg => Some(320),
            Self::Opus => Some(256),
            Self::Flac | Self::Wav | Self::Alac => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Mp3 => "MP3",
            Self::Aac => "AAC",
            Self::Ogg => "OGG",
            Self::Opus => "OPUS",
            Self::Flac => "FLAC",
            Self::Wav => "WAV",
            Self::Alac => "ALAC",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MP3" => Ok(Self::Mp3),
            "AAC" => Ok(Self::Aac),
            "OGG" => Ok(Self::Ogg),
            "OPUS" => Ok(Self::Opus),
            "FLAC" => Ok(Self::Flac),
            "WAV" => Ok(Self::Wav),
            "ALAC" => Ok(Self::Alac),
            other => Err(Error::invalid_argument(format!(
                "unsupported audio format: {other}"
            ))),
        }
    }
}

/// Requested output format of a download.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConversionTarget {
    pub format: AudioFormat,

    /// Bitrate in kbps; `None` for lossless formats.
    pub bitrate: Option<u32>,
}

impl ConversionTarget {
    /// Path the converted file of `input` is written to.
    #[must_use]
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let extension = self.format.extension().trim_start_matches('.');
        input.with_extension(extension)
    }

    /// Path the encoder writes to before the result is moved into place.
    ///
    /// Differs from [`output_path`](Self::output_path) only when the
    /// target keeps the extension of `input`, so that `ffmpeg` never reads
    /// and writes the same file.
    #[must_use]
    pub fn staging_path(&self, input: &Path) -> PathBuf {
        let output = self.output_path(input);
        if output != input {
            return output;
        }

        let extension = self.format.extension().trim_start_matches('.');
        input.with_extension(format!("part.{extension}"))
    }

    /// Whether a file downloaded at `tier` already is in this format and
    /// bitrate.
    #[must_use]
    pub fn is_satisfied_by(&self, tier: QualityTier) -> bool {
        match (self.format, tier) {
            (AudioFormat::Flac, QualityTier::FLAC) => true,
            (AudioFormat::Mp3, QualityTier::MP3_320) => {
                self.bitrate.is_none_or(|kbps| kbps == 320)
            }
            (AudioFormat::Mp3, QualityTier::MP3_128) => {
                self.bitrate.is_none_or(|kbps| kbps == 128)
            }
            _ => false,
        }
    }
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.bitrate {
            Some(bitrate) => write!(f, "{}_{bitrate}K", self.format),
            None => write!(f, "{}", self.format),
        }
    }
}

impl FromStr for ConversionTarget {
    type Err = Error;

    /// Parses `FORMAT[_BITRATE[K]]`. A bitrate the format does not offer
    /// falls back to its default.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let (format, bitrate) = match upper.split_once('_') {
            Some((format, bitrate)) => (format, Some(bitrate)),
            None => (upper.as_str(), None),
        };
        let format: AudioFormat = format.parse()?;

        if format.is_lossless() {
            if bitrate.is_some() {
                debug!("ignoring bitrate of lossless target {s}");
            }
            return Ok(Self {
                format,
                bitrate: None,
            });
        }

        let bitrate = match bitrate.map(|b| b.trim_end_matches('K').parse::<u32>()) {
            Some(Ok(kbps)) if format.bitrates().contains(&kbps) => Some(kbps),
            Some(_) => {
                let fallback = format.default_bitrate();
                warn!("unsupported bitrate in {s}, using {fallback:?} kbps");
                fallback
            }
            None => format.default_bitrate(),
        };

        Ok(Self { format, bitrate })
    }
}

/// Transcodes audio files.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Converts `input` to `target` and returns the path of the result.
    ///
    /// On success the source file is gone, or replaced in place when the
    /// result has the same path. On failure the source file is left
    /// untouched.
    async fn convert(&self, input: &Path, target: &ConversionTarget) -> Result<PathBuf>;
}

/// Converter spawning the `ffmpeg` binary.
#[derive(Clone, Debug)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Converter for Ffmpeg {
    async fn convert(&self, input: &Path, target: &ConversionTarget) -> Result<PathBuf> {
        let output = target.output_path(input);
        let staging = target.staging_path(input);

        let mut command = Command::new(&self.binary);
        command
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-map", "0:a", "-map_metadata", "0", "-c:a", target.format.codec()]);
        if let Some(kbps) = target.bitrate {
            command.arg("-b:a").arg(format!("{kbps}k"));
        }
        command.arg(&staging);

        debug!("converting {} to {target}", input.display());
        let result = command.output().await.map_err(|e| {
            Error::conversion_failed(format!("failed to run {}: {e}", self.binary.display()))
        })?;

        if !result.status.success() {
            if let Err(e) = tokio::fs::remove_file(&staging).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove {}: {e}", staging.display());
                }
            }
            return Err(Error::conversion_failed(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        if staging == output {
            tokio::fs::remove_file(input).await?;
        } else {
            tokio::fs::rename(&staging, &output).await?;
        }
        Ok(output)
    }
}
