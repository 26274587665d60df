//! Output layout.
//!
//! Track paths are rendered from two templates, one for the directory and
//! one for the file name, with these placeholders:
//!
//! | Placeholder  | Value                                     |
//! |--------------|-------------------------------------------|
//! | `%music%`    | track title                               |
//! | `%artist%`   | all track artists                         |
//! | `%album%`    | album title                               |
//! | `%ar_album%` | album artist                              |
//! | `%tracknum%` | track number, zero-padded if requested    |
//! | `%discnum%`  | disc number                               |
//! | `%year%`     | release year                              |
//! | `%isrc%`     | ISRC                                      |
//! | `%quality%`  | quality label, e.g. `FLAC` or `320`       |
//! | `%explicit%` | `(Explicit)` for explicit tracks          |
//!
//! Every path component is sanitized after substitution, so a slash in a
//! title never creates a directory.

use std::path::{Path, PathBuf};

use crate::{preferences::Preferences, quality::QualityTier, tagging::Tags};

/// Longest file name component kept, in characters.
const MAX_COMPONENT_LENGTH: usize = 200;

/// Replaces characters that are invalid in file names on common
/// filesystems and trims what Windows would silently drop.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_COMPONENT_LENGTH)
        .collect();

    let trimmed = replaced.trim().trim_end_matches('.').trim_end();
    if trimmed.is_empty() {
        "Unknown".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Renders a template for one track.
struct Renderer<'a> {
    tags: &'a Tags,
    quality: QualityTier,
    pad_width: usize,
}

impl Renderer<'_> {
    fn value(&self, placeholder: &str) -> Option<String> {
        let tags = self.tags;
        let value = match placeholder {
            "music" => tags.title.clone(),
            "artist" => tags.artist(),
            "album" => tags.album.clone(),
            "ar_album" => {
                if tags.album_artist.is_empty() {
                    tags.artists.first().cloned().unwrap_or_default()
                } else {
                    tags.album_artist.clone()
                }
            }
            "tracknum" => format!(
                "{:0width$}",
                tags.track_number.unwrap_or(1),
                width = self.pad_width
            ),
            "discnum" => tags.disc_number.unwrap_or(1).to_string(),
            "year" => tags.year().unwrap_or_default().to_owned(),
            "isrc" => tags.isrc.clone().unwrap_or_default(),
            "quality" => self.quality.label().to_owned(),
            "explicit" => {
                if tags.explicit == Some(true) {
                    "(Explicit)".to_owned()
                } else {
                    String::new()
                }
            }
            _ => return None,
        };
        Some(value)
    }

    /// Substitutes placeholders in one path component. Unknown
    /// placeholders are kept literally.
    fn component(&self, template: &str) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('%') {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) => {
                    let name = &after[..end];
                    if let Some(value) = self.value(name) {
                        rendered.push_str(&value);
                        rest = &after[end + 1..];
                    } else {
                        rendered.push('%');
                        rest = after;
                    }
                }
                None => {
                    rendered.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        rendered.push_str(rest);

        // Collapse the gaps left by empty placeholders.
        let collapsed = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
        sanitize(&collapsed)
    }

    fn path(&self, template: &str) -> PathBuf {
        template
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.component(segment))
            .collect()
    }
}

fn pad_width(preferences: &Preferences, total: Option<u32>) -> usize {
    if !preferences.pad_tracks {
        return 1;
    }
    let digits = total.map_or(2, |total| total.to_string().len());
    digits.max(2)
}

/// Directory a track is written to.
#[must_use]
pub fn track_dir(tags: &Tags, preferences: &Preferences, quality: QualityTier) -> PathBuf {
    let renderer = Renderer {
        tags,
        quality,
        pad_width: pad_width(preferences, tags.total_tracks),
    };
    preferences
        .output_dir
        .join(renderer.path(&preferences.dir_format))
}

/// Full path of a track at `quality`, including the extension.
#[must_use]
pub fn track_path(tags: &Tags, preferences: &Preferences, quality: QualityTier) -> PathBuf {
    let renderer = Renderer {
        tags,
        quality,
        pad_width: pad_width(preferences, tags.total_tracks),
    };
    let name = renderer.component(&preferences.track_format);
    track_dir(tags, preferences, quality).join(format!("{name}{}", quality.extension()))
}

/// Path of a podcast episode: `{show}/{title}.mp3`.
#[must_use]
pub fn episode_path(tags: &Tags, preferences: &Preferences) -> PathBuf {
    preferences
        .output_dir
        .join(sanitize(&tags.album))
        .join(format!("{}.mp3", sanitize(&tags.title)))
}

/// `path` with its extension replaced by that of `quality`.
#[must_use]
pub fn with_quality(path: &Path, quality: QualityTier) -> PathBuf {
    path.with_extension(quality.extension().trim_start_matches('.'))
}

/// Archive of an album: `{artist} - {album} ({quality}).zip`.
#[must_use]
pub fn album_zip(output_dir: &Path, artist: &str, album: &str, quality: QualityTier) -> PathBuf {
    output_dir.join(sanitize(&format!(
        "{artist} - {album} ({}).zip",
        quality.label()
    )))
}

/// Archive of a playlist: `{playlist} ({quality}).zip`.
#[must_use]
pub fn playlist_zip(output_dir: &Path, playlist: &str, quality: QualityTier) -> PathBuf {
    output_dir.join(sanitize(&format!("{playlist} ({}).zip", quality.label())))
}

/// Playlist file: `{playlist}.m3u`.
#[must_use]
pub fn m3u_path(output_dir: &Path, playlist: &str) -> PathBuf {
    output_dir.join(format!("{}.m3u", sanitize(playlist)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Tags {
        Tags {
            title: "Face to Face".to_owned(),
            artists: vec!["Daft Punk".to_owned(), "Todd Edwards".to_owned()],
            album: "Discovery".to_owned(),
            album_artist: "Daft Punk".to_owned(),
            track_number: Some(7),
            total_tracks: Some(14),
            date: Some("2001-03-07".to_owned()),
            ..Tags::default()
        }
    }

    #[test]
    fn default_templates() {
        let preferences = Preferences::new("/music");
        assert_eq!(
            track_path(&tags(), &preferences, QualityTier::FLAC),
            PathBuf::from("/music/Daft Punk/Discovery/07. Face to Face.flac")
        );
    }

    #[test]
    fn padding_follows_track_count() {
        let mut preferences = Preferences::new("/music");
        let mut tags = tags();
        tags.total_tracks = Some(120);
        assert_eq!(
            track_path(&tags, &preferences, QualityTier::MP3_320)
                .file_name()
                .unwrap(),
            "007. Face to Face.mp3"
        );

        preferences.pad_tracks = false;
        assert_eq!(
            track_path(&tags, &preferences, QualityTier::MP3_320)
                .file_name()
                .unwrap(),
            "7. Face to Face.mp3"
        );
    }

    #[test]
    fn custom_templates_and_sanitizing() {
        let mut preferences = Preferences::new("/music");
        preferences.dir_format = "%artist%/%year% - %album% [%quality%]".to_owned();
        preferences.track_format = "%discnum%-%tracknum% %music% %explicit%".to_owned();

        let mut tags = tags();
        tags.title = "AC/DC: Live?".to_owned();
        assert_eq!(
            track_path(&tags, &preferences, QualityTier::MP3_128),
            PathBuf::from("/music/Daft Punk; Todd Edwards/2001 - Discovery [128]/1-07 AC_DC_ Live_.mp3")
        );
    }

    #[test]
    fn sanitize_never_yields_empty_components() {
        assert_eq!(sanitize("  ...  "), "Unknown");
        assert_eq!(sanitize("Track."), "Track");
        assert_eq!(sanitize("a\u{0}b"), "a_b");
    }

    #[test]
    fn batch_artifacts() {
        let dir = Path::new("/music");
        assert_eq!(
            album_zip(dir, "Daft Punk", "Discovery", QualityTier::FLAC),
            PathBuf::from("/music/Daft Punk - Discovery (FLAC).zip")
        );
        assert_eq!(
            playlist_zip(dir, "Road/Trip", QualityTier::MP3_320),
            PathBuf::from("/music/Road_Trip (320).zip")
        );
        assert_eq!(m3u_path(dir, "Road Trip"), PathBuf::from("/music/Road Trip.m3u"));
    }
}
