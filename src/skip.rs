//! Detection of tracks that are already on disk.

use std::path::{Path, PathBuf};

use crate::{convert::ConversionTarget, quality::QualityTier, tagging::Tagger};

/// Paths a finished download of `expected` may have ended up at.
///
/// With a conversion target only the converted file counts. Without one,
/// any tier's extension does, since an earlier run may have fallen back
/// to a different tier.
#[must_use]
pub fn candidates(expected: &Path, convert_to: Option<&ConversionTarget>) -> Vec<PathBuf> {
    if let Some(target) = convert_to {
        return vec![target.output_path(expected)];
    }

    let mut paths = vec![expected.to_path_buf()];
    for tier in QualityTier::LADDER {
        let path = crate::path::with_quality(expected, tier);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

fn same(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

/// Finds an existing file for the track titled `title` on `album`.
///
/// A candidate qualifies when it is a non-empty file whose tags name the
/// same title and album. A file without readable tags only qualifies at
/// the exact expected path.
pub async fn find_existing(
    expected: &Path,
    title: &str,
    album: &str,
    convert_to: Option<&ConversionTarget>,
    tagger: &dyn Tagger,
) -> Option<PathBuf> {
    for candidate in candidates(expected, convert_to) {
        let Ok(metadata) = tokio::fs::metadata(&candidate).await else {
            continue;
        };
        if !metadata.is_file() || metadata.len() == 0 {
            continue;
        }

        match tagger.read_identity(&candidate) {
            Some((found_title, found_album)) => {
                if same(&found_title, title) && same(&found_album, album) {
                    return Some(candidate);
                }
                debug!(
                    "{} belongs to \"{found_title}\" on \"{found_album}\"",
                    candidate.display()
                );
            }
            None if candidate == expected => return Some(candidate),
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Result, tagging::Tags};

    struct FixedIdentity(Option<(String, String)>);

    impl Tagger for FixedIdentity {
        fn write(&self, _path: &Path, _tags: &Tags) -> Result<()> {
            Ok(())
        }

        fn read_identity(&self, _path: &Path) -> Option<(String, String)> {
            self.0.clone()
        }
    }

    #[test]
    fn candidates_follow_conversion_target() {
        let expected = Path::new("/music/01. Track.flac");
        assert_eq!(
            candidates(expected, None),
            vec![
                PathBuf::from("/music/01. Track.flac"),
                PathBuf::from("/music/01. Track.mp3"),
            ]
        );

        let target: ConversionTarget = "OPUS".parse().unwrap();
        assert_eq!(
            candidates(expected, Some(&target)),
            vec![PathBuf::from("/music/01. Track.opus")]
        );
    }

    #[tokio::test]
    async fn alternate_tier_matches_by_tags() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("01. Track.flac");
        let fallback = dir.path().join("01. Track.mp3");
        std::fs::write(&fallback, b"ID3").unwrap();

        let tagger = FixedIdentity(Some(("Track".to_owned(), "Album".to_owned())));
        let found = find_existing(&expected, "track", "Album", None, &tagger).await;
        assert_eq!(found, Some(fallback.clone()));

        let other = FixedIdentity(Some(("Other".to_owned(), "Album".to_owned())));
        assert!(find_existing(&expected, "Track", "Album", None, &other)
            .await
            .is_none());

        let untagged = FixedIdentity(None);
        assert!(find_existing(&expected, "Track", "Album", None, &untagged)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn empty_files_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("01. Track.mp3");
        std::fs::write(&expected, b"").unwrap();

        let tagger = FixedIdentity(None);
        assert!(find_existing(&expected, "Track", "Album", None, &tagger)
            .await
            .is_none());
    }
}
