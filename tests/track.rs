mod common;

use common::{payload, song, track_record, Harness, Payload, ALBUM, ARTIST};
use deezload::{
    error::ErrorKind,
    events::Status,
    item::ItemKind,
    quality::QualityTier,
    track::{EncryptionType, Episode, Fallback},
};

const LINK: &str = "https://www.deezer.com/track/1";

fn one_more_time(harness: &Harness) {
    harness.add_track(track_record(1, "One More Time", 1), song(1, "One More Time"));
}

fn expected_path(harness: &Harness) -> std::path::PathBuf {
    harness
        .dir
        .path()
        .join(ARTIST)
        .join(ALBUM)
        .join("01. One More Time.mp3")
}

fn statuses(harness: &Harness) -> Vec<Status> {
    harness
        .recorder
        .events()
        .into_iter()
        .map(|event| event.status)
        .collect()
}

#[tokio::test]
async fn zero_size_lossless_goes_straight_to_lossy() {
    let harness = Harness::new();
    let mut song = song(1, "One More Time");
    song.filesize_flac = Some(0);
    harness.add_track(track_record(1, "One More Time", 1), song);

    let mut preferences = harness.preferences();
    preferences.quality = QualityTier::FLAC;
    let item = harness
        .downloader()
        .download_track(LINK, &preferences)
        .await
        .unwrap();

    assert!(item.success);
    assert_eq!(item.quality, Some(QualityTier::MP3_320));
    assert_eq!(item.extension().as_deref(), Some(".mp3"));
    let path = item.path.unwrap();
    assert_eq!(path, expected_path(&harness));
    assert_eq!(std::fs::read(&path).unwrap(), payload(1));

    assert!(harness
        .media
        .calls()
        .iter()
        .all(|(_, tier)| *tier != QualityTier::FLAC));
    assert!(harness
        .fetcher
        .opened()
        .iter()
        .all(|url| !url.path().contains("FLAC")));
    assert!(!statuses(&harness)
        .iter()
        .any(|status| matches!(status, Status::Retrying { .. })));
}

#[tokio::test]
async fn second_download_is_skipped() {
    let harness = Harness::new();
    one_more_time(&harness);
    let downloader = harness.downloader();
    let preferences = harness.preferences();

    let first = downloader.download_track(LINK, &preferences).await.unwrap();
    assert!(first.success);
    assert!(!first.was_skipped);
    let opened = harness.fetcher.opened().len();
    let calls = harness.media.calls().len();

    let second = downloader.download_track(LINK, &preferences).await.unwrap();
    assert!(second.success);
    assert!(second.was_skipped);
    assert_eq!(second.path, first.path);
    assert_eq!(harness.fetcher.opened().len(), opened);
    assert_eq!(harness.media.calls().len(), calls);
    assert!(matches!(
        statuses(&harness).last(),
        Some(Status::Skipped { .. })
    ));
}

#[tokio::test]
async fn standalone_track_reports_summary() {
    let harness = Harness::new();
    one_more_time(&harness);

    let item = harness
        .downloader()
        .download_track(LINK, &harness.preferences())
        .await
        .unwrap();
    assert_eq!(item.encryption, Some(EncryptionType::Blowfish));

    let events = harness.recorder.events();
    assert_eq!(events.first().map(|event| &event.status), Some(&Status::Initializing));
    match &events.last().unwrap().status {
        Status::Done {
            summary: Some(summary),
        } => {
            assert_eq!(summary.total_successful(), 1);
            assert_eq!(summary.successful[0].title, "One More Time");
        }
        other => panic!("unexpected final status {other:?}"),
    }
    assert!(events.iter().all(|event| event.parent.is_none()));

    let tags = harness.tagger.tags(item.path.as_ref().unwrap()).unwrap();
    assert_eq!(tags.title, "One More Time");
    assert!(tags.cover.is_none());
}

#[tokio::test]
async fn lossless_falls_back_once_to_best_lossy() {
    let harness = Harness::new();
    one_more_time(&harness);
    harness
        .media
        .unavailable
        .lock()
        .unwrap()
        .insert(QualityTier::FLAC);

    let mut preferences = harness.preferences();
    preferences.quality = QualityTier::FLAC;
    let item = harness
        .downloader()
        .download_track(LINK, &preferences)
        .await
        .unwrap();

    assert_eq!(item.quality, Some(QualityTier::MP3_320));
    assert!(statuses(&harness).contains(&Status::Retrying {
        from: QualityTier::FLAC,
        to: QualityTier::MP3_320,
        reason: "Track not found (HTTP 404)".to_owned(),
    }));
}

#[tokio::test]
async fn lossy_without_recursion_fails_with_quality_unavailable() {
    let harness = Harness::new();
    one_more_time(&harness);
    harness
        .media
        .unavailable
        .lock()
        .unwrap()
        .insert(QualityTier::MP3_320);

    let downloader = harness.downloader();
    let error = downloader
        .download_track(LINK, &harness.preferences())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::TrackNotFound);
    assert!(error.is(ErrorKind::QualityUnavailable));
    assert!(matches!(statuses(&harness).last(), Some(Status::Error { .. })));
    assert!(!expected_path(&harness).exists());
    assert!(downloader.in_flight().is_empty());
}

#[tokio::test]
async fn recursive_quality_walks_the_whole_ladder() {
    let harness = Harness::new();
    one_more_time(&harness);
    {
        let mut unavailable = harness.media.unavailable.lock().unwrap();
        unavailable.insert(QualityTier::MP3_320);
        unavailable.insert(QualityTier::FLAC);
    }

    let mut preferences = harness.preferences();
    preferences.recursive_quality = true;
    let item = harness
        .downloader()
        .download_track(LINK, &preferences)
        .await
        .unwrap();

    assert_eq!(item.quality, Some(QualityTier::MP3_128));
    let retries: Vec<_> = statuses(&harness)
        .into_iter()
        .filter_map(|status| match status {
            Status::Retrying { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        retries,
        vec![
            (QualityTier::MP3_320, QualityTier::FLAC),
            (QualityTier::FLAC, QualityTier::MP3_128)
        ]
    );
}

#[tokio::test]
async fn decryption_failure_removes_partial_file() {
    let harness = Harness::new();
    one_more_time(&harness);
    harness
        .fetcher
        .serve(1, QualityTier::MP3_320, Payload::Corrupt(payload(1)));

    let error = harness
        .downloader()
        .download_track(LINK, &harness.preferences())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::TrackNotFound);
    assert!(error.is(ErrorKind::DecryptionFailed));
    assert!(!expected_path(&harness).exists());
    // Decryption failures never fall back to another tier.
    assert!(harness
        .fetcher
        .opened()
        .iter()
        .all(|url| url.path().starts_with("/320/")));
    match statuses(&harness).last() {
        Some(Status::Error { error }) => assert!(error.starts_with("Decryption error")),
        other => panic!("unexpected final status {other:?}"),
    }
}

#[tokio::test]
async fn failed_conversion_keeps_original() {
    let harness = Harness::new();
    one_more_time(&harness);
    *harness.converter.fail.lock().unwrap() = true;

    let mut preferences = harness.preferences();
    preferences.convert_to = Some("FLAC".parse().unwrap());
    let item = harness
        .downloader()
        .download_track(LINK, &preferences)
        .await
        .unwrap();

    assert!(item.success);
    assert_eq!(item.extension().as_deref(), Some(".mp3"));
    assert!(item.path.unwrap().exists());
}

#[tokio::test]
async fn converted_file_replaces_original() {
    let harness = Harness::new();
    one_more_time(&harness);

    let mut preferences = harness.preferences();
    preferences.convert_to = Some("OPUS_128K".parse().unwrap());
    let downloader = harness.downloader();
    let item = downloader.download_track(LINK, &preferences).await.unwrap();

    let path = item.path.unwrap();
    assert_eq!(path.extension().unwrap(), "opus");
    assert!(path.exists());
    assert!(!path.with_extension("mp3").exists());
    assert!(harness.tagger.tags(&path).is_some());
    assert!(downloader.in_flight().is_empty());

    // Only the converted file counts as already downloaded.
    let again = downloader.download_track(LINK, &preferences).await.unwrap();
    assert!(again.was_skipped);
}

#[tokio::test]
async fn lower_bitrate_of_same_format_is_reencoded() {
    let harness = Harness::new();
    one_more_time(&harness);

    let mut preferences = harness.preferences();
    preferences.convert_to = Some("MP3_128K".parse().unwrap());
    let downloader = harness.downloader();
    let item = downloader.download_track(LINK, &preferences).await.unwrap();

    assert_eq!(item.quality, Some(QualityTier::MP3_320));
    assert_eq!(item.path.as_deref(), Some(expected_path(&harness).as_path()));
    assert!(expected_path(&harness).exists());

    let converted = harness.converter.converted.lock().unwrap().clone();
    assert_eq!(converted.len(), 1);
    assert_eq!(converted[0].0, expected_path(&harness));
    assert_eq!(converted[0].1.bitrate, Some(128));
    assert!(downloader.in_flight().is_empty());
}

#[tokio::test]
async fn matching_target_is_not_reencoded() {
    let harness = Harness::new();
    one_more_time(&harness);

    let mut preferences = harness.preferences();
    preferences.convert_to = Some("MP3_320K".parse().unwrap());
    let item = harness
        .downloader()
        .download_track(LINK, &preferences)
        .await
        .unwrap();

    assert_eq!(item.path.as_deref(), Some(expected_path(&harness).as_path()));
    assert!(harness.converter.converted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn market_restriction_is_reported() {
    let harness = Harness::new();
    let mut record = track_record(1, "One More Time", 1);
    record.available_countries = vec!["DE".to_owned()];
    harness.add_track(record, song(1, "One More Time"));

    let mut preferences = harness.preferences();
    preferences.market = Some("FR".to_owned());
    let error = harness
        .downloader()
        .download_track(LINK, &preferences)
        .await
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::MarketUnavailable);
    assert!(harness.fetcher.opened().is_empty());
    assert!(matches!(statuses(&harness).last(), Some(Status::Error { .. })));
}

#[tokio::test]
async fn unavailable_track_uses_alternate_id() {
    let harness = Harness::new();
    harness.add_track(track_record(11, "One More Time", 1), song(11, "One More Time"));
    let mut gone = song(10, "One More Time");
    gone.fallback = Some(Box::new(Fallback { id: 11 }));
    harness.media.add_song(gone);

    let item = harness
        .downloader()
        .download_track("https://www.deezer.com/en/track/10", &harness.preferences())
        .await
        .unwrap();

    assert!(item.success);
    assert_eq!(item.id, 11);
}

#[tokio::test]
async fn episodes_stream_directly() {
    let harness = Harness::new();
    let url: url::Url = "https://podcasts.example/5.mp3".parse().unwrap();
    harness.media.episodes.lock().unwrap().insert(
        5,
        Episode {
            id: 5,
            title: "Pilot".to_owned(),
            show: "The Show".to_owned(),
            direct_stream_url: url.to_string(),
            ..Episode::default()
        },
    );
    harness
        .fetcher
        .payloads
        .lock()
        .unwrap()
        .insert(url, Payload::Audio(b"episode audio".to_vec()));

    let item = harness
        .downloader()
        .download_episode("https://www.deezer.com/episode/5", &harness.preferences())
        .await
        .unwrap();

    assert_eq!(item.kind, ItemKind::Episode);
    assert_eq!(item.encryption, Some(EncryptionType::None));
    let path = item.path.unwrap();
    assert_eq!(path, harness.dir.path().join("The Show").join("Pilot.mp3"));
    assert_eq!(std::fs::read(path).unwrap(), b"episode audio");
    assert!(harness.media.calls().is_empty());
}
