mod common;

use common::{secrets, song, source_url, FakeMedia};
use deezload::{
    config::ResolvePolicy,
    error::ErrorKind,
    quality::QualityTier,
    resolver::Resolver,
    track::{Descriptor, Episode},
};

fn songs(count: u64) -> Vec<Descriptor> {
    (1..=count)
        .map(|id| Descriptor::Song(song(id, &format!("Track {id}"))))
        .collect()
}

fn host(source: &deezload::protocol::media::MediaSource) -> String {
    source.sources[0].url.host_str().unwrap().to_owned()
}

#[tokio::test]
async fn refused_track_is_derived_alone() {
    let media = FakeMedia::default();
    media.refused.lock().unwrap().insert("token-3".to_owned());
    let secrets = secrets();
    let resolver = Resolver::new(&media, &secrets, ResolvePolicy::default());

    let results = resolver
        .resolve(&songs(5), QualityTier::MP3_320)
        .await
        .unwrap();

    assert_eq!(results.len(), 5);
    for (index, result) in results.iter().enumerate() {
        let id = index as u64 + 1;
        let source = result.as_ref().unwrap();
        assert_eq!(source.tier, QualityTier::MP3_320);
        if id == 3 {
            assert_eq!(host(source), "e-cdns-proxy-0.dzcdn.net");
            assert!(source.sources[0].url.path().starts_with("/mobile/1/"));
        } else {
            assert_eq!(source.sources.len(), 2);
            assert_eq!(source.sources[0].url, source_url(id, QualityTier::MP3_320, 1));
        }
    }
    assert_eq!(media.calls().len(), 1);
}

#[tokio::test]
async fn refused_batch_derives_every_track() {
    let media = FakeMedia::default();
    *media.refuse_all.lock().unwrap() = true;
    let secrets = secrets();
    let resolver = Resolver::new(&media, &secrets, ResolvePolicy::default());

    let results = resolver
        .resolve(&songs(4), QualityTier::FLAC)
        .await
        .unwrap();

    assert!(results
        .iter()
        .all(|result| host(result.as_ref().unwrap()).starts_with("e-cdns-proxy-")));
    // Legacy URLs are derived locally.
    assert_eq!(media.calls().len(), 1);
}

#[tokio::test]
async fn aes_tracks_are_retried_individually() {
    let media = FakeMedia::default();
    media.refused.lock().unwrap().insert("token-2".to_owned());
    let secrets = secrets();
    let resolver = Resolver::new(&media, &secrets, ResolvePolicy::default());

    let mut descriptors = songs(3);
    if let Descriptor::Song(song) = &mut descriptors[1] {
        song.media_key = Some("6b6579".to_owned());
        song.media_nonce = Some("6e6f6e6365".to_owned());
    }

    let results = resolver
        .resolve(&descriptors, QualityTier::MP3_128)
        .await
        .unwrap();

    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().kind, ErrorKind::NotFound);
    assert!(results[2].is_ok());

    let calls = media.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, vec!["token-2".to_owned()]);
}

#[tokio::test]
async fn batches_are_chunked_in_order() {
    let media = FakeMedia::default();
    let secrets = secrets();
    let policy = ResolvePolicy {
        batch_size: 2,
        ..ResolvePolicy::default()
    };
    let resolver = Resolver::new(&media, &secrets, policy);

    let results = resolver
        .resolve(&songs(5), QualityTier::MP3_320)
        .await
        .unwrap();

    let calls = media.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].0, vec!["token-5".to_owned()]);
    for (index, result) in results.iter().enumerate() {
        let id = index as u64 + 1;
        assert_eq!(
            result.as_ref().unwrap().sources[0].url,
            source_url(id, QualityTier::MP3_320, 1)
        );
    }
}

#[tokio::test]
async fn single_source_is_derived_when_policy_allows() {
    let media = FakeMedia::default();
    media
        .single_source
        .lock()
        .unwrap()
        .insert("token-2".to_owned());
    let secrets = secrets();
    let resolver = Resolver::new(&media, &secrets, ResolvePolicy::default());

    let results = resolver
        .resolve(&songs(3), QualityTier::MP3_320)
        .await
        .unwrap();

    let derived = results[1].as_ref().unwrap();
    assert_eq!(host(derived), "e-cdns-proxy-0.dzcdn.net");
    for index in [0, 2] {
        let source = results[index].as_ref().unwrap();
        assert_eq!(source.sources.len(), 2);
        assert_eq!(
            source.sources[0].url,
            source_url(index as u64 + 1, QualityTier::MP3_320, 1)
        );
    }
    assert_eq!(media.calls().len(), 1);
}

#[tokio::test]
async fn single_source_is_kept_without_fallback() {
    let media = FakeMedia::default();
    media
        .single_source
        .lock()
        .unwrap()
        .insert("token-2".to_owned());
    let secrets = secrets();
    let policy = ResolvePolicy {
        single_source_fallback: false,
        ..ResolvePolicy::default()
    };
    let resolver = Resolver::new(&media, &secrets, policy);

    let results = resolver
        .resolve(&songs(3), QualityTier::MP3_320)
        .await
        .unwrap();

    let kept = results[1].as_ref().unwrap();
    assert_eq!(kept.sources.len(), 1);
    assert_eq!(kept.sources[0].url, source_url(2, QualityTier::MP3_320, 1));
    assert_eq!(media.calls().len(), 1);
}

#[tokio::test]
async fn episodes_bypass_the_media_api() {
    let media = FakeMedia::default();
    let secrets = secrets();
    let resolver = Resolver::new(&media, &secrets, ResolvePolicy::default());

    let mut descriptors = songs(1);
    descriptors.push(Descriptor::Episode(Episode {
        id: 7,
        direct_stream_url: "https://podcasts.example/7.mp3".to_owned(),
        ..Episode::default()
    }));
    descriptors.push(Descriptor::Episode(Episode {
        id: 8,
        ..Episode::default()
    }));

    let results = resolver
        .resolve(&descriptors, QualityTier::MP3_320)
        .await
        .unwrap();

    assert!(results[0].is_ok());
    assert_eq!(host(results[1].as_ref().unwrap()), "podcasts.example");
    assert_eq!(results[2].as_ref().unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(media.calls(), vec![(vec!["token-1".to_owned()], QualityTier::MP3_320)]);
}

#[tokio::test]
async fn legacy_derivation_needs_a_url_key() {
    let media = FakeMedia::default();
    *media.refuse_all.lock().unwrap() = true;
    let mut secrets = secrets();
    secrets.url_key = None;
    let resolver = Resolver::new(&media, &secrets, ResolvePolicy::default());

    let results = resolver
        .resolve(&songs(1), QualityTier::MP3_320)
        .await
        .unwrap();
    assert_eq!(
        results[0].as_ref().unwrap_err().kind,
        ErrorKind::InvalidArgument
    );
}
