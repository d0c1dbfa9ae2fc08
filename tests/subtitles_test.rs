//! Subtitle client and sync tests
//!
//! Release listing shapes, archive extraction, WebVTT normalization and the
//! render pipeline on top of a downloaded track.

use std::io::{Cursor, Write};

use mockito::{Matcher, Server};
use tvhero::models::SubtitleCandidate;
use tvhero::stream::subtitles::{extract_single_file, SubtitleError};
use tvhero::stream::{SubtitleClient, SubtitleSettings, SubtitleTrack};

/// Build a zip archive holding the given files
fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const SRT: &str = "1\r\n00:00:01,000 --> 00:00:03,000\r\n?מה קורה\r\n\r\n2\r\n00:00:04,500 --> 00:00:06,000\r\n.הכל טוב\r\n";

// =============================================================================
// Listing Tests
// =============================================================================

#[tokio::test]
async fn test_list_movie_releases() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api/releases/tt0133093")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"subs": [
                {"id": 187001, "version": "The.Matrix.1999.1080p.BluRay", "year": 1999, "release_group": "FGT"},
                {"id": 187002, "version": "The.Matrix.1999.720p.WEB"}
            ]}"#,
        )
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url());
    let candidates = client.list_candidates("tt0133093", None, None).await;

    mock.assert_async().await;
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id, "187001");
    assert_eq!(candidates[0].label, "The.Matrix.1999.1080p.BluRay (1999) - FGT");
    assert_eq!(candidates[1].label, "The.Matrix.1999.720p.WEB");
}

#[tokio::test]
async fn test_list_episode_releases() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/api/releases/tt0903747")
        .with_status(200)
        .with_body(
            r#"{"subs": {
                "1": {"1": [{"id": 9001, "version": "S01E01.HDTV"}], "2": [{"id": 9002, "version": "S01E02.HDTV"}]},
                "2": {"1": []}
            }}"#,
        )
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url());

    let episode = client.list_candidates("tt0903747", Some(1), Some(2)).await;
    assert_eq!(episode, vec![SubtitleCandidate { id: "9002".into(), label: "S01E02.HDTV".into() }]);

    let empty = client.list_candidates("tt0903747", Some(2), Some(1)).await;
    assert!(empty.is_empty());

    // Flat request against a nested payload is a shape mismatch
    let mismatch = client.list_candidates("tt0903747", None, None).await;
    assert_eq!(mismatch.len(), 1);
    assert!(mismatch[0].is_error());
}

#[tokio::test]
async fn test_list_failure_returns_sentinel() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url());
    let candidates = client.list_candidates("0133093", None, None).await;

    assert_eq!(candidates, vec![SubtitleCandidate::error_sentinel()]);
}

// =============================================================================
// Download Tests
// =============================================================================

#[tokio::test]
async fn test_load_srt_archive_as_webvtt() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api/files/sub/187001")
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_body(archive(&[("The.Matrix.1999.srt", SRT.as_bytes())]))
        .expect(1)
        .create_async()
        .await;

    let cache = tempfile::tempdir().unwrap();
    let client = SubtitleClient::with_base_url(server.url()).with_cache_dir(cache.path());

    let text = client.load("187001").await.unwrap();
    assert!(text.starts_with("WEBVTT\n\n"));
    assert!(text.contains("00:00:01.000 --> 00:00:03.000"));
    assert!(!text.contains('\r'));

    // Second load is served from the cache
    let cached = client.load("187001").await.unwrap();
    assert_eq!(cached, text);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_load_native_webvtt_with_bom() {
    let mut server = Server::new_async().await;
    let vtt = "\u{feff}WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nשלום\n";

    server
        .mock("GET", "/api/files/sub/55")
        .with_status(200)
        .with_body(archive(&[("sub.vtt", vtt.as_bytes())]))
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url());
    let text = client.load("55").await.unwrap();
    assert_eq!(text, "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nשלום\n");
}

#[tokio::test]
async fn test_load_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/files/sub/404")
        .with_status(404)
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url());
    assert!(client.load("404").await.is_err());
}

#[test]
fn test_extract_rejects_bad_archives() {
    assert!(matches!(
        extract_single_file(b"not a zip"),
        Err(SubtitleError::Archive(_))
    ));

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .add_directory("empty/", zip::write::SimpleFileOptions::default())
        .unwrap();
    let only_dir = writer.finish().unwrap().into_inner();
    assert!(matches!(
        extract_single_file(&only_dir),
        Err(SubtitleError::EmptyArchive)
    ));
}

// =============================================================================
// Render Pipeline
// =============================================================================

#[tokio::test]
async fn test_downloaded_track_renders_with_settings() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/files/sub/1")
        .with_status(200)
        .with_body(archive(&[("a.srt", SRT.as_bytes())]))
        .create_async()
        .await;

    let client = SubtitleClient::with_base_url(server.url());
    let text = client.load("1").await.unwrap();

    let settings = SubtitleSettings {
        timing_offset_seconds: -1.5,
        ..SubtitleSettings::default()
    };
    let mut track = SubtitleTrack::new(text, settings);
    let body = track.rendered().body.clone();

    assert!(body.contains("00:00:00.000 --> 00:00:01.500"));
    assert!(body.contains("00:00:03.000 --> 00:00:04.500"));
    assert!(body.contains("מה קורה?"));
    assert!(body.contains("הכל טוב."));

    track.reset();
    assert!(track.rendered().body.contains("00:00:01.000 --> 00:00:03.000"));
    assert_eq!(track.text_renders(), 2);
}
