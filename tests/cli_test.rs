//! CLI Command Tests
//!
//! Argument parsing, JSON output shapes and handler exit codes against
//! mocked backends and a temporary data directory.

// =============================================================================
// CLI Argument Parsing Tests
// =============================================================================

mod cli_parsing {
    use clap::Parser;
    use tvhero::cli::{CategoryArg, Cli, Command, ExitCode, FilterArg, LibraryAction};

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["tvhero"]).is_err());
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::parse_from(["tvhero", "search", "מטריקס"]);
        match cli.command {
            Command::Search(cmd) => {
                assert_eq!(cmd.query, "מטריקס");
                assert_eq!(cmd.media_type, FilterArg::All);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_command_aliases() {
        let cli = Cli::parse_from(["tvhero", "ss", "סרט אימה בבית נטוש", "-t", "movie"]);
        assert!(matches!(
            cli.command,
            Command::SmartSearch(ref cmd) if cmd.media_type == FilterArg::Movie
        ));

        let cli = Cli::parse_from(["tvhero", "subs", "tt0903747", "-s", "1", "-e", "2"]);
        assert!(matches!(cli.command, Command::Subtitles(_)));

        let cli = Cli::parse_from(["tvhero", "lib", "ls"]);
        assert!(matches!(
            cli.command,
            Command::Library(ref cmd) if matches!(cmd.action, LibraryAction::List { name: None })
        ));
    }

    #[test]
    fn test_info_requires_media_type() {
        assert!(Cli::try_parse_from(["tvhero", "info", "603"]).is_err());

        let cli = Cli::parse_from(["tvhero", "info", "603", "-t", "movie"]);
        match cli.command {
            Command::Info(cmd) => {
                assert_eq!(cmd.id, 603);
                assert_eq!(cmd.media_type, CategoryArg::Movie);
            }
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_subtitles_season_requires_episode() {
        assert!(Cli::try_parse_from(["tvhero", "subtitles", "tt0903747", "-s", "1"]).is_err());
        assert!(Cli::try_parse_from(["tvhero", "subtitles", "tt0903747", "-e", "1"]).is_err());
    }

    #[test]
    fn test_library_add() {
        let cli = Cli::parse_from(["tvhero", "library", "add", "לצפייה בסופש", "1396", "-t", "tv"]);
        match cli.command {
            Command::Library(cmd) => match cmd.action {
                LibraryAction::Add { name, id, media_type } => {
                    assert_eq!(name, "לצפייה בסופש");
                    assert_eq!(id, 1396);
                    assert_eq!(media_type, CategoryArg::Tv);
                }
                _ => panic!("Expected Add action"),
            },
            _ => panic!("Expected Library command"),
        }
    }

    #[test]
    fn test_rate_and_status() {
        let cli = Cli::parse_from(["tvhero", "rate", "603"]);
        assert!(matches!(cli.command, Command::Rate(ref cmd) if cmd.rating.is_none()));

        let cli = Cli::parse_from(["tvhero", "rate", "603", "4"]);
        assert!(matches!(cli.command, Command::Rate(ref cmd) if cmd.rating == Some(4)));

        let cli = Cli::parse_from(["tvhero", "status", "603", "--show"]);
        assert!(matches!(cli.command, Command::Status(ref cmd) if cmd.show));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tvhero", "status", "1", "-q", "--user", "noa", "-v"]);
        assert!(cli.quiet);
        assert_eq!(cli.user.as_deref(), Some("noa"));
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Error), 1);
        assert_eq!(i32::from(ExitCode::InvalidArgs), 2);
        assert_eq!(i32::from(ExitCode::NetworkError), 3);
        assert_eq!(i32::from(ExitCode::NoStreams), 5);
        assert_eq!(i32::from(ExitCode::NotSignedIn), 7);
    }
}

// =============================================================================
// JSON Output Tests
// =============================================================================

mod json_output {
    use tvhero::cli::{ExitCode, JsonOutput, PlayResponse, StreamEntry};

    #[test]
    fn test_json_output_success() {
        let output = JsonOutput::success(vec!["a", "b"]);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["data"], serde_json::json!(["a", "b"]));
        assert!(json.get("error").is_none());
        assert!(json.get("exit_code").is_none());
    }

    #[test]
    fn test_json_output_error() {
        let output = JsonOutput::<()>::error_msg("Sign in required", ExitCode::NotSignedIn);
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["error"], "Sign in required");
        assert_eq!(json["exit_code"], 7);
    }

    #[test]
    fn test_play_response_omits_empty_fields() {
        let response = PlayResponse {
            title: "מטריקס (1999)".to_string(),
            state: "ready".to_string(),
            trailer: None,
            streams: vec![StreamEntry {
                resolution: "480p".to_string(),
                url: "http://cdn/480.mp4".to_string(),
            }],
            resolution: Some("480p".to_string()),
            stream_url: Some("http://cdn/480.mp4".to_string()),
            notice: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("trailer").is_none());
        assert!(json.get("notice").is_none());
        assert_eq!(json["streams"][0]["resolution"], "480p");
    }
}

// =============================================================================
// Handler Tests
// =============================================================================

mod handlers {
    use std::io::{Cursor, Write};
    use std::path::Path;

    use clap::Parser;
    use mockito::{Matcher, Server};
    use tvhero::cli::{Cli, Command, ExitCode, Output};
    use tvhero::commands::{self, Context};
    use tvhero::config::Config;

    fn output() -> Output {
        Output {
            json: true,
            quiet: true,
        }
    }

    fn config(server_url: &str, data_dir: &Path) -> Config {
        Config {
            tmdb_api_key: Some("test_key".to_string()),
            tmdb_base_url: Some(server_url.to_string()),
            openai_api_key: Some("sk-test".to_string()),
            inference_base_url: Some(server_url.to_string()),
            subtitle_base_url: Some(server_url.to_string()),
            stream_base_url: Some(server_url.to_string()),
            data_dir: Some(data_dir.to_path_buf()),
            cache_dir: Some(data_dir.join("cache")),
            ..Default::default()
        }
    }

    fn command(args: &[&str]) -> Command {
        let mut argv = vec!["tvhero"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).command
    }

    #[tokio::test]
    async fn test_search_success() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let movie = server
            .mock("GET", "/search/movie")
            .match_query(Matcher::UrlEncoded("query".into(), "dune".into()))
            .with_status(200)
            .with_body(r#"{"results": [{"id": 438631, "title": "Dune", "release_date": "2021-09-15"}]}"#)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Search(cmd) = command(&["search", "dune", "-t", "movie"]) else {
            panic!("Expected Search command");
        };

        let code = commands::search_cmd(cmd, &ctx, &output()).await;
        movie.assert_async().await;
        assert_eq!(code, ExitCode::Success);
    }

    #[tokio::test]
    async fn test_search_short_query_is_invalid() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Search(cmd) = command(&["search", "ab"]) else {
            panic!("Expected Search command");
        };

        assert_eq!(commands::search_cmd(cmd, &ctx, &output()).await, ExitCode::InvalidArgs);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_upstream_failure_is_network_error() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("GET", "/search/tv")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Search(cmd) = command(&["search", "friends", "-t", "tv"]) else {
            panic!("Expected Search command");
        };

        assert_eq!(commands::search_cmd(cmd, &ctx, &output()).await, ExitCode::NetworkError);
    }

    #[tokio::test]
    async fn test_smart_search_requires_sign_in() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let mock = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), Some("  "));
        let Command::SmartSearch(cmd) = command(&["smart-search", "סרט על שודד ים"]) else {
            panic!("Expected SmartSearch command");
        };

        assert_eq!(
            commands::smart_search_cmd(cmd, &ctx, &output()).await,
            ExitCode::NotSignedIn
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_play_series_needs_episode() {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Play(cmd) = command(&["play", "1396", "-t", "tv", "-s", "1"]) else {
            panic!("Expected Play command");
        };

        assert_eq!(commands::play_cmd(cmd, &ctx, &output()).await, ExitCode::InvalidArgs);
    }

    #[tokio::test]
    async fn test_status_and_rate_round_trip() {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(&server.url(), dir.path()), Some("dana"));

        let Command::Status(cmd) = command(&["status", "603"]) else {
            panic!("Expected Status command");
        };
        assert_eq!(commands::status_cmd(cmd, &ctx, &output()).await, ExitCode::Success);

        let Command::Rate(cmd) = command(&["rate", "603", "5"]) else {
            panic!("Expected Rate command");
        };
        assert_eq!(commands::rate_cmd(cmd, &ctx, &output()).await, ExitCode::Success);

        let Command::Rate(cmd) = command(&["rate", "603", "6"]) else {
            panic!("Expected Rate command");
        };
        assert_eq!(commands::rate_cmd(cmd, &ctx, &output()).await, ExitCode::InvalidArgs);

        let profile = std::fs::read_to_string(dir.path().join("dana").join("profile.json")).unwrap();
        let profile: serde_json::Value = serde_json::from_str(&profile).unwrap();
        assert_eq!(profile["statuses"]["603"], "watched");
        assert_eq!(profile["ratings"]["603"], 5);
    }

    #[tokio::test]
    async fn test_library_commands_require_sign_in() {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(&server.url(), dir.path()), Some(""));

        let Command::Library(cmd) = command(&["library", "list"]) else {
            panic!("Expected Library command");
        };
        assert_eq!(commands::library_cmd(cmd, &ctx, &output()).await, ExitCode::NotSignedIn);

        let Command::Status(cmd) = command(&["status", "1", "--show"]) else {
            panic!("Expected Status command");
        };
        assert_eq!(commands::status_cmd(cmd, &ctx, &output()).await, ExitCode::NotSignedIn);
    }

    #[tokio::test]
    async fn test_library_add_hydrates_and_lists() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        server
            .mock("GET", "/movie/603")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": 603, "title": "מטריקס", "release_date": "1999-03-30"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/movie/603/external_ids")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"imdb_id": "tt0133093"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/movie/603/credits")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"cast": []}"#)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), Some("dana"));

        let Command::Library(cmd) = command(&["library", "add", "קלאסיקות", "603", "-t", "movie"]) else {
            panic!("Expected Library command");
        };
        assert_eq!(commands::library_cmd(cmd, &ctx, &output()).await, ExitCode::Success);

        let stored = std::fs::read_dir(dir.path().join("dana").join("libraries"))
            .unwrap()
            .count();
        assert_eq!(stored, 1);

        let Command::Library(cmd) = command(&["library", "rm", "קלאסיקות", "603", "-t", "movie"]) else {
            panic!("Expected Library command");
        };
        assert_eq!(commands::library_cmd(cmd, &ctx, &output()).await, ExitCode::Success);
    }

    #[tokio::test]
    async fn test_subtitles_invalid_imdb_id() {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(config(&server.url(), dir.path()), None);

        let Command::Subtitles(cmd) = command(&["subtitles", "0903747"]) else {
            panic!("Expected Subtitles command");
        };
        assert_eq!(commands::subtitles_cmd(cmd, &ctx, &output()).await, ExitCode::InvalidArgs);
    }

    #[tokio::test]
    async fn test_subtitles_listing_failure_is_network_error() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("GET", "/api/releases/tt0903747")
            .with_status(500)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Subtitles(cmd) = command(&["subtitles", "tt0903747", "-s", "1", "-e", "1"]) else {
            panic!("Expected Subtitles command");
        };
        assert_eq!(commands::subtitles_cmd(cmd, &ctx, &output()).await, ExitCode::NetworkError);
    }

    #[tokio::test]
    async fn test_subtitle_render_to_file() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("episode.srt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"1\n00:00:02,000 --> 00:00:04,000\n!\xd7\xa9\xd7\x9c\xd7\x95\xd7\x9d\n")
            .unwrap();
        let archive = writer.finish().unwrap().into_inner();

        server
            .mock("GET", "/api/files/sub/777")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let out_path = dir.path().join("episode.vtt");
        let out_arg = out_path.to_string_lossy().to_string();
        let Command::Subtitle(cmd) = command(&[
            "subtitle", "777", "--offset", "-1", "--position", "80", "-o", &out_arg,
        ]) else {
            panic!("Expected Subtitle command");
        };

        assert_eq!(commands::subtitle_cmd(cmd, &ctx, &output()).await, ExitCode::Success);

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.starts_with("WEBVTT\n\nSTYLE\n::cue {"));
        assert!(written.contains("00:00:01.000 --> 00:00:03.000 line:80%"));
        assert!(written.contains("שלום!"));
    }

    async fn mock_movie_for_play(server: &mut mockito::ServerGuard) {
        server
            .mock("GET", "/movie/603")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": 603, "title": "מטריקס", "release_date": "1999-03-30"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/movie/603/external_ids")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"imdb_id": "tt0133093"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/movie/603/credits")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"cast": []}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/movie/603/videos")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results": [{"key": "vKQi3bBA1y8", "site": "YouTube", "type": "Trailer"}]}"#)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_play_movie_success() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        mock_movie_for_play(&mut server).await;
        let streams = server
            .mock("GET", "/fetch_stream")
            .match_query(Matcher::UrlEncoded("title".into(), "מטריקס 1999".into()))
            .with_status(200)
            .with_body(r#"{"stream_urls": {"1080p": "http://cdn/1080.m3u8", "480p": "http://cdn/480.m3u8"}}"#)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Play(cmd) = command(&["play", "603", "-t", "movie"]) else {
            panic!("Expected Play command");
        };

        assert_eq!(commands::play_cmd(cmd, &ctx, &output()).await, ExitCode::Success);
        streams.assert_async().await;
    }

    #[tokio::test]
    async fn test_play_provider_error_is_no_streams() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        mock_movie_for_play(&mut server).await;
        server
            .mock("GET", "/fetch_stream")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "הסרט לא נמצא"}"#)
            .create_async()
            .await;

        let ctx = Context::new(config(&server.url(), dir.path()), None);
        let Command::Play(cmd) = command(&["play", "603", "-t", "movie"]) else {
            panic!("Expected Play command");
        };

        assert_eq!(commands::play_cmd(cmd, &ctx, &output()).await, ExitCode::NoStreams);
    }
}
