//! TVHero - Hebrew movie and TV tracker
//!
//! # Usage
//!
//! ```bash
//! tvhero smart-search "סדרת מתח סקנדינבית"
//! tvhero search "הכלה מאיסטנבול" -t tv
//! tvhero play 603 -t movie --json
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tvhero::cli::{Cli, Command, ExitCode, Output};
use tvhero::commands::{self, Context};
use tvhero::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    run_cli(cli).await.into()
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tvhero={}", cli.log_level())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
        },
        None => Config::load(),
    };
    let ctx = Context::new(config, cli.user.as_deref());

    match cli.command {
        Command::SmartSearch(cmd) => commands::smart_search_cmd(cmd, &ctx, &output).await,
        Command::Search(cmd) => commands::search_cmd(cmd, &ctx, &output).await,
        Command::Info(cmd) => commands::info_cmd(cmd, &ctx, &output).await,
        Command::Trailer(cmd) => commands::trailer_cmd(cmd, &ctx, &output).await,
        Command::Seasons(cmd) => commands::seasons_cmd(cmd, &ctx, &output).await,
        Command::Episodes(cmd) => commands::episodes_cmd(cmd, &ctx, &output).await,
        Command::Play(cmd) => commands::play_cmd(cmd, &ctx, &output).await,
        Command::Subtitles(cmd) => commands::subtitles_cmd(cmd, &ctx, &output).await,
        Command::Subtitle(cmd) => commands::subtitle_cmd(cmd, &ctx, &output).await,
        Command::Library(cmd) => commands::library_cmd(cmd, &ctx, &output).await,
        Command::Status(cmd) => commands::status_cmd(cmd, &ctx, &output).await,
        Command::Rate(cmd) => commands::rate_cmd(cmd, &ctx, &output).await,
    }
}
