use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use newsletter_digest::config::Settings;
use newsletter_digest::pipeline::{self, LiveBackend};

#[derive(Parser)]
#[command(name = "newsletter_digest")]
#[command(about = "Summarize unread newsletters into one daily digest email", long_about = None)]
struct Cli {
    /// TOML settings file; environment variables take precedence over it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Upper bound on unread messages fetched in one run
    #[arg(long)]
    max_results: Option<u32>,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let cli = Cli::parse();

    info!("Starting newsletter digest at {}", Local::now());

    let settings = load_settings(&cli)?;
    let report = pipeline::run(settings, &LiveBackend);

    info!("Run finished in state {}", report.final_state());
    Ok(ExitCode::from(report.exit_code()))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    // An explicit --config must exist; the default location is optional.
    let file = match &cli.config {
        Some(path) => Settings::load_file(path)?,
        None => match Settings::default_file() {
            Some(path) if path.exists() => Settings::load_file(&path)?,
            _ => Settings::default(),
        },
    };

    let mut settings = file.merge(Settings::from_env());
    if let Some(n) = cli.max_results {
        settings.max_results = Some(n.to_string());
    }
    Ok(settings)
}
