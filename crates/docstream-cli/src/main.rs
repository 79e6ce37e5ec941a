//! docstream - command-line client for streaming document analysis.

use clap::Parser;
use docstream_cli::commands;
use docstream_cli::config::OutputFormat;
use docstream_cli::{Cli, Command, Config, Formatter};

#[tokio::main]
async fn main() {
    docstream_cli::init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> docstream_cli::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(profile_name) = cli.profile.clone() {
        config.switch_profile(profile_name)?;
    }

    let json_requested = matches!(&cli.command, Command::Analyze(args) if args.json);
    let format = if json_requested {
        OutputFormat::Json
    } else {
        cli.format.map(Into::into).unwrap_or(config.settings.format)
    };
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Profile(args) => commands::execute_profile(args, &mut config, &formatter)?,
        Command::Analyze(args) => {
            let profile = config.get_active_profile()?;
            commands::execute_analyze(args, profile, &config.settings, &formatter).await?;
        }
        Command::Stop(args) => {
            let profile = config.get_active_profile()?;
            commands::execute_stop(args, profile, &formatter).await?;
        }
    }

    Ok(())
}
