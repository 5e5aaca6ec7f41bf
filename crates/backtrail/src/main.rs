//! `backtrail` - CLI for the background location recorder
//!
//! This binary records significant location changes and inspects the recorded
//! database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use backtrail::cli::output::{write_records, write_status};
use backtrail::cli::{Cli, Command, ConfigCommand, ListCommand, RecordCommand};
use backtrail::presenter::{RowFormatter, TrailStyle};
use backtrail::{init_logging, Config, LocationController, LocationService, LocationStore, TerminalView};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Record(record_cmd) => handle_record(config, &record_cmd),
        Command::List(list_cmd) => handle_list(&config, &list_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn row_formatter(config: &Config) -> RowFormatter {
    if config.display.utc {
        RowFormatter::utc()
    } else {
        RowFormatter::local()
    }
}

fn handle_record(mut config: Config, cmd: &RecordCommand) -> anyhow::Result<()> {
    config.override_provider(cmd.provider.map(Into::into), cmd.replay.clone());
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(record(&config))
}

async fn record(config: &Config) -> anyhow::Result<()> {
    let mut store = LocationStore::open(config.database_path())?;
    let service = LocationService::from_config(config)?;
    info!(
        "Recording from {} into {}",
        service.provider_name(),
        store.path().display()
    );

    let style = TrailStyle {
        stroke_color: config.display.trail_color.clone(),
        line_width: config.display.trail_width,
    };
    let view = TerminalView::new(std::io::stdout());
    let mut controller = LocationController::new(&mut store, service, view)
        .with_formatter(row_formatter(config))
        .with_trail_style(style);

    controller.did_load();
    controller.did_appear().await?;

    let outcome = tokio::select! {
        result = controller.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping");
            Ok(())
        }
    };

    if let Err(e) = controller.stop() {
        error!("Failed to stop location provider: {}", e);
    }
    drop(controller);

    // Save whatever was staged, even if the run itself failed.
    let closed = store.close();
    outcome?;
    closed?;
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let store = LocationStore::open(config.database_path())?;
    let records = match cmd.limit {
        Some(limit) => store.recent(limit)?,
        None => store.locations()?,
    };

    let mut stdout = std::io::stdout().lock();
    write_records(&mut stdout, &records, cmd.format, &row_formatter(config))?;
    stdout.flush()?;
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let path = config.database_path();
    let store = LocationStore::open(&path)?;
    let stats = store.stats()?;

    let mut stdout = std::io::stdout().lock();
    write_status(&mut stdout, &stats, &path, json, &row_formatter(config))?;
    stdout.flush()?;
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Location]");
                println!("  Provider:           {}", config.location.provider);
                println!(
                    "  Significant change: {} m",
                    config.location.significant_distance_m
                );
                println!();
                println!("[gpsd]");
                println!("  Address:            {}", config.gpsd_address());
                println!();
                println!("[Replay]");
                println!(
                    "  Path:               {}",
                    config
                        .replay
                        .path
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |p| p.display().to_string())
                );
                println!("  Interval:           {} ms", config.replay.interval_ms);
                println!("  Grant:              {:?}", config.replay.grant);
                println!(
                    "  Significant change: {}",
                    config.replay.significant_change_available
                );
                println!();
                println!("[Display]");
                println!("  UTC:                {}", config.display.utc);
                println!(
                    "  Trail:              {} {}pt",
                    config.display.trail_color, config.display.trail_width
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate()) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
