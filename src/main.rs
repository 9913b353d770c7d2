use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use flowwire::{
    api::ApiClient,
    arguments::get_enabled_debug_modes,
    channel::message::WELCOME,
    config::{self, Config, CONFIG_FILE_PATH},
    logger::{self, LogTag},
    telemetry::{DebugEvent, PollingFeed, TelemetryChannel},
    updates::UpdateChannel,
};

/// Watch the dashboard's live-event channels from a terminal
#[derive(Debug, Parser)]
#[command(name = "flowwire", version, about)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Debug output for the channel internals
    #[arg(long, global = true)]
    debug_channel: bool,

    #[arg(long, global = true)]
    debug_updates: bool,

    #[arg(long, global = true)]
    debug_telemetry: bool,

    #[arg(long, global = true)]
    debug_api: bool,

    #[arg(long, global = true)]
    debug_config: bool,

    #[arg(long, global = true)]
    debug_system: bool,

    /// Verbose output for every tag
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors and warnings only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print messages from the general update channel
    Updates {
        /// Message types to print (repeatable)
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,
    },

    /// Follow debug events and node health from the telemetry channel
    Telemetry {
        /// Only keep events of this workflow
        #[arg(long)]
        workflow: Option<String>,

        /// Also poll the REST endpoint for cached debug events
        #[arg(long)]
        poll: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reads the raw --debug-*/--verbose/--quiet flags clap accepted above
    logger::init();

    let config = load_config(cli.config.as_deref())?;
    logger::apply_settings(&config.logging);

    let modes = get_enabled_debug_modes();
    if !modes.is_empty() {
        logger::info(
            LogTag::System,
            &format!("Debug output enabled for: {}", modes.join(", ")),
        );
    }

    let result = match cli.command {
        Command::Updates { types } => run_updates(&config, types).await,
        Command::Telemetry { workflow, poll } => run_telemetry(&config, workflow, poll).await,
    };

    logger::flush();
    result
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => config::load_config_from_path(path)
            .map_err(|e| anyhow!("loading {}: {}", path, e))?,
        None => config::load_config()
            .map_err(|e| anyhow!("loading {}: {}", CONFIG_FILE_PATH, e))?,
    }

    let config = config::get_config_clone();
    config::validate_config(&config).map_err(|e| anyhow!("invalid configuration: {}", e))?;
    Ok(config)
}

async fn run_updates(config: &Config, mut types: Vec<String>) -> Result<()> {
    let updates = UpdateChannel::from_config(&config.updates);

    if types.is_empty() {
        logger::info(
            LogTag::Updates,
            "No --type given, printing welcome frames only",
        );
        types.push(WELCOME.to_string());
    }

    for event_type in &types {
        updates.on(event_type, |envelope| {
            logger::info(
                LogTag::Updates,
                &format!("{} {}", envelope.event_type, envelope.payload),
            );
        });
    }

    logger::info(
        LogTag::System,
        &format!("Watching {} (Ctrl+C to stop)", config.updates.url),
    );
    updates.connect();

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    updates.disconnect();
    logger::info(LogTag::System, "Shutting down");
    Ok(())
}

async fn run_telemetry(config: &Config, workflow: Option<String>, poll: bool) -> Result<()> {
    let telemetry = TelemetryChannel::from_config(&config.telemetry);
    telemetry.set_workflow(workflow);

    let _attachment = telemetry.attach();

    let _feed = if poll {
        let api = ApiClient::from_config(&config.api).context("building API client")?;
        Some(PollingFeed::from_config(
            telemetry.clone(),
            api,
            &config.telemetry,
        ))
    } else {
        None
    };

    logger::info(
        LogTag::System,
        &format!("Watching {} (Ctrl+C to stop)", config.telemetry.url),
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut last_head: Option<DebugEvent> = None;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl+C")?;
                break;
            }
            _ = ticker.tick() => {
                // Newest first: everything before the previously newest event is new
                let events = telemetry.events();
                let fresh = match &last_head {
                    Some(head) => events
                        .iter()
                        .position(|e| e.is_duplicate_of(head))
                        .unwrap_or(events.len()),
                    None => events.len(),
                };
                for event in events.iter().take(fresh).rev() {
                    logger::info(
                        LogTag::Telemetry,
                        &format!(
                            "{} {} {} ({} bytes)",
                            event.workflow_id,
                            event.node_label.as_deref().unwrap_or(&event.node_id),
                            event.unit_payload.payload_type,
                            event.unit_payload.payload_size
                        ),
                    );
                }
                last_head = events.first().cloned().or(last_head);

                let summary = telemetry.health_summary();
                let link = if telemetry.is_connected() {
                    "connected".to_string()
                } else {
                    telemetry.error().unwrap_or_else(|| "disconnected".to_string())
                };
                logger::info(
                    LogTag::Telemetry,
                    &format!(
                        "{} | {} healthy, {} degraded, {} error",
                        link, summary.healthy, summary.degraded, summary.error
                    ),
                );
            }
        }
    }

    logger::info(LogTag::System, "Shutting down");
    Ok(())
}
