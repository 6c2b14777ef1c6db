//! closer-bucket operator binary: runs one engine operation against the shared stores and
//! prints the result as JSON.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use closer_bucket::{
    AppState, BucketConfig, SharedState,
    dto::{
        admin::{AddCloserRequest, SetCycleLengthRequest, SetWeightRequest, UpdateCloserRequest},
        draw::{CooldownRequest, DEFAULT_DRAW_KIND, DrawRequest},
    },
    services::{admin_service, draw_service, health_service, public_service},
};

#[derive(Debug, Parser)]
#[command(name = "closer-bucket", version)]
#[command(about = "Run one closer bucket operation and print the result as JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Draw a closer for every USER; the draws run concurrently.
    Draw {
        #[arg(long, default_value = DEFAULT_DRAW_KIND)]
        kind: String,
        /// Customer the drawn closer is assigned to.
        #[arg(long)]
        label: Option<String>,
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Whether USER may draw KIND right now.
    Cooldown {
        user: String,
        #[arg(default_value = DEFAULT_DRAW_KIND)]
        kind: String,
    },
    /// Tickets and weights of the current cycle.
    Composition,
    /// Configured closers.
    Roster,
    /// Lifetime draw counts.
    Stats,
    /// Reachability of both storage tiers.
    Health,
    /// Most recent draws, newest first.
    History {
        #[arg(default_value_t = 20)]
        limit: usize,
    },
    /// Restore every default weight and start a new cycle.
    Reset,
    SetWeight {
        closer: String,
        #[arg(allow_negative_numbers = true)]
        weight: f64,
    },
    /// Change how many draws make up a cycle.
    Cycle { length: u32 },
    AddCloser {
        name: String,
        display_name: String,
        color: String,
        default_weight: f64,
    },
    RemoveCloser { name: String },
    /// Edit a closer; omitted fields are left unchanged.
    UpdateCloser {
        name: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        default_weight: Option<f64>,
        #[arg(long)]
        active: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = BucketConfig::load();
    let state = AppState::open(config).context("opening closer bucket stores")?;
    info!(command = ?cli.command, "running command");

    run(&state, cli.command).await
}

async fn run(state: &SharedState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Draw { kind, label, users } => {
            let draws = users.into_iter().map(|user| {
                let mut request = DrawRequest::new(user, kind.clone());
                request.customer_label = label.clone();
                draw_service::draw(state, request)
            });

            let mut results = Vec::new();
            let mut failed = 0;
            for outcome in join_all(draws).await {
                match outcome {
                    Ok(response) => results.push(serde_json::to_value(response)?),
                    Err(err) => {
                        error!(error = %err, "draw failed");
                        failed += 1;
                        results.push(serde_json::json!({ "status": "error", "message": err.to_string() }));
                    }
                }
            }
            print_json(&results)?;
            if failed > 0 {
                bail!("{failed} draw(s) failed");
            }
        }
        Command::Cooldown { user, kind } => print_json(
            &draw_service::check_cooldown(state, CooldownRequest::new(user, kind)).await?,
        )?,
        Command::Composition => print_json(&public_service::get_composition(state).await?)?,
        Command::Roster => print_json(&public_service::get_roster(state).await?)?,
        Command::Stats => print_json(&public_service::get_stats(state).await?)?,
        Command::Health => print_json(&health_service::health(state).await?)?,
        Command::History { limit } => {
            print_json(&public_service::recent_draws(state, limit).await?)?
        }
        Command::Reset => print_json(&admin_service::reset_all(state).await?)?,
        Command::SetWeight { closer, weight } => print_json(
            &admin_service::set_weight(state, SetWeightRequest { closer, weight }).await?,
        )?,
        Command::Cycle { length } => print_json(
            &admin_service::set_cycle_length(
                state,
                SetCycleLengthRequest {
                    cycle_length: length,
                },
            )
            .await?,
        )?,
        Command::AddCloser {
            name,
            display_name,
            color,
            default_weight,
        } => print_json(
            &admin_service::add_closer(
                state,
                AddCloserRequest {
                    name,
                    display_name,
                    color,
                    default_weight,
                    active: true,
                },
            )
            .await?,
        )?,
        Command::RemoveCloser { name } => {
            print_json(&admin_service::remove_closer(state, name).await?)?
        }
        Command::UpdateCloser {
            name,
            display_name,
            color,
            default_weight,
            active,
        } => {
            let update = UpdateCloserRequest {
                display_name,
                color,
                default_weight,
                active,
            };
            print_json(&admin_service::update_closer_metadata(state, name, update).await?)?
        }
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("rendering output")?;
    println!("{rendered}");
    Ok(())
}

/// Configure tracing so logs go to stderr and never mix with the JSON output.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
