/*!
 * BlockTrace CLI - Command Line Interface
 *
 * Thin front end over the typed ledger client: every subcommand maps to one
 * call on `LedgerClient`.
 */

use blocktrace::{
    build_client,
    config::ClientConfig,
    connect::{CallResult, EndpointIdentity, LedgerClient, NewStep},
    error::{BlockTraceError, Result, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    output::{self, Icons, Theme},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "blocktrace")]
#[command(version, about = "Record and inspect product provenance on a BlockTrace ledger", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/blocktrace/config.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Ledger host, e.g. http://127.0.0.1:8081
    #[arg(long, global = true)]
    host: Option<String>,

    /// Ledger service identifier
    #[arg(long = "service-id", global = true)]
    service_id: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and report the connection state
    Status,

    /// Describe the ledger service
    Info,

    /// Append a provenance step to a product's history
    AddStep {
        #[arg(long = "product")]
        product_id: String,

        #[arg(long = "actor")]
        actor_name: String,

        #[arg(long)]
        role: String,

        #[arg(long)]
        action: String,

        #[arg(long)]
        location: String,

        /// Free-form note; a non-empty note marks the step as verified
        #[arg(long)]
        notes: Option<String>,
    },

    /// List every product with recorded history
    Products,

    /// Show the history of one product
    History {
        /// Product identifier
        product_id: String,
    },

    /// Total number of steps on the ledger
    Count,

    /// Products, steps and verified steps across the whole ledger
    Summary,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", Theme::error(Icons::ERROR), e);
            if let Some(hint) = e.remediation() {
                eprintln!("  {}", Theme::muted(hint));
            }
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if cli.host.is_some() {
        config.host = cli.host.clone();
    }
    if cli.service_id.is_some() {
        config.service_id = cli.service_id.clone();
    }
    config.verbose |= cli.verbose;

    logging::init_logging(&config)?;

    let (endpoint, client) = build_client(&config)?;
    debug!("Using ledger {}", endpoint);

    let result = dispatch(&cli, &client, &endpoint).await;
    client.disconnect().await;
    result
}

async fn dispatch(
    cli: &Cli,
    client: &LedgerClient,
    endpoint: &EndpointIdentity,
) -> Result<i32> {
    match &cli.command {
        Commands::Status => {
            client.connect().await;
            let status = client.status().await;
            if cli.json {
                output::print_json(&status)?;
            } else {
                println!("{}", output::status_table(&status, endpoint));
            }
            Ok(if status.connected {
                EXIT_SUCCESS
            } else {
                EXIT_PARTIAL
            })
        }

        Commands::Info => {
            let info = client.describe_service().await?;
            if cli.json {
                output::print_json(&serde_json::json!({ "info": info }))?;
            } else {
                println!("{}", info);
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::AddStep {
            product_id,
            actor_name,
            role,
            action,
            location,
            notes,
        } => {
            let mut step = NewStep::new(product_id, actor_name, role, action, location);
            step.notes = notes.clone();

            let result = client.add_step(step).await?;
            if cli.json {
                output::print_json(&result)?;
                return Ok(if result.is_ok() {
                    EXIT_SUCCESS
                } else {
                    EXIT_PARTIAL
                });
            }

            match result {
                CallResult::Ok(message) => {
                    println!("{} {}", Theme::success(Icons::SUCCESS), message);
                    Ok(EXIT_SUCCESS)
                }
                CallResult::Err(message) => Err(BlockTraceError::Rejected(message)),
            }
        }

        Commands::Products => {
            let products = client.get_all_entities().await?;
            if cli.json {
                output::print_json(&products)?;
            } else if products.is_empty() {
                println!("{}", Theme::muted("No products recorded yet"));
            } else {
                for product in &products {
                    println!("{}", product);
                }
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::History { product_id } => {
            let history = client.get_history(product_id).await?;
            if cli.json {
                output::print_json(&history)?;
            } else if history.is_empty() {
                println!("{}", Theme::muted(format!("No history for {}", product_id)));
            } else {
                println!("{}", output::history_table(&history));
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Count => {
            let count = client.get_total_event_count().await?;
            if cli.json {
                output::print_json(&serde_json::json!({ "count": count }))?;
            } else {
                println!("{}", count);
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Summary => {
            let summary = client.refresh_summary().await?;
            if cli.json {
                output::print_json(&summary)?;
            } else {
                println!("{}", output::summary_table(&summary));
                if summary.is_partial() {
                    eprintln!(
                        "{} {}",
                        Theme::warning(Icons::WARNING),
                        Theme::warning("Some histories could not be read; verified count may be low")
                    );
                }
            }
            Ok(if summary.is_partial() {
                EXIT_PARTIAL
            } else {
                EXIT_SUCCESS
            })
        }
    }
}
