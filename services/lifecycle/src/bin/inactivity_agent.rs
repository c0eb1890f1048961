//! Inactivity Lifecycle Agent
//!
//! Warns, disables and deletes IAM access keys and Tableau users that have
//! gone unused. All credentials come from the environment.
//!
//! # Usage
//! ```bash
//! # Enforce the policy on IAM access keys
//! DISABLE_IN_DAYS=90 DELETE_IN_DAYS=180 inactivity-agent iam
//!
//! # Preview what would happen to Tableau users
//! inactivity-agent --dry-run tableau run
//!
//! # Report inactive Tableau users as JSON
//! inactivity-agent --output json tableau inactive
//!
//! # Create a Tableau user (no-op if it already exists)
//! inactivity-agent tableau create-user --username alice@example.com
//!
//! # Invoke the serverless entry point with an event
//! echo '{"pipeline": "tableau"}' | inactivity-agent handle
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lornu_lifecycle::agents::iam::IamKeyStore;
use lornu_lifecycle::agents::inactivity::handler::{self, InvocationContext};
use lornu_lifecycle::agents::inactivity::{
    InactivityLifecycleAgent, ManagedResource, ResourceStore, RunSummary, ThresholdConfig,
};
use lornu_lifecycle::agents::tableau::{TableauUserStore, DEFAULT_SITE_ROLE};
use lornu_lifecycle::config::{self, TableauConfig};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "inactivity-agent")]
#[command(about = "Lornu AI Inactivity Lifecycle Agent", long_about = None)]
#[command(version)]
struct Cli {
    /// Days of inactivity before a resource is disabled
    #[arg(long, env = "DISABLE_IN_DAYS", global = true)]
    disable_in_days: Option<u32>,

    /// Days of inactivity before a resource is deleted
    #[arg(long, env = "DELETE_IN_DAYS", global = true)]
    delete_in_days: Option<u32>,

    /// Days before disablement that the warning is sent
    #[arg(long, env = "WARN_BEFORE_DAYS", global = true)]
    warn_before_days: Option<u32>,

    /// Classify and report without changing or notifying anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output format for results on stdout
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the policy to IAM access keys
    Iam {
        /// AWS region (defaults to the provider chain)
        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,
    },

    /// Tableau user operations
    Tableau {
        #[command(subcommand)]
        command: TableauCommands,
    },

    /// Invoke the serverless entry point with a JSON event
    Handle {
        /// Event file (reads stdin when omitted)
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TableauCommands {
    /// Apply the policy to Tableau users
    Run,

    /// List users inactive for at least the disable threshold
    Inactive,

    /// Create a user if it does not already exist
    CreateUser {
        /// Username (usually an email address)
        #[arg(long)]
        username: String,

        /// Site role for the new user
        #[arg(long, default_value = DEFAULT_SITE_ROLE)]
        role: String,
    },
}

impl Cli {
    /// Thresholds from flags or their environment fallbacks, validated the
    /// same way as the invocation entry point
    fn thresholds(&self) -> Result<ThresholdConfig> {
        let config = ThresholdConfig::from_lookup(|key| {
            match key {
                config::DISABLE_IN_DAYS => self.disable_in_days,
                config::DELETE_IN_DAYS => self.delete_in_days,
                config::WARN_BEFORE_DAYS => self.warn_before_days,
                _ => None,
            }
            .map(|days| days.to_string())
        })?;
        Ok(config)
    }
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    match &cli.command {
        Commands::Iam { region } => {
            let config = cli.thresholds()?;
            let store = Arc::new(IamKeyStore::new(region.clone()).await);
            let summary = run(store, config, cli.dry_run).await?;
            print_summary(&summary, cli.output)?;
        }

        Commands::Tableau { command } => {
            let tableau_config =
                TableauConfig::from_env().context("Failed to load Tableau configuration")?;
            let store = Arc::new(TableauUserStore::new(tableau_config)?);

            match command {
                TableauCommands::Run => {
                    let config = cli.thresholds()?;
                    let summary = run(store, config, cli.dry_run).await?;
                    print_summary(&summary, cli.output)?;
                }

                TableauCommands::Inactive => {
                    let config = cli.thresholds()?;
                    let result = store.list_inactive_users(&config, Utc::now()).await;
                    release(store.as_ref()).await;
                    print_resources(&result?, cli.output)?;
                }

                TableauCommands::CreateUser { username, role } => {
                    if cli.dry_run {
                        warn!(user = %username, "Dry run: user not created");
                        return Ok(());
                    }
                    let result = store.create_user(username, role).await;
                    release(store.as_ref()).await;
                    print_resources(&[result?], cli.output)?;
                }
            }
        }

        Commands::Handle { event } => {
            let raw = match event {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read event file {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read event from stdin")?;
                    buf
                }
            };
            let event: serde_json::Value = if raw.trim().is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_str(&raw).context("Event is not valid JSON")?
            };

            let context = InvocationContext {
                request_id: uuid::Uuid::new_v4().to_string(),
                function_name: "inactivity-agent".to_string(),
            };

            let response = handler::handle(&event, &context).await;
            println!("{}", serde_json::to_string_pretty(&response)?);

            if response.status_code >= 500 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn run(
    store: Arc<dyn ResourceStore>,
    config: ThresholdConfig,
    dry_run: bool,
) -> Result<RunSummary> {
    let notifier = handler::notifier_from_env()?;
    info!(store = %store.kind(), notifier = notifier.name(), "Inactivity agent starting");

    let agent = InactivityLifecycleAgent::new(store, notifier, config).dry_run(dry_run);
    let summary = agent.run().await.context("Lifecycle run failed")?;

    if !summary.is_clean() {
        warn!(failed = summary.failed.len(), "Some resources could not be processed");
    }
    Ok(summary)
}

async fn release(store: &dyn ResourceStore) {
    if let Err(e) = store.release().await {
        warn!(error = %e, "Failed to release store session");
    }
}

fn print_summary(summary: &RunSummary, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Text => print!("{}", summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}

fn print_resources(resources: &[ManagedResource], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(resources)?),
        OutputFormat::Text => {
            println!("\n{:<40} {:<12} {:<20} {:<30}", "USER", "STATE", "LAST ACTIVITY", "CONTACT");
            println!("{}", "-".repeat(104));

            for resource in resources {
                println!(
                    "{:<40} {:<12} {:<20} {:<30}",
                    resource.id,
                    format!("{:?}", resource.state),
                    resource
                        .last_activity
                        .map(|at| at.date_naive().to_string())
                        .unwrap_or_else(|| "never".to_string()),
                    resource.owner_contact.as_deref().unwrap_or("-")
                );
            }

            info!("Listed {} users", resources.len());
        }
    }
    Ok(())
}
