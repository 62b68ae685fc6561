//! modem-auth CLI
//!
//! Discover how a modem authenticates, poll it once, and inspect stored
//! target records.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use modem_auth::{
    config::load_config,
    error::{AppError, Result},
    models::{Config, Credentials, DiscoveryHints},
    pipeline::{ExtractorSet, Orchestrator},
    services,
    storage::{LocalStore, StoredTarget, TargetStore},
    utils::http::DeviceClient,
};

/// modem-auth - cable modem authentication discovery
#[derive(Parser, Debug)]
#[command(
    name = "modem-auth",
    version,
    about = "Discover and poll cable modem web interfaces"
)]
struct Cli {
    /// Directory holding config.toml and stored target records
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the authentication strategy of a configured target or an address
    Discover {
        /// Target id from config.toml, or a device address
        target: String,

        /// Save the discovered record (configured targets only)
        #[arg(long)]
        save: bool,
    },

    /// Run one poll cycle against a stored target
    Poll {
        target: String,

        /// Print raw bodies instead of extracted records
        #[arg(long)]
        raw: bool,
    },

    /// Validate configuration files
    Validate,

    /// Show the stored record of a target
    Show { target: String },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Credentials for an ad-hoc address come from the standard variables.
fn env_credentials() -> Option<Credentials> {
    Credentials::from_env("MODEM_USERNAME", "MODEM_PASSWORD")
}

async fn discover(
    config: &Config,
    store: &LocalStore,
    target: &str,
    save: bool,
) -> Result<()> {
    let (id, address, credentials, hints) = match config.target(target) {
        Some(configured) => (
            Some(configured.id.clone()),
            configured.address.clone(),
            configured.credentials(),
            configured.hints.clone(),
        ),
        None => (None, target.to_string(), env_credentials(), DiscoveryHints::default()),
    };

    let outcome = services::discover(&address, credentials.as_ref(), &hints, config).await;
    let (_, discovery) = match outcome {
        Ok(found) => found,
        Err(AppError::NoMatchingStrategy { signals }) => {
            log::error!("No authentication strategy worked for {}", address);
            for signal in &signals {
                println!("  {signal}");
            }
            return Err(AppError::NoMatchingStrategy { signals });
        }
        Err(e) => return Err(e),
    };

    println!("Strategy: {}", discovery.config.kind());
    println!("{}", serde_json::to_string_pretty(&discovery.config)?);
    println!("Data paths: {:?}", discovery.data_paths);
    for candidate in discovery.candidates.iter().take(3) {
        println!("Candidate: {} ({:.2})", candidate.profile.name, candidate.score);
    }
    println!("Signals:");
    for signal in &discovery.signals {
        println!("  {signal}");
    }

    if save {
        match id {
            Some(id) => {
                let record = StoredTarget::from_discovery(id, address, &discovery);
                store.save(&record).await?;
            }
            None => log::warn!("--save needs a target id from config.toml; not saved"),
        }
    }
    Ok(())
}

async fn poll(config: &Config, store: &LocalStore, target: &str, raw: bool) -> Result<()> {
    let configured = config
        .target(target)
        .ok_or_else(|| AppError::config(format!("Unknown target '{target}'")))?;
    let mut record = store.load(target).await?.ok_or_else(|| {
        AppError::config(format!("No stored record for '{target}'. Run 'discover --save' first."))
    })?;

    let client = DeviceClient::connect(&record.address, &config.http)?;
    let mut orchestrator = Orchestrator::new(
        client,
        record.auth.clone(),
        record.data_paths.clone(),
        &config.circuit,
    )?;
    let credentials = configured.credentials();

    if raw {
        let data = orchestrator.poll(credentials.as_ref()).await?;
        for body in &data.bodies {
            println!("== {} ({})", body.resource, body.status);
            println!("{}", body.body);
        }
    } else {
        let extractors = ExtractorSet::default();
        let (_, records, selection) = orchestrator
            .poll_records(credentials.as_ref(), &extractors, &record.extractor)
            .await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        record.update_extractor(selection);
    }

    if record.update_auth(orchestrator.config()) {
        log::info!("Negotiated parameters changed, updating record");
    }
    store.save(&record).await?;
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = load_config(&config_path)?;
    let store = LocalStore::new(&cli.storage_dir);

    match cli.command {
        Command::Discover { target, save } => discover(&config, &store, &target, save).await?,

        Command::Poll { target, raw } => poll(&config, &store, &target, raw).await?,

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!(
                "✓ Config OK ({} targets, {} known profiles)",
                config.targets.len(),
                config.discovery.profiles.len()
            );
        }

        Command::Show { target } => match store.load(&target).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => log::info!("No stored record for {}", target),
        },
    }

    Ok(())
}
