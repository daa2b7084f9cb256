//! Montage command-line entry point of the workshop portal.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use montage_core::MontageError;
use montage_core::models::account::PricingTier;
use montage_core::models::job::{Category, DiamondCut, FinishingOptions, GlassOption, Urgency};
use montage_core::pricing::{PriceCalculator, PriceTable, round_money};
use montage_db::{DbConfig, DbError, DbManager};
use montage_service::ServiceConfig;
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "montage")]
#[command(version)]
#[command(about = "Lens finishing workshop portal")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate(DbArgs),

    /// Price a job without storing it
    Quote(QuoteArgs),

    /// Print the effective service configuration as JSON
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct DbArgs {
    /// SurrealDB WebSocket address
    #[arg(long, env = "MONTAGE_DB_URL", default_value = "127.0.0.1:8000")]
    url: String,

    #[arg(long, env = "MONTAGE_DB_NAMESPACE", default_value = "montage")]
    namespace: String,

    #[arg(long, env = "MONTAGE_DB_DATABASE", default_value = "portal")]
    database: String,

    #[arg(long, env = "MONTAGE_DB_USERNAME", default_value = "root")]
    username: String,

    #[arg(
        long,
        env = "MONTAGE_DB_PASSWORD",
        default_value = "root",
        hide_env_values = true
    )]
    password: String,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        Self {
            url: args.url,
            namespace: args.namespace,
            database: args.database,
            username: args.username,
            password: args.password,
        }
    }
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Service configuration file (JSON); missing keys take defaults
    #[arg(long, env = "MONTAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Price table file (JSON), overriding the one in the configuration
    #[arg(long, env = "MONTAGE_PRICE_TABLE")]
    price_table: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Frame category: rimmed, drilled or half-rim
    #[arg(long)]
    category: Category,

    /// Pricing tier of the shop (1 = standard, 2 = preferential)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    tier: u8,

    /// Glass treatment; repeat for several
    #[arg(long = "glass")]
    glass: Vec<GlassOption>,

    #[arg(long, default_value = "standard")]
    urgency: Urgency,

    #[arg(long, default_value = "standard")]
    diamond_cut: DiamondCut,

    #[arg(long, default_value_t = 0)]
    engravings: u8,

    #[arg(long)]
    shape_change: bool,

    #[command(flatten)]
    settings: ConfigArgs,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Montage(#[from] MontageError),
}

#[derive(Debug, Serialize)]
struct Quote {
    tier: u8,
    options: Vec<String>,
    subtotal: Decimal,
    price: Decimal,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(args: &ConfigArgs) -> Result<ServiceConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => read_json::<ServiceConfig>(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(path) = &args.price_table {
        config.price_table = read_json::<PriceTable>(path)?;
    }
    if !config.price_table.is_preferential_monotone() {
        warn!("Price table has preferential rates above standard ones");
    }
    Ok(config)
}

fn quote(args: QuoteArgs) -> Result<Quote, CliError> {
    let config = load_config(&args.settings)?;
    let tier = PricingTier::try_from(args.tier)?;
    let options = FinishingOptions {
        category: args.category,
        glass_options: args.glass.into_iter().collect::<BTreeSet<_>>(),
        urgency: args.urgency,
        diamond_cut: args.diamond_cut,
        engraving_count: args.engravings,
        shape_change: args.shape_change,
    };
    options.validate()?;

    let calculator = PriceCalculator::new(config.price_table);
    Ok(Quote {
        tier: tier.as_u8(),
        options: options.describe(),
        subtotal: round_money(calculator.subtotal(&options, tier)),
        price: round_money(calculator.compute(&options, tier)),
    })
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Migrate(args) => {
            let manager = DbManager::connect(&DbConfig::from(args)).await?;
            let version = manager.migrate().await?;
            if version.changed() {
                info!(from = version.previous, to = version.current, "Schema migrated");
            } else {
                info!(version = version.current, "Schema is up to date");
            }
        }
        Command::Quote(args) => {
            let quote = quote(args)?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
        Command::Config(args) => {
            let config = load_config(&args)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so command output stays machine-readable.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("montage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}
