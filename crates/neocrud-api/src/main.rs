//! CLI entry point for the neocrud resolver.

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, EnvFilter};

use neocrud_api::config::{build_service, load_store_config, StoreKind};
use neocrud_api::error::ApiError;
use neocrud_api::resolver::Resolver;
use neocrud_api::server::serve;

#[derive(Parser)]
#[command(name = "neocrud")]
#[command(about = "CRUD resolver over a Neo4j property graph")]
struct Cli {
    /// Store backend.
    #[arg(long, value_enum, default_value_t = StoreKind::Neo4j, global = true)]
    store: StoreKind,

    /// Config file prefix (default: neocrud).
    #[arg(short, long, default_value = "neocrud", global = true)]
    config: String,

    /// Per-operation timeout in milliseconds; 0 disables it.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify store connectivity and APOC availability.
    Check,

    /// Run one resolver operation and print its JSON result.
    Exec {
        /// Operation name, e.g. createNode or getAllNodes.
        operation: String,

        /// Operation arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Answer JSON-lines requests from stdin on stdout until EOF.
    Serve {
        /// Maximum requests resolved concurrently.
        #[arg(long, default_value_t = 64)]
        max_in_flight: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries results; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store_config = load_store_config(&cli.config, cli.timeout_ms)?;
    let service = build_service(cli.store, &store_config).await?;
    tracing::info!(
        store = ?cli.store,
        timeout_ms = store_config.statement_timeout_ms,
        "Service ready"
    );

    match cli.command {
        Command::Check => {
            let version = service.verify_connectivity().await?;
            println!("{}", serde_json::json!({ "ok": true, "apoc": version }));
        }
        Command::Exec { operation, args } => {
            let args: serde_json::Value = serde_json::from_str(&args).map_err(ApiError::from)?;
            let resolver = Resolver::new(service);
            let result = resolver
                .resolve(&operation, args)
                .await
                .map_err(ApiError::from)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Serve { max_in_flight } => {
            let resolver = Resolver::new(service);
            let stdin = BufReader::new(tokio::io::stdin());
            let stats = serve(resolver, stdin, tokio::io::stdout(), max_in_flight).await?;
            tracing::info!(requests = stats.requests, "Serve finished");
        }
    }

    Ok(())
}
