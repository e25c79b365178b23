use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linkgate::auth::hash_token;
use linkgate::config::GateConfig;
use linkgate::http::Gatekeeper;

#[derive(Parser)]
#[command(name = "linkgate")]
#[command(about = "Operator tooling for the short-link API gatekeeping layer", long_about = None)]
struct Cli {
    /// Gate configuration file (YAML)
    #[arg(short, long, env = "LINKGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh digest for an API token, for use as `auth.token_hash`
    Hash {
        /// The plaintext API token
        #[arg(env = "LINKGATE_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Validate the configuration and print the route policies
    Check {
        /// Authenticate this Authorization header value against the digest
        #[arg(long)]
        header: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = match &cli.config {
        Some(path) => GateConfig::from_file(path)?,
        None => GateConfig::default(),
    };

    match cli.command {
        Commands::Hash { token } => {
            let digest = hash_token(&token, &config.auth.hash_cost)?;
            println!("{}", digest);
        }
        Commands::Check { header } => {
            let gate = Gatekeeper::from_config(&config)?;
            info!(
                routes = gate.limiter().policies().len(),
                "Configuration is valid"
            );

            let mut routes: Vec<_> = gate.limiter().policies().iter().collect();
            routes.sort_by(|a, b| a.0.cmp(b.0));
            for (route, policy) in routes {
                println!(
                    "{:<32} {:>4} per {:?}",
                    route,
                    policy.limit(),
                    policy.window()
                );
            }

            if let Some(header) = header {
                match gate.verifier().authenticate(&header) {
                    Ok(_) => println!("header: authorized"),
                    Err(e) => {
                        warn!("Sample header was not accepted");
                        println!("header: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}
