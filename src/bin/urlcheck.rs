//! Offline URL validation CLI.
//!
//! Runs a URL through the gateway's validation pipeline without fetching
//! it. Useful for auditing a policy config against known-bad URLs.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use fetch_gateway::config::{load_config, GatewayConfig};
use fetch_gateway::validate::address::AddressClassifier;
use fetch_gateway::validate::resolver::{HostResolver, SystemResolver};
use fetch_gateway::UrlValidator;

#[derive(Parser)]
#[command(name = "urlcheck")]
#[command(about = "Validate a URL against the gateway policy without fetching it", long_about = None)]
struct Cli {
    /// The URL to validate.
    url: String,

    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                return ExitCode::from(2);
            }
        },
        None => GatewayConfig::default(),
    };

    let classifier = match AddressClassifier::from_config(&config.policy.blocked_ranges) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            eprintln!("Error building classifier: {}", e);
            return ExitCode::from(2);
        }
    };

    let resolver: Arc<dyn HostResolver> = Arc::new(SystemResolver);
    let validator = UrlValidator::from_config(&config.policy, classifier, resolver);

    let report = match validator.validate(&cli.url).await {
        Ok(cleared) => {
            let addrs: Vec<String> = cleared.resolved.iter().map(ToString::to_string).collect();
            json!({
                "url": cli.url,
                "allowed": true,
                "resolved": addrs,
            })
        }
        Err(denial) => json!({
            "url": cli.url,
            "allowed": false,
            "code": denial.code.as_str(),
            "reason": denial.message,
        }),
    };

    let allowed = report["allowed"].as_bool().unwrap_or(false);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_default()
    );

    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
