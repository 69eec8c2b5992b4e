use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use homebridge_outlets::{Config, HomebridgeClient};

/// Name of an outlet to toggle once after listing (optional).
const ENV_TOGGLE_OUTLET: &str = "HOMEBRIDGE_TOGGLE_OUTLET";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let mut client = HomebridgeClient::connect(config)
        .await
        .context("Failed to connect to Homebridge")?;
    info!(available = client.is_available(), "Connected to Homebridge");

    for outlet in client.outlets() {
        println!(
            "{:<30} {:<4} {}",
            outlet.name,
            if outlet.is_on { "on" } else { "off" },
            outlet.unique_id.as_deref().unwrap_or("-"),
        );
    }

    let Some(name) = std::env::var(ENV_TOGGLE_OUTLET).ok().filter(|n| !n.is_empty()) else {
        return Ok(());
    };

    let outlet = client
        .find_outlet(&name)
        .with_context(|| format!("no outlet named {name:?}"))?;
    let unique_id = outlet
        .unique_id
        .as_deref()
        .with_context(|| format!("outlet {name:?} has no uniqueId"))?;

    if client.toggle_outlet(unique_id, &outlet.toggle_payload()).await? {
        println!("{} switched {}", outlet.name, if outlet.is_on { "off" } else { "on" });
    } else {
        warn!(outlet = %outlet.name, "Bridge refused the toggle");
    }

    Ok(())
}
