// Tests may unwrap; the binary may not.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use toyssd::{SimConfig, System};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toyssd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment variables
    let config = match SimConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: hosts={}, direct_link={}, bus_latency={}, bus_lanes={}, storage_concurrency={}",
        config.hosts,
        config.direct_link,
        config.bus.latency,
        config.bus.lanes,
        config.storage.concurrency
    );

    let mut system = match System::new(&config) {
        Ok(system) => system,
        Err(e) => {
            tracing::error!("Failed to build system: {e}");
            std::process::exit(1);
        }
    };

    let result = match system.run_workload() {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Simulation failed: {e}");
            std::process::exit(1);
        }
    };

    // The result on stdout is the only output other tools consume.
    match serde_json::to_string(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to encode result: {e}");
            std::process::exit(1);
        }
    }
}
