use tracing::{debug, error, info};

use filedrop::{Config, Store};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("filedrop.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load filedrop.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    match filedrop::logging::init(&config.logging) {
        Ok(sink) => debug!("Logging to {:?}", sink),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            filedrop::logging::init_console_only(&config.logging.level);
        }
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let store = match Store::from_config(&config.storage) {
        Ok(store) => store,
        Err(e) => {
            error!("Could not open storage: {}", e);
            std::process::exit(1);
        }
    };

    info!("filedrop - constrained file drop");
    info!("{}", store);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down, {} file(s) tracked", store.len().await);
}
