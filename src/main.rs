use derma::config::Config;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // read the layered application configuration
    let config = Arc::new(Config::new()?);

    // initialize tracing with an env-filter, e.g. `RUST_LOG=derma=debug`
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    derma::start(config).await
}
