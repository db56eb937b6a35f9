mod api_doc;
mod constants;
mod error;
mod handlers;
mod middleware;
mod services;
mod setup;
mod state;
mod telemetry;

use vidup_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Storage, services and routes
    let (_state, router) = crate::setup::initialize_app(config.clone()).await?;

    crate::setup::server::start_server(&config, router).await?;

    Ok(())
}
