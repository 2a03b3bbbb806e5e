pub mod allocator;
pub mod average;
pub mod config;
pub mod err;
pub mod io;
pub mod models;
pub mod relations;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::Json;
use serde::Serialize;

use crate::config::{Config, StorageMode};
use crate::err::Error;
use crate::io::{DiskGateway, Gateway, MemoryGateway};
use crate::routes::School;

pub type Payload<T> = Result<Json<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let gateway: Arc<dyn Gateway> = match config.storage {
        StorageMode::Disk => {
            let disk = DiskGateway::new(&config.data_dir);
            disk.prepare().await?;
            Arc::new(disk)
        }
        StorageMode::Memory => {
            log::warn!("Running with in-memory storage, nothing will be saved");
            Arc::new(MemoryGateway::new())
        }
    };

    let school = School::open(gateway).await?;
    let app = school.router();

    log::info!("Starting school records HTTP server on http://{}", config.addr);
    axum::Server::bind(&config.addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Could not listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
